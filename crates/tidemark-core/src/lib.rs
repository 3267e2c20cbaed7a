//! tidemark-core: the editing engine behind an effect-timeline video editor.
//!
//! The engine keeps three representations of one project in agreement:
//!
//! - [`timeline::Timeline`] — the in-memory ordered list of effect items
//! - [`history::History`] — the linear, truncatable log of user actions,
//!   navigated by undo/redo
//! - [`db::store::Store`] — the durable SQLite representation, updated
//!   incrementally by replaying the pending slice of the history log
//!
//! [`session::Session`] ties the three together for one open project and is
//! the only type most callers need. [`sync::sync`] is the replay engine that
//! drains recorded actions (forward) or their inverses (backward) into store
//! primitives, one transaction per action.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums per module; `anyhow::Result` at the
//!   session/orchestration seam.
//! - **Logging**: `tracing` macros; the library installs no subscriber.

pub mod db;
pub mod effect;
pub mod history;
pub mod session;
pub mod sync;
pub mod timeline;

pub use db::{ItemId, Store, StoreError};
pub use effect::{CatalogError, EffectCatalog, EffectDescriptor, EffectRef, MemoryCatalog};
pub use history::{Action, History};
pub use session::Session;
pub use sync::{sync, SyncError, SyncReport};
pub use timeline::{Timeline, TimelineError, TimelineItem};
