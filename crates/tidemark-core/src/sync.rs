//! Replays the pending slice of the history log into store primitives.
//!
//! The history log carries two pointers: `undo_pointer` (where the user is)
//! and `synced_pointer` (where the save file is). Draining the range between
//! them makes the store match the in-memory timeline as of the current log
//! position:
//!
//! | Action | Forward | Inverse (backward drain) |
//! |---|---|---|
//! | Append | `append_item` + `save_parameters` | `undo_last_append` |
//! | Insert | `insert_item` + `save_parameters` | `remove_item(index)` |
//! | Remove | `remove_item(index)` | `insert_item(index)` + `save_parameters` |
//! | Edit | remove + insert replacement | remove + insert original |
//! | Move | remove at `from`, insert at `to` | remove at `to`, insert at `from` |
//! | SetInputPath / SetOutputPath | upsert current | upsert previous |
//!
//! Each log entry commits as one transaction before the next is touched, and
//! the synced pointer moves only past fully committed entries. A failure
//! aborts the drain: the entry's transaction is rolled back, earlier commits
//! stay, and a retry resumes at the failed entry. No compensating rollback
//! across entries is attempted.
//!
//! Edit and Move never update in place — the row is reborn with a fresh
//! `item_id` each time, including on redo. Downstream code treats the re-id
//! as expected.

use crate::db::schema;
use crate::db::store::{Store, StoreError};
use crate::history::{Action, History};

/// What one drain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries replayed forward.
    pub applied: usize,
    /// Entries replayed backward (inverted).
    pub reverted: usize,
}

/// A drain aborted mid-range. `position` and `action` identify the log entry
/// whose transaction failed; everything before it (in drain order) is
/// committed and the synced pointer reflects that.
#[derive(Debug, thiserror::Error)]
#[error("sync failed replaying {action} at log position {position}")]
pub struct SyncError {
    pub position: usize,
    pub action: &'static str,
    #[source]
    pub source: StoreError,
}

/// Drain the pending history range into the store.
///
/// Forward when the log advanced past the synced mark, backward (inverse
/// primitives, reverse order) when the user undid past it, no-op when the
/// pointers already agree. Serial and non-cancellable: the drain either
/// completes or fails outright.
///
/// # Errors
///
/// Returns [`SyncError`] identifying the first entry whose transaction could
/// not be committed.
pub fn sync(history: &mut History, store: &Store) -> Result<SyncReport, SyncError> {
    let synced = history.synced_pointer();
    let undo = history.undo_pointer();
    let mut report = SyncReport::default();

    if synced < undo {
        for position in synced..undo {
            let action = &history.entries()[position];
            replay_entry(store, position, action, Direction::Forward)?;
            history.mark_synced(position + 1);
            report.applied += 1;
        }
    } else if undo < synced {
        for position in (undo..synced).rev() {
            let action = &history.entries()[position];
            replay_entry(store, position, action, Direction::Backward)?;
            history.mark_synced(position);
            report.reverted += 1;
        }
    }

    if report != SyncReport::default() {
        tracing::info!(
            applied = report.applied,
            reverted = report.reverted,
            synced_pointer = history.synced_pointer(),
            "save-file sync complete"
        );
    }
    Ok(report)
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn replay_entry(
    store: &Store,
    position: usize,
    action: &Action,
    direction: Direction,
) -> Result<(), SyncError> {
    let fail = |source: StoreError| SyncError {
        position,
        action: action.kind(),
        source,
    };

    store.begin_action().map_err(fail)?;

    let result = match direction {
        Direction::Forward => apply_forward(store, action),
        Direction::Backward => apply_inverse(store, action),
    };

    match result.and_then(|()| store.commit_action()) {
        Ok(()) => Ok(()),
        Err(source) => {
            // Leave the file at the last committed entry.
            if let Err(rollback) = store.rollback_action() {
                tracing::warn!(
                    position,
                    action = action.kind(),
                    error = %rollback,
                    "rollback after failed sync entry also failed"
                );
            }
            Err(fail(source))
        }
    }
}

fn apply_forward(store: &Store, action: &Action) -> Result<(), StoreError> {
    match action {
        Action::Append { item } => {
            let id = store.append_item(&item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        Action::Insert { index, item } => {
            let id = store.insert_item(*index, &item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        Action::Remove { index, .. } => {
            store.remove_item(*index)?;
        }
        Action::Edit {
            index, replacement, ..
        } => {
            store.remove_item(*index)?;
            let id = store.insert_item(*index, &replacement.effect, &replacement.label)?;
            store.save_parameters(id, &replacement.parameters)?;
        }
        Action::Move { from, to, item } => {
            store.remove_item(*from)?;
            let id = store.insert_item(*to, &item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        Action::SetInputPath { current, .. } => {
            store.set_setting(schema::INPUT_VIDEO_PATH, current.as_deref())?;
        }
        Action::SetOutputPath { current, .. } => {
            store.set_setting(schema::OUTPUT_VIDEO_PATH, current.as_deref())?;
        }
    }
    Ok(())
}

fn apply_inverse(store: &Store, action: &Action) -> Result<(), StoreError> {
    match action {
        Action::Append { .. } => {
            store.undo_last_append()?;
        }
        Action::Insert { index, .. } => {
            store.remove_item(*index)?;
        }
        Action::Remove { index, item } => {
            let id = store.insert_item(*index, &item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        Action::Edit {
            index, original, ..
        } => {
            store.remove_item(*index)?;
            let id = store.insert_item(*index, &original.effect, &original.label)?;
            store.save_parameters(id, &original.parameters)?;
        }
        Action::Move { from, to, item } => {
            store.remove_item(*to)?;
            let id = store.insert_item(*from, &item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        Action::SetInputPath { previous, .. } => {
            store.set_setting(schema::INPUT_VIDEO_PATH, previous.as_deref())?;
        }
        Action::SetOutputPath { previous, .. } => {
            store.set_setting(schema::OUTPUT_VIDEO_PATH, previous.as_deref())?;
        }
    }
    Ok(())
}
