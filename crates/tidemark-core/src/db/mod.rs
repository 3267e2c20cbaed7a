//! SQLite save-file utilities.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` so external readers (render snapshots, inspectors)
//!   don't block the single writer
//! - `busy_timeout = 5s` to ride out transient locks
//! - `foreign_keys = ON` to keep the `parameters → timeline` relationship
//!   honest

pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::time::Duration;

pub use store::{ItemId, Store, StoreError};

/// Busy timeout used for save-file connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("project.tidemark");
        (dir, path)
    }

    #[test]
    fn create_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = Store::create(&path).expect("create store");
        let conn = store.connection();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }
}
