//! Save-file schema.
//!
//! Three relations:
//! - `timeline` — one row per effect item; `ordering` is the authoritative
//!   position and is independent of `item_id`, which only ever grows
//! - `parameters` — `(name, value)` pairs owned by a timeline row
//! - `settings` — project-level key/value settings, nullable values
//!
//! `item_id` is deliberately not stable across edits: editing or moving an
//! item persists as remove + insert, so the row is reborn with a fresh id.
//! AUTOINCREMENT (rather than plain rowid assignment) guarantees ids are
//! never reused even after the highest row is deleted, which is what makes
//! the fresh-id-on-redo behavior observable.

/// Settings every save file carries, seeded as NULL at creation.
pub const INPUT_VIDEO_PATH: &str = "input_video_path";
pub const OUTPUT_VIDEO_PATH: &str = "output_video_path";

pub const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE timeline (
  item_id        INTEGER PRIMARY KEY AUTOINCREMENT,
  ordering       INTEGER NOT NULL,
  effect_plugin  TEXT NOT NULL,
  effect_name    TEXT NOT NULL,
  label          TEXT NOT NULL
);

CREATE TABLE parameters (
  item_id  INTEGER NOT NULL,
  name     TEXT NOT NULL,
  value    TEXT NOT NULL,
  FOREIGN KEY (item_id) REFERENCES timeline (item_id)
);

CREATE TABLE settings (
  name   TEXT PRIMARY KEY NOT NULL,
  value  TEXT
);
";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_creates_all_required_relations() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(CREATE_SCHEMA_SQL).expect("create schema");

        for relation in ["timeline", "parameters", "settings"] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    [relation],
                    |row| row.get(0),
                )
                .expect("query sqlite_master");
            assert!(exists, "missing relation {relation}");
        }
    }
}
