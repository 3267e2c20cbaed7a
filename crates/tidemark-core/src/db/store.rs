//! Store primitives over the save-file relations.
//!
//! Each primitive is one small, independently meaningful mutation of the
//! `timeline`/`parameters`/`settings` relations, addressed by *position*
//! (the `ordering` column), not by row identity. The synchronizer composes
//! primitives into per-action transactions; nothing here begins or commits
//! on its own.
//!
//! The insert primitives return the [`ItemId`] they created, and
//! [`Store::save_parameters`] takes that id explicitly. Threading the id
//! keeps parameter writes tied to exactly the row they belong to, with no
//! dependence on what was inserted last; every insert still gets a fresh
//! id, so ids are not stable across edit or redo.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{configure_connection, schema};
use crate::effect::{CatalogError, EffectCatalog, EffectRef};
use crate::timeline::TimelineItem;

/// Identity of one `timeline` row. Monotonically increasing, never reused,
/// and *not* stable across an edit or a redo — both replay as remove +
/// insert, so the row comes back under a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemId(pub i64);

/// Failures surfaced by the save-file layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying file or SQLite failure during a primitive. Not retried
    /// automatically.
    #[error("save file storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("could not create save file {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// One of the required relations is absent. Reported per relation so a
    /// truncated or foreign file is diagnosable.
    #[error("save file is missing the `{0}` relation")]
    MissingRelation(&'static str),

    /// The `settings` relation exists but lacks a setting every save file
    /// must carry.
    #[error("save file is missing the required setting `{0}`")]
    MissingSetting(String),

    /// A persisted row references an effect the catalog no longer resolves.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A durable save file: one open SQLite connection plus the primitives the
/// synchronizer replays actions into.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Create a fresh save file at `path`, truncating any existing file, and
    /// seed the schema with NULL input/output path settings.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be truncated or the schema cannot be written.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        fs::File::create(path).map_err(|source| StoreError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        conn.execute_batch(schema::CREATE_SCHEMA_SQL)?;

        let store = Self { conn };
        store.set_setting(schema::INPUT_VIDEO_PATH, None)?;
        store.set_setting(schema::OUTPUT_VIDEO_PATH, None)?;
        tracing::debug!(path = %path.display(), "created save file");
        Ok(store)
    }

    /// Open an existing save file. Relation presence is checked at load
    /// time, not here, so that each missing relation reports distinctly.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or configured.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    /// Ephemeral in-memory store with the full schema. Useful for tests and
    /// for projects that were never given a backing file.
    ///
    /// # Errors
    ///
    /// Fails if SQLite cannot create the in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        conn.execute_batch(schema::CREATE_SCHEMA_SQL)?;
        let store = Self { conn };
        store.set_setting(schema::INPUT_VIDEO_PATH, None)?;
        store.set_setting(schema::OUTPUT_VIDEO_PATH, None)?;
        Ok(store)
    }

    /// Direct access to the underlying connection, for inspection and tests.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------------
    // Per-action transaction control (used by the synchronizer)
    // -----------------------------------------------------------------------

    pub(crate) fn begin_action(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    pub(crate) fn commit_action(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub(crate) fn rollback_action(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    /// Append a row at the end: `ordering = max + 1`, fresh `item_id`.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn append_item(&self, effect: &EffectRef, label: &str) -> Result<ItemId, StoreError> {
        self.conn.execute(
            "INSERT INTO timeline (ordering, effect_plugin, effect_name, label)
             VALUES (
               (SELECT COALESCE(MAX(ordering), -1) + 1 FROM timeline),
               ?1, ?2, ?3
             )",
            params![effect.plugin, effect.name, label],
        )?;
        Ok(ItemId(self.conn.last_insert_rowid()))
    }

    /// Insert a row at `ordering`, shifting everything at and after it up by
    /// one first.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn insert_item(
        &self,
        ordering: usize,
        effect: &EffectRef,
        label: &str,
    ) -> Result<ItemId, StoreError> {
        self.conn.execute(
            "UPDATE timeline SET ordering = ordering + 1 WHERE ordering >= ?1",
            params![ordering],
        )?;
        self.conn.execute(
            "INSERT INTO timeline (ordering, effect_plugin, effect_name, label)
             VALUES (?1, ?2, ?3, ?4)",
            params![ordering, effect.plugin, effect.name, label],
        )?;
        Ok(ItemId(self.conn.last_insert_rowid()))
    }

    /// Write the parameter rows owned by `item_id`, one per pair. Parameter
    /// rows are never edited in place; they are written once per insert and
    /// deleted with their row.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn save_parameters(
        &self,
        item_id: ItemId,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("INSERT INTO parameters (item_id, name, value) VALUES (?1, ?2, ?3)")?;
        for (name, value) in parameters {
            stmt.execute(params![item_id.0, name, value])?;
        }
        Ok(())
    }

    /// Remove the row at `ordering`: its parameter rows first, then the row,
    /// then close the gap by shifting trailing orderings down.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn remove_item(&self, ordering: usize) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM parameters
             WHERE item_id = (SELECT item_id FROM timeline WHERE ordering = ?1)",
            params![ordering],
        )?;
        self.conn
            .execute("DELETE FROM timeline WHERE ordering = ?1", params![ordering])?;
        self.conn.execute(
            "UPDATE timeline SET ordering = ordering - 1 WHERE ordering > ?1",
            params![ordering],
        )?;
        Ok(())
    }

    /// Delete parameters and row for the highest-ordering entry. Inverts an
    /// append, which never carried an explicit index.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn undo_last_append(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM parameters
             WHERE item_id = (
               SELECT item_id FROM timeline
               WHERE ordering = (SELECT MAX(ordering) FROM timeline)
             )",
            [],
        )?;
        self.conn.execute(
            "DELETE FROM timeline
             WHERE ordering = (SELECT MAX(ordering) FROM timeline)",
            [],
        )?;
        Ok(())
    }

    /// Upsert one settings row. A `None` value persists as NULL.
    ///
    /// # Errors
    ///
    /// Fails on any storage error.
    pub fn set_setting(&self, name: &str, value: Option<&str>) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load the settings relation as a map.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingRelation`] if `settings` is absent, and
    /// [`StoreError::MissingSetting`] if a setting every save file must
    /// carry has no row at all (a NULL value is fine; a missing row is not).
    pub fn load_settings(&self) -> Result<BTreeMap<String, Option<String>>, StoreError> {
        self.require_relation("settings")?;

        let mut stmt = self.conn.prepare("SELECT name, value FROM settings")?;
        let settings = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        for required in [schema::INPUT_VIDEO_PATH, schema::OUTPUT_VIDEO_PATH] {
            if !settings.contains_key(required) {
                return Err(StoreError::MissingSetting(required.to_string()));
            }
        }
        Ok(settings)
    }

    /// Load the full timeline in `ordering` order, re-keying parameter rows
    /// back into each item's map and checking every effect reference against
    /// the catalog.
    ///
    /// Aborts on the first error; no partially populated timeline is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingRelation`] for an absent `timeline` or
    /// `parameters` relation, [`StoreError::Catalog`] for a reference the
    /// catalog no longer resolves.
    pub fn load_timeline<C: EffectCatalog>(
        &self,
        catalog: &C,
    ) -> Result<Vec<TimelineItem>, StoreError> {
        self.require_relation("timeline")?;
        self.require_relation("parameters")?;

        let mut stmt = self.conn.prepare(
            "SELECT item_id, effect_plugin, effect_name, label
             FROM timeline ORDER BY ordering",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut param_stmt = self
            .conn
            .prepare("SELECT name, value FROM parameters WHERE item_id = ?1")?;

        let mut items = Vec::with_capacity(rows.len());
        for (item_id, plugin, name, label) in rows {
            let effect = EffectRef::new(plugin, name);
            catalog.resolve(&effect)?;

            let parameters = param_stmt
                .query_map(params![item_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<BTreeMap<_, _>, _>>()?;

            items.push(TimelineItem::new(effect, label, parameters));
        }
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_relation(&self, name: &'static str) -> Result<(), StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::MissingRelation(name));
        }
        Ok(())
    }
}
