//! One open project: timeline + history + optional backing save file.
//!
//! Every edit goes through the session so that each timeline mutation is
//! paired with exactly one recorded action — the engine never derives the
//! action from the mutation. Undo/redo navigate the history log and apply
//! the returned action's inverse/forward effect back onto the timeline;
//! nothing touches the save file until an explicit [`Session::save`].

use std::path::Path;

use anyhow::Context;

use crate::db::schema;
use crate::db::store::Store;
use crate::effect::EffectCatalog;
use crate::history::{Action, History};
use crate::sync::{sync, SyncReport};
use crate::timeline::{Timeline, TimelineItem};

/// An open project. Owns the in-memory state and the save-file connection;
/// there is no process-wide current document — callers hold the session.
pub struct Session {
    timeline: Timeline,
    history: History,
    store: Option<Store>,
    input_video_path: Option<String>,
    output_video_path: Option<String>,
}

impl Session {
    /// Empty project with no backing file. Attach one later with
    /// [`Session::save_as`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeline: Timeline::new(),
            history: History::new(),
            store: None,
            input_video_path: None,
            output_video_path: None,
        }
    }

    /// Empty project backed by an ephemeral in-memory store.
    ///
    /// # Errors
    ///
    /// Fails if the in-memory database cannot be created.
    pub fn in_memory() -> anyhow::Result<Self> {
        let store = Store::in_memory().context("create in-memory store")?;
        let mut session = Self::new();
        session.store = Some(store);
        Ok(session)
    }

    /// Empty project backed by a freshly created save file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created or the schema written.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let store = Store::create(path)
            .with_context(|| format!("create save file {}", path.display()))?;
        let mut session = Self::new();
        session.store = Some(store);
        Ok(session)
    }

    /// Load a project from an existing save file.
    ///
    /// The timeline is rebuilt from the `timeline`/`parameters` relations in
    /// ordering order and every effect reference is checked against the
    /// catalog. Any failure aborts the load — no partially populated session
    /// is returned. The history log starts empty: undo history is not
    /// persisted, so editing history does not survive close/reopen.
    ///
    /// # Errors
    ///
    /// Fails on storage errors, missing relations or settings, and effect
    /// references the catalog no longer resolves.
    pub fn open<C: EffectCatalog>(path: &Path, catalog: &C) -> anyhow::Result<Self> {
        let store =
            Store::open(path).with_context(|| format!("open save file {}", path.display()))?;

        let settings = store.load_settings().context("load settings")?;
        let items = store.load_timeline(catalog).context("load timeline")?;

        let mut timeline = Timeline::new();
        for item in items {
            timeline.append(item);
        }

        let input_video_path = settings.get(schema::INPUT_VIDEO_PATH).cloned().flatten();
        let output_video_path = settings.get(schema::OUTPUT_VIDEO_PATH).cloned().flatten();

        tracing::debug!(
            path = %path.display(),
            items = timeline.len(),
            "loaded project from save file"
        );

        Ok(Self {
            timeline,
            history: History::new(),
            store: Some(store),
            input_video_path,
            output_video_path,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn input_video_path(&self) -> Option<&str> {
        self.input_video_path.as_deref()
    }

    #[must_use]
    pub fn output_video_path(&self) -> Option<&str> {
        self.output_video_path.as_deref()
    }

    #[must_use]
    pub fn has_backing_store(&self) -> bool {
        self.store.is_some()
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.history.has_unsynced_changes()
    }

    /// Ordered `(effect, parameters)` pairs for the render pipeline, which
    /// only ever reads a snapshot and never mutates the session.
    #[must_use]
    pub fn render_snapshot(&self) -> Vec<(crate::effect::EffectRef, std::collections::BTreeMap<String, String>)> {
        self.timeline.render_snapshot()
    }

    // -----------------------------------------------------------------------
    // Edits (each pairs one timeline mutation with one recorded action)
    // -----------------------------------------------------------------------

    /// Append an item at the end of the timeline.
    ///
    /// # Errors
    ///
    /// Fails only if a pre-record retreat sync is needed and fails.
    pub fn add_item(&mut self, item: TimelineItem) -> anyhow::Result<()> {
        self.prepare_record()?;
        self.timeline.append(item.clone());
        self.history.record(Action::Append { item });
        Ok(())
    }

    /// Insert an item at `index`.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range.
    pub fn insert_item(&mut self, index: usize, item: TimelineItem) -> anyhow::Result<()> {
        self.prepare_record()?;
        self.timeline.insert(index, item.clone())?;
        self.history.record(Action::Insert { index, item });
        Ok(())
    }

    /// Remove and return the item at `index`.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range.
    pub fn remove_item(&mut self, index: usize) -> anyhow::Result<TimelineItem> {
        self.prepare_record()?;
        let item = self.timeline.remove(index)?;
        self.history.record(Action::Remove {
            index,
            item: item.clone(),
        });
        Ok(item)
    }

    /// Replace the item at `index`, returning the displaced original. The
    /// edit persists as remove + insert, never as an in-place update.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range.
    pub fn edit_item(
        &mut self,
        index: usize,
        replacement: TimelineItem,
    ) -> anyhow::Result<TimelineItem> {
        self.prepare_record()?;
        let original = self.timeline.replace(index, replacement.clone())?;
        self.history.record(Action::Edit {
            index,
            original: original.clone(),
            replacement,
        });
        Ok(original)
    }

    /// Move the item at `from` to `to` (post-removal indexing).
    ///
    /// # Errors
    ///
    /// Fails if either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> anyhow::Result<()> {
        self.prepare_record()?;
        let item = self.timeline.shift(from, to)?;
        self.history.record(Action::Move { from, to, item });
        Ok(())
    }

    /// Set the input video path, recording the old value for undo.
    ///
    /// # Errors
    ///
    /// Fails only if a pre-record retreat sync is needed and fails.
    pub fn set_input_path(&mut self, path: Option<String>) -> anyhow::Result<()> {
        self.prepare_record()?;
        let previous = self.input_video_path.clone();
        self.input_video_path.clone_from(&path);
        self.history.record(Action::SetInputPath {
            previous,
            current: path,
        });
        Ok(())
    }

    /// Set the output video path, recording the old value for undo.
    ///
    /// # Errors
    ///
    /// Fails only if a pre-record retreat sync is needed and fails.
    pub fn set_output_path(&mut self, path: Option<String>) -> anyhow::Result<()> {
        self.prepare_record()?;
        let previous = self.output_video_path.clone();
        self.output_video_path.clone_from(&path);
        self.history.record(Action::SetOutputPath {
            previous,
            current: path,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    /// Undo the most recent done action, applying its inverse to the
    /// timeline. Returns the undone action, or `None` if the log is at its
    /// start.
    ///
    /// # Errors
    ///
    /// An index failure here means a mutation was not paired with its
    /// record; it is propagated loudly rather than clamped.
    pub fn undo(&mut self) -> anyhow::Result<Option<Action>> {
        let Some(action) = self.history.undo().cloned() else {
            return Ok(None);
        };
        self.apply_inverse(&action)
            .with_context(|| format!("apply undo of {} to timeline", action.kind()))?;
        Ok(Some(action))
    }

    /// Redo the next undone action, re-applying it forward to the timeline.
    /// Returns the redone action, or `None` if the log is at its end.
    ///
    /// # Errors
    ///
    /// Same failure mode as [`Session::undo`].
    pub fn redo(&mut self) -> anyhow::Result<Option<Action>> {
        let Some(action) = self.history.redo().cloned() else {
            return Ok(None);
        };
        self.apply_forward(&action)
            .with_context(|| format!("apply redo of {} to timeline", action.kind()))?;
        Ok(Some(action))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Drain the pending history range into the save file, then rewrite the
    /// two path settings with their current values.
    ///
    /// # Errors
    ///
    /// Fails if no save file is attached, or if the drain aborts. An aborted
    /// drain leaves the synced pointer at the last committed entry, so a
    /// retry re-attempts the remaining range.
    pub fn save(&mut self) -> anyhow::Result<SyncReport> {
        let store = self
            .store
            .as_ref()
            .context("no save file attached; use save_as first")?;

        let report = sync(&mut self.history, store).context("drain pending history")?;

        store
            .set_setting(schema::INPUT_VIDEO_PATH, self.input_video_path.as_deref())
            .context("write input video path")?;
        store
            .set_setting(schema::OUTPUT_VIDEO_PATH, self.output_video_path.as_deref())
            .context("write output video path")?;

        Ok(report)
    }

    /// Retarget the session to a freshly created save file and write the
    /// current state into it as one snapshot. History is not replayed — it
    /// may not reach back to the project's start — so rows are appended
    /// directly in timeline order.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created or the snapshot transaction
    /// cannot commit; the session keeps its previous backing store then.
    pub fn save_as(&mut self, path: &Path) -> anyhow::Result<()> {
        let store = Store::create(path)
            .with_context(|| format!("create save file {}", path.display()))?;

        store.begin_action().context("begin snapshot")?;
        let written = self.write_snapshot(&store);
        if let Err(err) = written {
            let _ = store.rollback_action();
            return Err(err).context("write snapshot");
        }
        store.commit_action().context("commit snapshot")?;

        // The new file reflects the state at the current log position.
        self.history.mark_synced(self.history.undo_pointer());
        self.store = Some(store);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Before a record that would truncate the undone tail, make sure the
    /// truncated entries are not ones the save file still reflects: if the
    /// log has retreated below the synced mark, drain backward first.
    fn prepare_record(&mut self) -> anyhow::Result<()> {
        if self.history.synced_pointer() > self.history.undo_pointer() {
            if let Some(store) = &self.store {
                sync(&mut self.history, store)
                    .context("sync retreat before recording over saved entries")?;
            }
        }
        Ok(())
    }

    fn apply_inverse(&mut self, action: &Action) -> Result<(), crate::timeline::TimelineError> {
        match action {
            Action::Append { .. } => {
                let last = self.timeline.len().saturating_sub(1);
                self.timeline.remove(last)?;
            }
            Action::Insert { index, .. } => {
                self.timeline.remove(*index)?;
            }
            Action::Remove { index, item } => {
                self.timeline.insert(*index, item.clone())?;
            }
            Action::Edit {
                index, original, ..
            } => {
                self.timeline.replace(*index, original.clone())?;
            }
            Action::Move { from, to, .. } => {
                self.timeline.shift(*to, *from)?;
            }
            Action::SetInputPath { previous, .. } => {
                self.input_video_path.clone_from(previous);
            }
            Action::SetOutputPath { previous, .. } => {
                self.output_video_path.clone_from(previous);
            }
        }
        Ok(())
    }

    fn apply_forward(&mut self, action: &Action) -> Result<(), crate::timeline::TimelineError> {
        match action {
            Action::Append { item } => {
                self.timeline.append(item.clone());
            }
            Action::Insert { index, item } => {
                self.timeline.insert(*index, item.clone())?;
            }
            Action::Remove { index, .. } => {
                self.timeline.remove(*index)?;
            }
            Action::Edit {
                index, replacement, ..
            } => {
                self.timeline.replace(*index, replacement.clone())?;
            }
            Action::Move { from, to, .. } => {
                self.timeline.shift(*from, *to)?;
            }
            Action::SetInputPath { current, .. } => {
                self.input_video_path.clone_from(current);
            }
            Action::SetOutputPath { current, .. } => {
                self.output_video_path.clone_from(current);
            }
        }
        Ok(())
    }

    fn write_snapshot(&self, store: &Store) -> anyhow::Result<()> {
        for item in self.timeline.items() {
            let id = store.append_item(&item.effect, &item.label)?;
            store.save_parameters(id, &item.parameters)?;
        }
        store.set_setting(schema::INPUT_VIDEO_PATH, self.input_video_path.as_deref())?;
        store.set_setting(schema::OUTPUT_VIDEO_PATH, self.output_video_path.as_deref())?;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectRef;
    use std::collections::BTreeMap;

    fn item(label: &str) -> TimelineItem {
        TimelineItem::new(EffectRef::new("color", "sepia"), label, BTreeMap::new())
    }

    fn labels(session: &Session) -> Vec<&str> {
        session.timeline().items().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn undo_then_redo_restores_state_for_every_action_kind() {
        let mut session = Session::new();
        session.add_item(item("a")).expect("add");
        session.add_item(item("b")).expect("add");
        session.insert_item(1, item("x")).expect("insert");
        session.edit_item(0, item("a2")).expect("edit");
        session.remove_item(2).expect("remove");
        session.move_item(0, 1).expect("move");
        session.set_input_path(Some("/in.mp4".into())).expect("input");
        session.set_output_path(Some("/out.mp4".into())).expect("output");

        let before_timeline = session.timeline().clone();
        let before_input = session.input_video_path().map(str::to_string);
        let before_output = session.output_video_path().map(str::to_string);

        for _ in 0..8 {
            session.undo().expect("undo");
        }
        assert!(session.timeline().is_empty());
        assert_eq!(session.input_video_path(), None);

        for _ in 0..8 {
            session.redo().expect("redo");
        }
        assert_eq!(session.timeline(), &before_timeline);
        assert_eq!(session.input_video_path().map(str::to_string), before_input);
        assert_eq!(session.output_video_path().map(str::to_string), before_output);
    }

    #[test]
    fn single_undo_redo_round_trips_each_variant() {
        let cases: Vec<Box<dyn Fn(&mut Session)>> = vec![
            Box::new(|s| s.add_item(item("n")).expect("add")),
            Box::new(|s| s.insert_item(0, item("n")).expect("insert")),
            Box::new(|s| {
                s.remove_item(0).expect("remove");
            }),
            Box::new(|s| {
                s.edit_item(0, item("n")).expect("edit");
            }),
            Box::new(|s| s.move_item(0, 1).expect("move")),
            Box::new(|s| s.set_input_path(Some("/v.mp4".into())).expect("path")),
            Box::new(|s| s.set_output_path(None).expect("path")),
        ];

        for case in cases {
            let mut session = Session::new();
            session.add_item(item("a")).expect("seed");
            session.add_item(item("b")).expect("seed");
            session.set_output_path(Some("/old.mp4".into())).expect("seed");

            case(&mut session);
            let after = session.timeline().clone();

            session.undo().expect("undo");
            session.redo().expect("redo");
            assert_eq!(session.timeline(), &after);
        }
    }

    #[test]
    fn undo_move_restores_original_order() {
        let mut session = Session::new();
        for label in ["a", "b", "c"] {
            session.add_item(item(label)).expect("add");
        }
        session.move_item(0, 2).expect("move");
        assert_eq!(labels(&session), ["b", "c", "a"]);

        session.undo().expect("undo");
        assert_eq!(labels(&session), ["a", "b", "c"]);
    }

    #[test]
    fn undo_past_start_and_redo_past_end_return_none() {
        let mut session = Session::new();
        assert!(session.undo().expect("undo").is_none());
        session.add_item(item("a")).expect("add");
        assert!(session.redo().expect("redo").is_none());
    }

    #[test]
    fn recording_after_undo_below_sync_mark_retreats_the_store_first() {
        let mut session = Session::in_memory().expect("session");
        session.add_item(item("a")).expect("add");
        session.save().expect("save");
        assert!(!session.has_unsaved_changes());

        session.undo().expect("undo");
        // Recording now would truncate the saved entry; the session must
        // drain the retreat before the branch cut.
        session.add_item(item("b")).expect("add");

        let count: i64 = session
            .store
            .as_ref()
            .expect("store")
            .connection()
            .query_row("SELECT COUNT(*) FROM timeline", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
        assert_eq!(session.history().synced_pointer(), 0);
        assert_eq!(labels(&session), ["b"]);

        session.save().expect("save again");
        let count: i64 = session
            .store
            .as_ref()
            .expect("store")
            .connection()
            .query_row("SELECT COUNT(*) FROM timeline", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn save_without_backing_store_fails() {
        let mut session = Session::new();
        assert!(!session.has_backing_store());
        session.add_item(item("a")).expect("add");
        assert!(session.save().is_err());

        let backed = Session::in_memory().expect("session");
        assert!(backed.has_backing_store());
    }

    #[test]
    fn save_as_writes_current_snapshot_not_history() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("snapshot.tidemark");

        let mut session = Session::new();
        session.add_item(item("a")).expect("add");
        session.add_item(item("b")).expect("add");
        session.remove_item(0).expect("remove");
        session.save_as(&path).expect("save_as");
        assert!(!session.has_unsaved_changes());

        // Undoing past the snapshot point still syncs backward correctly.
        session.undo().expect("undo");
        assert!(session.has_unsaved_changes());
        session.save().expect("save");

        let count: i64 = session
            .store
            .as_ref()
            .expect("store")
            .connection()
            .query_row("SELECT COUNT(*) FROM timeline", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 2);
    }
}
