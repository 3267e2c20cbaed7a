//! The action log: a linear, truncatable record of user edits with undo/redo
//! navigation and a separate high-water mark for what the save file reflects.
//!
//! Every [`Action`] carries enough payload to compute both its forward effect
//! and its exact inverse without consulting external state — undo has to
//! reconstruct prior state even after the timeline has moved on. A redone
//! entry is re-applied exactly as recorded.
//!
//! Recording after one or more undos discards the undone tail. There is no
//! redo tree: redo history is lost the moment a new action lands.

use crate::timeline::TimelineItem;

/// A recorded, invertible description of one user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Append {
        item: TimelineItem,
    },
    Insert {
        index: usize,
        item: TimelineItem,
    },
    Remove {
        index: usize,
        item: TimelineItem,
    },
    Edit {
        index: usize,
        original: TimelineItem,
        replacement: TimelineItem,
    },
    Move {
        from: usize,
        to: usize,
        item: TimelineItem,
    },
    SetInputPath {
        previous: Option<String>,
        current: Option<String>,
    },
    SetOutputPath {
        previous: Option<String>,
        current: Option<String>,
    },
}

impl Action {
    /// Short name for logs and error context.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Append { .. } => "append",
            Self::Insert { .. } => "insert",
            Self::Remove { .. } => "remove",
            Self::Edit { .. } => "edit",
            Self::Move { .. } => "move",
            Self::SetInputPath { .. } => "set-input-path",
            Self::SetOutputPath { .. } => "set-output-path",
        }
    }
}

/// The per-project action log.
///
/// `undo_pointer` separates done entries (before it) from undone entries (at
/// and after it). `synced_pointer` marks how far the save file reflects the
/// log; the pending slice between the two pointers is what [`crate::sync`]
/// drains, forward or backward.
///
/// Invariant: `synced_pointer` is always reachable from `undo_pointer` by one
/// contiguous replay, which means entries between the two pointers are never
/// truncated. [`crate::session::Session`] syncs backward before recording
/// whenever the log has retreated below the synced mark.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Action>,
    undo_pointer: usize,
    synced_pointer: usize,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[Action] {
        &self.entries
    }

    #[must_use]
    pub fn undo_pointer(&self) -> usize {
        self.undo_pointer
    }

    #[must_use]
    pub fn synced_pointer(&self) -> usize {
        self.synced_pointer
    }

    /// Whether the save file is behind (or ahead of) the current log position.
    #[must_use]
    pub fn has_unsynced_changes(&self) -> bool {
        self.synced_pointer != self.undo_pointer
    }

    /// Record a new action, discarding any undone tail first.
    pub fn record(&mut self, action: Action) {
        debug_assert!(
            self.synced_pointer <= self.undo_pointer,
            "recording would truncate entries the store still reflects; sync backward first"
        );
        if self.undo_pointer != self.entries.len() {
            self.entries.truncate(self.undo_pointer);
        }
        self.entries.push(action);
        self.undo_pointer = self.entries.len();
    }

    /// Step the pointer back one entry and return it, or `None` if there is
    /// nothing to undo. The caller applies the action's inverse; the log
    /// itself only moves the pointer.
    pub fn undo(&mut self) -> Option<&Action> {
        if self.undo_pointer == 0 {
            return None;
        }
        self.undo_pointer -= 1;
        Some(&self.entries[self.undo_pointer])
    }

    /// Return the entry at the pointer and step past it, or `None` if there
    /// is nothing to redo. The entry comes back exactly as recorded, so the
    /// caller re-applies it forward.
    pub fn redo(&mut self) -> Option<&Action> {
        if self.undo_pointer == self.entries.len() {
            return None;
        }
        let action = &self.entries[self.undo_pointer];
        self.undo_pointer += 1;
        Some(action)
    }

    /// Advance or retreat the synced mark to `position`. Called by the
    /// synchronizer after each fully committed entry.
    pub(crate) fn mark_synced(&mut self, position: usize) {
        debug_assert!(position <= self.entries.len());
        self.synced_pointer = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectRef;
    use std::collections::BTreeMap;

    fn append(label: &str) -> Action {
        Action::Append {
            item: TimelineItem::new(EffectRef::new("color", "sepia"), label, BTreeMap::new()),
        }
    }

    #[test]
    fn undo_on_empty_log_returns_none() {
        let mut history = History::new();
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_then_redo_returns_same_entry() {
        let mut history = History::new();
        history.record(append("a"));

        let undone = history.undo().cloned().expect("undo");
        assert_eq!(history.undo_pointer(), 0);

        let redone = history.redo().cloned().expect("redo");
        assert_eq!(undone, redone);
        assert_eq!(history.undo_pointer(), 1);
    }

    #[test]
    fn redo_returns_entries_in_recorded_order() {
        let mut history = History::new();
        history.record(append("a"));
        history.record(append("b"));
        history.undo();
        history.undo();

        assert_eq!(history.redo(), Some(&append("a")));
        assert_eq!(history.redo(), Some(&append("b")));
        assert!(history.redo().is_none());
    }

    #[test]
    fn record_after_undo_discards_redo_branch() {
        let mut history = History::new();
        history.record(append("a"));
        history.record(append("b"));
        history.undo();
        history.record(append("c"));

        // "b" is unreachable now
        assert!(history.redo().is_none());
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[1], append("c"));
    }

    #[test]
    fn unsynced_changes_tracks_pointer_divergence() {
        let mut history = History::new();
        assert!(!history.has_unsynced_changes());

        history.record(append("a"));
        assert!(history.has_unsynced_changes());

        history.mark_synced(1);
        assert!(!history.has_unsynced_changes());

        history.undo();
        assert!(history.has_unsynced_changes());
    }
}
