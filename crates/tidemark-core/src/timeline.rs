//! The ordered sequence of effect items applied to the input video.
//!
//! Pure in-memory structure with list-splice semantics. Positions are
//! contiguous zero-based indices; any structural change renumbers everything
//! after the splice point, so held indices are invalid after any mutation and
//! callers re-resolve positions before the next operation.

use std::collections::BTreeMap;

use crate::effect::EffectRef;

/// One effect instance placed on the timeline, with its bound parameter
/// values. Immutable once constructed: editing an item is modeled as
/// replacing it with a new value, because persistence always treats an edit
/// as remove-then-insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineItem {
    pub effect: EffectRef,
    pub label: String,
    pub parameters: BTreeMap<String, String>,
}

impl TimelineItem {
    pub fn new(
        effect: EffectRef,
        label: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            effect,
            label: label.into(),
            parameters,
        }
    }
}

/// A timeline operation was given a position outside the current sequence.
///
/// Given correct pairing of mutations with history records this is
/// unreachable, so it fails loudly instead of clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timeline index {index} out of range (len {len})")]
pub struct TimelineError {
    pub index: usize,
    pub len: usize,
}

/// The ordered, index-addressed list of timeline items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    items: Vec<TimelineItem>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TimelineItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> impl Iterator<Item = &TimelineItem> {
        self.items.iter()
    }

    pub fn append(&mut self, item: TimelineItem) {
        self.items.push(item);
    }

    /// Insert `item` at `index`, shifting everything at and after it up by
    /// one. `index == len` is an append.
    ///
    /// # Errors
    ///
    /// Fails if `index > len`.
    pub fn insert(&mut self, index: usize, item: TimelineItem) -> Result<(), TimelineError> {
        if index > self.items.len() {
            return Err(TimelineError {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, item);
        Ok(())
    }

    /// Remove and return the item at `index`, renumbering trailing positions.
    ///
    /// # Errors
    ///
    /// Fails if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Result<TimelineItem, TimelineError> {
        if index >= self.items.len() {
            return Err(TimelineError {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Replace the item at `index`, returning the displaced item.
    ///
    /// # Errors
    ///
    /// Fails if `index >= len`.
    pub fn replace(
        &mut self,
        index: usize,
        item: TimelineItem,
    ) -> Result<TimelineItem, TimelineError> {
        if index >= self.items.len() {
            return Err(TimelineError {
                index,
                len: self.items.len(),
            });
        }
        Ok(std::mem::replace(&mut self.items[index], item))
    }

    /// Move the item at `from` to `to`: remove at `from`, then insert at
    /// `to` against the post-removal sequence. If `to` was computed against
    /// the pre-removal length the caller must pre-adjust; no index semantics
    /// are second-guessed here.
    ///
    /// Returns a copy of the moved item.
    ///
    /// # Errors
    ///
    /// Fails if `from` is out of range, or `to` exceeds the post-removal
    /// length (the removed item is put back in that case).
    pub fn shift(&mut self, from: usize, to: usize) -> Result<TimelineItem, TimelineError> {
        let moved = self.remove(from)?;
        if let Err(err) = self.insert(to, moved.clone()) {
            self.items.insert(from, moved);
            return Err(err);
        }
        Ok(moved)
    }

    /// Read-only ordered `(effect, parameters)` pairs for the render
    /// pipeline. The renderer never mutates the timeline; it works from this
    /// snapshot.
    #[must_use]
    pub fn render_snapshot(&self) -> Vec<(EffectRef, BTreeMap<String, String>)> {
        self.items
            .iter()
            .map(|item| (item.effect.clone(), item.parameters.clone()))
            .collect()
    }
}
