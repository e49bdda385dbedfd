use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::canvas::{RasterSurface, Size};

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

/// Default number of raster states kept on the undo stack.
pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// SNAPSHOT: immutable, content-addressed raster state
// ============================================================================

/// A frozen copy of the raster surface.
///
/// Pixels are shared through `Arc`, so cloning a snapshot (e.g. moving it
/// between the undo and redo stacks) never copies pixel data. Two snapshots
/// compare equal when their dimensions and BLAKE3 digests match.
#[derive(Clone)]
pub struct Snapshot {
    image: Arc<RgbaImage>,
    digest: blake3::Hash,
}

impl Snapshot {
    pub fn capture(surface: &RasterSurface) -> Self {
        Self::from_image(surface.image().clone())
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let digest = Self::digest_of(&image);
        Self {
            image: Arc::new(image),
            digest,
        }
    }

    fn digest_of(image: &RgbaImage) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&image.width().to_le_bytes());
        hasher.update(&image.height().to_le_bytes());
        hasher.update(image.as_raw());
        hasher.finalize()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// Hex content address of this snapshot.
    pub fn id(&self) -> String {
        self.digest.to_hex().to_string()
    }

    /// True when `surface` currently holds exactly this snapshot's pixels.
    pub fn matches(&self, surface: &RasterSurface) -> bool {
        self.image.as_raw() == surface.image().as_raw() && self.size() == surface.size()
    }

    pub fn memory_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.digest == other.digest
    }
}

impl Eq for Snapshot {}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("size", &self.size())
            .field("id", &&self.id()[..12])
            .finish()
    }
}

// ============================================================================
// HISTORY STATE: undo/redo stacks of snapshots
// ============================================================================

/// Undo/redo history over raster snapshots.
///
/// The newest entry of the undo stack is always what the surface shows once
/// no gesture is in progress. The oldest remaining entry is the baseline and
/// is never popped by [`HistoryState::undo`].
#[derive(Clone, Debug)]
pub struct HistoryState {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
    max_history_size: usize,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryState {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            // A baseline plus at least one undoable state.
            max_history_size: max_history_size.max(2),
        }
    }

    /// History holding only `baseline`.
    pub fn seeded(baseline: Snapshot, max_history_size: usize) -> Self {
        let mut history = Self::new(max_history_size);
        history.undo_stack.push_back(baseline);
        history
    }

    /// Record a new state produced by a user action.
    ///
    /// Returns `false` (and leaves both stacks untouched) when `snapshot`
    /// equals the current top, so no-op strokes never pollute history.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if self.undo_stack.back() == Some(&snapshot) {
            return false;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(snapshot);
        self.prune();
        true
    }

    /// Step back one state. Returns the snapshot that should now be shown,
    /// or `None` when only the baseline remains.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.undo_stack.len() < 2 {
            return None;
        }
        let top = self.undo_stack.pop_back()?;
        self.redo_stack.push_back(top);
        self.undo_stack.back()
    }

    /// Re-apply the most recently undone state.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.redo_stack.pop_back()?;
        self.undo_stack.push_back(next);
        self.undo_stack.back()
    }

    /// The state currently rendered.
    pub fn current(&self) -> Option<&Snapshot> {
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Bytes held by both stacks. Snapshots shared between entries are
    /// counted once per entry.
    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .map(Snapshot::memory_size)
            .sum()
    }

    /// Forget everything and start over from `baseline`.
    pub fn reset(&mut self, baseline: Snapshot) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.undo_stack.push_back(baseline);
    }

    /// Drop the oldest states beyond the configured depth. The baseline at
    /// index 0 is never dropped.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.remove(1);
        }
    }
}
