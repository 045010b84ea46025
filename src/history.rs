//! Undo/redo history: reversible snapshot deltas and the bounded two-stack
//! manager that owns them.
//!
//! Entries are immutable once committed and never alias live canvas memory —
//! undo and redo are byte-exact restores, never recomputation, so reversal
//! cannot drift no matter how long the session runs.

use std::collections::VecDeque;

use crate::canvas::FrameStore;
use crate::error::{EditorError, Result};
use crate::geometry::PixelRect;
use crate::palette::{Palette, Rgb};

// ============================================================================
// PIXEL PATCH — a rect of index data captured from one frame
// ============================================================================

/// A rectangular patch of palette indices for efficient undo/redo. Holds a
/// stable frame *id*, not an index or a canvas reference: frame deletion and
/// reordering shift indices, but the id either resolves to the same frame's
/// current slot or to nothing at all (in which case the patch applies as a
/// no-op). It can never land on a different frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelPatch {
    pub frame_id: u64,
    pub rect: PixelRect,
    pub indices: Vec<u8>,
}

impl PixelPatch {
    /// Capture `rect` from the frame currently at index `frame`.
    pub fn capture(store: &FrameStore, frame: usize, rect: PixelRect) -> Result<Self> {
        let frame_id = store.frame_id(frame)?;
        let canvas = store.frame(frame)?;
        Ok(Self { frame_id, rect, indices: canvas.extract_rect(rect) })
    }

    /// Capture `rect` from a detached canvas (the pre-stroke clone held by a
    /// stroke tracker).
    pub(crate) fn capture_canvas(canvas: &crate::canvas::Canvas, frame_id: u64, rect: PixelRect) -> Self {
        Self { frame_id, rect, indices: canvas.extract_rect(rect) }
    }

    /// Restore the patch. A deleted frame is logged and skipped — its history
    /// entries become no-ops rather than breaking the rest of the stack.
    pub fn apply(&self, store: &mut FrameStore) {
        let Some(frame) = store.frame_index_of(self.frame_id) else {
            log::warn!("skipping history patch for deleted frame id {}", self.frame_id);
            return;
        };
        if let Err(err) = store.restore_rect(frame, self.rect, &self.indices) {
            log::warn!("skipping history patch for frame {}: {}", frame, err);
        }
    }

    pub fn memory_size(&self) -> usize {
        self.indices.len()
    }
}

// ============================================================================
// COMMAND — the closed set of reversible edits
// ============================================================================

/// One committed, reversible edit. A closed variant set rather than trait
/// objects: the core has exactly two delta shapes, pixel patches and palette
/// table swaps.
#[derive(Clone, Debug)]
pub enum Command {
    /// A pixel edit: dirty rect plus before/after index snapshots.
    Pixels {
        description: String,
        before: PixelPatch,
        after: PixelPatch,
    },
    /// A palette edit. Snapshots the color table only — cycle ranges are live
    /// playback state, not document content, so reversing a recolor must not
    /// clobber ranges set up afterwards. The table is at most 256 entries, so
    /// whole-table before/after snapshots are cheaper than a sparse delta.
    Palette {
        description: String,
        before: Vec<Rgb>,
        after: Vec<Rgb>,
    },
}

impl Command {
    pub fn undo(&self, store: &mut FrameStore, palette: &mut Palette) {
        match self {
            Command::Pixels { before, .. } => before.apply(store),
            Command::Palette { before, .. } => palette.restore_colors(before),
        }
    }

    pub fn redo(&self, store: &mut FrameStore, palette: &mut Palette) {
        match self {
            Command::Pixels { after, .. } => after.apply(store),
            Command::Palette { after, .. } => palette.restore_colors(after),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Command::Pixels { description, .. } | Command::Palette { description, .. } => description,
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            Command::Pixels { before, after, .. } => before.memory_size() + after.memory_size(),
            Command::Palette { before, after, .. } => {
                (before.len() + after.len()) * std::mem::size_of::<Rgb>()
            }
        }
    }

    /// Dirty rect this command touches when applied, if it is a pixel edit.
    pub fn dirty_rect(&self) -> Option<PixelRect> {
        match self {
            Command::Pixels { after, .. } => Some(after.rect),
            Command::Palette { .. } => None,
        }
    }
}

// ============================================================================
// HISTORY MANAGER — bounded two-stack undo/redo
// ============================================================================

/// Undo/redo manager with count and memory limits. Eviction drops the oldest
/// committed entries first and never touches the redo stack or the most
/// recent edits, so it only limits how far back undo can reach.
pub struct HistoryManager {
    undo_stack: VecDeque<Command>,
    redo_stack: VecDeque<Command>,
    max_entries: usize,
    /// Optional memory cap in bytes across both stacks.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_entries: max_entries.max(1),
            max_memory_bytes: Some(100 * 1024 * 1024),
            total_memory: 0,
        }
    }

    pub fn set_memory_limit(&mut self, bytes: Option<usize>) {
        self.max_memory_bytes = bytes;
        self.prune();
    }

    /// Record a committed edit. Any redoable branch is invalidated.
    pub fn commit(&mut self, command: Command) {
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    /// Reverse the most recent edit. Returns its description.
    pub fn undo(&mut self, store: &mut FrameStore, palette: &mut Palette) -> Result<String> {
        let command = self
            .undo_stack
            .pop_back()
            .ok_or(EditorError::HistoryEmpty { action: "undo" })?;
        command.undo(store, palette);
        let description = command.description().to_string();
        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Reapply the most recently undone edit. Returns its description.
    pub fn redo(&mut self, store: &mut FrameStore, palette: &mut Palette) -> Result<String> {
        let command = self
            .redo_stack
            .pop_back()
            .ok_or(EditorError::HistoryEmpty { action: "redo" })?;
        command.redo(store, palette);
        let description = command.description().to_string();
        self.undo_stack.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
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

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// All undoable descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    /// Current memory usage of both stacks (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Evict oldest entries to stay within the count and memory limits.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_entries {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> (FrameStore, Palette) {
        let pal = Palette::default_16();
        let store = FrameStore::new(8, 8, pal.len(), 0).unwrap();
        (store, pal)
    }

    fn pixel_command(store: &mut FrameStore, x: i64, y: i64, index: u8) -> Command {
        pixel_command_on(store, 0, x, y, index)
    }

    fn pixel_command_on(store: &mut FrameStore, frame: usize, x: i64, y: i64, index: u8) -> Command {
        let rect = PixelRect::from_point(x as u32, y as u32);
        let before = PixelPatch::capture(store, frame, rect).unwrap();
        store.set_pixel(frame, x, y, index).unwrap();
        let after = PixelPatch::capture(store, frame, rect).unwrap();
        store.take_op_dirty();
        Command::Pixels { description: format!("Plot {}", index), before, after }
    }

    #[test]
    fn undo_and_redo_restore_exact_bytes() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        history.commit(pixel_command(&mut store, 2, 2, 5));

        assert_eq!(history.undo(&mut store, &mut pal).unwrap(), "Plot 5");
        assert_eq!(store.get_pixel(0, 2, 2).unwrap(), 0);
        assert_eq!(history.redo(&mut store, &mut pal).unwrap(), "Plot 5");
        assert_eq!(store.get_pixel(0, 2, 2).unwrap(), 5);
    }

    #[test]
    fn empty_stacks_report_history_empty() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        assert_eq!(
            history.undo(&mut store, &mut pal),
            Err(EditorError::HistoryEmpty { action: "undo" })
        );
        assert_eq!(
            history.redo(&mut store, &mut pal),
            Err(EditorError::HistoryEmpty { action: "redo" })
        );
    }

    #[test]
    fn new_commit_clears_redo_branch() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        history.commit(pixel_command(&mut store, 1, 1, 3));
        history.undo(&mut store, &mut pal).unwrap();
        assert!(history.can_redo());
        history.commit(pixel_command(&mut store, 4, 4, 7));
        assert!(!history.can_redo());
    }

    #[test]
    fn count_eviction_keeps_recent_entries_undoable() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(2);
        history.commit(pixel_command(&mut store, 0, 0, 1));
        history.commit(pixel_command(&mut store, 1, 0, 2));
        history.commit(pixel_command(&mut store, 2, 0, 3));
        assert_eq!(history.undo_count(), 2);

        // The two newest edits still reverse exactly.
        history.undo(&mut store, &mut pal).unwrap();
        history.undo(&mut store, &mut pal).unwrap();
        assert_eq!(store.get_pixel(0, 2, 0).unwrap(), 0);
        assert_eq!(store.get_pixel(0, 1, 0).unwrap(), 0);
        // The evicted first edit is simply out of reach.
        assert!(!history.can_undo());
        assert_eq!(store.get_pixel(0, 0, 0).unwrap(), 1);
    }

    #[test]
    fn palette_command_swaps_color_table() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        let before = pal.colors().to_vec();
        pal.set_color(3, Rgb::new(1, 2, 3)).unwrap();
        history.commit(Command::Palette {
            description: "Recolor 3".into(),
            before,
            after: pal.colors().to_vec(),
        });
        history.undo(&mut store, &mut pal).unwrap();
        assert_eq!(pal.colors(), Palette::default_16().colors());
        history.redo(&mut store, &mut pal).unwrap();
        assert_eq!(pal.color(3).unwrap(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn palette_undo_leaves_cycle_ranges_alone() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        let before = pal.colors().to_vec();
        pal.set_color(5, Rgb::new(9, 9, 9)).unwrap();
        history.commit(Command::Palette {
            description: "Recolor 5".into(),
            before,
            after: pal.colors().to_vec(),
        });
        // A range registered after the recolor must survive its undo.
        pal.add_cycle_range("glow", 8, 11, 2.0, crate::palette::CycleDirection::Forward)
            .unwrap();
        history.undo(&mut store, &mut pal).unwrap();
        assert_eq!(pal.color(5).unwrap(), Palette::default_16().color(5).unwrap());
        assert_eq!(pal.cycle_ranges().len(), 1);
    }

    #[test]
    fn patch_on_deleted_frame_is_a_noop() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        store.create_frame(0).unwrap();
        let rect = PixelRect::from_point(1, 1);
        let before = PixelPatch::capture(&store, 1, rect).unwrap();
        store.set_pixel(1, 1, 1, 4).unwrap();
        let after = PixelPatch::capture(&store, 1, rect).unwrap();
        history.commit(Command::Pixels { description: "Plot".into(), before, after });

        store.delete_frame(1).unwrap();
        // Undo targets a frame that no longer exists: logged, skipped, and
        // the rest of the session stays usable.
        assert!(history.undo(&mut store, &mut pal).is_ok());
        assert_eq!(store.frame_count(), 1);
    }

    #[test]
    fn redo_never_lands_on_the_frame_that_inherited_a_deleted_index() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        store.create_frame(0).unwrap(); // index 1
        store.create_frame(0).unwrap(); // index 2
        history.commit(pixel_command_on(&mut store, 1, 3, 3, 4));
        history.undo(&mut store, &mut pal).unwrap();

        // Deleting frame 1 slides the old frame 2 into its index slot.
        store.delete_frame(1).unwrap();
        assert!(history.redo(&mut store, &mut pal).is_ok());
        // The inheriting frame stays byte-identical; the patch was skipped.
        assert!(store.frame(1).unwrap().raw().iter().all(|&i| i == 0));
    }

    #[test]
    fn patches_follow_frames_across_reordering() {
        let (mut store, mut pal) = doc();
        let mut history = HistoryManager::new(10);
        store.create_frame(0).unwrap();
        history.commit(pixel_command_on(&mut store, 1, 2, 2, 7));

        store.reorder_frame(1, 0).unwrap();
        history.undo(&mut store, &mut pal).unwrap();
        // The edited frame now sits at index 0; undo cleared it there.
        assert_eq!(store.get_pixel(0, 2, 2).unwrap(), 0);
        assert_eq!(store.get_pixel(1, 2, 2).unwrap(), 0);
        history.redo(&mut store, &mut pal).unwrap();
        assert_eq!(store.get_pixel(0, 2, 2).unwrap(), 7);
    }

    #[test]
    fn memory_accounting_tracks_commits_and_eviction() {
        let (mut store, _pal) = doc();
        let mut history = HistoryManager::new(50);
        assert_eq!(history.memory_usage(), 0);
        history.commit(pixel_command(&mut store, 0, 0, 1));
        let one = history.memory_usage();
        assert!(one > 0);
        history.set_memory_limit(Some(one));
        history.commit(pixel_command(&mut store, 1, 1, 2));
        // Cap of one entry: the older command was evicted.
        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.memory_usage(), one);
    }
}
