//! Animation timeline: frame order, per-frame durations, a playback cursor
//! and onion-skin compositing.
//!
//! The timeline owns the duration list and the cursor; the pixel data lives
//! in the `FrameStore`. Every structural transition takes the store as an
//! argument and keeps both sides in lockstep, so a frame index means the same
//! thing to the timeline, the store and the history manager.

use image::RgbaImage;

use crate::canvas::{blend_over, render_frame_rgba, FrameStore};
use crate::error::{EditorError, Result};
use crate::palette::Palette;

/// 10 fps, the traditional pencil-test default.
pub const DEFAULT_FRAME_DURATION_MS: u32 = 100;

/// Opacity of the nearest onion-skin ghost; each step further out halves it.
const ONION_BASE_ALPHA: f32 = 0.4;

pub struct Timeline {
    durations_ms: Vec<u32>,
    cursor: usize,
    onion_depth: usize,
    playing: bool,
    /// Time spent on the current frame so far, only meaningful while playing.
    elapsed_ms: u32,
}

impl Timeline {
    /// A timeline for a store that holds one frame.
    pub fn new() -> Self {
        Self {
            durations_ms: vec![DEFAULT_FRAME_DURATION_MS],
            cursor: 0,
            onion_depth: 0,
            playing: false,
            elapsed_ms: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.durations_ms.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        self.cursor = index;
        self.elapsed_ms = 0;
        Ok(())
    }

    pub fn duration_ms(&self, index: usize) -> Result<u32> {
        self.check(index)?;
        Ok(self.durations_ms[index])
    }

    pub(crate) fn durations(&self) -> &[u32] {
        &self.durations_ms
    }

    pub fn set_duration(&mut self, index: usize, ms: u32) -> Result<()> {
        self.check(index)?;
        self.durations_ms[index] = ms.max(1);
        Ok(())
    }

    pub fn onion_depth(&self) -> usize {
        self.onion_depth
    }

    pub fn set_onion_depth(&mut self, depth: usize) {
        self.onion_depth = depth;
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.durations_ms.len() {
            return Err(EditorError::FrameNotFound { index, count: self.durations_ms.len() });
        }
        Ok(())
    }

    // ---- structural transitions ---------------------------------------------

    /// Insert a blank frame at `at` and move the cursor onto it.
    pub fn insert_frame(&mut self, store: &mut FrameStore, at: usize, fill: u8) -> Result<usize> {
        let index = store.insert_frame(at, fill)?;
        self.durations_ms.insert(index, DEFAULT_FRAME_DURATION_MS);
        self.cursor = index;
        self.elapsed_ms = 0;
        Ok(index)
    }

    /// Remove a frame. The last remaining frame cannot be removed.
    pub fn remove_frame(&mut self, store: &mut FrameStore, index: usize) -> Result<()> {
        if self.durations_ms.len() == 1 {
            return Err(EditorError::LastFrame);
        }
        store.delete_frame(index)?;
        self.durations_ms.remove(index);
        if self.cursor >= self.durations_ms.len() {
            self.cursor = self.durations_ms.len() - 1;
        } else if self.cursor > index {
            self.cursor -= 1;
        }
        self.elapsed_ms = 0;
        Ok(())
    }

    /// Duplicate `index` (pixels and duration); the copy lands after it and
    /// becomes current.
    pub fn duplicate_frame(&mut self, store: &mut FrameStore, index: usize) -> Result<usize> {
        let copy = store.duplicate_frame(index)?;
        let duration = self.durations_ms[index];
        self.durations_ms.insert(copy, duration);
        self.cursor = copy;
        self.elapsed_ms = 0;
        Ok(copy)
    }

    /// Move the frame at `from` so it sits at `to`; the cursor follows it.
    pub fn reorder_frame(&mut self, store: &mut FrameStore, from: usize, to: usize) -> Result<()> {
        store.reorder_frame(from, to)?;
        let duration = self.durations_ms.remove(from);
        self.durations_ms.insert(to, duration);
        if self.cursor == from {
            self.cursor = to;
        } else if from < self.cursor && to >= self.cursor {
            self.cursor -= 1;
        } else if from > self.cursor && to <= self.cursor {
            self.cursor += 1;
        }
        Ok(())
    }

    // ---- playback -----------------------------------------------------------

    pub fn play(&mut self) {
        self.playing = true;
        self.elapsed_ms = 0;
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.elapsed_ms = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance playback by `dt_ms`. Pure cursor movement over the duration
    /// list; touches no pixel data. Returns whether the cursor moved.
    pub fn advance(&mut self, dt_ms: u32) -> bool {
        if !self.playing || self.durations_ms.is_empty() {
            return false;
        }
        let start = self.cursor;
        self.elapsed_ms += dt_ms;
        // Durations are clamped to >= 1ms, so this terminates.
        while self.elapsed_ms >= self.durations_ms[self.cursor] {
            self.elapsed_ms -= self.durations_ms[self.cursor];
            self.cursor = (self.cursor + 1) % self.durations_ms.len();
        }
        self.cursor != start
    }

    // ---- onion skin ---------------------------------------------------------

    /// Render the current frame with translucent ghosts of its neighbors on
    /// top, `onion_depth` steps each way, nearer ghosts stronger. A drawing
    /// guide only: nothing is written back to any frame.
    pub fn composite_onion(&self, store: &FrameStore, palette: &Palette) -> Result<RgbaImage> {
        let mut out = render_frame_rgba(store, palette, self.cursor)?;
        if self.onion_depth == 0 {
            return Ok(out);
        }

        // Farthest ghosts first so nearer ones dominate where they overlap.
        for d in (1..=self.onion_depth).rev() {
            let alpha = ONION_BASE_ALPHA / 2f32.powi(d as i32 - 1);
            let behind = self.cursor.checked_sub(d);
            let ahead = self.cursor + d;
            for neighbor in [behind, Some(ahead)].into_iter().flatten() {
                if neighbor >= store.frame_count() {
                    continue;
                }
                let ghost = render_frame_rgba(store, palette, neighbor)?;
                for (dst, src) in out.pixels_mut().zip(ghost.pixels()) {
                    blend_over(dst, *src, alpha);
                }
            }
        }
        Ok(out)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
