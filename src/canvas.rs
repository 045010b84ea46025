//! Pixel storage: one `Canvas` per animation frame, all frames owned by a
//! `FrameStore` that shares a single palette.
//!
//! Canvases are flat `Vec<u8>` index grids. Even a 640×512 cel is only 320KB,
//! so there is nothing to win from tiled or copy-on-write storage here — the
//! flat buffer keeps patch capture and restore a pair of `memcpy`s per row.
//!
//! `FrameStore::set_pixel` is the single point through which pixel mutation
//! occurs. Every write lands in two dirty accumulators: the per-operation one
//! consumed when a logical edit becomes an UndoEntry, and the query-level one
//! drained by the UI through `dirty_region_since_last_query`.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{EditorError, Result};
use crate::geometry::{DirtyAccumulator, DirtyRegion, PixelRect};
use crate::palette::Palette;

// ============================================================================
// CANVAS — one frame's index grid
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: u8) -> Self {
        Self {
            width,
            height,
            data: vec![fill; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Unchecked-by-construction accessor; callers validate bounds first.
    pub(crate) fn index_at(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub(crate) fn set_index_at(&mut self, x: u32, y: u32, index: u8) {
        self.data[y as usize * self.width as usize + x as usize] = index;
    }

    /// Row-major index buffer, for patch capture and snapshot export.
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Copy the pixels inside `rect` into a tight row-major buffer.
    pub(crate) fn extract_rect(&self, rect: PixelRect) -> Vec<u8> {
        let w = rect.width() as usize;
        let mut out = Vec::with_capacity(rect.area());
        for y in rect.min_y..=rect.max_y {
            let start = y as usize * self.width as usize + rect.min_x as usize;
            out.extend_from_slice(&self.data[start..start + w]);
        }
        out
    }

    /// Write a tight row-major buffer back into `rect`. Inverse of
    /// `extract_rect`; `pixels.len()` must equal `rect.area()`.
    pub(crate) fn blit_rect(&mut self, rect: PixelRect, pixels: &[u8]) {
        debug_assert_eq!(pixels.len(), rect.area());
        let w = rect.width() as usize;
        for (row, y) in (rect.min_y..=rect.max_y).enumerate() {
            let dst = y as usize * self.width as usize + rect.min_x as usize;
            self.data[dst..dst + w].copy_from_slice(&pixels[row * w..(row + 1) * w]);
        }
    }
}

// ============================================================================
// FRAME STORE
// ============================================================================

/// Owns every frame's pixel buffer. Dimensions are fixed at construction for
/// the lifetime of the session; frames can be created, deleted, duplicated
/// and (via the timeline) reordered.
#[derive(Debug)]
pub struct FrameStore {
    width: u32,
    height: u32,
    /// Number of valid palette slots; `set_pixel` rejects indices past it.
    palette_len: usize,
    frames: Vec<Canvas>,
    /// Stable identity per frame, parallel to `frames`. Indices shift on
    /// insert/delete/reorder; ids never do, so history patches can tell a
    /// deleted frame from whichever frame slid into its index slot.
    ids: Vec<u64>,
    next_id: u64,
    op_dirty: DirtyAccumulator,
    query_dirty: DirtyAccumulator,
}

impl FrameStore {
    /// Create a store with one frame filled with `fill`.
    pub fn new(width: u32, height: u32, palette_len: usize, fill: u8) -> Result<Self> {
        if (fill as usize) >= palette_len {
            return Err(EditorError::InvalidPaletteIndex { index: fill as usize, len: palette_len });
        }
        Ok(Self {
            width,
            height,
            palette_len,
            frames: vec![Canvas::new(width, height, fill)],
            ids: vec![1],
            next_id: 2,
            op_dirty: DirtyAccumulator::default(),
            query_dirty: DirtyAccumulator::default(),
        })
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Stable id of the frame currently at `index`.
    pub(crate) fn frame_id(&self, index: usize) -> Result<u64> {
        self.ids
            .get(index)
            .copied()
            .ok_or(EditorError::FrameNotFound { index, count: self.frames.len() })
    }

    /// Current index of the frame with stable id `id`, if it still exists.
    pub(crate) fn frame_index_of(&self, id: u64) -> Option<usize> {
        self.ids.iter().position(|&existing| existing == id)
    }

    pub(crate) fn all_frames(&self) -> &[Canvas] {
        &self.frames
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn palette_len(&self) -> usize {
        self.palette_len
    }

    /// Called when the palette grows so new slots become writable. The
    /// palette never shrinks during a session, which is what keeps every
    /// stored pixel index valid.
    pub(crate) fn set_palette_len(&mut self, len: usize) {
        debug_assert!(len >= self.palette_len);
        self.palette_len = len;
    }

    pub fn frame(&self, index: usize) -> Result<&Canvas> {
        self.frames
            .get(index)
            .ok_or(EditorError::FrameNotFound { index, count: self.frames.len() })
    }

    pub(crate) fn frame_mut(&mut self, index: usize) -> Result<&mut Canvas> {
        let count = self.frames.len();
        self.frames
            .get_mut(index)
            .ok_or(EditorError::FrameNotFound { index, count })
    }

    // ---- pixel access -------------------------------------------------------

    pub fn get_pixel(&self, frame: usize, x: i64, y: i64) -> Result<u8> {
        let canvas = self.frame(frame)?;
        if !canvas.in_bounds(x, y) {
            return Err(EditorError::OutOfBounds { x, y, width: self.width, height: self.height });
        }
        Ok(canvas.index_at(x as u32, y as u32))
    }

    /// The single mutation point. Validates the frame, the coordinate and the
    /// palette slot, writes, and marks both dirty accumulators.
    pub fn set_pixel(&mut self, frame: usize, x: i64, y: i64, index: u8) -> Result<()> {
        if (index as usize) >= self.palette_len {
            return Err(EditorError::InvalidPaletteIndex {
                index: index as usize,
                len: self.palette_len,
            });
        }
        let (width, height) = (self.width, self.height);
        let canvas = self.frame_mut(frame)?;
        if !canvas.in_bounds(x, y) {
            return Err(EditorError::OutOfBounds { x, y, width, height });
        }
        canvas.set_index_at(x as u32, y as u32, index);
        self.op_dirty.mark(frame, x as u32, y as u32);
        self.query_dirty.mark(frame, x as u32, y as u32);
        Ok(())
    }

    /// Restore a rect of pixels byte-exactly (undo/redo path). Bypasses
    /// per-pixel validation — the patch was captured from this same store —
    /// but still lands in the query accumulator so the UI repaints.
    pub(crate) fn restore_rect(&mut self, frame: usize, rect: PixelRect, pixels: &[u8]) -> Result<()> {
        let canvas = self.frame_mut(frame)?;
        canvas.blit_rect(rect, pixels);
        self.query_dirty.mark_rect(frame, rect);
        Ok(())
    }

    // ---- frame structure ----------------------------------------------------

    /// Append a new frame filled with `fill`; returns its index.
    pub fn create_frame(&mut self, fill: u8) -> Result<usize> {
        self.insert_frame(self.frames.len(), fill)
    }

    /// Insert a new frame at `at` (0..=frame_count).
    pub fn insert_frame(&mut self, at: usize, fill: u8) -> Result<usize> {
        if (fill as usize) >= self.palette_len {
            return Err(EditorError::InvalidPaletteIndex { index: fill as usize, len: self.palette_len });
        }
        if at > self.frames.len() {
            return Err(EditorError::FrameNotFound { index: at, count: self.frames.len() });
        }
        self.frames.insert(at, Canvas::new(self.width, self.height, fill));
        let id = self.alloc_id();
        self.ids.insert(at, id);
        self.mark_whole_frame_dirty(at);
        Ok(at)
    }

    pub fn delete_frame(&mut self, index: usize) -> Result<Canvas> {
        if index >= self.frames.len() {
            return Err(EditorError::FrameNotFound { index, count: self.frames.len() });
        }
        self.ids.remove(index);
        Ok(self.frames.remove(index))
    }

    /// Duplicate `index`; the copy lands directly after it.
    pub fn duplicate_frame(&mut self, index: usize) -> Result<usize> {
        let copy = self.frame(index)?.clone();
        self.frames.insert(index + 1, copy);
        let id = self.alloc_id();
        self.ids.insert(index + 1, id);
        self.mark_whole_frame_dirty(index + 1);
        Ok(index + 1)
    }

    pub(crate) fn reorder_frame(&mut self, from: usize, to: usize) -> Result<()> {
        let count = self.frames.len();
        if from >= count {
            return Err(EditorError::FrameNotFound { index: from, count });
        }
        if to >= count {
            return Err(EditorError::FrameNotFound { index: to, count });
        }
        let canvas = self.frames.remove(from);
        self.frames.insert(to, canvas);
        let id = self.ids.remove(from);
        self.ids.insert(to, id);
        Ok(())
    }

    fn mark_whole_frame_dirty(&mut self, frame: usize) {
        if self.width > 0 && self.height > 0 {
            self.query_dirty
                .mark_rect(frame, PixelRect::new(0, 0, self.width - 1, self.height - 1));
        }
    }

    // ---- dirty tracking -----------------------------------------------------

    /// Drain the per-operation accumulator. Called once per logical edit when
    /// its UndoEntry is assembled.
    pub(crate) fn take_op_dirty(&mut self) -> Vec<DirtyRegion> {
        self.op_dirty.take()
    }

    /// Dirty rect the current operation has produced on `frame`, if any.
    pub(crate) fn op_dirty_rect(&self, frame: usize) -> Option<PixelRect> {
        self.op_dirty.rect_for_frame(frame)
    }

    /// Drain everything changed since the last call. The UI boundary.
    pub fn take_query_dirty(&mut self) -> Vec<DirtyRegion> {
        self.query_dirty.take()
    }
}

// ============================================================================
// RGBA EXPANSION — read-only rendering of a frame through the palette
// ============================================================================

/// Expand a frame to RGBA through the palette. Rows are resolved in parallel;
/// indices past the palette (impossible via `set_pixel`, but snapshots are
/// host-supplied) render as opaque black with a warning.
pub fn render_frame_rgba(store: &FrameStore, palette: &Palette, frame: usize) -> Result<RgbaImage> {
    let canvas = store.frame(frame)?;
    let width = canvas.width();
    let height = canvas.height();
    let src = canvas.raw();
    let mut out = RgbaImage::new(width, height);

    let row_len = width as usize * 4;
    out.as_mut()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src[y * width as usize..(y + 1) * width as usize];
            for (x, &index) in src_row.iter().enumerate() {
                let rgb = palette.color(index as usize).unwrap_or_else(|_| {
                    log::warn!("frame {} pixel ({}, {}) has stale index {}", frame, x, y, index);
                    crate::palette::Rgb::BLACK
                });
                let o = x * 4;
                row[o] = rgb.r;
                row[o + 1] = rgb.g;
                row[o + 2] = rgb.b;
                row[o + 3] = 255;
            }
        });
    Ok(out)
}

/// Alpha-blend `src` over `dst` in place (straight alpha, u8 math).
pub(crate) fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for c in 0..3 {
        let d = dst.0[c] as f32;
        let s = src.0[c] as f32;
        dst.0[c] = (d + (s - d) * a).round() as u8;
    }
}
