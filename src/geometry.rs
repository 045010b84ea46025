//! Pixel-space geometry shared by the canvas, brush, fill and history
//! modules: stroke sample points, inclusive bounding rectangles and the
//! dirty-region accumulator fed by every pixel write.

use serde::{Deserialize, Serialize};

// ============================================================================
// STROKE SAMPLE POINT
// ============================================================================

/// One sample of a press-drag-release gesture. Positions are fractional so
/// stamp centers can interpolate between input events; pressure is `None`
/// for devices that do not report it (treated as full pressure).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    pub pressure: Option<f32>,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure: Some(pressure.clamp(0.0, 1.0)) }
    }

    /// Pressure with the no-sensor fallback applied.
    pub fn effective_pressure(&self) -> f32 {
        self.pressure.unwrap_or(1.0)
    }
}

// ============================================================================
// PIXEL RECT — inclusive min/max bounding box
// ============================================================================

/// Inclusive pixel bounding box. `min_x..=max_x` × `min_y..=max_y` are all
/// valid pixels; a 1×1 rect has `min == max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelRect {
    pub fn from_point(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self { min_x, min_y, max_x, max_y }
    }

    /// Grow the rect to cover `(x, y)`.
    pub fn include(&mut self, x: u32, y: u32) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains_rect(&self, other: PixelRect) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Clamp to a `width × height` canvas. Returns `None` when the rect lies
    /// entirely outside.
    pub fn clamped(&self, width: u32, height: u32) -> Option<PixelRect> {
        if width == 0 || height == 0 || self.min_x >= width || self.min_y >= height {
            return None;
        }
        Some(PixelRect {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x.min(width - 1),
            max_y: self.max_y.min(height - 1),
        })
    }
}

// ============================================================================
// DIRTY-REGION ACCUMULATOR
// ============================================================================

/// The minimal rect bounding all pixels changed on one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRegion {
    pub frame: usize,
    pub rect: PixelRect,
}

/// Accumulates pixel writes into per-frame dirty rects. The frame store
/// keeps two of these: one drained per logical operation (to bound an
/// UndoEntry) and one drained by the UI's `dirty_region_since_last_query`.
#[derive(Clone, Debug, Default)]
pub struct DirtyAccumulator {
    regions: Vec<DirtyRegion>,
}

impl DirtyAccumulator {
    /// Record a single pixel write on `frame`.
    pub fn mark(&mut self, frame: usize, x: u32, y: u32) {
        for region in &mut self.regions {
            if region.frame == frame {
                region.rect.include(x, y);
                return;
            }
        }
        self.regions.push(DirtyRegion { frame, rect: PixelRect::from_point(x, y) });
    }

    /// Record a whole-rect change on `frame` (frame creation, patch restore).
    pub fn mark_rect(&mut self, frame: usize, rect: PixelRect) {
        for region in &mut self.regions {
            if region.frame == frame {
                region.rect = region.rect.union(&rect);
                return;
            }
        }
        self.regions.push(DirtyRegion { frame, rect });
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Drain all accumulated regions, leaving the accumulator empty.
    pub fn take(&mut self) -> Vec<DirtyRegion> {
        std::mem::take(&mut self.regions)
    }

    /// Dirty rect for a single frame, if any pixel on it changed.
    pub fn rect_for_frame(&self, frame: usize) -> Option<PixelRect> {
        self.regions.iter().find(|r| r.frame == frame).map(|r| r.rect)
    }
}
