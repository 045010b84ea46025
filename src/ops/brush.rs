//! Brush engine: coverage masks, the stroke tracker and the stamp
//! rasterizer that turns drag gestures into pixel writes.
//!
//! Soft-edge blending rule: the brush color is mixed with the destination's
//! palette color in linear RGB, weighted by `coverage / 255` (scaled by pen
//! pressure), and the result rounds to the nearest palette index by squared
//! distance in linear RGB. The rule is a pure function of destination index
//! and coverage, which is what makes mirrored strokes with symmetric masks
//! come out pixel-mirrored.

use crate::canvas::{Canvas, FrameStore};
use crate::error::{EditorError, Result};
use crate::geometry::{PixelRect, StrokePoint};
use crate::history::{Command, PixelPatch};
use crate::palette::{Palette, Rgb};

// ============================================================================
// BRUSH MASK
// ============================================================================

/// Square 2D coverage mask, always odd-sized so stamps center exactly on
/// stroke sample points. Coverage is 0 (untouched) to 255 (opaque).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushMask {
    size: u32,
    coverage: Vec<u8>,
}

impl BrushMask {
    /// Round circular tip. `hardness` 1.0 is a hard pixel disk; lower values
    /// feather the rim toward the center.
    pub fn circle(diameter: u32, hardness: f32) -> Result<Self> {
        if diameter == 0 {
            return Err(EditorError::InvalidMask { reason: "zero-sized brush".into() });
        }
        let size = if diameter % 2 == 0 { diameter + 1 } else { diameter };
        let hardness = hardness.clamp(0.0, 1.0);
        let half = (size / 2) as f32;
        // Pull the radius in slightly so a 3px circle is the classic plus
        // shape rather than a full square.
        let radius = (size as f32 / 2.0 - 0.25).max(0.5);
        let feather = (1.0 - hardness) * radius;
        let inner = radius - feather;

        let mut coverage = vec![0u8; (size * size) as usize];
        for y in 0..size {
            for x in 0..size {
                let d = (x as f32 - half).hypot(y as f32 - half);
                let cov = if hardness >= 0.99 {
                    if d <= radius { 1.0 } else { 0.0 }
                } else if d <= inner {
                    1.0
                } else {
                    ((radius + 0.5 - d) / (radius + 0.5 - inner)).clamp(0.0, 1.0)
                };
                coverage[(y * size + x) as usize] = (cov * 255.0).round() as u8;
            }
        }
        Ok(Self { size, coverage })
    }

    /// Fully opaque square tip.
    pub fn square(size: u32) -> Result<Self> {
        if size == 0 {
            return Err(EditorError::InvalidMask { reason: "zero-sized brush".into() });
        }
        let size = if size % 2 == 0 { size + 1 } else { size };
        Ok(Self { size, coverage: vec![255; (size * size) as usize] })
    }

    /// Custom tip from raw coverage cells (row-major, `size * size` entries,
    /// `size` odd).
    pub fn from_coverage(size: u32, coverage: Vec<u8>) -> Result<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(EditorError::InvalidMask {
                reason: format!("mask size {} must be odd and non-zero", size),
            });
        }
        if coverage.len() != (size * size) as usize {
            return Err(EditorError::InvalidMask {
                reason: format!("{} cells for a {}×{} mask", coverage.len(), size, size),
            });
        }
        Ok(Self { size, coverage })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn coverage(&self) -> &[u8] {
        &self.coverage
    }

    fn cell(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.size + x) as usize]
    }
}

// ============================================================================
// BRUSH
// ============================================================================

/// A mask plus an optional 256-entry remap table. When the table is present
/// the stamp recolors each covered destination pixel through it instead of
/// painting the active color (the classic color-remap brush).
#[derive(Clone, Debug)]
pub struct Brush {
    pub mask: BrushMask,
    pub remap: Option<Box<[u8; 256]>>,
}

impl Brush {
    pub fn new(mask: BrushMask) -> Self {
        Self { mask, remap: None }
    }

    pub fn with_remap(mask: BrushMask, remap: [u8; 256]) -> Self {
        Self { mask, remap: Some(Box::new(remap)) }
    }

    /// Stamp spacing along a stroke: at most half the mask's minimum
    /// dimension, so consecutive stamps always overlap. The 1px pencil
    /// steps at half a pixel for the same reason.
    pub fn step(&self) -> f32 {
        ((self.mask.size() / 2) as f32).max(0.5)
    }
}

impl Default for Brush {
    fn default() -> Self {
        // 1px pencil; never fails for an odd, non-zero diameter.
        Self::new(BrushMask::circle(1, 1.0).unwrap())
    }
}

// ============================================================================
// STAMPING
// ============================================================================

/// Mix `src` over `dest` (palette indices) at `weight` in linear RGB, then
/// round to the nearest palette slot.
pub(crate) fn blend_indexed(palette: &Palette, dest: u8, src: u8, weight: f32) -> u8 {
    if weight >= 1.0 {
        return src;
    }
    if weight <= 0.0 {
        return dest;
    }
    let d = palette.color(dest as usize).unwrap_or(Rgb::BLACK).to_linear();
    let s = palette.color(src as usize).unwrap_or(Rgb::BLACK).to_linear();
    let mixed = [
        d[0] + (s[0] - d[0]) * weight,
        d[1] + (s[1] - d[1]) * weight,
        d[2] + (s[2] - d[2]) * weight,
    ];
    palette.nearest_index(Rgb::from_linear(mixed))
}

/// Composite one brush stamp centered on `(cx, cy)`. Cells hanging past the
/// canvas edge are clipped, not errors — the gesture itself may stay in
/// bounds while the mask overhangs.
pub(crate) fn stamp(
    store: &mut FrameStore,
    palette: &Palette,
    frame: usize,
    brush: &Brush,
    color: u8,
    cx: f32,
    cy: f32,
    pressure: f32,
) -> Result<()> {
    let mask = &brush.mask;
    let half = (mask.size() / 2) as i64;
    let px0 = cx.round() as i64 - half;
    let py0 = cy.round() as i64 - half;
    let (w, h) = (store.width() as i64, store.height() as i64);

    for my in 0..mask.size() {
        let y = py0 + my as i64;
        if y < 0 || y >= h {
            continue;
        }
        for mx in 0..mask.size() {
            let cov = mask.cell(mx, my);
            if cov == 0 {
                continue;
            }
            let x = px0 + mx as i64;
            if x < 0 || x >= w {
                continue;
            }
            let dest = store.get_pixel(frame, x, y)?;
            let src = match &brush.remap {
                Some(table) => table[dest as usize],
                None => color,
            };
            let weight = (cov as f32 / 255.0) * pressure;
            let out = if cov == 255 && pressure >= 1.0 {
                src
            } else {
                blend_indexed(palette, dest, src, weight)
            };
            if out != dest {
                store.set_pixel(frame, x, y, out)?;
            }
        }
    }
    Ok(())
}

/// Stamp along the segment `from -> to` with fixed-step resampling.
/// `remainder` carries the distance travelled since the last stamp across
/// segments so spacing is independent of input event granularity.
pub(crate) fn stamp_segment(
    store: &mut FrameStore,
    palette: &Palette,
    frame: usize,
    brush: &Brush,
    color: u8,
    from: StrokePoint,
    to: StrokePoint,
    remainder: &mut f32,
) -> Result<()> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = dx.hypot(dy);
    if dist <= f32::EPSILON {
        return Ok(());
    }
    let step = brush.step();
    let p0 = from.effective_pressure();
    let p1 = to.effective_pressure();

    let mut t = step - *remainder;
    while t <= dist {
        let s = t / dist;
        let pressure = p0 + (p1 - p0) * s;
        stamp(store, palette, frame, brush, color, from.x + dx * s, from.y + dy * s, pressure)?;
        t += step;
    }
    *remainder = dist - (t - step);
    Ok(())
}

// ============================================================================
// STROKE TRACKER — one press-drag-release gesture
// ============================================================================

/// Accumulates one gesture and converts it into a single UndoEntry on
/// release. The whole pre-stroke frame is cloned at `begin` (a cel is tens
/// of kilobytes), which makes `cancel` an exact restore and lets `finish`
/// crop before/after patches to the union dirty rect.
pub struct StrokeTracker {
    frame: usize,
    description: String,
    points: Vec<StrokePoint>,
    before: Canvas,
    last: StrokePoint,
    distance_remainder: f32,
}

impl StrokeTracker {
    /// Start a gesture: snapshot the frame and stamp the first point.
    pub fn begin(
        store: &mut FrameStore,
        palette: &Palette,
        frame: usize,
        brush: &Brush,
        color: u8,
        point: StrokePoint,
        description: impl Into<String>,
    ) -> Result<Self> {
        let before = store.frame(frame)?.clone();
        store.take_op_dirty();
        stamp(store, palette, frame, brush, color, point.x, point.y, point.effective_pressure())?;
        Ok(Self {
            frame,
            description: description.into(),
            points: vec![point],
            before,
            last: point,
            distance_remainder: 0.0,
        })
    }

    /// Append a drag sample, stamping intermediate centers.
    pub fn extend(
        &mut self,
        store: &mut FrameStore,
        palette: &Palette,
        brush: &Brush,
        color: u8,
        point: StrokePoint,
    ) -> Result<()> {
        stamp_segment(
            store,
            palette,
            self.frame,
            brush,
            color,
            self.last,
            point,
            &mut self.distance_remainder,
        )?;
        self.points.push(point);
        self.last = point;
        Ok(())
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn last_point(&self) -> StrokePoint {
        self.last
    }

    pub fn sample_count(&self) -> usize {
        self.points.len()
    }

    /// Finalize: one atomic command covering the union dirty rect of every
    /// stamp since `begin`, or `None` for a stroke that changed nothing.
    pub fn finish(self, store: &mut FrameStore) -> Result<Option<Command>> {
        let rect = store.op_dirty_rect(self.frame);
        store.take_op_dirty();
        let Some(rect) = rect else {
            return Ok(None);
        };
        let frame_id = store.frame_id(self.frame)?;
        let before = PixelPatch::capture_canvas(&self.before, frame_id, rect);
        let after = PixelPatch::capture(store, self.frame, rect)?;
        Ok(Some(Command::Pixels { description: self.description, before, after }))
    }

    /// Abort: restore the touched region byte-exactly from the pre-stroke
    /// snapshot.
    pub fn cancel(self, store: &mut FrameStore) -> Result<()> {
        if let Some(rect) = store.op_dirty_rect(self.frame) {
            let saved = self.before.extract_rect(rect);
            store.restore_rect(self.frame, rect, &saved)?;
        }
        store.take_op_dirty();
        Ok(())
    }
}
