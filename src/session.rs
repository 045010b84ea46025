//! Session: the external interface of the painting core.
//!
//! A `Session` owns one document (frame store + palette + timeline + history)
//! and translates input intents — stroke begin/move/end, fill requests, color
//! picks, undo/redo — into calls on the engines. It is the only type outside
//! collaborators talk to; nothing else hands out mutable access to the pixel
//! data.

use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{render_frame_rgba, FrameStore};
use crate::error::{EditorError, Result};
use crate::geometry::{DirtyRegion, StrokePoint};
use crate::history::{Command, HistoryManager};
use crate::ops::brush::{Brush, StrokeTracker};
use crate::ops::fill::{flood_fill, Connectivity, FillRequest, FillStyle};
use crate::ops::shapes::{draw_shape, ShapeKind};
use crate::palette::{hsv_to_rgb, wheel_to_hsv, Palette, Rgb};
use crate::timeline::Timeline;

/// Upper bound on flood-fill region size. Generous for any sane canvas; its
/// job is to bound worst-case latency, not to police normal use.
pub const DEFAULT_REGION_LIMIT: usize = 1 << 22;

// ============================================================================
// TOOLS AND INTENT PAYLOADS
// ============================================================================

/// The closed tool set. A tagged enum rather than trait objects: dispatch is
/// a `match`, and adding a tool is a compile-checked change everywhere it
/// matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Brush,
    Fill,
    Shape(ShapeKind),
    ColorPicker,
}

/// Where a `pick_color` intent gets its color from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColorSource {
    /// An existing palette slot becomes the active color.
    Index(u8),
    /// A point on the color wheel recolors the active slot. `x`/`y` are
    /// offsets from the wheel center in wheel radii; `value` comes from the
    /// brightness slider.
    Wheel { x: f32, y: f32, value: f32 },
}

/// What the host UI wants to know about the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorMeta {
    pub x: f32,
    pub y: f32,
    pub frame: usize,
    /// Palette index under the cursor, `None` while off-canvas.
    pub index: Option<u8>,
}

/// One frame handed across the boundary: raw indices plus the palette-
/// resolved RGBA expansion.
pub struct FrameSnapshot {
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
    pub rgba: RgbaImage,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    id: Uuid,
    pub(crate) frames: FrameStore,
    pub(crate) palette: Palette,
    pub(crate) timeline: Timeline,
    history: HistoryManager,
    tool: Tool,
    brush: Brush,
    color_index: u8,
    fill_tolerance: f32,
    fill_connectivity: Connectivity,
    region_limit: usize,
    stroke: Option<StrokeTracker>,
    shape_gesture: Option<(StrokePoint, StrokePoint)>,
    cursor: Option<StrokePoint>,
}

impl Session {
    pub fn new(width: u32, height: u32, palette: Palette) -> Result<Self> {
        let frames = FrameStore::new(width, height, palette.len(), 0)?;
        log::info!("session opened: {}×{} canvas, {} colors", width, height, palette.len());
        Ok(Self {
            id: Uuid::new_v4(),
            frames,
            palette,
            timeline: Timeline::new(),
            history: HistoryManager::default(),
            tool: Tool::Brush,
            brush: Brush::default(),
            color_index: 1,
            fill_tolerance: 0.0,
            fill_connectivity: Connectivity::Four,
            region_limit: DEFAULT_REGION_LIMIT,
            stroke: None,
            shape_gesture: None,
            cursor: None,
        })
    }

    // ---- context ------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.frames.width()
    }

    pub fn height(&self) -> u32 {
        self.frames.height()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switching tools aborts any gesture in flight.
    pub fn set_tool(&mut self, tool: Tool) -> Result<()> {
        self.abort_gesture()?;
        self.tool = tool;
        Ok(())
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn color_index(&self) -> u8 {
        self.color_index
    }

    pub fn set_color_index(&mut self, index: u8) -> Result<()> {
        if (index as usize) >= self.palette.len() {
            return Err(EditorError::InvalidPaletteIndex {
                index: index as usize,
                len: self.palette.len(),
            });
        }
        self.color_index = index;
        Ok(())
    }

    pub fn set_fill_options(&mut self, tolerance: f32, connectivity: Connectivity) {
        self.fill_tolerance = tolerance.max(0.0);
        self.fill_connectivity = connectivity;
    }

    pub fn set_region_limit(&mut self, limit: usize) {
        self.region_limit = limit.max(1);
    }

    pub fn current_frame(&self) -> usize {
        self.timeline.cursor()
    }

    pub fn is_gesture_active(&self) -> bool {
        self.stroke.is_some() || self.shape_gesture.is_some()
    }

    // ---- gesture dispatch ---------------------------------------------------

    /// Press. For the click-tools (fill, picker) this IS the whole action.
    pub fn begin_stroke(&mut self, point: StrokePoint) -> Result<()> {
        self.abort_gesture()?;
        self.cursor = Some(point);
        match self.tool {
            Tool::Brush => {
                let tracker = StrokeTracker::begin(
                    &mut self.frames,
                    &self.palette,
                    self.timeline.cursor(),
                    &self.brush,
                    self.color_index,
                    point,
                    "Brush Stroke",
                )?;
                self.stroke = Some(tracker);
                Ok(())
            }
            Tool::Shape(_) => {
                self.shape_gesture = Some((point, point));
                Ok(())
            }
            Tool::Fill => self.request_fill(point.x.round() as i64, point.y.round() as i64),
            Tool::ColorPicker => {
                let frame = self.timeline.cursor();
                let index =
                    self.frames.get_pixel(frame, point.x.round() as i64, point.y.round() as i64)?;
                self.color_index = index;
                Ok(())
            }
        }
    }

    /// Drag. Only meaningful for the brush and shape tools; for the others
    /// it just tracks the cursor.
    pub fn extend_stroke(&mut self, point: StrokePoint) -> Result<()> {
        self.cursor = Some(point);
        if let Some(stroke) = &mut self.stroke {
            stroke.extend(&mut self.frames, &self.palette, &self.brush, self.color_index, point)?;
        } else if let Some((_, target)) = &mut self.shape_gesture {
            *target = point;
        }
        Ok(())
    }

    /// Release: the gesture becomes one history entry (or none, if it
    /// changed nothing). Returns the entry's description.
    pub fn end_stroke(&mut self) -> Result<Option<String>> {
        if let Some(stroke) = self.stroke.take() {
            let command = stroke.finish(&mut self.frames)?;
            return Ok(self.commit(command));
        }
        if let Some((anchor, target)) = self.shape_gesture.take() {
            let Tool::Shape(kind) = self.tool else {
                return Ok(None);
            };
            let command = draw_shape(
                &mut self.frames,
                &self.palette,
                self.timeline.cursor(),
                &self.brush,
                self.color_index,
                kind,
                anchor,
                target,
            )?;
            return Ok(self.commit(command));
        }
        Ok(None)
    }

    /// Abort the gesture in flight, restoring touched pixels byte-exactly.
    /// No history entry is recorded. A no-op when nothing is in flight.
    pub fn cancel_stroke(&mut self) -> Result<()> {
        self.abort_gesture()
    }

    fn abort_gesture(&mut self) -> Result<()> {
        if let Some(stroke) = self.stroke.take() {
            stroke.cancel(&mut self.frames)?;
        }
        self.shape_gesture = None;
        Ok(())
    }

    fn commit(&mut self, command: Option<Command>) -> Option<String> {
        let command = command?;
        let description = command.description().to_string();
        self.history.commit(command);
        Some(description)
    }

    // ---- fill ---------------------------------------------------------------

    /// Flood-fill from `(x, y)` on the current frame with the active color
    /// and the session's tolerance/connectivity options.
    pub fn request_fill(&mut self, x: i64, y: i64) -> Result<()> {
        let req = FillRequest {
            frame: self.timeline.cursor(),
            x,
            y,
            tolerance: self.fill_tolerance,
            style: FillStyle::Solid(self.color_index),
            connectivity: self.fill_connectivity,
        };
        self.fill(&req)
    }

    /// Fill with an explicit request (pattern fills, other frames).
    pub fn fill(&mut self, req: &FillRequest) -> Result<()> {
        let outcome = flood_fill(&mut self.frames, &self.palette, req, self.region_limit)?;
        self.commit(outcome.command);
        Ok(())
    }

    // ---- color picking ------------------------------------------------------

    /// Apply a color pick. `Index` switches the active slot; `Wheel`
    /// recolors the active slot and records a palette history entry.
    pub fn pick_color(&mut self, source: ColorSource) -> Result<()> {
        match source {
            ColorSource::Index(index) => self.set_color_index(index),
            ColorSource::Wheel { x, y, value } => {
                let rgb = hsv_to_rgb(wheel_to_hsv(x, y, value));
                self.set_palette_color(self.color_index, rgb)
            }
        }
    }

    /// Recolor a palette slot, as one undoable palette edit. Only the color
    /// table is snapshotted; cycle ranges stay outside history.
    pub fn set_palette_color(&mut self, index: u8, rgb: Rgb) -> Result<()> {
        let before = self.palette.colors().to_vec();
        self.palette.set_color(index as usize, rgb)?;
        self.history.commit(Command::Palette {
            description: "Edit Color".to_string(),
            before,
            after: self.palette.colors().to_vec(),
        });
        Ok(())
    }

    /// Append a palette entry. Not undoable: the palette never shrinks
    /// mid-session, which is what keeps every stored pixel index valid.
    pub fn add_palette_color(&mut self, rgb: Rgb) -> Result<usize> {
        let slot = self.palette.push(rgb)?;
        self.frames.set_palette_len(self.palette.len());
        Ok(slot)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Mutable cycling controls. Range setup and stepping are live palette
    /// state, not document edits, so they bypass history.
    pub fn palette_cycles_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    // ---- history ------------------------------------------------------------

    pub fn undo(&mut self) -> Result<String> {
        self.abort_gesture()?;
        self.history.undo(&mut self.frames, &mut self.palette)
    }

    pub fn redo(&mut self) -> Result<String> {
        self.abort_gesture()?;
        self.history.redo(&mut self.frames, &mut self.palette)
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    // ---- timeline -----------------------------------------------------------

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn insert_frame(&mut self, at: usize) -> Result<usize> {
        self.abort_gesture()?;
        self.timeline.insert_frame(&mut self.frames, at, 0)
    }

    pub fn remove_frame(&mut self, index: usize) -> Result<()> {
        self.abort_gesture()?;
        self.timeline.remove_frame(&mut self.frames, index)
    }

    pub fn duplicate_frame(&mut self, index: usize) -> Result<usize> {
        self.abort_gesture()?;
        self.timeline.duplicate_frame(&mut self.frames, index)
    }

    pub fn reorder_frame(&mut self, from: usize, to: usize) -> Result<()> {
        self.abort_gesture()?;
        self.timeline.reorder_frame(&mut self.frames, from, to)
    }

    pub fn set_frame_duration(&mut self, index: usize, ms: u32) -> Result<()> {
        self.timeline.set_duration(index, ms)
    }

    pub fn set_onion_depth(&mut self, depth: usize) {
        self.timeline.set_onion_depth(depth);
    }

    pub fn set_current_frame(&mut self, index: usize) -> Result<()> {
        self.abort_gesture()?;
        self.timeline.set_cursor(index)
    }

    pub fn play(&mut self) {
        self.timeline.play();
    }

    pub fn pause(&mut self) {
        self.timeline.pause();
    }

    /// Advance wall time: playback cursor and palette cycling. Returns
    /// whether the host should repaint.
    pub fn tick(&mut self, dt_ms: u32) -> bool {
        let moved = self.timeline.advance(dt_ms);
        let cycling = self
            .palette
            .cycle_ranges()
            .iter()
            .any(|r| r.active && r.rate > 0.0);
        self.palette.tick(dt_ms);
        moved || cycling
    }

    // ---- queries ------------------------------------------------------------

    /// Everything that changed since the last call, as per-frame dirty rects.
    pub fn dirty_region_since_last_query(&mut self) -> Vec<DirtyRegion> {
        self.frames.take_query_dirty()
    }

    pub fn frame_snapshot(&self, index: usize) -> Result<FrameSnapshot> {
        let canvas = self.frames.frame(index)?;
        Ok(FrameSnapshot {
            width: canvas.width(),
            height: canvas.height(),
            indices: canvas.raw().to_vec(),
            rgba: render_frame_rgba(&self.frames, &self.palette, index)?,
        })
    }

    pub fn palette_snapshot(&self) -> Palette {
        self.palette.clone()
    }

    pub fn current_cursor_position_meta(&self) -> Option<CursorMeta> {
        let point = self.cursor?;
        let frame = self.timeline.cursor();
        let index = self
            .frames
            .get_pixel(frame, point.x.round() as i64, point.y.round() as i64)
            .ok();
        Some(CursorMeta { x: point.x, y: point.y, frame, index })
    }

    /// Current frame with onion-skin ghosts, for display only.
    pub fn onion_preview(&self) -> Result<RgbaImage> {
        self.timeline.composite_onion(&self.frames, &self.palette)
    }
}
