//! Shape tool rasterization: line, rectangle outline, ellipse outline.
//!
//! Shapes are not their own rasterizer. Each kind expands to a polyline of
//! stamp centers and is walked through the same stamp pipeline as a freehand
//! stroke, so brush size, hardness and remap all apply, and the result is one
//! history command.

use crate::canvas::FrameStore;
use crate::error::Result;
use crate::geometry::StrokePoint;
use crate::history::{Command, PixelPatch};
use crate::ops::brush::{stamp, stamp_segment, Brush};
use crate::palette::Palette;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Rectangle,
    Ellipse,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
        }
    }
}

/// Expand the gesture's anchor/target pair into the outline polyline.
fn outline(kind: ShapeKind, anchor: StrokePoint, target: StrokePoint) -> Vec<StrokePoint> {
    match kind {
        ShapeKind::Line => vec![anchor, target],
        ShapeKind::Rectangle => vec![
            anchor,
            StrokePoint::new(target.x, anchor.y),
            target,
            StrokePoint::new(anchor.x, target.y),
            anchor,
        ],
        ShapeKind::Ellipse => {
            let cx = (anchor.x + target.x) / 2.0;
            let cy = (anchor.y + target.y) / 2.0;
            let rx = (target.x - anchor.x).abs() / 2.0;
            let ry = (target.y - anchor.y).abs() / 2.0;
            // Chord length stays near one pixel so the stamp walk leaves no
            // gaps at any radius.
            let segments = (std::f32::consts::TAU * rx.max(ry)).ceil().max(8.0) as u32;
            (0..=segments)
                .map(|i| {
                    let theta = std::f32::consts::TAU * i as f32 / segments as f32;
                    StrokePoint::new(cx + rx * theta.cos(), cy + ry * theta.sin())
                })
                .collect()
        }
    }
}

/// Rasterize one committed shape gesture. Returns `None` when the shape
/// changed no pixels (fully off-canvas, or stamping its own color).
pub fn draw_shape(
    store: &mut FrameStore,
    palette: &Palette,
    frame: usize,
    brush: &Brush,
    color: u8,
    kind: ShapeKind,
    anchor: StrokePoint,
    target: StrokePoint,
) -> Result<Option<Command>> {
    let before = store.frame(frame)?.clone();
    store.take_op_dirty();

    let path = outline(kind, anchor, target);
    let first = path[0];
    stamp(store, palette, frame, brush, color, first.x, first.y, first.effective_pressure())?;
    let mut remainder = 0.0f32;
    for pair in path.windows(2) {
        stamp_segment(store, palette, frame, brush, color, pair[0], pair[1], &mut remainder)?;
    }

    let rect = store.op_dirty_rect(frame);
    store.take_op_dirty();
    let Some(rect) = rect else {
        return Ok(None);
    };
    let frame_id = store.frame_id(frame)?;
    let before = PixelPatch::capture_canvas(&before, frame_id, rect);
    let after = PixelPatch::capture(store, frame, rect)?;
    Ok(Some(Command::Pixels {
        description: kind.label().to_string(),
        before,
        after,
    }))
}
