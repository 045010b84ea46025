//! Core painting engine for an indexed-palette pixel-art and cel-animation
//! editor.
//!
//! The crate is UI-free: a host (editor shell, test harness, batch tool)
//! drives a [`Session`] with input intents — stroke begin/move/end, fill
//! requests, color picks, undo/redo — and reads back dirty regions and frame
//! snapshots. Everything runs synchronously on the caller's thread; the only
//! internal parallelism is row-parallel RGBA expansion when rendering.
//!
//! ```
//! use pixelcel::{Palette, Session, StrokePoint};
//!
//! let mut session = Session::new(64, 64, Palette::default_16())?;
//! session.set_color_index(7)?;
//! session.begin_stroke(StrokePoint::new(10.0, 10.0))?;
//! session.extend_stroke(StrokePoint::new(40.0, 30.0))?;
//! session.end_stroke()?;
//! assert!(session.history().can_undo());
//! # Ok::<(), pixelcel::EditorError>(())
//! ```

mod canvas;
mod error;
mod geometry;
mod history;
mod ops;
mod palette;
mod session;
mod snapshot;
mod timeline;

pub use canvas::{render_frame_rgba, Canvas, FrameStore};
pub use error::{EditorError, Result};
pub use geometry::{DirtyRegion, PixelRect, StrokePoint};
pub use history::{Command, HistoryManager, PixelPatch};
pub use ops::brush::{Brush, BrushMask, StrokeTracker};
pub use ops::fill::{flood_fill, Connectivity, FillOutcome, FillRequest, FillStyle};
pub use ops::shapes::{draw_shape, ShapeKind};
pub use palette::{
    hsv_to_rgb, rgb_to_hsv, wheel_to_hsv, CycleDirection, CycleRange, Hsv, Palette, Rgb,
    MAX_PALETTE_SIZE,
};
pub use session::{
    ColorSource, CursorMeta, FrameSnapshot, Session, Tool, DEFAULT_REGION_LIMIT,
};
pub use snapshot::DocumentSnapshot;
pub use timeline::{Timeline, DEFAULT_FRAME_DURATION_MS};
