//! Unified error type for the painting core.
//!
//! Every error here is recoverable: a failed mutating call leaves the
//! document byte-identical to its state before the call, and the caller may
//! simply continue the session.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("coordinate ({x}, {y}) outside canvas {width}×{height}")]
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("fill region exceeds the safety limit of {limit} pixels")]
    RegionTooLarge { limit: usize },

    /// Undo/redo requested with nothing on the corresponding stack.
    /// Benign — the UI typically just disables the menu item.
    #[error("nothing to {action}")]
    HistoryEmpty { action: &'static str },

    #[error("palette index {index} out of range (palette has {len} entries)")]
    InvalidPaletteIndex { index: usize, len: usize },

    #[error("frame {index} does not exist (store has {count} frames)")]
    FrameNotFound { index: usize, count: usize },

    /// A timeline always holds at least one frame.
    #[error("cannot remove the only remaining frame")]
    LastFrame,

    #[error("invalid brush mask: {reason}")]
    InvalidMask { reason: String },

    #[error("cycle range {low}..={high} is out of bounds or overlaps an existing range")]
    InvalidCycleRange { low: usize, high: usize },

    #[error("malformed document snapshot: {0}")]
    MalformedSnapshot(String),
}

pub type Result<T> = std::result::Result<T, EditorError>;
