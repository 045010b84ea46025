//! Opaque document snapshots.
//!
//! The core defines no file format. It hands the host a self-contained
//! `DocumentSnapshot` (raw index buffers + palette table + timeline data) and
//! accepts one back, encoded with bincode either way. Mapping snapshots to
//! on-disk image or animation formats is the loader/saver's job.

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::geometry::PixelRect;
use crate::palette::Palette;
use crate::session::Session;

/// Snapshot format tag, bumped on breaking layout changes.
const SNAPSHOT_MAGIC: &str = "PCL1";

/// Maximum supported canvas dimension in pixels (per axis).
const MAX_CANVAS_DIM: u32 = 16384;

/// Everything needed to rebuild a document: dimensions, the palette with its
/// cycling ranges, every frame's raw index buffer, and the timeline state.
/// History does not survive a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    magic: String,
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
    pub frames: Vec<Vec<u8>>,
    pub durations_ms: Vec<u32>,
    pub cursor: usize,
    pub onion_depth: usize,
}

impl DocumentSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| EditorError::MalformedSnapshot(e.to_string()))
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let snapshot: DocumentSnapshot =
            bincode::deserialize(raw).map_err(|e| EditorError::MalformedSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Snapshots cross a trust boundary (the host may have read one from
    /// disk), so everything `set_pixel` would normally enforce is re-checked
    /// here before any buffer is adopted.
    fn validate(&self) -> Result<()> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(EditorError::MalformedSnapshot(format!(
                "unknown magic '{}'",
                self.magic
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(EditorError::MalformedSnapshot(
                "canvas dimensions cannot be zero".into(),
            ));
        }
        if self.width > MAX_CANVAS_DIM || self.height > MAX_CANVAS_DIM {
            return Err(EditorError::MalformedSnapshot(format!(
                "canvas size {}×{} exceeds the {}px per-axis limit",
                self.width, self.height, MAX_CANVAS_DIM
            )));
        }
        if self.frames.is_empty() {
            return Err(EditorError::MalformedSnapshot("no frames".into()));
        }
        if self.durations_ms.len() != self.frames.len() {
            return Err(EditorError::MalformedSnapshot(format!(
                "{} durations for {} frames",
                self.durations_ms.len(),
                self.frames.len()
            )));
        }
        if self.cursor >= self.frames.len() {
            return Err(EditorError::MalformedSnapshot(format!(
                "cursor {} past the last frame",
                self.cursor
            )));
        }
        if self.palette.is_empty() {
            return Err(EditorError::MalformedSnapshot("empty palette".into()));
        }
        let expected = self.width as usize * self.height as usize;
        let palette_len = self.palette.len();
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.len() != expected {
                return Err(EditorError::MalformedSnapshot(format!(
                    "frame {} holds {} pixels, expected {}",
                    i,
                    frame.len(),
                    expected
                )));
            }
            if frame.iter().any(|&index| index as usize >= palette_len) {
                return Err(EditorError::MalformedSnapshot(format!(
                    "frame {} references a palette index past {}",
                    i,
                    palette_len - 1
                )));
            }
        }
        Ok(())
    }
}

impl Session {
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            magic: SNAPSHOT_MAGIC.to_string(),
            width: self.width(),
            height: self.height(),
            palette: self.palette.clone(),
            frames: self
                .frames
                .all_frames()
                .iter()
                .map(|canvas| canvas.raw().to_vec())
                .collect(),
            durations_ms: self.timeline.durations().to_vec(),
            cursor: self.timeline.cursor(),
            onion_depth: self.timeline.onion_depth(),
        }
    }

    /// Rebuild a session from a snapshot. The result is a fresh session (new
    /// id, empty history) holding the snapshot's document byte-exactly.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self> {
        snapshot.validate()?;
        let mut session = Session::new(snapshot.width, snapshot.height, snapshot.palette.clone())?;
        let full = PixelRect::new(0, 0, snapshot.width - 1, snapshot.height - 1);
        for (i, frame) in snapshot.frames.iter().enumerate() {
            if i > 0 {
                session.timeline.insert_frame(&mut session.frames, i, 0)?;
            }
            session.frames.restore_rect(i, full, frame)?;
            session.timeline.set_duration(i, snapshot.durations_ms[i])?;
        }
        session.timeline.set_cursor(snapshot.cursor)?;
        session.timeline.set_onion_depth(snapshot.onion_depth);
        // The rebuild marked everything dirty; a fresh document starts clean.
        session.frames.take_query_dirty();
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::StrokePoint;
    use pretty_assertions::assert_eq;

    fn painted_session() -> Session {
        let mut s = Session::new(16, 16, Palette::default_16()).unwrap();
        s.set_color_index(7).unwrap();
        s.begin_stroke(StrokePoint::new(3.0, 3.0)).unwrap();
        s.extend_stroke(StrokePoint::new(12.0, 8.0)).unwrap();
        s.end_stroke().unwrap();
        s.duplicate_frame(0).unwrap();
        s.set_frame_duration(1, 250).unwrap();
        s
    }

    #[test]
    fn snapshot_round_trips_through_bytes() {
        let original = painted_session();
        let bytes = original.snapshot().to_bytes().unwrap();
        let restored = Session::from_snapshot(&DocumentSnapshot::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(restored.width(), 16);
        assert_eq!(restored.timeline().frame_count(), 2);
        assert_eq!(restored.timeline().cursor(), 1);
        assert_eq!(restored.timeline().duration_ms(1).unwrap(), 250);
        assert_eq!(
            restored.frame_snapshot(0).unwrap().indices,
            original.frame_snapshot(0).unwrap().indices
        );
        assert_eq!(restored.palette_snapshot(), original.palette_snapshot());
        // New document, new identity, clean history.
        assert_ne!(restored.id(), original.id());
        assert!(!restored.history().can_undo());
    }

    #[test]
    fn snapshot_captures_every_frame_buffer() {
        let mut s = painted_session();
        s.duplicate_frame(1).unwrap();
        let snapshot = s.snapshot();
        assert_eq!(snapshot.frames.len(), s.timeline().frame_count());
        assert_eq!(snapshot.durations_ms.len(), snapshot.frames.len());
        for frame in &snapshot.frames {
            assert_eq!(frame.len(), 16 * 16);
        }
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = DocumentSnapshot::from_bytes(&[0x00, 0x01, 0x02]);
        assert!(matches!(err, Err(EditorError::MalformedSnapshot(_))));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut snapshot = painted_session().snapshot();
        snapshot.magic = "PFE1".to_string();
        let bytes = bincode::serialize(&snapshot).unwrap();
        let err = DocumentSnapshot::from_bytes(&bytes);
        assert!(matches!(err, Err(EditorError::MalformedSnapshot(_))));
    }

    #[test]
    fn truncated_frame_buffer_is_rejected() {
        let mut snapshot = painted_session().snapshot();
        snapshot.frames[0].pop();
        assert!(matches!(
            Session::from_snapshot(&snapshot),
            Err(EditorError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn stale_palette_index_is_rejected() {
        let mut snapshot = painted_session().snapshot();
        snapshot.frames[0][0] = 200;
        assert!(matches!(
            Session::from_snapshot(&snapshot),
            Err(EditorError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn cursor_past_last_frame_is_rejected() {
        let mut snapshot = painted_session().snapshot();
        snapshot.cursor = 5;
        assert!(matches!(
            Session::from_snapshot(&snapshot),
            Err(EditorError::MalformedSnapshot(_))
        ));
    }
}
