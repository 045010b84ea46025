//! Region fill: flood and pattern fill over a connected region of matching
//! pixels.
//!
//! The traversal is an explicit work queue, never recursion, so a
//! whole-canvas fill costs heap instead of stack. The matching mask is fully
//! computed before the first pixel write, which makes the operation atomic:
//! a fill that trips the safety bound leaves the canvas byte-identical.

use std::collections::VecDeque;

use crate::canvas::FrameStore;
use crate::error::{EditorError, Result};
use crate::geometry::PixelRect;
use crate::history::{Command, PixelPatch};
use crate::palette::Palette;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Four,
    /// Also crosses diagonal joints.
    Eight,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillStyle {
    Solid(u8),
    /// Repeating tile of indices sampled at `(x mod width, y mod height)`.
    Pattern { width: u32, height: u32, indices: Vec<u8> },
}

#[derive(Clone, Debug)]
pub struct FillRequest {
    pub frame: usize,
    pub x: i64,
    pub y: i64,
    /// Max-channel color distance a neighbor may have from the seed color.
    /// Zero means exact index match.
    pub tolerance: f32,
    pub style: FillStyle,
    pub connectivity: Connectivity,
}

impl FillRequest {
    pub fn solid(frame: usize, x: i64, y: i64, color: u8) -> Self {
        Self {
            frame,
            x,
            y,
            tolerance: 0.0,
            style: FillStyle::Solid(color),
            connectivity: Connectivity::Four,
        }
    }
}

/// What a successful fill produced. `dirty` is `None` for the idempotent
/// no-op case (seed already holds the fill color at tolerance 0), which also
/// commits no history entry.
#[derive(Debug)]
pub struct FillOutcome {
    pub dirty: Option<PixelRect>,
    pub command: Option<Command>,
}

// ============================================================================
// FLOOD FILL
// ============================================================================

/// Flood-fill `req` against the store. `region_limit` bounds the number of
/// pixels the region may reach before the operation aborts with
/// `RegionTooLarge`.
pub fn flood_fill(
    store: &mut FrameStore,
    palette: &Palette,
    req: &FillRequest,
    region_limit: usize,
) -> Result<FillOutcome> {
    let canvas = store.frame(req.frame)?;
    if !canvas.in_bounds(req.x, req.y) {
        return Err(EditorError::OutOfBounds {
            x: req.x,
            y: req.y,
            width: store.width(),
            height: store.height(),
        });
    }
    validate_style(&req.style, store.palette_len())?;

    let width = store.width() as usize;
    let height = store.height() as usize;
    let (sx, sy) = (req.x as u32, req.y as u32);
    let seed_index = canvas.index_at(sx, sy);

    // Idempotence: re-filling a pixel with its own color at exact match is a
    // successful no-op with no history side effects.
    if req.tolerance <= 0.0
        && let FillStyle::Solid(color) = req.style
        && color == seed_index
    {
        return Ok(FillOutcome { dirty: None, command: None });
    }

    let seed_color = palette.color(seed_index as usize)?;
    let matches = |index: u8| -> bool {
        if req.tolerance <= 0.0 {
            index == seed_index
        } else {
            match palette.color(index as usize) {
                Ok(color) => seed_color.distance(color) <= req.tolerance,
                Err(_) => false,
            }
        }
    };

    // Mask doubles as the visited array and the write plan.
    let mut mask = vec![false; width * height];
    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();
    let mut bbox = PixelRect::from_point(sx, sy);
    let mut count = 1usize;

    mask[sy as usize * width + sx as usize] = true;
    queue.push_back((sx, sy));

    while let Some((x, y)) = queue.pop_front() {
        bbox.include(x, y);
        let neighbors: &[(i64, i64)] = match req.connectivity {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, 0),
                (1, 0),
                (0, -1),
                (0, 1),
                (-1, -1),
                (1, -1),
                (-1, 1),
                (1, 1),
            ],
        };
        for (dx, dy) in neighbors {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let flat = ny as usize * width + nx as usize;
            if mask[flat] || !matches(canvas.index_at(nx as u32, ny as u32)) {
                continue;
            }
            mask[flat] = true;
            count += 1;
            if count > region_limit {
                return Err(EditorError::RegionTooLarge { limit: region_limit });
            }
            queue.push_back((nx as u32, ny as u32));
        }
    }

    // Region accepted: snapshot, write every masked pixel, snapshot again.
    let before = PixelPatch::capture(store, req.frame, bbox)?;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            if !mask[y as usize * width + x as usize] {
                continue;
            }
            let value = match &req.style {
                FillStyle::Solid(color) => *color,
                FillStyle::Pattern { width: pw, height: ph, indices } => {
                    indices[((y % ph) * pw + (x % pw)) as usize]
                }
            };
            store.set_pixel(req.frame, x as i64, y as i64, value)?;
        }
    }
    store.take_op_dirty();
    let after = PixelPatch::capture(store, req.frame, bbox)?;

    let description = match req.style {
        FillStyle::Solid(_) => "Fill".to_string(),
        FillStyle::Pattern { .. } => "Pattern Fill".to_string(),
    };
    Ok(FillOutcome {
        dirty: Some(bbox),
        command: Some(Command::Pixels { description, before, after }),
    })
}

fn validate_style(style: &FillStyle, palette_len: usize) -> Result<()> {
    match style {
        FillStyle::Solid(color) => {
            if (*color as usize) >= palette_len {
                return Err(EditorError::InvalidPaletteIndex {
                    index: *color as usize,
                    len: palette_len,
                });
            }
        }
        FillStyle::Pattern { width, height, indices } => {
            if *width == 0 || *height == 0 || indices.len() != (*width * *height) as usize {
                return Err(EditorError::InvalidMask {
                    reason: format!(
                        "pattern tile {}×{} with {} cells",
                        width,
                        height,
                        indices.len()
                    ),
                });
            }
            for &index in indices {
                if (index as usize) >= palette_len {
                    return Err(EditorError::InvalidPaletteIndex {
                        index: index as usize,
                        len: palette_len,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(size: u32) -> (FrameStore, Palette) {
        let pal = Palette::default_16();
        let store = FrameStore::new(size, size, pal.len(), 0).unwrap();
        (store, pal)
    }

    #[test]
    fn fills_whole_uniform_canvas() {
        let (mut store, pal) = doc(64);
        let outcome =
            flood_fill(&mut store, &pal, &FillRequest::solid(0, 0, 0, 5), usize::MAX).unwrap();
        assert_eq!(outcome.dirty, Some(PixelRect::new(0, 0, 63, 63)));
        assert!(outcome.command.is_some());
        for y in 0..64 {
            for x in 0..64 {
                assert_eq!(store.get_pixel(0, x, y).unwrap(), 5);
            }
        }
    }

    #[test]
    fn self_color_fill_is_a_noop() {
        let (mut store, pal) = doc(16);
        let outcome =
            flood_fill(&mut store, &pal, &FillRequest::solid(0, 3, 3, 0), usize::MAX).unwrap();
        assert_eq!(outcome.dirty, None);
        assert!(outcome.command.is_none());
        assert!(store.take_query_dirty().is_empty());
    }

    #[test]
    fn fill_stops_at_non_matching_border() {
        let (mut store, pal) = doc(16);
        // Vertical wall of 9s at x = 8.
        for y in 0..16 {
            store.set_pixel(0, 8, y, 9).unwrap();
        }
        store.take_op_dirty();
        store.take_query_dirty();

        let outcome =
            flood_fill(&mut store, &pal, &FillRequest::solid(0, 2, 2, 5), usize::MAX).unwrap();
        assert_eq!(outcome.dirty, Some(PixelRect::new(0, 0, 7, 15)));
        assert_eq!(store.get_pixel(0, 7, 0).unwrap(), 5);
        assert_eq!(store.get_pixel(0, 8, 0).unwrap(), 9);
        assert_eq!(store.get_pixel(0, 9, 0).unwrap(), 0);
    }

    #[test]
    fn eight_connectivity_crosses_diagonal_joints() {
        // A diagonal wall of 9s blocks 4-connected flow but leaves diagonal
        // gaps an 8-connected fill can slip through.
        let walled = || {
            let (mut store, pal) = doc(8);
            for i in 0..8i64 {
                store.set_pixel(0, i, i, 9).unwrap();
            }
            store.take_op_dirty();
            (store, pal)
        };

        let (mut store, pal) = walled();
        let req = FillRequest::solid(0, 7, 0, 5);
        flood_fill(&mut store, &pal, &req, usize::MAX).unwrap();
        assert_eq!(store.get_pixel(0, 0, 7).unwrap(), 0);

        let (mut store, pal) = walled();
        let mut req = FillRequest::solid(0, 7, 0, 5);
        req.connectivity = Connectivity::Eight;
        flood_fill(&mut store, &pal, &req, usize::MAX).unwrap();
        assert_eq!(store.get_pixel(0, 0, 7).unwrap(), 5);
    }

    #[test]
    fn tolerance_matches_similar_palette_colors() {
        let mut pal = Palette::default_16();
        pal.set_color(1, crate::palette::Rgb::new(10, 0, 0)).unwrap();
        let mut store = FrameStore::new(4, 1, pal.len(), 0).unwrap();
        store.set_pixel(0, 1, 0, 1).unwrap();
        store.set_pixel(0, 2, 0, 15).unwrap();
        store.take_op_dirty();

        let mut req = FillRequest::solid(0, 0, 0, 5);
        req.tolerance = 16.0;
        flood_fill(&mut store, &pal, &req, usize::MAX).unwrap();
        // Index 1 is within 16 of black, white is not.
        assert_eq!(store.get_pixel(0, 1, 0).unwrap(), 5);
        assert_eq!(store.get_pixel(0, 2, 0).unwrap(), 15);
    }

    #[test]
    fn region_limit_aborts_without_touching_canvas() {
        let (mut store, pal) = doc(64);
        let before: Vec<u8> = store.frame(0).unwrap().raw().to_vec();
        let err = flood_fill(&mut store, &pal, &FillRequest::solid(0, 0, 0, 5), 100);
        assert_eq!(err.unwrap_err(), EditorError::RegionTooLarge { limit: 100 });
        assert_eq!(store.frame(0).unwrap().raw(), &before[..]);
        assert!(store.take_query_dirty().is_empty());
    }

    #[test]
    fn seed_out_of_bounds_rejected() {
        let (mut store, pal) = doc(8);
        let err = flood_fill(&mut store, &pal, &FillRequest::solid(0, 8, 0, 5), usize::MAX);
        assert_eq!(
            err.unwrap_err(),
            EditorError::OutOfBounds { x: 8, y: 0, width: 8, height: 8 }
        );
    }

    #[test]
    fn pattern_fill_tiles_from_canvas_origin() {
        let (mut store, pal) = doc(4);
        let req = FillRequest {
            frame: 0,
            x: 0,
            y: 0,
            tolerance: 0.0,
            style: FillStyle::Pattern { width: 2, height: 1, indices: vec![5, 6] },
            connectivity: Connectivity::Four,
        };
        flood_fill(&mut store, &pal, &req, usize::MAX).unwrap();
        assert_eq!(store.get_pixel(0, 0, 0).unwrap(), 5);
        assert_eq!(store.get_pixel(0, 1, 0).unwrap(), 6);
        assert_eq!(store.get_pixel(0, 2, 3).unwrap(), 5);
    }

    #[test]
    fn invalid_fill_color_rejected_before_any_write() {
        let (mut store, pal) = doc(8);
        let err = flood_fill(&mut store, &pal, &FillRequest::solid(0, 0, 0, 200), usize::MAX);
        assert_eq!(
            err.unwrap_err(),
            EditorError::InvalidPaletteIndex { index: 200, len: 16 }
        );
        assert!(store.take_query_dirty().is_empty());
    }
}
