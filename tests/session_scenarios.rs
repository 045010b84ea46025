//! End-to-end scenarios driven purely through the public `Session` API, the
//! way a host editor would.

use pixelcel::{
    Brush, BrushMask, CycleDirection, DocumentSnapshot, EditorError, Palette, Session, ShapeKind,
    StrokePoint, Tool,
};
use pretty_assertions::assert_eq;

fn session_64() -> Session {
    let _ = env_logger::builder().is_test(true).try_init();
    Session::new(64, 64, Palette::default_16()).unwrap()
}

fn indices(s: &Session, frame: usize) -> Vec<u8> {
    s.frame_snapshot(frame).unwrap().indices
}

#[test]
fn brush_stroke_commits_once_and_survives_undo_redo() {
    let mut s = session_64();
    s.set_brush(Brush::new(BrushMask::circle(3, 1.0).unwrap()));
    s.set_color_index(7).unwrap();

    s.begin_stroke(StrokePoint::new(10.0, 10.0)).unwrap();
    s.extend_stroke(StrokePoint::new(30.0, 10.0)).unwrap();
    s.extend_stroke(StrokePoint::new(30.0, 25.0)).unwrap();
    s.end_stroke().unwrap();

    assert_eq!(s.history().undo_count(), 1);
    let painted = indices(&s, 0);
    assert!(painted.iter().any(|&i| i == 7));

    s.undo().unwrap();
    assert!(indices(&s, 0).iter().all(|&i| i == 0));

    s.redo().unwrap();
    assert_eq!(indices(&s, 0), painted);
}

#[test]
fn fill_click_covers_canvas_and_reports_the_whole_dirty_rect() {
    let mut s = session_64();
    s.set_tool(Tool::Fill).unwrap();
    s.set_color_index(3).unwrap();
    s.begin_stroke(StrokePoint::new(32.0, 32.0)).unwrap();
    s.end_stroke().unwrap();

    assert!(indices(&s, 0).iter().all(|&i| i == 3));
    assert_eq!(s.history().undo_count(), 1);

    let dirty = s.dirty_region_since_last_query();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].frame, 0);
    assert_eq!((dirty[0].rect.min_x, dirty[0].rect.min_y), (0, 0));
    assert_eq!((dirty[0].rect.max_x, dirty[0].rect.max_y), (63, 63));
}

#[test]
fn oversized_fill_fails_without_changing_a_byte() {
    let mut s = session_64();
    s.set_tool(Tool::Fill).unwrap();
    s.set_color_index(3).unwrap();
    s.set_region_limit(64);

    let before = indices(&s, 0);
    let err = s.begin_stroke(StrokePoint::new(32.0, 32.0));
    assert_eq!(err.unwrap_err(), EditorError::RegionTooLarge { limit: 64 });

    assert_eq!(indices(&s, 0), before);
    assert!(s.dirty_region_since_last_query().is_empty());
    assert_eq!(s.history().undo_count(), 0);
}

#[test]
fn identical_intent_sequences_produce_identical_documents() {
    let run = || {
        let mut s = session_64();
        s.set_brush(Brush::new(BrushMask::circle(5, 0.5).unwrap()));
        s.set_color_index(9).unwrap();
        s.begin_stroke(StrokePoint::new(5.0, 5.0)).unwrap();
        s.extend_stroke(StrokePoint::new(40.0, 22.0)).unwrap();
        s.extend_stroke(StrokePoint::new(12.0, 50.0)).unwrap();
        s.end_stroke().unwrap();

        s.set_tool(Tool::Shape(ShapeKind::Ellipse)).unwrap();
        s.set_color_index(12).unwrap();
        s.begin_stroke(StrokePoint::new(20.0, 20.0)).unwrap();
        s.extend_stroke(StrokePoint::new(50.0, 44.0)).unwrap();
        s.end_stroke().unwrap();

        s.set_tool(Tool::Fill).unwrap();
        s.set_color_index(2).unwrap();
        s.request_fill(0, 63).unwrap();
        indices(&s, 0)
    };
    assert_eq!(run(), run());
}

#[test]
fn snapshot_round_trip_preserves_the_whole_animation() {
    let mut s = session_64();
    s.set_color_index(7).unwrap();
    s.begin_stroke(StrokePoint::new(8.0, 8.0)).unwrap();
    s.extend_stroke(StrokePoint::new(40.0, 40.0)).unwrap();
    s.end_stroke().unwrap();

    s.duplicate_frame(0).unwrap();
    s.set_color_index(12).unwrap();
    s.begin_stroke(StrokePoint::new(50.0, 10.0)).unwrap();
    s.end_stroke().unwrap();
    s.set_frame_duration(0, 80).unwrap();
    s.set_frame_duration(1, 120).unwrap();

    let bytes = s.snapshot().to_bytes().unwrap();
    let restored =
        Session::from_snapshot(&DocumentSnapshot::from_bytes(&bytes).unwrap()).unwrap();

    assert_eq!(restored.timeline().frame_count(), 2);
    assert_eq!(restored.timeline().duration_ms(0).unwrap(), 80);
    assert_eq!(restored.timeline().duration_ms(1).unwrap(), 120);
    assert_eq!(indices(&restored, 0), indices(&s, 0));
    assert_eq!(indices(&restored, 1), indices(&s, 1));
    assert_eq!(restored.palette_snapshot(), s.palette_snapshot());
}

#[test]
fn onion_preview_is_a_pure_read() {
    let mut s = session_64();
    s.set_color_index(15).unwrap();
    s.begin_stroke(StrokePoint::new(10.0, 10.0)).unwrap();
    s.end_stroke().unwrap();
    s.insert_frame(1).unwrap();
    s.set_onion_depth(1);
    s.dirty_region_since_last_query();

    let frame0 = indices(&s, 0);
    let frame1 = indices(&s, 1);
    let preview = s.onion_preview().unwrap();
    // The ghost of frame 0's white pixel shows up dimmed in the preview.
    let ghost = preview.get_pixel(10, 10).0[0];
    assert!(ghost > 0 && ghost < 255, "ghost channel: {ghost}");

    assert_eq!(indices(&s, 0), frame0);
    assert_eq!(indices(&s, 1), frame1);
    assert!(s.dirty_region_since_last_query().is_empty());
}

#[test]
fn cycling_rotates_colors_but_never_pixel_indices() {
    let mut s = session_64();
    s.set_color_index(2).unwrap();
    s.begin_stroke(StrokePoint::new(4.0, 4.0)).unwrap();
    s.end_stroke().unwrap();

    let original = s.palette_snapshot();
    s.palette_cycles_mut()
        .add_cycle_range("glow", 1, 4, 5.0, CycleDirection::Forward)
        .unwrap();

    // Direct stepping: +3 then -3 restores the table exactly.
    s.palette_cycles_mut().step_cycle(0, 3).unwrap();
    s.palette_cycles_mut().step_cycle(0, -3).unwrap();
    assert_eq!(s.palette_snapshot().colors(), original.colors());

    // Time-based cycling recolors the table...
    assert!(s.tick(400));
    assert_ne!(s.palette_snapshot().colors(), original.colors());
    // ...but the stored pixel index is untouched.
    assert_eq!(s.frame_snapshot(0).unwrap().indices[4 * 64 + 4], 2);
}

#[test]
fn history_depth_is_bounded() {
    let mut s = session_64();
    s.set_color_index(7).unwrap();
    for i in 0..55i32 {
        let x = 1.0 + (i % 60) as f32;
        s.begin_stroke(StrokePoint::new(x, 1.0)).unwrap();
        s.end_stroke().unwrap();
    }
    // Default depth is 50; the oldest five entries were evicted.
    assert_eq!(s.history().undo_count(), 50);
    while s.history().can_undo() {
        s.undo().unwrap();
    }
    // The five unreachable strokes remain applied.
    let remaining: usize = indices(&s, 0).iter().filter(|&&i| i == 7).count();
    assert_eq!(remaining, 5);
}
