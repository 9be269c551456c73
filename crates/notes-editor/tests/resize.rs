mod common;

use std::cell::Cell;
use std::rc::Rc;

use manos_notes_core::{ChartAttrs, ImageAttrs, find_node_by_id, node_at_path};
use manos_notes_editor::{EditorSession, GestureKind, Point2};
use proptest::prelude::*;

use common::{StackLayout, session};

fn image_session() -> (EditorSession, String) {
    let mut session = session();
    let id = session
        .command(|e| e.insert_image(ImageAttrs::new("https://cdn.example.com/a.png")))
        .unwrap();
    (session, id)
}

fn stored_int(session: &EditorSession, id: &str, key: &str) -> i64 {
    let path = find_node_by_id(session.editor().doc(), id).unwrap();
    let node = node_at_path(session.editor().doc(), &path).unwrap();
    node.attrs().unwrap()[key].as_i64().unwrap()
}

#[test]
fn image_width_follows_the_pointer_once_per_frame() {
    let (mut session, id) = image_session();
    let layout = StackLayout::new(2);
    let released = Rc::new(Cell::new(0));
    let counter = released.clone();

    assert!(session.begin_resize(&id, Point2::new(600.0, 10.0), &layout, move || counter.set(counter.get() + 1)));
    assert_eq!(
        session.gestures().active(),
        Some(&GestureKind::ImageResize { node_id: id.clone() })
    );

    // 600px content column; only the newest move of the frame is written.
    assert!(session.resize_move(Point2::new(300.0, 10.0)));
    assert!(!session.resize_move(Point2::new(330.0, 10.0)));
    assert!(session.resize_frame());
    assert_eq!(stored_int(&session, &id, "width"), 55);

    // No movement since the last frame: nothing to write.
    assert!(!session.resize_frame());

    assert!(session.resize_move(Point2::new(-5000.0, 10.0)));
    session.end_resize();
    assert_eq!(stored_int(&session, &id, "width"), 20);
    assert_eq!(released.get(), 1);
    assert!(session.gestures().active().is_none());
}

#[test]
fn chart_height_is_clamped() {
    let mut session = session();
    let id = session.command(|e| e.insert_chart("c1", None)).unwrap();
    let layout = StackLayout::new(2);

    assert!(session.begin_resize(&id, Point2::new(0.0, 100.0), &layout, || {}));
    session.resize_move(Point2::new(0.0, 5000.0));
    session.resize_frame();
    assert_eq!(stored_int(&session, &id, "height"), 900);

    session.resize_move(Point2::new(0.0, -5000.0));
    session.end_resize();
    assert_eq!(stored_int(&session, &id, "height"), 180);
}

#[test]
fn deleting_the_node_ends_its_gesture() {
    let (mut session, id) = image_session();
    let layout = StackLayout::new(2);
    let released = Rc::new(Cell::new(false));
    let flag = released.clone();
    session.begin_resize(&id, Point2::new(0.0, 0.0), &layout, move || flag.set(true));

    session.command(|e| e.remove_node_by_id(&id)).unwrap();
    assert!(released.get());
    assert!(session.gestures().active().is_none());
    assert!(!session.resize_move(Point2::new(50.0, 0.0)));
    assert!(!session.resize_frame());
}

#[test]
fn non_widgets_cannot_be_resized() {
    let mut session = session();
    let layout = StackLayout::new(1);
    assert!(!session.begin_resize("missing", Point2::default(), &layout, || {}));
    assert!(session.gestures().active().is_none());
}

proptest! {
    #[test]
    fn stored_image_width_stays_in_range(
        start_x in -2000.0f32..2000.0,
        moves in prop::collection::vec(-5000.0f32..5000.0, 1..8),
        content_width in prop_oneof![Just(0.0f32), 1.0f32..1200.0],
    ) {
        let (mut session, id) = image_session();
        let mut layout = StackLayout::new(2);
        layout.content_width = content_width;
        let began = session.begin_resize(&id, Point2::new(start_x, 0.0), &layout, || {});
        prop_assert!(began);
        for x in moves {
            session.resize_move(Point2::new(x, 0.0));
            session.resize_frame();
            let width = stored_int(&session, &id, "width");
            prop_assert!((20..=100).contains(&width), "width {}", width);
        }
        session.end_resize();
    }

    #[test]
    fn stored_chart_height_stays_in_range(dy in prop::num::f32::ANY) {
        let mut session = session();
        let id = session.command(|e| e.insert_chart("c1", None)).unwrap();
        let layout = StackLayout::new(2);
        let began = session.begin_resize(&id, Point2::new(0.0, 0.0), &layout, || {});
        prop_assert!(began);
        session.resize_move(Point2::new(0.0, dy));
        session.end_resize();
        let height = stored_int(&session, &id, "height");
        prop_assert!((180..=900).contains(&height), "height {}", height);
        let attrs = ChartAttrs::from_attrs(
            node_at_path(session.editor().doc(), &find_node_by_id(session.editor().doc(), &id).unwrap())
                .unwrap()
                .attrs()
                .unwrap(),
        );
        prop_assert_eq!(i64::from(attrs.height), height);
    }
}
