mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use manos_notes_core::{Document, ImageAttrs, Node, NodeKind, NoteValue, Selection};
use manos_notes_editor::{
    BLOCK_MOVE_MIME, DropOutcome, DropPayload, EditorSession, GestureKind, ImageFile,
};

use common::{StackLayout, session};

fn abc() -> EditorSession {
    let mut session = session();
    let markup = NoteValue::from_document(Document::new(vec![
        Node::paragraph("a"),
        Node::paragraph("b"),
        Node::paragraph("c"),
    ]))
    .to_markup()
    .unwrap();
    session.load_markup(&markup).unwrap();
    session
}

fn texts(session: &EditorSession) -> Vec<String> {
    session
        .editor()
        .doc()
        .children
        .iter()
        .map(Node::text_content)
        .collect()
}

fn grab(session: &mut EditorSession, layout: &StackLayout, y: f32) -> DropPayload {
    session.hover_gutter(layout, y, Instant::now());
    let payload = session.start_block_drag(|| {}).unwrap();
    assert_eq!(payload.mime, BLOCK_MOVE_MIME);
    DropPayload::from_transfer(&[(payload.mime.to_string(), payload.data)], vec![])
}

#[test]
fn dropping_onto_its_own_span_changes_nothing() {
    let mut session = abc();
    let layout = StackLayout::new(4);
    let before = session.editor().doc().clone();

    // Block 1 spans y 40..80; both halves resolve to gaps inside it.
    for y in [45.0, 75.0] {
        let payload = grab(&mut session, &layout, 50.0);
        assert_eq!(payload, DropPayload::BlockMove { from: 1 });
        assert_eq!(session.drop_at(&layout, payload, y).unwrap(), DropOutcome::NoOp);
        assert_eq!(session.editor().doc(), &before);
    }
    // The lower half of the block above and the upper half of the block below.
    for y in [35.0, 85.0] {
        let payload = grab(&mut session, &layout, 50.0);
        assert_eq!(session.drop_at(&layout, payload, y).unwrap(), DropOutcome::NoOp);
    }
    assert_eq!(session.editor().doc(), &before);
    assert!(!session.editor().can_undo());
}

#[test]
fn drop_above_the_midpoint_inserts_before() {
    let mut session = abc();
    let layout = StackLayout::new(4);

    let payload = grab(&mut session, &layout, 90.0);
    assert_eq!(
        session.drop_at(&layout, payload, 5.0).unwrap(),
        DropOutcome::Moved { from: 2, to: 0 }
    );
    assert_eq!(texts(&session), vec!["c", "a", "b", ""]);
}

#[test]
fn drop_below_the_midpoint_inserts_after() {
    let mut session = abc();
    let layout = StackLayout::new(4);

    let payload = grab(&mut session, &layout, 10.0);
    assert_eq!(
        session.drop_at(&layout, payload, 115.0).unwrap(),
        DropOutcome::Moved { from: 0, to: 2 }
    );
    assert_eq!(texts(&session), vec!["b", "c", "a", ""]);
    assert!(session.gestures().active().is_none());
}

#[test]
fn dragging_an_atomic_block_selects_it() {
    let mut session = session();
    session
        .command(|e| e.insert_image(ImageAttrs::new("https://cdn.example.com/a.png")))
        .unwrap();
    let layout = StackLayout::new(2);

    let released = Rc::new(Cell::new(false));
    session.hover_gutter(&layout, 10.0, Instant::now());
    let flag = released.clone();
    session.start_block_drag(move || flag.set(true)).unwrap();

    assert_eq!(session.editor().selection(), &Selection::node(vec![0]));
    assert_eq!(session.gestures().active(), Some(&GestureKind::BlockDrag { from: 0 }));

    session.cancel_block_drag();
    assert!(released.get());
}

#[test]
fn file_drops_go_to_ingestion() {
    let mut session = abc();
    let layout = StackLayout::new(4);
    let png = ImageFile::new("chart.png", "image/png", vec![1, 2, 3]);

    let payload = DropPayload::from_transfer(&[], vec![png.clone()]);
    assert_eq!(
        session.drop_at(&layout, payload, 10.0).unwrap(),
        DropOutcome::Ingest(vec![png])
    );
    let payload = DropPayload::from_transfer(&[("text/plain".into(), "hi".into())], vec![]);
    assert_eq!(session.drop_at(&layout, payload, 10.0).unwrap(), DropOutcome::Ignored);
}

#[test]
fn insert_below_opens_a_paragraph_after_the_hovered_block() {
    let mut session = abc();
    let layout = StackLayout::new(4);
    session.hover_gutter(&layout, 50.0, Instant::now());
    session.gutter_insert_below().unwrap();

    assert_eq!(texts(&session), vec!["a", "b", "", "c", ""]);
    assert!(session.editor().doc().children[2].is_kind(NodeKind::Paragraph));
    assert_eq!(session.editor().selection().head_path(), &[2, 0]);
}

#[test]
fn gutter_hides_after_the_delay() {
    let mut session = abc();
    let layout = StackLayout::new(4);
    let t0 = Instant::now();
    session.hover_gutter(&layout, 50.0, t0);
    assert_eq!(session.gutter().hover().map(|h| h.index), Some(1));
    assert_eq!(session.gutter().hover().map(|h| h.top), Some(40.0));

    session.hover_gutter(&layout, 900.0, t0);
    assert!(session.gutter().hide_pending());
    assert!(!session.gutter_mut().tick(t0 + Duration::from_millis(100)));
    assert!(session.gutter_mut().tick(t0 + Duration::from_millis(150)));
    assert!(session.gutter().hover().is_none());
}
