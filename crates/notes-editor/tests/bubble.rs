mod common;

use manos_notes_core::{BlockType, Point, Selection};
use manos_notes_editor::{BubbleAction, BubbleItem, EditorSession, Point2, Size2, TableOp};

use common::{StackLayout, session};

fn hello_world() -> EditorSession {
    let mut session = session();
    session.type_text("Hello world").unwrap();
    session
}

fn select(session: &mut EditorSession, from: usize, to: usize) {
    session.set_selection(Selection::range(
        Point::new(vec![0, 0], from),
        Point::new(vec![0, 0], to),
    ));
}

fn visible(session: &EditorSession) -> bool {
    session.bubble().is_visible(session.editor())
}

#[test]
fn shows_for_a_range_and_hides_for_a_plain_caret() {
    let mut session = hello_world();
    assert!(!visible(&session));
    assert!(session.bubble().items(session.editor()).is_empty());

    select(&mut session, 0, 5);
    assert!(visible(&session));
    let items = session.bubble().items(session.editor());
    assert!(!items.iter().any(|i| matches!(i, BubbleItem::Table { .. })));
    assert_eq!(
        items[0],
        BubbleItem::Block {
            block_type: BlockType::Paragraph,
            label: "Text",
            active: true
        }
    );
    assert!(items.contains(&BubbleItem::Bold { active: false }));
    assert_eq!(items.last(), Some(&BubbleItem::Link { href: None }));
}

#[test]
fn text_controls_apply_to_the_range() {
    let mut session = hello_world();
    select(&mut session, 6, 11);

    session.bubble_action(BubbleAction::ToggleBold).unwrap();
    assert!(session.editor().active_marks().bold);
    assert!(
        session
            .bubble()
            .items(session.editor())
            .contains(&BubbleItem::Bold { active: true })
    );

    session.bubble_action(BubbleAction::Link("example.com".into())).unwrap();
    assert_eq!(session.editor().active_link().as_deref(), Some("https://example.com"));
    session.bubble_action(BubbleAction::Link("  ".into())).unwrap();
    assert_eq!(session.editor().active_link(), None);
}

#[test]
fn a_caret_in_a_table_shows_table_controls_only() {
    let mut session = session();
    session.command(|e| e.insert_table(2, 2)).unwrap();
    assert!(session.editor().selection().is_collapsed());
    assert!(visible(&session));

    let items = session.bubble().items(session.editor());
    let tables: Vec<TableOp> = items
        .iter()
        .filter_map(|i| match i {
            BubbleItem::Table { op } => Some(*op),
            _ => None,
        })
        .collect();
    assert_eq!(tables, TableOp::ALL.to_vec());
    assert!(matches!(items[0], BubbleItem::Table { .. }));
    assert!(!items.iter().any(|i| matches!(i, BubbleItem::Bold { .. })));

    session.bubble_action(BubbleAction::Table(TableOp::RowBelow)).unwrap();
    assert_eq!(session.editor().doc().children[0].children().len(), 3);
    session.bubble_action(BubbleAction::Table(TableOp::DeleteTable)).unwrap();
    assert!(!session.editor().in_table());
    assert!(!visible(&session));
}

#[test]
fn block_switcher_changes_the_block() {
    let mut session = hello_world();
    select(&mut session, 0, 5);
    session.bubble_action(BubbleAction::SetBlock(BlockType::Heading(1))).unwrap();
    assert!(session.bubble().items(session.editor()).contains(&BubbleItem::Block {
        block_type: BlockType::Heading(1),
        label: "Heading 1",
        active: true
    }));
}

#[test]
fn outside_click_closes_until_the_selection_changes() {
    let mut session = hello_world();
    let layout = StackLayout::new(2);
    select(&mut session, 0, 5);

    // Inside the editor: stays open.
    session.pointer_down(Point2::new(10.0, 10.0), None, &layout);
    assert!(visible(&session));

    // On the menu, which sits outside the editor column.
    let menu = manos_notes_editor::Rect::new(650.0, 0.0, 100.0, 40.0);
    session.pointer_down(Point2::new(700.0, 20.0), Some(menu), &layout);
    assert!(visible(&session));

    session.pointer_down(Point2::new(700.0, 500.0), Some(menu), &layout);
    assert!(!visible(&session));

    select(&mut session, 0, 4);
    assert!(visible(&session));
}

#[test]
fn placed_above_the_selection_midpoint() {
    let mut session = hello_world();
    let layout = StackLayout::new(2).starting_at(200.0);
    select(&mut session, 0, 10);

    let size = Size2::new(300.0, 40.0);
    let placement = session
        .bubble()
        .placement(session.editor(), &layout, size, 6.0)
        .unwrap();
    assert!(!placement.flipped);
    // Caret x at 0 and 80: midpoint 40, menu centered on it then clamped.
    assert_eq!(placement.rect.x, 0.0);
    assert_eq!(placement.rect.y, 200.0 - 6.0 - 40.0);

    let layout = StackLayout::new(2);
    let placement = session
        .bubble()
        .placement(session.editor(), &layout, size, 6.0)
        .unwrap();
    assert!(placement.flipped);
    assert_eq!(placement.rect.y, 26.0);
}
