use manos_notes_core::{Document, Editor, Node, NodeKind, Point, Selection};

fn texts(editor: &Editor) -> Vec<String> {
    editor.doc().children.iter().map(Node::text_content).collect()
}

fn caret_at(editor: &Editor) -> (Vec<usize>, usize) {
    let focus = editor.selection().focus().expect("text selection");
    (focus.path.clone(), focus.offset)
}

fn editor_with(children: Vec<Node>, path: Vec<usize>, offset: usize) -> Editor {
    let mut editor = Editor::from_document(Document::new(children));
    editor.set_selection(Selection::collapsed(Point::new(path, offset)));
    editor
}

#[test]
fn enter_splits_a_paragraph_at_the_caret() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], vec![0, 0], 2);
    editor.split_block().unwrap();

    assert_eq!(texts(&editor), vec!["he", "llo", ""]);
    assert_eq!(caret_at(&editor), (vec![1, 0], 0));

    assert!(editor.undo());
    assert_eq!(texts(&editor), vec!["hello", ""]);
}

#[test]
fn enter_at_the_end_of_a_heading_opens_a_paragraph() {
    let mut editor = editor_with(vec![Node::heading(1, "Title")], vec![0, 0], 5);
    editor.split_block().unwrap();

    assert_eq!(editor.doc().children[0], Node::heading(1, "Title"));
    assert!(editor.doc().children[1].is_kind(NodeKind::Paragraph));
    assert_eq!(caret_at(&editor), (vec![1, 0], 0));
}

#[test]
fn enter_in_a_code_block_inserts_a_newline() {
    let mut editor = editor_with(vec![Node::code_block("fn x")], vec![0, 0], 4);
    editor.split_block().unwrap();
    editor.insert_text("}").unwrap();

    assert_eq!(editor.doc().children[0], Node::code_block("fn x\n}"));
}

#[test]
fn backspace_at_a_block_start_joins_it_to_the_previous_one() {
    let mut editor = editor_with(
        vec![Node::paragraph("ab"), Node::paragraph("cd")],
        vec![1, 0],
        0,
    );
    editor.delete_backward().unwrap();

    assert_eq!(texts(&editor), vec!["abcd", ""]);
    assert_eq!(caret_at(&editor), (vec![0, 0], 2));
}

#[test]
fn backspace_removes_a_whole_character() {
    let mut editor = editor_with(vec![Node::paragraph("héllo")], vec![0, 0], 3);
    editor.delete_backward().unwrap();

    assert_eq!(texts(&editor)[0], "hllo");
    assert_eq!(caret_at(&editor), (vec![0, 0], 1));
}

#[test]
fn backspace_at_the_start_of_a_heading_turns_it_into_text() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::heading(2, "b")],
        vec![1, 0],
        0,
    );
    editor.delete_backward().unwrap();
    assert_eq!(editor.doc().children[1], Node::paragraph("b"));
}

#[test]
fn backspace_at_the_document_start_does_nothing() {
    let mut editor = editor_with(vec![Node::paragraph("a")], vec![0, 0], 0);
    editor.delete_backward().unwrap();
    assert_eq!(texts(&editor), vec!["a", ""]);
    assert!(!editor.can_undo());
}

#[test]
fn deleting_a_range_joins_the_outer_blocks() {
    let mut editor = Editor::from_document(Document::new(vec![
        Node::paragraph("a1"),
        Node::paragraph("b2"),
        Node::paragraph("c3"),
    ]));
    editor
        .delete_range(Point::new(vec![0, 0], 1), Point::new(vec![2, 0], 1))
        .unwrap();

    assert_eq!(texts(&editor), vec!["a3", ""]);
    assert_eq!(caret_at(&editor), (vec![0, 0], 1));
}

#[test]
fn typing_replaces_the_selected_text() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("hello world")]));
    editor.set_selection(Selection::range(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 5),
    ));
    editor.insert_text("bye").unwrap();

    assert_eq!(texts(&editor)[0], "bye world");
    assert_eq!(caret_at(&editor), (vec![0, 0], 3));
}

#[test]
fn pasted_lines_become_blocks() {
    let mut editor = Editor::empty();
    editor.insert_plain_text("one\ntwo\r\nthree").unwrap();

    assert_eq!(texts(&editor), vec!["one", "two", "three", ""]);
    assert_eq!(caret_at(&editor), (vec![2, 0], 5));
}

#[test]
fn callout_is_a_quote_with_a_lightbulb() {
    let mut editor = Editor::empty();
    editor.insert_callout().unwrap();
    editor.insert_text("Note").unwrap();

    let callout = &editor.doc().children[0];
    assert!(callout.is_kind(NodeKind::Blockquote));
    assert_eq!(callout.children(), &[Node::paragraph("💡 Note")]);
    assert!(editor.doc().children[1].is_empty_paragraph());
}

#[test]
fn horizontal_rule_moves_the_caret_below_it() {
    let mut editor = editor_with(vec![Node::paragraph("above")], vec![0, 0], 5);
    editor.insert_horizontal_rule().unwrap();

    assert!(editor.doc().children[1].is_kind(NodeKind::HorizontalRule));
    assert_eq!(caret_at(&editor), (vec![2, 0], 0));
    assert_eq!(editor.doc().children.len(), 3);
}
