use manos_notes_core::{
    Document, Editor, Marks, Node, Point, Selection, TextNode, normalize_link_input,
    point_global_offset,
};

fn leaves(editor: &Editor, block: usize) -> Vec<(String, Marks)> {
    editor.doc().children[block]
        .children()
        .iter()
        .map(|n| match n {
            Node::Text(t) => (t.text.clone(), t.marks.clone()),
            other => panic!("unexpected inline {other:?}"),
        })
        .collect()
}

/// (start, end) of the selection as offsets within block `block`.
fn block_range(editor: &Editor, block: usize) -> (usize, usize) {
    let children = editor.doc().children[block].children();
    let (start, end) = editor.selection().ordered().expect("text selection");
    let offset = |p: &Point| point_global_offset(children, p.path[1], p.offset);
    (offset(&start), offset(&end))
}

fn bold() -> Marks {
    Marks {
        bold: true,
        ..Marks::default()
    }
}

fn select(editor: &mut Editor, anchor: (Vec<usize>, usize), focus: (Vec<usize>, usize)) {
    editor.set_selection(Selection::range(
        Point::new(anchor.0, anchor.1),
        Point::new(focus.0, focus.1),
    ));
}

#[test]
fn toggle_bold_only_affects_the_selected_range() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("abcde")]));
    select(&mut editor, (vec![0, 0], 1), (vec![0, 0], 3));

    editor.toggle_bold().unwrap();
    assert_eq!(
        leaves(&editor, 0),
        vec![
            ("a".into(), Marks::default()),
            ("bc".into(), bold()),
            ("de".into(), Marks::default()),
        ]
    );
    assert_eq!(block_range(&editor, 0), (1, 3));

    editor.toggle_bold().unwrap();
    assert_eq!(leaves(&editor, 0), vec![("abcde".into(), Marks::default())]);
    assert_eq!(block_range(&editor, 0), (1, 3));
}

#[test]
fn partially_bold_selection_becomes_fully_bold() {
    let doc = Document::new(vec![Node::element(
        manos_notes_core::NodeKind::Paragraph,
        Default::default(),
        vec![
            Node::Text(TextNode {
                text: "ab".into(),
                marks: bold(),
            }),
            Node::text("cd"),
        ],
    )]);
    let mut editor = Editor::from_document(doc);
    select(&mut editor, (vec![0, 0], 0), (vec![0, 1], 2));

    editor.toggle_bold().unwrap();
    assert_eq!(leaves(&editor, 0), vec![("abcd".into(), bold())]);
}

#[test]
fn marks_span_several_blocks() {
    let mut editor = Editor::from_document(Document::new(vec![
        Node::paragraph("one"),
        Node::paragraph("two"),
    ]));
    select(&mut editor, (vec![1, 0], 2), (vec![0, 0], 1));

    editor.toggle_italic().unwrap();
    let italic = Marks {
        italic: true,
        ..Marks::default()
    };
    assert_eq!(
        leaves(&editor, 0),
        vec![("o".into(), Marks::default()), ("ne".into(), italic.clone())]
    );
    assert_eq!(
        leaves(&editor, 1),
        vec![("tw".into(), italic), ("o".into(), Marks::default())]
    );

    // Backward selection keeps its direction.
    let anchor = editor.selection().anchor().unwrap();
    assert_eq!(anchor.path[0], 1);
}

#[test]
fn collapsed_caret_is_left_alone() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("abc")]));
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 1)));
    editor.toggle_bold().unwrap();
    assert_eq!(leaves(&editor, 0), vec![("abc".into(), Marks::default())]);
    assert!(!editor.can_undo());
}

#[test]
fn link_input_is_normalized_and_empty_input_unlinks() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("see docs")]));
    select(&mut editor, (vec![0, 0], 4), (vec![0, 0], 8));

    editor.set_link("docs.example.com").unwrap();
    let linked = leaves(&editor, 0);
    assert_eq!(linked[1].0, "docs");
    assert_eq!(
        linked[1].1.link.as_deref(),
        Some("https://docs.example.com")
    );
    assert_eq!(
        editor.active_link().as_deref(),
        Some("https://docs.example.com")
    );

    editor.set_link("   ").unwrap();
    assert_eq!(leaves(&editor, 0), vec![("see docs".into(), Marks::default())]);

    assert_eq!(normalize_link_input("mailto:a@b.c").as_deref(), Some("mailto:a@b.c"));
}

#[test]
fn font_family_and_size_apply_to_the_range() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("abc")]));
    select(&mut editor, (vec![0, 0], 0), (vec![0, 0], 3));

    editor.set_font_family(Some("Georgia".into())).unwrap();
    editor.set_font_size(Some(18)).unwrap();
    let marks = &leaves(&editor, 0)[0].1;
    assert_eq!(marks.font_family.as_deref(), Some("Georgia"));
    assert_eq!(marks.font_size, Some(18));

    editor.set_font_size(None).unwrap();
    assert_eq!(leaves(&editor, 0)[0].1.font_size, None);
}

#[test]
fn strikethrough_and_code_toggle_independently() {
    let mut editor = Editor::from_document(Document::new(vec![Node::paragraph("abc")]));
    select(&mut editor, (vec![0, 0], 0), (vec![0, 0], 3));

    editor.toggle_strikethrough().unwrap();
    editor.toggle_code().unwrap();
    let marks = editor.active_marks();
    assert!(marks.strikethrough);
    assert!(marks.code);
    assert!(!marks.bold);

    assert!(editor.undo());
    assert!(!editor.active_marks().code);
    assert!(editor.active_marks().strikethrough);
}
