use manos_notes_core::{
    AttrPatch, ChartAttrs, Document, Editor, ImageAttrs, LinkPreviewAttrs, Node, NodeKind, Point,
    Selection, find_node_by_id, node_at_path,
};

fn attrs_of<'a>(editor: &'a Editor, id: &str) -> &'a manos_notes_core::Attrs {
    let path = find_node_by_id(editor.doc(), id).expect("node present");
    node_at_path(editor.doc(), &path)
        .and_then(Node::attrs)
        .expect("atomic node attrs")
}

#[test]
fn image_is_inserted_at_full_width_with_an_id() {
    let mut editor = Editor::empty();
    let id = editor
        .insert_image(ImageAttrs {
            alt: Some("chart".into()),
            ..ImageAttrs::new("https://files/a.png")
        })
        .unwrap();

    let image = ImageAttrs::from_attrs(attrs_of(&editor, &id));
    assert_eq!(image.src, "https://files/a.png");
    assert_eq!(image.width, 100);
    assert_eq!(image.alt.as_deref(), Some("chart"));
    assert_eq!(image.id.as_deref(), Some(id.as_str()));

    // Caret lands in the paragraph after the image.
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![1, 0], 0))
    );
}

#[test]
fn width_writes_are_clamped_by_normalization() {
    let mut editor = Editor::empty();
    let id = editor.insert_image(ImageAttrs::new("https://files/a.png")).unwrap();

    editor.set_attrs_by_id(&id, AttrPatch::set("width", 5)).unwrap();
    assert_eq!(ImageAttrs::from_attrs(attrs_of(&editor, &id)).width, 20);
    assert_eq!(attrs_of(&editor, &id)["width"], serde_json::json!(20));

    editor
        .set_attrs_by_id(&id, ImageAttrs::width_patch(250.0))
        .unwrap();
    assert_eq!(attrs_of(&editor, &id)["width"], serde_json::json!(100));
}

#[test]
fn chart_starts_without_a_snapshot_and_clamps_height() {
    let mut editor = Editor::empty();
    let id = editor.insert_chart("c1", Some("Revenue".into())).unwrap();

    let chart = ChartAttrs::from_attrs(attrs_of(&editor, &id));
    assert_eq!(chart.chart_id, "c1");
    assert_eq!(chart.chart_name.as_deref(), Some("Revenue"));
    assert!(!chart.has_snapshot());
    assert_eq!(chart.height, 360);

    editor.set_attrs_by_id(&id, AttrPatch::set("height", 5000)).unwrap();
    assert_eq!(attrs_of(&editor, &id)["height"], serde_json::json!(900));
    editor.set_attrs_by_id(&id, AttrPatch::set("height", 12)).unwrap();
    assert_eq!(attrs_of(&editor, &id)["height"], serde_json::json!(180));
}

#[test]
fn link_preview_keeps_its_metadata() {
    let mut editor = Editor::empty();
    let id = editor
        .insert_link_preview(LinkPreviewAttrs {
            url: "https://example.com".into(),
            kind: "article".into(),
            title: Some("Example".into()),
            ..LinkPreviewAttrs::default()
        })
        .unwrap();

    let preview = LinkPreviewAttrs::from_attrs(attrs_of(&editor, &id));
    assert_eq!(preview.url, "https://example.com");
    assert_eq!(preview.kind, "article");
    assert_eq!(preview.title.as_deref(), Some("Example"));
}

#[test]
fn missing_and_duplicate_ids_are_repaired() {
    let image = ImageAttrs {
        id: None,
        ..ImageAttrs::new("https://files/a.png")
    }
    .into_node();
    let chart = ChartAttrs::new("c1", None).into_node();
    let editor = Editor::from_document(Document::new(vec![image, chart.clone(), chart]));

    let ids: Vec<_> = editor.doc().children[..3]
        .iter()
        .map(|n| n.id().expect("id").to_string())
        .collect();
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_ne!(ids[0], ids[2]);
}

#[test]
fn only_atomic_nodes_can_be_node_selected() {
    let mut editor = Editor::from_document(Document::new(vec![
        Node::paragraph("a"),
        Node::horizontal_rule(),
    ]));
    assert!(editor.select_node(&[1]).is_ok());
    assert!(editor.selection().is_node());

    assert!(editor.select_node(&[0]).is_err());
    assert!(editor.select_node(&[7]).is_err());
}

#[test]
fn backspace_after_an_atomic_node_selects_it_then_deletes_it() {
    let mut editor = Editor::from_document(Document::new(vec![
        Node::paragraph("a"),
        ImageAttrs::new("https://files/a.png").into_node(),
        Node::paragraph("b"),
    ]));
    editor.set_selection(Selection::collapsed(Point::new(vec![2, 0], 0)));

    editor.delete_backward().unwrap();
    assert_eq!(editor.selection(), &Selection::node(vec![1]));

    editor.delete_backward().unwrap();
    let kinds: Vec<_> = editor.doc().children.iter().filter_map(Node::kind).collect();
    assert!(!kinds.contains(&NodeKind::Image));
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 1))
    );
}

#[test]
fn typing_over_a_selected_node_replaces_it() {
    let mut editor = Editor::from_document(Document::new(vec![
        ImageAttrs::new("https://files/a.png").into_node(),
    ]));
    editor.select_node(&[0]).unwrap();
    editor.insert_text("x").unwrap();

    assert_eq!(editor.doc().children[0], Node::paragraph("x"));
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 1))
    );
}

#[test]
fn widget_delete_removes_by_id() {
    let mut editor = Editor::empty();
    let id = editor.insert_chart("c1", None).unwrap();
    assert!(editor.remove_node_by_id(&id).unwrap());
    assert!(find_node_by_id(editor.doc(), &id).is_none());
    assert!(editor.doc().children.last().unwrap().is_empty_paragraph());
}
