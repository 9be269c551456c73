use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::normalize_pass_ops;
use crate::ops::{Op, Path, Transaction};
use crate::schema::{NodeKind, Schema};
use crate::tree::{
    find_node_by_id, first_text_point, first_text_point_in, node_at_path, node_mut,
    normalize_point_to_existing_text,
};

pub type Attrs = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// A document holding only the trailing empty paragraph.
    pub fn empty() -> Self {
        Self {
            children: vec![Node::paragraph("")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn element(kind: NodeKind, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind,
            attrs,
            children,
        })
    }

    pub fn void(kind: NodeKind, attrs: Attrs) -> Self {
        Node::Void(VoidNode { kind, attrs })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::element(NodeKind::Paragraph, Attrs::default(), vec![Node::text(text)])
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        Self::element(NodeKind::Heading, attrs, vec![Node::text(text)])
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Self::element(NodeKind::CodeBlock, Attrs::default(), vec![Node::text(text)])
    }

    pub fn blockquote(children: Vec<Node>) -> Self {
        Self::element(NodeKind::Blockquote, Attrs::default(), children)
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Self::element(NodeKind::ListItem, Attrs::default(), children)
    }

    /// A bullet or ordered list whose items each hold a single paragraph.
    pub fn list(kind: NodeKind, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let items = items
            .into_iter()
            .map(|text| Node::list_item(vec![Node::paragraph(text)]))
            .collect();
        Self::element(kind, Attrs::default(), items)
    }

    pub fn horizontal_rule() -> Self {
        Self::void(NodeKind::HorizontalRule, Attrs::default())
    }

    pub fn column(children: Vec<Node>) -> Self {
        Self::element(NodeKind::Column, Attrs::default(), children)
    }

    pub fn two_columns(left: Vec<Node>, right: Vec<Node>) -> Self {
        Self::element(
            NodeKind::TwoColumnBlock,
            Attrs::default(),
            vec![Node::column(left), Node::column(right)],
        )
    }

    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Node::Element(el) => Some(el.kind),
            Node::Void(v) => Some(v.kind),
            Node::Text(_) => None,
        }
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Element(el) => Some(&el.attrs),
            Node::Void(v) => Some(&v.attrs),
            Node::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Void(_) | Node::Text(_) => &[],
        }
    }

    /// Stable identity of atomic nodes, assigned during normalization.
    pub fn id(&self) -> Option<&str> {
        self.attrs()?.get("id")?.as_str()
    }

    /// Concatenated text of every leaf below this node.
    pub fn text_content(&self) -> String {
        fn walk(node: &Node, out: &mut String) {
            match node {
                Node::Text(t) => out.push_str(&t.text),
                Node::Element(el) => el.children.iter().for_each(|c| walk(c, out)),
                Node::Void(_) => {}
            }
        }
        let mut out = String::new();
        walk(self, &mut out);
        out
    }

    /// An empty paragraph: a paragraph whose leaves hold no text.
    pub fn is_empty_paragraph(&self) -> bool {
        match self {
            Node::Element(el) if el.kind == NodeKind::Paragraph => el
                .children
                .iter()
                .all(|c| matches!(c, Node::Text(t) if t.text.is_empty())),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Path of the text block holding this point.
    pub fn block_path(&self) -> &[usize] {
        self.path.split_last().map(|(_, p)| p).unwrap_or(&[])
    }
}

/// Either a text range between two leaf points or one whole atomic node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    Text { anchor: Point, focus: Point },
    Node { path: Path },
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Selection::Text {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Selection::Text { anchor, focus }
    }

    pub fn node(path: Path) -> Self {
        Selection::Node { path }
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Text { anchor, focus } => anchor == focus,
            Selection::Node { .. } => false,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    pub fn focus(&self) -> Option<&Point> {
        match self {
            Selection::Text { focus, .. } => Some(focus),
            Selection::Node { .. } => None,
        }
    }

    pub fn anchor(&self) -> Option<&Point> {
        match self {
            Selection::Text { anchor, .. } => Some(anchor),
            Selection::Node { .. } => None,
        }
    }

    /// The path the selection is "at": the focus leaf or the selected node.
    pub fn head_path(&self) -> &[usize] {
        match self {
            Selection::Text { focus, .. } => &focus.path,
            Selection::Node { path } => path,
        }
    }

    /// Start and end points in document order (text selections only).
    pub fn ordered(&self) -> Option<(Point, Point)> {
        let Selection::Text { anchor, focus } = self else {
            return None;
        };
        let (mut start, mut end) = (anchor.clone(), focus.clone());
        if start.path == end.path {
            if end.offset < start.offset {
                std::mem::swap(&mut start, &mut end);
            }
        } else if end.path < start.path {
            std::mem::swap(&mut start, &mut end);
        }
        Some((start, end))
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 200,
            max_normalize_iterations: 100,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError(pub String);

/// Result of applying a transaction outside of an [`Editor`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub doc: Document,
    pub selection: Selection,
    /// Ops that undo the transaction, already in application order.
    pub inverse_ops: Vec<Op>,
}

/// Apply `tx` to copies of `doc` and `selection`.
///
/// Either every op applies and normalization converges, or an error is
/// returned and nothing observable changed.
pub fn apply_transaction(
    schema: &Schema,
    config: &EditorConfig,
    doc: &Document,
    selection: &Selection,
    tx: Transaction,
) -> Result<Applied, ApplyError> {
    let mut doc = doc.clone();
    let mut selection = selection.clone();

    let mut inverse_ops: Vec<Op> = Vec::new();
    for op in tx.ops {
        inverse_ops.push(apply_op_to(&mut doc, &mut selection, op)?);
    }

    if let Some(sel) = tx.selection_after {
        selection = sel;
    }

    let mut inverse_normalize =
        normalize_with_inverse_ops(schema, config, &mut doc, &mut selection)?;
    inverse_ops.append(&mut inverse_normalize);
    inverse_ops.reverse();

    let selection = normalize_selection(schema, &doc, &selection);
    Ok(Applied {
        doc,
        selection,
        inverse_ops,
    })
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    schema: Schema,
    config: EditorConfig,
    generation: u64,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, schema: Schema) -> Self {
        Self::with_config(doc, selection, schema, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        schema: Schema,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            schema,
            config,
            generation: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    /// An editor over a single empty paragraph with the caret inside it.
    pub fn empty() -> Self {
        Self::from_document(Document::empty())
    }

    pub fn from_document(doc: Document) -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, Schema::notes())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Bumped whenever the document is replaced wholesale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = normalize_selection(&self.schema, &self.doc, &selection);
    }

    /// Swap in a different note. Undo history does not survive the swap.
    pub fn replace_document(&mut self, doc: Document) {
        self.doc = doc;
        self.selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        self.generation = self.generation.wrapping_add(1);
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.normalize_in_place();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(redo_ops) = self.replay(inverse_ops, selection_before.clone()) else {
            return false;
        };
        self.redo_stack.push(UndoRecord {
            inverse_ops: redo_ops,
            selection_before,
            selection_after,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(undo_ops) = self.replay(inverse_ops, selection_after.clone()) else {
            return false;
        };
        self.undo_stack.push(UndoRecord {
            inverse_ops: undo_ops,
            selection_before,
            selection_after,
        });
        true
    }

    fn replay(&mut self, ops: Vec<Op>, selection: Selection) -> Option<Vec<Op>> {
        let mut doc = self.doc.clone();
        let mut scratch = self.selection.clone();
        let mut inverse: Vec<Op> = Vec::new();
        for op in ops {
            match apply_op_to(&mut doc, &mut scratch, op) {
                Ok(inv) => inverse.push(inv),
                Err(err) => {
                    tracing::warn!("history replay failed, dropping record: {err}");
                    return None;
                }
            }
        }
        inverse.reverse();
        self.doc = doc;
        self.selection = selection;
        self.normalize_in_place();
        Some(inverse)
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let add_to_history = tx.meta.add_to_history;
        let selection_before = self.selection.clone();

        let Applied {
            doc,
            selection,
            inverse_ops,
        } = apply_transaction(&self.schema, &self.config, &self.doc, &self.selection, tx)?;

        self.doc = doc;
        self.selection = selection;

        if add_to_history && !inverse_ops.is_empty() {
            self.undo_stack.push(UndoRecord {
                inverse_ops,
                selection_before,
                selection_after: self.selection.clone(),
            });
            self.redo_stack.clear();
            if self.undo_stack.len() > self.config.max_undo {
                self.undo_stack.remove(0);
            }
        }

        Ok(())
    }

    /// Patch the attributes of the node at `path`, provided it still is a
    /// node of `expected` kind. Returns whether the write landed.
    pub fn set_node_attrs(
        &mut self,
        path: &[usize],
        expected: NodeKind,
        patch: AttrPatch,
    ) -> Result<bool, ApplyError> {
        self.write_node_attrs(path, expected, patch, true)
    }

    /// Like [`Editor::set_node_attrs`], but the write stays out of undo
    /// history and leaves the redo stack alone. For results that arrive in
    /// the background rather than from the user.
    pub fn set_node_attrs_without_history(
        &mut self,
        path: &[usize],
        expected: NodeKind,
        patch: AttrPatch,
    ) -> Result<bool, ApplyError> {
        self.write_node_attrs(path, expected, patch, false)
    }

    fn write_node_attrs(
        &mut self,
        path: &[usize],
        expected: NodeKind,
        patch: AttrPatch,
        add_to_history: bool,
    ) -> Result<bool, ApplyError> {
        match node_at_path(&self.doc, path) {
            Some(node) if node.is_kind(expected) => {}
            _ => {
                tracing::debug!(?path, ?expected, "attribute write target is gone, dropping");
                return Ok(false);
            }
        }
        let tx = Transaction::new(vec![Op::SetNodeAttrs {
            path: path.to_vec(),
            patch,
        }])
        .source("attrs:path");
        self.apply(if add_to_history { tx } else { tx.without_history() })?;
        Ok(true)
    }

    /// Patch the attributes of the node carrying stable id `id`, wherever it
    /// currently lives. Returns whether the write landed.
    pub fn set_attrs_by_id(&mut self, id: &str, patch: AttrPatch) -> Result<bool, ApplyError> {
        let Some(path) = find_node_by_id(&self.doc, id) else {
            tracing::debug!(id, "attribute write target id no longer exists, dropping");
            return Ok(false);
        };
        self.apply(
            Transaction::new(vec![Op::SetNodeAttrs { path, patch }]).source("attrs:id"),
        )?;
        Ok(true)
    }

    fn normalize_in_place(&mut self) {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        match normalize_with_inverse_ops(&self.schema, &self.config, &mut doc, &mut selection) {
            Ok(_) => self.doc = doc,
            Err(err) => tracing::warn!("normalization failed: {err}"),
        }
        self.selection = normalize_selection(&self.schema, &self.doc, &selection);
    }
}

fn normalize_with_inverse_ops(
    schema: &Schema,
    config: &EditorConfig,
    doc: &mut Document,
    selection: &mut Selection,
) -> Result<Vec<Op>, ApplyError> {
    let mut inverse_ops: Vec<Op> = Vec::new();
    for _ in 0..config.max_normalize_iterations {
        let ops = normalize_pass_ops(doc, schema);
        if ops.is_empty() {
            return Ok(inverse_ops);
        }
        for op in ops {
            inverse_ops.push(apply_op_to(doc, selection, op)?);
        }
    }
    Err(ApplyError::NormalizeDidNotConverge)
}

/// Map a selection onto existing leaves; node selections must target an
/// atomic node, anything else falls back to a caret inside it.
pub fn normalize_selection(schema: &Schema, doc: &Document, selection: &Selection) -> Selection {
    let fallback = first_text_point(doc).unwrap_or(Point {
        path: vec![0],
        offset: 0,
    });

    match selection {
        Selection::Node { path } => match node_at_path(doc, path) {
            Some(Node::Void(v)) if schema.is_atomic(v.kind) => selection.clone(),
            Some(Node::Element(_)) => {
                Selection::collapsed(first_text_point_in(doc, path).unwrap_or(fallback))
            }
            _ => Selection::collapsed(fallback),
        },
        Selection::Text { anchor, focus } => {
            let anchor = normalize_point_to_existing_text(doc, anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, focus).unwrap_or_else(|| fallback.clone())
            });
            let focus =
                normalize_point_to_existing_text(doc, focus).unwrap_or_else(|| anchor.clone());
            Selection::Text { anchor, focus }
        }
    }
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let node = node_mut(doc, &path)?;
            let old = match node {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Void(v) => patch_apply(&mut v.attrs, &patch),
                Node::Text(_) => return Err(ApplyError::InvalidPath("Text has no attrs".into())),
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn selection_points_mut(selection: &mut Selection) -> Vec<(&mut Path, Option<&mut usize>)> {
    match selection {
        Selection::Text { anchor, focus } => vec![
            (&mut anchor.path, Some(&mut anchor.offset)),
            (&mut focus.path, Some(&mut focus.offset)),
        ],
        Selection::Node { path } => vec![(path, None)],
    }
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for (point_path, point_offset) in selection_points_mut(selection) {
        if let Some(point_offset) = point_offset {
            if point_path.as_slice() == path && *point_offset >= offset {
                *point_offset = point_offset.saturating_add(len);
            }
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for (point_path, point_offset) in selection_points_mut(selection) {
        let Some(point_offset) = point_offset else {
            continue;
        };
        if point_path.as_slice() != path || *point_offset <= range.start {
            continue;
        }
        if *point_offset >= range.end {
            *point_offset = point_offset.saturating_sub(removed_len);
        } else {
            *point_offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((index, parent_path)) = path.split_last() else {
        return;
    };

    for (point_path, _) in selection_points_mut(selection) {
        if point_path.len() <= parent_path.len() || !point_path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point_path[depth] >= *index {
            point_path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    if let Selection::Node { path: selected } = selection {
        if selected.starts_with(path) {
            let mut caret = parent_path.to_vec();
            caret.push(index.saturating_sub(1));
            *selection = Selection::collapsed(Point::new(caret, 0));
            return;
        }
    }

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at_path(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for (point_path, point_offset) in selection_points_mut(selection) {
        if point_path.len() <= parent_path.len() || !point_path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point_path[depth];
        if ix > index {
            point_path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        let Some(point_offset) = point_offset else {
            continue;
        };
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point_path.truncate(depth + 1);
            point_path[depth] = left_index;
            *point_offset = (prefix + *point_offset).min(prefix + removed_text.text.len());
        } else {
            point_path.truncate(depth + 1);
            point_path[depth] = index.saturating_sub(1);
            *point_offset = 0;
        }
    }
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn children_vec_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Void(_) | Node::Text(_) => Err(PathError("Parent is not a container".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_vec_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_vec_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut patch = Self::default();
        patch.set.insert(key.into(), value.into());
        patch
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    pub fn without(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}
