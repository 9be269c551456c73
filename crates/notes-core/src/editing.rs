use std::fmt;

use crate::attrs::{ChartAttrs, ImageAttrs, LinkPreviewAttrs, new_node_id};
use crate::block::{BlockType, set_block_type_tx};
use crate::core::{
    Attrs, Document, Editor, ElementNode, Node, Point, Selection, TextNode,
    clamp_to_char_boundary,
};
use crate::list::{lift_list_item_tx, sink_list_item_tx};
use crate::ops::{Op, Path, Transaction};
use crate::schema::NodeKind;
use crate::table::{insert_row_below_tx, table_cell_point};
use crate::tree::{
    ancestor_element_path, child_path, children_at_path, first_text_point_in, last_text_point_in,
    node_at_path, point_for_global_offset, point_global_offset, text_blocks_in_order,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

/// What the Tab key ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOutcome {
    MovedPastNode,
    MovedCell,
    ListIndent,
    InsertedTab,
    InsertedSpaces,
    Ignored,
}

pub(crate) fn apply_command(
    editor: &mut Editor,
    what: &str,
    tx: Result<Transaction, String>,
) -> Result<(), CommandError> {
    let tx = tx.map_err(CommandError::new)?;
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to {what}: {e:?}")))
}

pub(crate) fn text_focus(editor: &Editor) -> Result<Point, String> {
    editor
        .selection()
        .focus()
        .cloned()
        .ok_or_else(|| "Selection is not in text".to_string())
}

pub(crate) fn text_block<'a>(doc: &'a Document, block_path: &[usize]) -> Result<&'a ElementNode, String> {
    match node_at_path(doc, block_path) {
        Some(Node::Element(el)) if crate::tree::is_text_block_kind(el.kind) => Ok(el),
        _ => Err("Not in a text block".into()),
    }
}

/// Split a text block's leaves at a byte offset counted across the block.
///
/// Both halves always hold at least one (possibly empty) leaf.
pub(crate) fn split_inline(children: &[Node], at: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            continue;
        };
        let start = cursor;
        let end = cursor + t.text.len();
        cursor = end;

        if end <= at {
            left.push(node.clone());
        } else if start >= at {
            right.push(node.clone());
        } else {
            let cut = clamp_to_char_boundary(&t.text, at - start);
            left.push(Node::Text(TextNode {
                text: t.text[..cut].to_string(),
                marks: t.marks.clone(),
            }));
            right.push(Node::Text(TextNode {
                text: t.text[cut..].to_string(),
                marks: t.marks.clone(),
            }));
        }
    }

    if left.is_empty() {
        left.push(Node::text(""));
    }
    if right.is_empty() {
        right.push(Node::text(""));
    }
    (left, right)
}

fn parent_and_index(path: &[usize]) -> Result<(&[usize], usize), String> {
    path.split_last()
        .map(|(ix, parent)| (parent, *ix))
        .ok_or_else(|| "Empty path".to_string())
}

/// Relative path from a node to its first text leaf.
fn first_leaf_offset(node: &Node) -> Option<Path> {
    match node {
        Node::Text(_) => Some(Vec::new()),
        Node::Void(_) => None,
        Node::Element(el) => el.children.iter().enumerate().find_map(|(ix, child)| {
            let mut rest = first_leaf_offset(child)?;
            rest.insert(0, ix);
            Some(rest)
        }),
    }
}

/// Give an atomic node a stable id if it has none; returns the id.
pub(crate) fn ensure_node_id(node: &mut Node) -> Option<String> {
    let Node::Void(v) = node else {
        return None;
    };
    if let Some(id) = v.attrs.get("id").and_then(|v| v.as_str()) {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    let id = new_node_id();
    v.attrs.insert("id".into(), id.clone().into());
    Some(id)
}

pub(crate) fn delete_range_tx(
    doc: &Document,
    start: &Point,
    end: &Point,
) -> Result<Option<Transaction>, String> {
    if start == end {
        return Ok(None);
    }

    if start.path == end.path {
        let tx = Transaction::new(vec![Op::RemoveText {
            path: start.path.clone(),
            range: start.offset..end.offset,
        }])
        .selection_after(Selection::collapsed(start.clone()))
        .source("command:delete_range");
        return Ok(Some(tx));
    }

    let start_block = start.block_path().to_vec();
    let end_block = end.block_path().to_vec();
    let start_el = text_block(doc, &start_block)?;
    let end_el = text_block(doc, &end_block)?;

    let start_leaf = start.path.last().copied().unwrap_or(0);
    let end_leaf = end.path.last().copied().unwrap_or(0);
    let start_global = point_global_offset(&start_el.children, start_leaf, start.offset);
    let end_global = point_global_offset(&end_el.children, end_leaf, end.offset);

    let (left, _) = split_inline(&start_el.children, start_global);
    let (_, right) = split_inline(&end_el.children, end_global);

    let (start_parent, start_ix) = parent_and_index(&start_block)?;
    let (end_parent, end_ix) = parent_and_index(&end_block)?;

    if start_parent == end_parent {
        // Siblings: drop everything in between and join the two halves.
        let mut ops: Vec<Op> = (start_ix..=end_ix)
            .rev()
            .map(|ix| Op::RemoveNode {
                path: child_path(start_parent, ix),
            })
            .collect();
        let mut children = left;
        children.extend(right);
        let caret = point_for_global_offset(&start_block, &children, start_global);
        ops.push(Op::InsertNode {
            path: start_block.clone(),
            node: Node::element(start_el.kind, start_el.attrs.clone(), children),
        });
        let tx = Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source("command:delete_range");
        return Ok(Some(tx));
    }

    // Different containers: clear the covered text, keep the structure.
    let mut ops: Vec<Op> = Vec::new();
    let blocks = text_blocks_in_order(doc);
    for block in blocks
        .iter()
        .rev()
        .filter(|b| b.as_slice() >= start_block.as_slice() && b.as_slice() <= end_block.as_slice())
    {
        let Ok(el) = text_block(doc, block) else {
            continue;
        };
        let children = if *block == start_block {
            left.clone()
        } else if *block == end_block {
            right.clone()
        } else {
            vec![Node::text("")]
        };
        ops.push(Op::RemoveNode {
            path: block.clone(),
        });
        ops.push(Op::InsertNode {
            path: block.clone(),
            node: Node::element(el.kind, el.attrs.clone(), children),
        });
    }
    let caret = point_for_global_offset(&start_block, &left, start_global);
    Ok(Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source("command:delete_range"),
    ))
}

fn insert_text_tx(editor: &Editor, text: &str) -> Result<Transaction, String> {
    let focus = text_focus(editor)?;
    let point = Point::new(focus.path.clone(), focus.offset);
    let caret = Point::new(point.path.clone(), point.offset + text.len());
    Ok(Transaction::new(vec![Op::InsertText {
        path: point.path,
        offset: point.offset,
        text: text.to_string(),
    }])
    .selection_after(Selection::collapsed(caret))
    .source("command:insert_text"))
}

/// Insert `node` as a block next to the focused block and return the
/// transaction together with the inserted node's path.
///
/// An empty focused paragraph is replaced instead. The caret ends inside the
/// node when it has text, otherwise in the paragraph that follows it (one is
/// created when needed).
pub(crate) fn insert_block_tx(
    editor: &Editor,
    node: Node,
    source: &str,
) -> Result<(Transaction, Path), String> {
    let doc = editor.doc();
    let (block_path, replace) = match editor.selection() {
        Selection::Node { path } => (path.clone(), false),
        Selection::Text { focus, .. } => {
            let block_path = focus.block_path().to_vec();
            let replace = node_at_path(doc, &block_path).is_some_and(Node::is_empty_paragraph);
            (block_path, replace)
        }
    };
    let (parent, ix) = parent_and_index(&block_path)?;
    let siblings = children_at_path(doc, parent).ok_or("Invalid block path")?;

    let at = if replace { ix } else { ix + 1 };
    let node_path = child_path(parent, at);
    let mut ops: Vec<Op> = Vec::new();
    if replace {
        ops.push(Op::RemoveNode {
            path: block_path.clone(),
        });
    }

    let caret = match first_leaf_offset(&node) {
        Some(rel) => {
            let mut path = node_path.clone();
            path.extend(rel);
            Point::new(path, 0)
        }
        None => {
            let next_path = child_path(parent, at + 1);
            let next_is_paragraph = siblings
                .get(ix + 1)
                .is_some_and(|n| n.is_kind(NodeKind::Paragraph));
            if !next_is_paragraph {
                ops.push(Op::InsertNode {
                    path: next_path.clone(),
                    node: Node::paragraph(""),
                });
            }
            Point::new(child_path(&next_path, 0), 0)
        }
    };

    // Insert the block before any trailing paragraph so the paths above hold.
    ops.insert(
        usize::from(replace),
        Op::InsertNode {
            path: node_path.clone(),
            node,
        },
    );

    Ok((
        Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source(source.to_string()),
        node_path,
    ))
}

pub(crate) fn callout_node() -> Node {
    Node::blockquote(vec![Node::paragraph("💡 ")])
}

/// Where the caret lands right after the node at `path`.
fn point_after_node(doc: &Document, path: &[usize]) -> Option<Point> {
    text_blocks_in_order(doc)
        .into_iter()
        .find(|b| b.as_slice() > path && !b.starts_with(path))
        .and_then(|b| first_text_point_in(doc, &b))
}

fn move_past_node_tx(editor: &Editor, path: &[usize]) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (parent, ix) = parent_and_index(path)?;
    let next_sibling_is_text = children_at_path(doc, parent)
        .and_then(|c| c.get(ix + 1))
        .and_then(|n| n.kind())
        .is_some_and(crate::tree::is_text_block_kind);

    if next_sibling_is_text {
        let caret = first_text_point_in(doc, &child_path(parent, ix + 1)).ok_or("No text after node")?;
        return Ok(Transaction::new(Vec::new())
            .selection_after(Selection::collapsed(caret))
            .source("command:tab.past_node"));
    }

    // Nothing to land on in this container: open a paragraph.
    let paragraph_path = child_path(parent, ix + 1);
    Ok(Transaction::new(vec![Op::InsertNode {
        path: paragraph_path.clone(),
        node: Node::paragraph(""),
    }])
    .selection_after(Selection::collapsed(Point::new(child_path(&paragraph_path, 0), 0)))
    .source("command:tab.past_node"))
}

fn delete_backward_tx(editor: &Editor) -> Result<Option<Transaction>, String> {
    let doc = editor.doc();
    let selection = editor.selection();

    if let Selection::Node { path } = selection {
        return remove_node_tx(doc, path).map(Some);
    }
    if let Some((start, end)) = selection.ordered() {
        if start != end {
            return delete_range_tx(doc, &start, &end);
        }
    }

    let point = text_focus(editor)?;
    let block_path = point.block_path().to_vec();
    let el = text_block(doc, &block_path)?;
    let leaf_ix = point.path.last().copied().unwrap_or(0);
    let global = point_global_offset(&el.children, leaf_ix, point.offset);

    if global > 0 {
        let text: String = el
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        let prev = text[..global]
            .char_indices()
            .next_back()
            .map(|(ix, _)| ix)
            .unwrap_or(0);
        let from = point_for_global_offset(&block_path, &el.children, prev);
        return delete_range_tx(doc, &from, &point);
    }

    // At the start of the block.
    if el.kind != NodeKind::Paragraph {
        return set_block_type_tx(editor, BlockType::Paragraph).map(Some);
    }

    let (parent, ix) = parent_and_index(&block_path)?;
    if ix == 0 {
        if let Some(item_path) = ancestor_element_path(doc, &block_path, NodeKind::ListItem) {
            if item_path.as_slice() == parent {
                return lift_list_item_tx(editor).map(Some);
            }
        }
        if node_at_path(doc, parent).is_some_and(|n| n.is_kind(NodeKind::Blockquote)) {
            return set_block_type_tx(editor, BlockType::Paragraph).map(Some);
        }
        return Ok(None);
    }

    let prev_path = child_path(parent, ix - 1);
    match node_at_path(doc, &prev_path) {
        Some(Node::Void(_)) => {
            let mut ops = Vec::new();
            let has_next = children_at_path(doc, parent).is_some_and(|c| ix + 1 < c.len());
            if el.children.iter().all(|n| matches!(n, Node::Text(t) if t.text.is_empty())) && has_next {
                ops.push(Op::RemoveNode {
                    path: block_path.clone(),
                });
            }
            Ok(Some(
                Transaction::new(ops)
                    .selection_after(Selection::node(prev_path))
                    .source("command:delete_backward"),
            ))
        }
        Some(Node::Element(prev)) if crate::tree::is_text_block_kind(prev.kind) => {
            let end_of_prev = last_text_point_in(doc, &prev_path).ok_or("Previous block has no text")?;
            delete_range_tx(doc, &end_of_prev, &point)
        }
        Some(Node::Element(_)) => {
            let caret = last_text_point_in(doc, &prev_path).ok_or("Previous block has no text")?;
            Ok(Some(
                Transaction::new(Vec::new())
                    .selection_after(Selection::collapsed(caret))
                    .source("command:delete_backward"),
            ))
        }
        _ => Ok(None),
    }
}

fn split_block_tx(editor: &Editor) -> Result<Transaction, String> {
    let doc = editor.doc();
    if let Selection::Node { path } = editor.selection() {
        let (parent, ix) = parent_and_index(path)?;
        let paragraph_path = child_path(parent, ix + 1);
        return Ok(Transaction::new(vec![Op::InsertNode {
            path: paragraph_path.clone(),
            node: Node::paragraph(""),
        }])
        .selection_after(Selection::collapsed(Point::new(child_path(&paragraph_path, 0), 0)))
        .source("command:split_block"));
    }

    let point = text_focus(editor)?;
    let block_path = point.block_path().to_vec();
    let el = text_block(doc, &block_path)?;

    if el.kind == NodeKind::CodeBlock {
        return insert_text_tx(editor, "\n");
    }

    let leaf_ix = point.path.last().copied().unwrap_or(0);
    let global = point_global_offset(&el.children, leaf_ix, point.offset);
    let (left, right) = split_inline(&el.children, global);
    let (parent, ix) = parent_and_index(&block_path)?;

    let in_list_item = ancestor_element_path(doc, &block_path, NodeKind::ListItem)
        .filter(|item| item.as_slice() == parent);
    if let Some(item_path) = in_list_item {
        if Node::Element(el.clone()).text_content().is_empty() {
            return lift_list_item_tx(editor);
        }
        let Some(Node::Element(item)) = node_at_path(doc, &item_path) else {
            return Err("Invalid list item".into());
        };
        let mut kept: Vec<Node> = item.children[..ix].to_vec();
        kept.push(Node::element(el.kind, el.attrs.clone(), left));
        let mut moved: Vec<Node> = vec![Node::element(NodeKind::Paragraph, Attrs::default(), right)];
        moved.extend(item.children[ix + 1..].iter().cloned());

        let (list_path, item_ix) = parent_and_index(&item_path)?;
        let new_item_path = child_path(list_path, item_ix + 1);
        return Ok(Transaction::new(vec![
            Op::RemoveNode {
                path: item_path.clone(),
            },
            Op::InsertNode {
                path: item_path.clone(),
                node: Node::element(NodeKind::ListItem, item.attrs.clone(), kept),
            },
            Op::InsertNode {
                path: new_item_path.clone(),
                node: Node::list_item(moved),
            },
        ])
        .selection_after(Selection::collapsed(Point::new(
            child_path(&child_path(&new_item_path, 0), 0),
            0,
        )))
        .source("command:split_block:list_item"));
    }

    let right_is_empty = right.iter().all(|n| matches!(n, Node::Text(t) if t.text.is_empty()));
    let right_block = if el.kind == NodeKind::Heading && right_is_empty {
        Node::element(NodeKind::Paragraph, Attrs::default(), right)
    } else {
        Node::element(el.kind, el.attrs.clone(), right)
    };

    let next_path = child_path(parent, ix + 1);
    Ok(Transaction::new(vec![
        Op::RemoveNode {
            path: block_path.clone(),
        },
        Op::InsertNode {
            path: block_path.clone(),
            node: Node::element(el.kind, el.attrs.clone(), left),
        },
        Op::InsertNode {
            path: next_path.clone(),
            node: right_block,
        },
    ])
    .selection_after(Selection::collapsed(Point::new(child_path(&next_path, 0), 0)))
    .source("command:split_block"))
}

pub(crate) fn remove_node_tx(doc: &Document, path: &[usize]) -> Result<Transaction, String> {
    if node_at_path(doc, path).is_none() {
        return Err("No node at path".into());
    }
    let (parent, ix) = parent_and_index(path)?;
    // Caret goes to the end of the previous text, else the start of the next.
    let caret = text_blocks_in_order(doc)
        .into_iter()
        .filter(|b| b.as_slice() < path && !b.starts_with(path))
        .next_back()
        .and_then(|b| last_text_point_in(doc, &b))
        .or_else(|| {
            point_after_node(doc, path).map(|mut p| {
                // Paths after the removed node shift left by one at its depth.
                if p.path.len() > parent.len() && p.path.starts_with(parent) && p.path[parent.len()] > ix {
                    p.path[parent.len()] -= 1;
                }
                p
            })
        });

    let mut tx = Transaction::new(vec![Op::RemoveNode {
        path: path.to_vec(),
    }])
    .source("command:remove_node");
    if let Some(caret) = caret {
        tx = tx.selection_after(Selection::collapsed(caret));
    }
    Ok(tx)
}

/// Move the top-level block at `from` into the gap before index `gap`
/// (`gap == len` means after the last block). Dropping a block into either
/// gap around itself is a no-op.
pub(crate) fn move_block_tx(doc: &Document, from: usize, gap: usize) -> Result<Option<Transaction>, String> {
    let len = doc.children.len();
    if from >= len {
        return Err(format!("No block at {from}"));
    }
    let gap = gap.min(len);
    if gap == from || gap == from + 1 {
        return Ok(None);
    }

    let node = doc.children[from].clone();
    let to = if gap > from { gap - 1 } else { gap };

    let selection = match &node {
        Node::Void(_) => Selection::node(vec![to]),
        Node::Element(_) | Node::Text(_) => {
            let rel = first_leaf_offset(&node).unwrap_or_default();
            let mut path = vec![to];
            path.extend(rel);
            Selection::collapsed(Point::new(path, 0))
        }
    };

    Ok(Some(
        Transaction::new(vec![
            Op::RemoveNode { path: vec![from] },
            Op::InsertNode {
                path: vec![to],
                node,
            },
        ])
        .selection_after(selection)
        .source("command:block.move"),
    ))
}

impl Editor {
    /// Type `text` at the caret, replacing a non-empty selection first.
    pub fn insert_text(&mut self, text: &str) -> Result<(), CommandError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Selection::Node { path } = self.selection().clone() {
            let paragraph = Node::paragraph(text);
            let caret = Point::new(child_path(&path, 0), text.len());
            let tx = Transaction::new(vec![
                Op::RemoveNode { path: path.clone() },
                Op::InsertNode { path, node: paragraph },
            ])
            .selection_after(Selection::collapsed(caret))
            .source("command:insert_text:replace_node");
            return apply_command(self, "insert text", Ok(tx));
        }
        self.delete_selection()?;
        let tx = insert_text_tx(self, text);
        apply_command(self, "insert text", tx)
    }

    /// Insert pasted plain text; each line after the first starts a new block.
    pub fn insert_plain_text(&mut self, text: &str) -> Result<(), CommandError> {
        for (ix, line) in text.split('\n').enumerate() {
            if ix > 0 {
                self.split_block()?;
            }
            self.insert_text(line.trim_end_matches('\r'))?;
        }
        Ok(())
    }

    /// Remove the selected range or node. Collapsed carets are left alone.
    pub fn delete_selection(&mut self) -> Result<(), CommandError> {
        let tx = match self.selection().clone() {
            Selection::Node { path } => Some(remove_node_tx(self.doc(), &path)),
            selection @ Selection::Text { .. } => match selection.ordered() {
                Some((start, end)) => delete_range_tx(self.doc(), &start, &end).transpose(),
                None => None,
            },
        };
        match tx {
            Some(tx) => apply_command(self, "delete selection", tx),
            None => Ok(()),
        }
    }

    /// Delete between two points; positions are clamped onto the document.
    pub fn delete_range(&mut self, start: Point, end: Point) -> Result<(), CommandError> {
        self.set_selection(Selection::range(start, end));
        self.delete_selection()
    }

    /// Replace a range with `content`. Text leaves are typed at the caret,
    /// anything else is inserted as a block after it.
    pub fn replace_range(&mut self, start: Point, end: Point, content: Vec<Node>) -> Result<(), CommandError> {
        self.delete_range(start, end)?;
        for node in content {
            match node {
                Node::Text(t) => self.insert_text(&t.text)?,
                block => {
                    self.insert_block(block)?;
                }
            }
        }
        Ok(())
    }

    pub fn delete_backward(&mut self) -> Result<(), CommandError> {
        match delete_backward_tx(self).map_err(CommandError::new)? {
            Some(tx) => apply_command(self, "delete backward", Ok(tx)),
            None => Ok(()),
        }
    }

    /// Enter: split the block at the caret.
    pub fn split_block(&mut self) -> Result<(), CommandError> {
        self.delete_selection()?;
        let tx = split_block_tx(self);
        apply_command(self, "split block", tx)
    }

    /// Insert any block next to the caret; returns where it landed.
    pub fn insert_block(&mut self, mut node: Node) -> Result<Path, CommandError> {
        ensure_node_id(&mut node);
        if !self.selection().is_collapsed() && !self.selection().is_node() {
            self.delete_selection()?;
        }
        let (tx, path) = insert_block_tx(self, node, "command:block.insert").map_err(CommandError::new)?;
        apply_command(self, "insert block", Ok(tx))?;
        Ok(path)
    }

    pub fn insert_horizontal_rule(&mut self) -> Result<(), CommandError> {
        self.insert_block(Node::horizontal_rule()).map(|_| ())
    }

    pub fn insert_callout(&mut self) -> Result<(), CommandError> {
        self.insert_block(callout_node())?;
        let caret = text_focus(self).map_err(CommandError::new)?;
        let end = Point::new(caret.path.clone(), "💡 ".len());
        self.set_selection(Selection::collapsed(end));
        Ok(())
    }

    pub fn insert_two_columns(&mut self) -> Result<(), CommandError> {
        self.insert_block(Node::two_columns(
            vec![Node::paragraph("")],
            vec![Node::paragraph("")],
        ))
        .map(|_| ())
    }

    /// Insert an image block; returns the node's stable id.
    pub fn insert_image(&mut self, image: ImageAttrs) -> Result<String, CommandError> {
        let mut node = image.into_node();
        let id = ensure_node_id(&mut node).unwrap_or_default();
        self.insert_block(node)?;
        Ok(id)
    }

    /// Insert a chart block without a snapshot; returns the node's stable id.
    pub fn insert_chart(&mut self, chart_id: &str, chart_name: Option<String>) -> Result<String, CommandError> {
        let mut node = ChartAttrs::new(chart_id, chart_name).into_node();
        let id = ensure_node_id(&mut node).unwrap_or_default();
        self.insert_block(node)?;
        Ok(id)
    }

    pub fn insert_link_preview(&mut self, preview: LinkPreviewAttrs) -> Result<String, CommandError> {
        let mut node = preview.into_node();
        let id = ensure_node_id(&mut node).unwrap_or_default();
        self.insert_block(node)?;
        Ok(id)
    }

    pub fn remove_node(&mut self, path: &[usize]) -> Result<(), CommandError> {
        let tx = remove_node_tx(self.doc(), path);
        apply_command(self, "remove node", tx)
    }

    /// Remove the node with stable id `id`. Returns false if it is gone.
    pub fn remove_node_by_id(&mut self, id: &str) -> Result<bool, CommandError> {
        let Some(path) = crate::tree::find_node_by_id(self.doc(), id) else {
            tracing::debug!(id, "remove target no longer exists");
            return Ok(false);
        };
        self.remove_node(&path)?;
        Ok(true)
    }

    /// Select a whole atomic node.
    pub fn select_node(&mut self, path: &[usize]) -> Result<(), CommandError> {
        match node_at_path(self.doc(), path) {
            Some(Node::Void(v)) if self.schema().is_atomic(v.kind) => {
                self.set_selection(Selection::node(path.to_vec()));
                Ok(())
            }
            Some(_) => Err(CommandError::new("Only atomic nodes can be node-selected")),
            None => Err(CommandError::new("No node at path")),
        }
    }

    /// Reorder top-level blocks. Returns false when the drop was a no-op.
    pub fn move_block(&mut self, from: usize, gap: usize) -> Result<bool, CommandError> {
        match move_block_tx(self.doc(), from, gap).map_err(CommandError::new)? {
            Some(tx) => {
                apply_command(self, "move block", Ok(tx))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn handle_tab(&mut self, shift: bool) -> Result<TabOutcome, CommandError> {
        if let Selection::Node { path } = self.selection().clone() {
            let tx = move_past_node_tx(self, &path);
            apply_command(self, "move past node", tx)?;
            return Ok(TabOutcome::MovedPastNode);
        }

        let focus = text_focus(self).map_err(CommandError::new)?;
        let block_path = focus.block_path().to_vec();
        if text_block(self.doc(), &block_path).is_ok_and(|el| el.kind == NodeKind::CodeBlock) {
            if shift {
                return Ok(TabOutcome::Ignored);
            }
            let tx = insert_text_tx(self, "\t");
            apply_command(self, "insert tab", tx)?;
            return Ok(TabOutcome::InsertedTab);
        }

        let item = ancestor_element_path(self.doc(), &block_path, NodeKind::ListItem);
        let cell = ancestor_element_path(self.doc(), &block_path, NodeKind::TableCell);
        let list_is_inner = match (&item, &cell) {
            (Some(item), Some(cell)) => item.len() > cell.len(),
            (Some(_), None) => true,
            _ => false,
        };

        if list_is_inner {
            let tx = if shift {
                lift_list_item_tx(self)
            } else {
                sink_list_item_tx(self)
            };
            // Indenting the first item has nowhere to go; that still counts.
            if let Ok(tx) = tx {
                apply_command(self, "indent list item", Ok(tx))?;
            }
            return Ok(TabOutcome::ListIndent);
        }

        if let Some(cell_path) = cell {
            match table_cell_point(self.doc(), &cell_path, !shift) {
                Some(point) => self.set_selection(Selection::collapsed(point)),
                None if !shift => {
                    let tx = insert_row_below_tx(self);
                    apply_command(self, "insert table row", tx)?;
                    if let Some(point) = table_cell_point(self.doc(), &cell_path, true) {
                        self.set_selection(Selection::collapsed(point));
                    }
                }
                None => {}
            }
            return Ok(TabOutcome::MovedCell);
        }

        if shift {
            return Ok(TabOutcome::Ignored);
        }
        let tx = insert_text_tx(self, "    ");
        apply_command(self, "insert spaces", tx)?;
        Ok(TabOutcome::InsertedSpaces)
    }
}
