use crate::core::{Editor, Node, Point, Selection};
use crate::editing::{CommandError, apply_command, text_focus};
use crate::ops::{Op, Path, Transaction};
use crate::schema::NodeKind;
use crate::tree::{ancestor_element_path, child_path, element_at_path, node_at_path};

fn remap_point(point: &Point, old_prefix: &[usize], map: &dyn Fn(&[usize]) -> Path) -> Point {
    if !point.path.starts_with(old_prefix) {
        return point.clone();
    }
    Point::new(map(&point.path[old_prefix.len()..]), point.offset)
}

fn remap_selection(selection: &Selection, old_prefix: &[usize], map: &dyn Fn(&[usize]) -> Path) -> Selection {
    match selection {
        Selection::Text { anchor, focus } => Selection::range(
            remap_point(anchor, old_prefix, map),
            remap_point(focus, old_prefix, map),
        ),
        Selection::Node { .. } => selection.clone(),
    }
}

fn current_item(editor: &Editor) -> Result<(Path, Path, usize), String> {
    let focus = text_focus(editor)?;
    let item_path = ancestor_element_path(editor.doc(), focus.block_path(), NodeKind::ListItem)
        .ok_or("Not in a list")?;
    let (item_ix, list_path) = item_path
        .split_last()
        .map(|(ix, list)| (*ix, list.to_vec()))
        .ok_or("Invalid list item path")?;
    Ok((item_path, list_path, item_ix))
}

/// Nest the current list item under its previous sibling.
pub(crate) fn sink_list_item_tx(editor: &Editor) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (item_path, list_path, item_ix) = current_item(editor)?;
    if item_ix == 0 {
        return Err("The first item of a list cannot be indented".into());
    }
    let list = element_at_path(doc, &list_path).ok_or("Invalid list")?;
    let item = list.children[item_ix].clone();
    let prev_path = child_path(&list_path, item_ix - 1);
    let prev = element_at_path(doc, &prev_path).ok_or("Invalid list item")?;

    let mut ops = vec![Op::RemoveNode {
        path: item_path.clone(),
    }];
    let new_item_path = match prev.children.last() {
        Some(Node::Element(nested)) if nested.kind == list.kind => {
            let nested_path = child_path(&prev_path, prev.children.len() - 1);
            let at = child_path(&nested_path, nested.children.len());
            ops.push(Op::InsertNode {
                path: at.clone(),
                node: item,
            });
            at
        }
        _ => {
            let nested_path = child_path(&prev_path, prev.children.len());
            ops.push(Op::InsertNode {
                path: nested_path.clone(),
                node: Node::element(list.kind, Default::default(), vec![item]),
            });
            child_path(&nested_path, 0)
        }
    };

    let selection_after = remap_selection(editor.selection(), &item_path, &|rest| {
        let mut path = new_item_path.clone();
        path.extend_from_slice(rest);
        path
    });
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:list.sink"))
}

/// Move the current list item one level out; at the outermost level its
/// blocks leave the list entirely.
pub(crate) fn lift_list_item_tx(editor: &Editor) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (item_path, list_path, item_ix) = current_item(editor)?;
    let list = element_at_path(doc, &list_path).ok_or("Invalid list")?;
    let item = element_at_path(doc, &item_path).ok_or("Invalid list item")?;

    let before: Vec<Node> = list.children[..item_ix].to_vec();
    let after: Vec<Node> = list.children[item_ix + 1..].to_vec();
    let (list_ix, list_parent) = list_path
        .split_last()
        .map(|(ix, parent)| (*ix, parent.to_vec()))
        .ok_or("Invalid list path")?;

    let parent_is_item = node_at_path(doc, &list_parent).is_some_and(|n| n.is_kind(NodeKind::ListItem));

    if parent_is_item {
        // Nested: the item becomes the next sibling of its parent item and
        // takes the following siblings along as its own sub-list.
        let outer_item = element_at_path(doc, &list_parent).ok_or("Invalid list item")?;
        let (outer_ix, outer_list) = list_parent
            .split_last()
            .map(|(ix, parent)| (*ix, parent.to_vec()))
            .ok_or("Invalid list path")?;

        let mut outer_children = outer_item.children.clone();
        if before.is_empty() {
            outer_children.remove(list_ix);
        } else {
            outer_children[list_ix] = Node::element(list.kind, list.attrs.clone(), before);
        }
        let mut moved_children = item.children.clone();
        if !after.is_empty() {
            moved_children.push(Node::element(list.kind, list.attrs.clone(), after));
        }

        let moved_path = child_path(&outer_list, outer_ix + 1);
        let ops = vec![
            Op::RemoveNode {
                path: list_parent.clone(),
            },
            Op::InsertNode {
                path: list_parent.clone(),
                node: Node::element(NodeKind::ListItem, outer_item.attrs.clone(), outer_children),
            },
            Op::InsertNode {
                path: moved_path.clone(),
                node: Node::element(NodeKind::ListItem, item.attrs.clone(), moved_children),
            },
        ];
        let selection_after = remap_selection(editor.selection(), &item_path, &|rest| {
            let mut path = moved_path.clone();
            path.extend_from_slice(rest);
            path
        });
        return Ok(Transaction::new(ops)
            .selection_after(selection_after)
            .source("command:list.lift"));
    }

    let mut replacement: Vec<Node> = Vec::new();
    if !before.is_empty() {
        replacement.push(Node::element(list.kind, list.attrs.clone(), before));
    }
    let first_block_ix = list_ix + replacement.len();
    replacement.extend(item.children.iter().cloned());
    if !after.is_empty() {
        replacement.push(Node::element(list.kind, list.attrs.clone(), after));
    }

    let mut ops = vec![Op::RemoveNode {
        path: list_path.clone(),
    }];
    for (k, node) in replacement.into_iter().enumerate() {
        ops.push(Op::InsertNode {
            path: child_path(&list_parent, list_ix + k),
            node,
        });
    }

    let selection_after = remap_selection(editor.selection(), &item_path, &|rest| {
        let (child_ix, tail) = rest.split_first().map(|(c, t)| (*c, t)).unwrap_or((0, &[][..]));
        let mut path = child_path(&list_parent, first_block_ix + child_ix);
        path.extend_from_slice(tail);
        path
    });
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:list.lift"))
}

impl Editor {
    pub fn sink_list_item(&mut self) -> Result<(), CommandError> {
        let tx = sink_list_item_tx(self);
        apply_command(self, "indent list item", tx)
    }

    pub fn lift_list_item(&mut self) -> Result<(), CommandError> {
        let tx = lift_list_item_tx(self);
        apply_command(self, "outdent list item", tx)
    }

    pub fn in_list(&self) -> bool {
        self.selection()
            .focus()
            .and_then(|f| ancestor_element_path(self.doc(), f.block_path(), NodeKind::ListItem))
            .is_some()
    }
}
