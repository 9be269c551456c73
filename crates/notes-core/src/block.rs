use serde::{Deserialize, Serialize};

use crate::attrs::stored_heading_level;
use crate::core::{Attrs, Editor, ElementNode, Node, Point, Selection};
use crate::editing::{CommandError, apply_command};
use crate::ops::{Op, Path, Transaction};
use crate::schema::NodeKind;
use crate::tree::{
    child_path, children_at_path, is_text_block_kind, node_at_path, point_for_global_offset,
    point_global_offset, text_blocks_in_order,
};

/// The block types offered by the block switcher and the slash palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "level", rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    Heading(u8),
    BulletList,
    OrderedList,
    Blockquote,
    CodeBlock,
}

impl BlockType {
    pub fn label(self) -> &'static str {
        match self {
            BlockType::Paragraph => "Text",
            BlockType::Heading(1) => "Heading 1",
            BlockType::Heading(2) => "Heading 2",
            BlockType::Heading(_) => "Heading 3",
            BlockType::BulletList => "Bullet list",
            BlockType::OrderedList => "Numbered list",
            BlockType::Blockquote => "Quote",
            BlockType::CodeBlock => "Code",
        }
    }

    pub const SWITCHER: [BlockType; 8] = [
        BlockType::Paragraph,
        BlockType::Heading(1),
        BlockType::Heading(2),
        BlockType::Heading(3),
        BlockType::BulletList,
        BlockType::OrderedList,
        BlockType::Blockquote,
        BlockType::CodeBlock,
    ];
}

/// The block type at the caret, looking through list and quote wrappers.
pub fn active_block_type(editor: &Editor) -> Option<BlockType> {
    let focus = editor.selection().focus()?;
    let block_path = focus.block_path();
    let Some(Node::Element(el)) = node_at_path(editor.doc(), block_path) else {
        return None;
    };
    match el.kind {
        NodeKind::Heading => {
            let level = stored_heading_level(&el.attrs).unwrap_or(1);
            return Some(BlockType::Heading(level.clamp(1, 3) as u8));
        }
        NodeKind::CodeBlock => return Some(BlockType::CodeBlock),
        _ => {}
    }
    for len in (1..block_path.len()).rev() {
        match node_at_path(editor.doc(), &block_path[..len]).and_then(Node::kind) {
            Some(NodeKind::BulletList) => return Some(BlockType::BulletList),
            Some(NodeKind::OrderedList) => return Some(BlockType::OrderedList),
            Some(NodeKind::Blockquote) => return Some(BlockType::Blockquote),
            Some(NodeKind::TableCell | NodeKind::Column) => break,
            _ => {}
        }
    }
    Some(BlockType::Paragraph)
}

enum Piece {
    Kept(Node),
    Target(ElementNode),
}

fn is_wrapper(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Blockquote | NodeKind::BulletList | NodeKind::OrderedList | NodeKind::ListItem
    )
}

/// Break `node` apart around the target text blocks, re-wrapping untouched
/// runs in copies of their original wrappers.
fn flatten(node: &Node, path: &mut Path, targets: &[Path]) -> Vec<Piece> {
    let touched = targets.iter().any(|t| t.starts_with(path.as_slice()));
    let Node::Element(el) = node else {
        return vec![Piece::Kept(node.clone())];
    };
    if !touched {
        return vec![Piece::Kept(node.clone())];
    }
    if targets.iter().any(|t| t.as_slice() == path.as_slice()) {
        return vec![Piece::Target(el.clone())];
    }
    if !is_wrapper(el.kind) {
        return vec![Piece::Kept(node.clone())];
    }

    let mut out: Vec<Piece> = Vec::new();
    let mut run: Vec<Node> = Vec::new();
    let flush = |run: &mut Vec<Node>, out: &mut Vec<Piece>| {
        if !run.is_empty() {
            out.push(Piece::Kept(Node::element(
                el.kind,
                el.attrs.clone(),
                std::mem::take(run),
            )));
        }
    };
    for (ix, child) in el.children.iter().enumerate() {
        path.push(ix);
        for piece in flatten(child, path, targets) {
            match piece {
                Piece::Kept(n) => run.push(n),
                target @ Piece::Target(_) => {
                    flush(&mut run, &mut out);
                    out.push(target);
                }
            }
        }
        path.pop();
    }
    flush(&mut run, &mut out);
    out
}

fn converted(block: &ElementNode, to: BlockType) -> Node {
    match to {
        BlockType::Heading(level) => {
            let mut attrs = Attrs::new();
            attrs.insert("level".into(), level.clamp(1, 3).into());
            Node::element(NodeKind::Heading, attrs, block.children.clone())
        }
        BlockType::CodeBlock => {
            Node::code_block(Node::Element(block.clone()).text_content())
        }
        BlockType::Paragraph | BlockType::BulletList | BlockType::OrderedList | BlockType::Blockquote => {
            Node::element(NodeKind::Paragraph, Attrs::new(), block.children.clone())
        }
    }
}

pub(crate) fn set_block_type_tx(editor: &Editor, to: BlockType) -> Result<Transaction, String> {
    let doc = editor.doc();
    let Some((start, end)) = editor.selection().ordered() else {
        return Err("No text block selected".into());
    };
    let start_block = start.block_path().to_vec();
    let end_block = end.block_path().to_vec();

    // Stop at the nearest table cell or column.
    let host_len = (1..start_block.len())
        .rev()
        .find(|len| {
            node_at_path(doc, &start_block[..*len])
                .is_some_and(|n| n.is_kind(NodeKind::TableCell) || n.is_kind(NodeKind::Column))
        })
        .unwrap_or(0);
    let host: Path = start_block[..host_len].to_vec();
    let host_children = children_at_path(doc, &host).ok_or("Invalid block path")?;

    let targets: Vec<Path> = text_blocks_in_order(doc)
        .into_iter()
        .filter(|b| b.as_slice() >= start_block.as_slice() && b.as_slice() <= end_block.as_slice())
        .filter(|b| b.starts_with(&host) && b.len() > host.len())
        .filter(|b| {
            // Skip blocks living in a deeper cell or column.
            !(host.len() + 1..b.len()).any(|len| {
                node_at_path(doc, &b[..len])
                    .is_some_and(|n| n.is_kind(NodeKind::TableCell) || n.is_kind(NodeKind::Column))
            })
        })
        .collect();
    let (Some(first), Some(last)) = (targets.first(), targets.last()) else {
        return Err("No text block selected".into());
    };
    let first_ix = first[host.len()];
    let last_ix = last[host.len()];

    let mut pieces: Vec<Piece> = Vec::new();
    for ix in first_ix..=last_ix {
        let mut path = child_path(&host, ix);
        pieces.extend(flatten(&host_children[ix], &mut path, &targets));
    }

    // Rebuild, remembering where each target block ends up.
    let mut nodes: Vec<Node> = Vec::new();
    let mut target_paths: Vec<Path> = Vec::new();
    let mut group: Vec<Node> = Vec::new();
    let wrap_kind = match to {
        BlockType::BulletList => Some(NodeKind::BulletList),
        BlockType::OrderedList => Some(NodeKind::OrderedList),
        BlockType::Blockquote => Some(NodeKind::Blockquote),
        _ => None,
    };
    let flush_group = |group: &mut Vec<Node>, nodes: &mut Vec<Node>| {
        let Some(kind) = wrap_kind else {
            return;
        };
        if group.is_empty() {
            return;
        }
        let children = std::mem::take(group);
        let children = if kind.is_list() {
            children.into_iter().map(|n| Node::list_item(vec![n])).collect()
        } else {
            children
        };
        nodes.push(Node::element(kind, Attrs::new(), children));
    };

    for piece in pieces {
        match piece {
            Piece::Kept(node) => {
                flush_group(&mut group, &mut nodes);
                nodes.push(node);
            }
            Piece::Target(block) => {
                let node = converted(&block, to);
                match wrap_kind {
                    Some(kind) => {
                        let at = first_ix + nodes.len();
                        let mut path = child_path(&host, at);
                        if kind.is_list() {
                            path.extend([group.len(), 0]);
                        } else {
                            path.push(group.len());
                        }
                        target_paths.push(path);
                        group.push(node);
                    }
                    None => {
                        target_paths.push(child_path(&host, first_ix + nodes.len()));
                        nodes.push(node);
                    }
                }
            }
        }
    }
    flush_group(&mut group, &mut nodes);

    let remap = |point: &Point| -> Point {
        let block = point.block_path();
        let Some(ix) = targets.iter().position(|t| t.as_slice() == block) else {
            return point.clone();
        };
        let Some(Node::Element(old)) = node_at_path(doc, block) else {
            return point.clone();
        };
        let leaf = point.path.last().copied().unwrap_or(0);
        let global = point_global_offset(&old.children, leaf, point.offset);
        let new_children = match to {
            BlockType::CodeBlock => vec![Node::text(Node::Element(old.clone()).text_content())],
            _ => old.children.clone(),
        };
        point_for_global_offset(&target_paths[ix], &new_children, global)
    };
    let selection_after = match editor.selection() {
        Selection::Text { anchor, focus } => Selection::range(remap(anchor), remap(focus)),
        Selection::Node { .. } => Selection::collapsed(remap(&start)),
    };

    let mut ops: Vec<Op> = (first_ix..=last_ix)
        .rev()
        .map(|ix| Op::RemoveNode {
            path: child_path(&host, ix),
        })
        .collect();
    for (k, node) in nodes.into_iter().enumerate() {
        ops.push(Op::InsertNode {
            path: child_path(&host, first_ix + k),
            node,
        });
    }

    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:block.set_type"))
}

impl Editor {
    /// Clear the wrappers and type of the selected blocks, then apply `to`.
    pub fn set_block_type(&mut self, to: BlockType) -> Result<(), CommandError> {
        let tx = set_block_type_tx(self, to);
        apply_command(self, "set block type", tx)
    }

    /// Whether the caret sits in a text block of kind `kind`.
    pub fn in_text_block_of(&self, kind: NodeKind) -> bool {
        self.selection()
            .focus()
            .and_then(|f| node_at_path(self.doc(), f.block_path()))
            .and_then(Node::kind)
            .is_some_and(|k| k == kind && is_text_block_kind(k))
    }
}
