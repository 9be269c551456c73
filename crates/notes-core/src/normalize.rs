use std::collections::HashSet;

use serde_json::Value;

use crate::attrs::{clamp_chart_height, clamp_image_width, new_node_id, stored_heading_level};
use crate::core::{AttrPatch, Attrs, Document, ElementNode, Node, TextNode, VoidNode};
use crate::ops::Op;
use crate::schema::{
    ChildConstraint, DEFAULT_CHART_HEIGHT_PX, MAX_HEADING_LEVEL, MAX_IMAGE_WIDTH_PCT,
    MIN_HEADING_LEVEL, NodeKind, Schema,
};
use crate::tree::child_path;

/// One structural rule the document is brought back to after every
/// transaction.
///
/// The ops a pass returns are applied in order against the document the pass
/// saw, so they must stay path-consistent among themselves.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op>;
}

static NORMALIZE_PASSES: &[&dyn NormalizePass] = &[
    &EnsureAtomicShape,
    &NormalizeBlockChildren,
    &NormalizeTableStructure,
    &NormalizeListStructure,
    &NormalizeTwoColumnStructure,
    &EnsureTextBlocksHaveLeaf,
    &MergeAdjacentTextLeaves,
    &NormalizeHeadingLevels,
    &ClampImageWidth,
    &ClampChartHeight,
    &EnsureAtomicIds,
    &EnsureTrailingParagraph,
];

pub fn normalize_passes() -> &'static [&'static dyn NormalizePass] {
    NORMALIZE_PASSES
}

/// Ops of the first pass that still finds something to fix, or nothing once
/// the document is normalized.
pub fn normalize_pass_ops(doc: &Document, schema: &Schema) -> Vec<Op> {
    for pass in NORMALIZE_PASSES {
        let ops = pass.run(doc, schema);
        if !ops.is_empty() {
            tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize");
            return ops;
        }
    }
    Vec::new()
}

/// Depth-first visit of every element, with its path.
fn visit_elements<'a>(
    children: &'a [Node],
    path: &mut Vec<usize>,
    f: &mut dyn FnMut(&'a ElementNode, &[usize]),
) {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);
        f(el, path);
        visit_elements(&el.children, path, f);
        path.pop();
    }
}

fn visit_voids<'a>(children: &'a [Node], path: &mut Vec<usize>, f: &mut dyn FnMut(&'a VoidNode, &[usize])) {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Void(v) => f(v, path),
            Node::Element(el) => visit_voids(&el.children, path, f),
            Node::Text(_) => {}
        }
        path.pop();
    }
}

fn replace_ops(path: Vec<usize>, node: Node) -> [Op; 2] {
    [
        Op::RemoveNode { path: path.clone() },
        Op::InsertNode { path, node },
    ]
}

/// Atomic kinds are always voids and non-atomic kinds always elements.
struct EnsureAtomicShape;

impl NormalizePass for EnsureAtomicShape {
    fn id(&self) -> &'static str {
        "core.ensure_atomic_shape"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        fn walk(children: &[Node], path: &mut Vec<usize>, schema: &Schema, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                match node {
                    Node::Element(el) if schema.is_atomic(el.kind) => {
                        ops.extend(replace_ops(path.clone(), Node::void(el.kind, el.attrs.clone())));
                    }
                    Node::Void(v) if !schema.is_atomic(v.kind) => {
                        ops.extend(replace_ops(
                            path.clone(),
                            Node::element(v.kind, v.attrs.clone(), Vec::new()),
                        ));
                    }
                    Node::Element(el) => walk(&el.children, path, schema, ops),
                    Node::Void(_) | Node::Text(_) => {}
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), schema, &mut ops);
        ops
    }
}

/// Block containers hold at least one block and never bare text; text
/// blocks hold nothing but text leaves.
struct NormalizeBlockChildren;

impl NormalizePass for NormalizeBlockChildren {
    fn id(&self) -> &'static str {
        "core.normalize_block_children"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        fn wrap_stray_text(children: &[Node], parent: &[usize], ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                if let Node::Text(t) = node {
                    let paragraph = Node::element(
                        NodeKind::Paragraph,
                        Attrs::default(),
                        vec![Node::Text(t.clone())],
                    );
                    ops.extend(replace_ops(child_path(parent, ix), paragraph));
                }
            }
        }

        let mut ops = Vec::new();
        wrap_stray_text(&doc.children, &[], &mut ops);
        if !ops.is_empty() {
            return ops;
        }

        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            match schema.spec(el.kind).children {
                ChildConstraint::BlockOnly => {
                    if el.children.is_empty() {
                        ops.push(Op::InsertNode {
                            path: child_path(path, 0),
                            node: Node::paragraph(""),
                        });
                    } else {
                        wrap_stray_text(&el.children, path, &mut ops);
                    }
                }
                ChildConstraint::InlineOnly => {
                    for (ix, child) in el.children.iter().enumerate().rev() {
                        if !matches!(child, Node::Text(_)) {
                            ops.push(Op::RemoveNode {
                                path: child_path(path, ix),
                            });
                        }
                    }
                }
                _ => {}
            }
        });
        ops
    }
}

struct NormalizeTableStructure;

impl NormalizePass for NormalizeTableStructure {
    fn id(&self) -> &'static str {
        "table.normalize_structure"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !ops.is_empty() || el.kind != NodeKind::Table {
                return;
            }

            let is_row = |n: &Node| n.is_kind(NodeKind::TableRow);
            if let Some(ix) = el.children.iter().rposition(|n| !is_row(n)) {
                ops.push(Op::RemoveNode {
                    path: child_path(path, ix),
                });
                return;
            }

            let cols = el
                .children
                .iter()
                .map(|row| row.children().iter().filter(|c| c.is_kind(NodeKind::TableCell)).count())
                .max()
                .unwrap_or(0);
            if cols == 0 {
                ops.push(Op::RemoveNode {
                    path: path.to_vec(),
                });
                return;
            }

            for (row_ix, row) in el.children.iter().enumerate() {
                let row_path = child_path(path, row_ix);
                if let Some(ix) = row
                    .children()
                    .iter()
                    .rposition(|c| !c.is_kind(NodeKind::TableCell))
                {
                    ops.push(Op::RemoveNode {
                        path: child_path(&row_path, ix),
                    });
                    return;
                }
                for cell_ix in row.children().len()..cols {
                    ops.push(Op::InsertNode {
                        path: child_path(&row_path, cell_ix),
                        node: table_cell(),
                    });
                }
            }
        });
        ops
    }
}

pub(crate) fn table_cell() -> Node {
    Node::element(NodeKind::TableCell, Attrs::default(), vec![Node::paragraph("")])
}

/// Lists only hold list items and are never empty.
struct NormalizeListStructure;

impl NormalizePass for NormalizeListStructure {
    fn id(&self) -> &'static str {
        "list.normalize_structure"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !ops.is_empty() || !el.kind.is_list() {
                return;
            }
            if el.children.is_empty() {
                ops.push(Op::RemoveNode {
                    path: path.to_vec(),
                });
                return;
            }
            for (ix, child) in el.children.iter().enumerate() {
                if child.is_kind(NodeKind::ListItem) {
                    continue;
                }
                ops.extend(replace_ops(
                    child_path(path, ix),
                    Node::list_item(vec![child.clone()]),
                ));
            }
        });
        ops
    }
}

/// A two-column block has exactly two columns, each holding a block.
struct NormalizeTwoColumnStructure;

impl NormalizePass for NormalizeTwoColumnStructure {
    fn id(&self) -> &'static str {
        "columns.normalize_structure"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !ops.is_empty() || el.kind != NodeKind::TwoColumnBlock {
                return;
            }

            for (ix, child) in el.children.iter().enumerate() {
                if child.is_kind(NodeKind::Column) {
                    continue;
                }
                ops.extend(replace_ops(
                    child_path(path, ix),
                    Node::column(vec![child.clone()]),
                ));
            }
            if !ops.is_empty() {
                return;
            }

            if el.children.len() < 2 {
                for ix in el.children.len()..2 {
                    ops.push(Op::InsertNode {
                        path: child_path(path, ix),
                        node: Node::column(vec![Node::paragraph("")]),
                    });
                }
                return;
            }

            if el.children.len() > 2 {
                // Fold the last column into the second one.
                let last_ix = el.children.len() - 1;
                let second_len = el.children[1].children().len();
                for (k, moved) in el.children[last_ix].children().iter().enumerate() {
                    ops.push(Op::InsertNode {
                        path: child_path(&child_path(path, 1), second_len + k),
                        node: moved.clone(),
                    });
                }
                ops.push(Op::RemoveNode {
                    path: child_path(path, last_ix),
                });
            }
        });
        ops
    }
}

struct EnsureTextBlocksHaveLeaf;

impl NormalizePass for EnsureTextBlocksHaveLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_blocks_have_leaf"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if schema.is_text_block(el.kind) && el.children.is_empty() {
                ops.push(Op::InsertNode {
                    path: child_path(path, 0),
                    node: Node::Text(TextNode {
                        text: String::new(),
                        marks: Default::default(),
                    }),
                });
            }
        });
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !schema.is_text_block(el.kind) || el.children.len() < 2 {
                return;
            }

            let mut ix = el.children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &el.children[ix] else {
                    continue;
                };

                // Empty leaves merge regardless of marks.
                let mut run_marks = (!right.text.is_empty()).then(|| right.marks.clone());
                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = el.children.get(start - 1) else {
                        break;
                    };
                    if !left.text.is_empty() {
                        match &run_marks {
                            Some(marks) if *marks != left.marks => break,
                            Some(_) => {}
                            None => run_marks = Some(left.marks.clone()),
                        }
                    }
                    start -= 1;
                }
                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = el.children.get(start) else {
                    continue;
                };
                if first.text.is_empty()
                    && let Some(marks) = run_marks
                    && marks != first.marks
                {
                    ops.push(Op::SetTextMarks {
                        path: child_path(path, start),
                        marks,
                    });
                }

                // Fold one leaf at a time so the removed text is always the
                // tail of its left neighbour.
                let mut len = first.text.len();
                for node in &el.children[start + 1..=ix] {
                    let Node::Text(t) = node else {
                        continue;
                    };
                    if !t.text.is_empty() {
                        ops.push(Op::InsertText {
                            path: child_path(path, start),
                            offset: len,
                            text: t.text.clone(),
                        });
                        len += t.text.len();
                    }
                    ops.push(Op::RemoveNode {
                        path: child_path(path, start + 1),
                    });
                }
                ix = start;
            }
        });
        ops
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if el.kind != NodeKind::Heading {
                return;
            }
            let level = stored_heading_level(&el.attrs)
                .unwrap_or(MIN_HEADING_LEVEL)
                .clamp(MIN_HEADING_LEVEL, MAX_HEADING_LEVEL);
            // Rewrites float levels as integers too.
            if el.attrs.get("level").and_then(Value::as_i64) != Some(level) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("level", level),
                });
            }
        });
        ops
    }
}

fn stored_u32(attrs: &Attrs, key: &str) -> Option<u32> {
    attrs
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn numeric(attrs: &Attrs, key: &str) -> Option<f64> {
    attrs.get(key).and_then(Value::as_f64)
}

struct ClampImageWidth;

impl NormalizePass for ClampImageWidth {
    fn id(&self) -> &'static str {
        "image.clamp_width"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_voids(&doc.children, &mut Vec::new(), &mut |v, path| {
            if v.kind != NodeKind::Image {
                return;
            }
            let want = numeric(&v.attrs, "width")
                .map(clamp_image_width)
                .unwrap_or(MAX_IMAGE_WIDTH_PCT as u32);
            if stored_u32(&v.attrs, "width") != Some(want) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("width", want),
                });
            }
        });
        ops
    }
}

struct ClampChartHeight;

impl NormalizePass for ClampChartHeight {
    fn id(&self) -> &'static str {
        "chart.clamp_height"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_voids(&doc.children, &mut Vec::new(), &mut |v, path| {
            if v.kind != NodeKind::ChartBlock {
                return;
            }
            let want = numeric(&v.attrs, "height")
                .map(clamp_chart_height)
                .unwrap_or(DEFAULT_CHART_HEIGHT_PX as u32);
            if stored_u32(&v.attrs, "height") != Some(want) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("height", want),
                });
            }
        });
        ops
    }
}

/// Every atomic node carries a unique stable id.
struct EnsureAtomicIds;

impl NormalizePass for EnsureAtomicIds {
    fn id(&self) -> &'static str {
        "core.ensure_atomic_ids"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ops = Vec::new();
        visit_voids(&doc.children, &mut Vec::new(), &mut |v, path| {
            let id = v.attrs.get("id").and_then(Value::as_str).filter(|s| !s.is_empty());
            match id {
                Some(id) if seen.insert(id) => {}
                _ => ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("id", new_node_id()),
                }),
            }
        });
        ops
    }
}

/// The last top-level node is always an empty paragraph.
struct EnsureTrailingParagraph;

impl NormalizePass for EnsureTrailingParagraph {
    fn id(&self) -> &'static str {
        "core.ensure_trailing_paragraph"
    }

    fn run(&self, doc: &Document, _schema: &Schema) -> Vec<Op> {
        match doc.children.last() {
            Some(last) if last.is_empty_paragraph() => Vec::new(),
            _ => vec![Op::InsertNode {
                path: vec![doc.children.len()],
                node: Node::paragraph(""),
            }],
        }
    }
}
