use crate::core::{Document, ElementNode, Node, PathError, Point, clamp_to_char_boundary};
use crate::ops::Path;
use crate::schema::NodeKind;

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    if path.is_empty() {
        return None;
    }

    let mut node = doc.children.get(path[0])?;
    for &ix in path.iter().skip(1) {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn element_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a ElementNode> {
    match node_at_path(doc, path)? {
        Node::Element(el) => Some(el),
        _ => None,
    }
}

pub fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(PathError("Empty path".into()));
    };
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| PathError(format!("Path out of bounds at depth 0: {first}")))?;
    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => el.children.get_mut(ix).ok_or_else(|| {
                PathError(format!("Path out of bounds at depth {}: {ix}", depth + 1))
            })?,
            Node::Void(_) | Node::Text(_) => {
                return Err(PathError("Path descends into a leaf".into()));
            }
        };
    }
    Ok(node)
}

/// Children of the container at `parent_path`; the empty path is the root.
pub fn children_at_path<'a>(doc: &'a Document, parent_path: &[usize]) -> Option<&'a [Node]> {
    if parent_path.is_empty() {
        return Some(&doc.children);
    }
    match node_at_path(doc, parent_path)? {
        Node::Element(el) => Some(&el.children),
        Node::Void(_) | Node::Text(_) => None,
    }
}

/// Path of the nearest node of `kind` at or above `path`.
pub fn ancestor_element_path(doc: &Document, path: &[usize], kind: NodeKind) -> Option<Path> {
    (1..=path.len()).rev().find_map(|len| {
        let candidate = &path[..len];
        match node_at_path(doc, candidate) {
            Some(Node::Element(el)) if el.kind == kind => Some(candidate.to_vec()),
            _ => None,
        }
    })
}

/// Depth-first search for the node whose `id` attribute equals `id`.
pub fn find_node_by_id(doc: &Document, id: &str) -> Option<Path> {
    fn walk(children: &[Node], id: &str, path: &mut Vec<usize>) -> Option<Path> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            if node.id() == Some(id) {
                return Some(path.clone());
            }
            if let Some(found) = walk(node.children(), id, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }

    walk(&doc.children, id, &mut Vec::new())
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_in(&doc.children, &mut Vec::new())
}

/// First leaf point inside the subtree at `path`.
pub fn first_text_point_in(doc: &Document, path: &[usize]) -> Option<Point> {
    match node_at_path(doc, path)? {
        Node::Text(_) => Some(Point::new(path.to_vec(), 0)),
        Node::Element(el) => first_text_in(&el.children, &mut path.to_vec()),
        Node::Void(_) => None,
    }
}

/// Last leaf point inside the subtree at `path`, at the end of its text.
pub fn last_text_point_in(doc: &Document, path: &[usize]) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate().rev() {
            path.push(ix);
            match node {
                Node::Text(t) => return Some(Point::new(path.clone(), t.text.len())),
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    match node_at_path(doc, path)? {
        Node::Text(t) => Some(Point::new(path.to_vec(), t.text.len())),
        Node::Element(el) => walk(&el.children, &mut path.to_vec()),
        Node::Void(_) => None,
    }
}

fn first_text_in(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Text(_) => return Some(Point::new(path.clone(), 0)),
            Node::Element(el) => {
                if let Some(point) = first_text_in(&el.children, path) {
                    return Some(point);
                }
            }
            Node::Void(_) => {}
        }
        path.pop();
    }
    None
}

/// Snap `point` onto the closest existing leaf, clamping every index and the
/// offset into range.
pub fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved_path, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    match node_at_path(doc, &resolved_path)? {
        Node::Text(t) => {
            let offset = clamp_to_char_boundary(&t.text, point.offset);
            Some(Point::new(resolved_path, offset))
        }
        Node::Element(el) => first_text_in(&el.children, &mut resolved_path),
        Node::Void(_) => {
            // Land on the closest text before the void, else after it.
            let blocks = text_blocks_in_order(doc);
            blocks
                .iter()
                .rev()
                .filter(|p| p.as_slice() < resolved_path.as_slice())
                .find_map(|p| last_text_point_in(doc, p))
                .or_else(|| {
                    blocks
                        .iter()
                        .filter(|p| p.as_slice() > resolved_path.as_slice())
                        .find_map(|p| first_text_point_in(doc, p))
                })
        }
    }
}

/// Paths of every text block (paragraph, heading, code block) in document order.
pub fn text_blocks_in_order(doc: &Document) -> Vec<Path> {
    fn walk(nodes: &[Node], path: &mut Vec<usize>, out: &mut Vec<Path>) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if is_text_block_kind(el.kind) {
                out.push(path.clone());
            } else {
                walk(&el.children, path, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut out);
    out
}

pub fn is_text_block_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock
    )
}

/// Byte offset of (`child_ix`, `offset`) counted across a block's leaves.
pub fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            global += t.text.len();
            continue;
        }
        if ix == child_ix {
            global += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    global
}

pub fn point_for_global_offset(block_path: &[usize], children: &[Node], global_offset: usize) -> Point {
    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if remaining < t.text.len() {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        if remaining == t.text.len() {
            // On a boundary, prefer the start of the following leaf.
            let next_ix = if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                child_ix + 1
            } else {
                child_ix
            };
            let mut path = block_path.to_vec();
            path.push(next_ix);
            let offset = if next_ix == child_ix { t.text.len() } else { 0 };
            return Point::new(path, offset);
        }
        remaining -= t.text.len();
    }

    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

pub fn total_inline_text_len(children: &[Node]) -> usize {
    children
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.text.len(),
            Node::Element(_) | Node::Void(_) => 0,
        })
        .sum()
}

/// Whether `path` lies inside (or is) the subtree rooted at `root`.
pub fn path_within(path: &[usize], root: &[usize]) -> bool {
    path.starts_with(root)
}

pub fn sibling_path(path: &[usize], ix: usize) -> Path {
    let mut out = path.to_vec();
    if let Some(last) = out.last_mut() {
        *last = ix;
    }
    out
}

pub fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut out = parent.to_vec();
    out.push(ix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;

    fn doc() -> Document {
        Document::new(vec![
            Node::heading(1, "Title"),
            Node::horizontal_rule(),
            Node::list(NodeKind::BulletList, ["a", "b"]),
            Node::paragraph(""),
        ])
    }

    #[test]
    fn text_blocks_descend_into_containers() {
        let blocks = text_blocks_in_order(&doc());
        assert_eq!(blocks, vec![vec![0], vec![2, 0, 0], vec![2, 1, 0], vec![3]]);
    }

    #[test]
    fn point_on_void_snaps_to_previous_text() {
        let doc = doc();
        let point = normalize_point_to_existing_text(&doc, &Point::new(vec![1, 0], 3))
            .expect("point");
        assert_eq!(point, Point::new(vec![0, 0], 5));
    }

    #[test]
    fn ancestor_lookup_finds_list_item() {
        let doc = doc();
        assert_eq!(
            ancestor_element_path(&doc, &[2, 1, 0, 0], NodeKind::ListItem),
            Some(vec![2, 1])
        );
        assert_eq!(ancestor_element_path(&doc, &[0, 0], NodeKind::ListItem), None);
    }

    #[test]
    fn global_offsets_cross_leaf_boundaries() {
        let children = vec![Node::text("ab"), Node::text("cd")];
        assert_eq!(point_global_offset(&children, 1, 1), 3);
        assert_eq!(point_for_global_offset(&[4], &children, 3), Point::new(vec![4, 1], 1));
        assert_eq!(point_for_global_offset(&[4], &children, 2), Point::new(vec![4, 1], 0));
    }
}
