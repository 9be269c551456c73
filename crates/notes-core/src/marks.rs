use crate::core::{Editor, Marks, Node, Selection, TextNode, clamp_to_char_boundary};
use crate::editing::{CommandError, apply_command, text_block};
use crate::ops::{Op, Transaction};
use crate::tree::{
    child_path, node_at_path, point_for_global_offset, point_global_offset, text_blocks_in_order,
    total_inline_text_len,
};

/// Accept what a user types into the link prompt.
///
/// Empty input means "remove the link"; a missing scheme becomes `https://`.
pub fn normalize_link_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let has_scheme = trimmed.contains("://") || trimmed.starts_with("mailto:") || trimmed.starts_with("tel:");
    if has_scheme {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

/// A text block touched by a range, with the covered byte span.
struct CoveredBlock {
    path: Vec<usize>,
    start: usize,
    end: usize,
}

fn covered_blocks(editor: &Editor) -> Result<Vec<CoveredBlock>, String> {
    let Some((start, end)) = editor.selection().ordered() else {
        return Err("Selection is not in text".into());
    };
    let doc = editor.doc();
    let start_block = start.block_path().to_vec();
    let end_block = end.block_path().to_vec();

    let mut out = Vec::new();
    for path in text_blocks_in_order(doc)
        .into_iter()
        .filter(|b| *b >= start_block && *b <= end_block)
    {
        let el = text_block(doc, &path)?;
        let total = total_inline_text_len(&el.children);
        let from = if path == start_block {
            point_global_offset(&el.children, start.path.last().copied().unwrap_or(0), start.offset)
        } else {
            0
        };
        let to = if path == end_block {
            point_global_offset(&el.children, end.path.last().copied().unwrap_or(0), end.offset)
        } else {
            total
        };
        if from < to {
            out.push(CoveredBlock {
                path,
                start: from,
                end: to,
            });
        }
    }
    Ok(out)
}

fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start_global.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end_global.saturating_sub(node_start));

        let pieces = [
            (&t.text[..sel_start], t.marks.clone()),
            (&t.text[sel_start..sel_end], apply(t.marks.clone())),
            (&t.text[sel_end..], t.marks.clone()),
        ];
        for (text, marks) in pieces {
            if !text.is_empty() {
                out.push(Node::Text(TextNode {
                    text: text.to_string(),
                    marks,
                }));
            }
        }
    }

    if out.is_empty() {
        out.push(Node::text(""));
    }
    out
}

fn every_covered_leaf(editor: &Editor, blocks: &[CoveredBlock], get: fn(&Marks) -> bool) -> bool {
    blocks.iter().all(|block| {
        let Ok(el) = text_block(editor.doc(), &block.path) else {
            return true;
        };
        let mut cursor = 0usize;
        el.children.iter().all(|node| {
            let Node::Text(t) = node else {
                return true;
            };
            let (node_start, node_end) = (cursor, cursor + t.text.len());
            cursor = node_end;
            block.end <= node_start || block.start >= node_end || get(&t.marks)
        })
    })
}

fn mark_range_tx(
    editor: &Editor,
    blocks: &[CoveredBlock],
    apply: &dyn Fn(Marks) -> Marks,
    source: &str,
) -> Result<Transaction, String> {
    let Selection::Text { anchor, focus } = editor.selection() else {
        return Err("Selection is not in text".into());
    };
    let mut new_anchor = anchor.clone();
    let mut new_focus = focus.clone();
    let mut ops: Vec<Op> = Vec::new();

    for block in blocks {
        let el = text_block(editor.doc(), &block.path)?;
        let children = el.children.as_slice();
        let new_children = apply_marks_in_block(children, block.start, block.end, apply);

        for child_ix in (0..children.len()).rev() {
            ops.push(Op::RemoveNode {
                path: child_path(&block.path, child_ix),
            });
        }
        for (child_ix, node) in new_children.iter().cloned().enumerate() {
            ops.push(Op::InsertNode {
                path: child_path(&block.path, child_ix),
                node,
            });
        }

        for point in [&mut new_anchor, &mut new_focus] {
            if point.block_path() != block.path.as_slice() {
                continue;
            }
            let global = point_global_offset(children, point.path.last().copied().unwrap_or(0), point.offset);
            *point = point_for_global_offset(&block.path, &new_children, global);
        }
    }

    Ok(Transaction::new(ops)
        .selection_after(Selection::range(new_anchor, new_focus))
        .source(source.to_string()))
}

fn toggle_bool_mark(
    editor: &mut Editor,
    get: fn(&Marks) -> bool,
    set: fn(&mut Marks, bool),
    what: &str,
) -> Result<(), CommandError> {
    let blocks = covered_blocks(editor).map_err(CommandError::new)?;
    if blocks.is_empty() {
        return Ok(());
    }
    let target = !every_covered_leaf(editor, &blocks, get);
    let tx = mark_range_tx(
        editor,
        &blocks,
        &|mut marks: Marks| {
            set(&mut marks, target);
            marks
        },
        &format!("command:marks.{what}"),
    );
    apply_command(editor, what, tx)
}

fn set_marks_with(
    editor: &mut Editor,
    apply: &dyn Fn(Marks) -> Marks,
    what: &str,
) -> Result<(), CommandError> {
    let blocks = covered_blocks(editor).map_err(CommandError::new)?;
    if blocks.is_empty() {
        return Ok(());
    }
    let tx = mark_range_tx(editor, &blocks, apply, &format!("command:marks.{what}"));
    apply_command(editor, what, tx)
}

impl Editor {
    pub fn toggle_bold(&mut self) -> Result<(), CommandError> {
        toggle_bool_mark(self, |m| m.bold, |m, v| m.bold = v, "toggle_bold")
    }

    pub fn toggle_italic(&mut self) -> Result<(), CommandError> {
        toggle_bool_mark(self, |m| m.italic, |m, v| m.italic = v, "toggle_italic")
    }

    pub fn toggle_strikethrough(&mut self) -> Result<(), CommandError> {
        toggle_bool_mark(
            self,
            |m| m.strikethrough,
            |m, v| m.strikethrough = v,
            "toggle_strikethrough",
        )
    }

    pub fn toggle_code(&mut self) -> Result<(), CommandError> {
        toggle_bool_mark(self, |m| m.code, |m, v| m.code = v, "toggle_code")
    }

    /// Link the selected text; an empty `input` removes the link instead.
    pub fn set_link(&mut self, input: &str) -> Result<(), CommandError> {
        match normalize_link_input(input) {
            Some(url) => set_marks_with(
                self,
                &|mut marks: Marks| {
                    marks.link = Some(url.clone());
                    marks
                },
                "set_link",
            ),
            None => self.unset_link(),
        }
    }

    pub fn unset_link(&mut self) -> Result<(), CommandError> {
        set_marks_with(
            self,
            &|mut marks: Marks| {
                marks.link = None;
                marks
            },
            "unset_link",
        )
    }

    pub fn set_font_family(&mut self, family: Option<String>) -> Result<(), CommandError> {
        set_marks_with(
            self,
            &|mut marks: Marks| {
                marks.font_family = family.clone().filter(|f| !f.trim().is_empty());
                marks
            },
            "set_font_family",
        )
    }

    pub fn set_font_size(&mut self, size: Option<u32>) -> Result<(), CommandError> {
        set_marks_with(
            self,
            &|mut marks: Marks| {
                marks.font_size = size.filter(|s| *s > 0);
                marks
            },
            "set_font_size",
        )
    }

    /// Marks at the focus leaf.
    pub fn active_marks(&self) -> Marks {
        let Some(focus) = self.selection().focus() else {
            return Marks::default();
        };
        match node_at_path(self.doc(), &focus.path) {
            Some(Node::Text(text)) => text.marks.clone(),
            _ => Marks::default(),
        }
    }

    pub fn active_link(&self) -> Option<String> {
        self.active_marks().link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_input_gets_a_scheme() {
        assert_eq!(normalize_link_input("example.com"), Some("https://example.com".into()));
        assert_eq!(normalize_link_input(" http://a.b "), Some("http://a.b".into()));
        assert_eq!(normalize_link_input("   "), None);
    }

    #[test]
    fn marks_split_leaves_at_range_edges() {
        let out = apply_marks_in_block(&[Node::text("hello")], 1, 3, &|mut m: Marks| {
            m.bold = true;
            m
        });
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[1], Node::Text(t) if t.text == "el" && t.marks.bold));
    }
}
