use serde::Serialize;

use crate::attrs::stored_heading_level;
use crate::core::{Document, Node};
use crate::schema::NodeKind;
use crate::value::NoteValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineHeading {
    pub level: u8,
    pub text: String,
}

/// Data pulled out of a note body for listings and the table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub headings: Vec<OutlineHeading>,
    pub word_count: usize,
    /// Link targets in document order, without duplicates.
    pub links: Vec<String>,
}

impl Outline {
    /// Never fails: markup that does not parse yields an empty outline.
    pub fn from_markup(markup: &str) -> Self {
        match NoteValue::from_markup(markup) {
            Ok(value) => Self::from_document(&value.document),
            Err(err) => {
                tracing::debug!("no outline for unreadable markup: {err}");
                Self::default()
            }
        }
    }

    pub fn from_document(doc: &Document) -> Self {
        let mut outline = Self::default();
        for node in &doc.children {
            outline.visit(node);
        }
        outline
    }

    fn visit(&mut self, node: &Node) {
        match node {
            Node::Text(text) => {
                self.word_count += text.text.split_whitespace().count();
                if let Some(link) = &text.marks.link {
                    self.push_link(link);
                }
            }
            Node::Void(void) => {
                if void.kind == NodeKind::LinkPreviewBlock
                    && let Some(url) = void.attrs.get("url").and_then(|v| v.as_str())
                {
                    self.push_link(url);
                }
            }
            Node::Element(el) => {
                if el.kind == NodeKind::Heading {
                    let level = stored_heading_level(&el.attrs).unwrap_or(1);
                    let text = node.text_content().trim().to_string();
                    if !text.is_empty() {
                        self.headings.push(OutlineHeading {
                            level: level.clamp(1, 3) as u8,
                            text,
                        });
                    }
                }
                for child in &el.children {
                    self.visit(child);
                }
            }
        }
    }

    fn push_link(&mut self, link: &str) {
        if !link.is_empty() && !self.links.iter().any(|l| l == link) {
            self.links.push(link.to_string());
        }
    }
}
