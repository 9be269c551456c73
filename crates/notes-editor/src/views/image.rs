use serde::Serialize;

use manos_notes_core::{Editor, ImageAttrs};

use super::NodeHandle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRender {
    pub id: String,
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width_pct: u32,
}

/// Resizable image. The width lives only in the node; the resize gesture
/// writes it straight back once per frame.
pub struct ImageView {
    handle: NodeHandle,
}

impl ImageView {
    pub(super) fn new(handle: NodeHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn attrs(&self, editor: &Editor) -> Option<ImageAttrs> {
        self.handle.attrs(editor).map(ImageAttrs::from_attrs)
    }

    pub fn set_width(&self, editor: &mut Editor, width_pct: f64) -> bool {
        self.handle
            .update_attributes(editor, ImageAttrs::width_patch(width_pct))
    }

    pub fn render(&self, editor: &Editor) -> Option<ImageRender> {
        let attrs = self.attrs(editor)?;
        Some(ImageRender {
            id: self.handle.id().to_string(),
            src: attrs.src,
            alt: attrs.alt,
            title: attrs.title,
            width_pct: attrs.width,
        })
    }
}
