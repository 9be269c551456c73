//! Block gutter: the insert-below button and grip handle shown next to the
//! hovered top-level block, plus drag reorder.

use std::time::{Duration, Instant};

use manos_notes_core::{
    CommandError, Editor, Node, Op, Point, Selection, Transaction, child_path,
};

use crate::fetch::ImageFile;
use crate::geometry::{EditorLayout, top_level_block_at};

/// Drag payload type for internal block moves.
pub const BLOCK_MOVE_MIME: &str = "application/x-manos-block-move";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GutterHover {
    pub index: usize,
    /// Top of the hovered block, for aligning the gutter.
    pub top: f32,
}

/// What the grip hands to the host's drag-and-drop machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub mime: &'static str,
    pub data: String,
}

/// A drop as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPayload {
    BlockMove { from: usize },
    Files(Vec<ImageFile>),
    Other,
}

impl DropPayload {
    /// Classify a data transfer by its item types. Internal moves win over
    /// files; non-image files are ignored.
    pub fn from_transfer(items: &[(String, String)], files: Vec<ImageFile>) -> Self {
        let block_move = items
            .iter()
            .find(|(mime, _)| mime == BLOCK_MOVE_MIME)
            .and_then(|(_, data)| data.trim().parse::<usize>().ok());
        if let Some(from) = block_move {
            return DropPayload::BlockMove { from };
        }
        let images: Vec<ImageFile> = files.into_iter().filter(ImageFile::is_image).collect();
        if images.is_empty() {
            DropPayload::Other
        } else {
            DropPayload::Files(images)
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum DropOutcome {
    Moved { from: usize, to: usize },
    /// Dropped onto its own span, outside any block, or with a stale source.
    NoOp,
    /// Image files to hand to the ingestion pipeline.
    Ingest(Vec<ImageFile>),
    Ignored,
}

#[derive(Debug)]
pub struct Gutter {
    editable: bool,
    hover: Option<GutterHover>,
    hide_at: Option<Instant>,
    hide_delay: Duration,
    drag_from: Option<usize>,
}

impl Gutter {
    pub fn new(hide_delay: Duration) -> Self {
        Self {
            editable: true,
            hover: None,
            hide_at: None,
            hide_delay,
            drag_from: None,
        }
    }

    pub fn hover(&self) -> Option<GutterHover> {
        self.hover
    }

    pub fn drag_source(&self) -> Option<usize> {
        self.drag_from
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
        if !editable {
            self.hover = None;
            self.hide_at = None;
        }
    }

    /// Pointer moved over the editing surface.
    pub fn pointer_move(&mut self, editor: &Editor, layout: &dyn EditorLayout, y: f32, now: Instant) {
        if !self.editable {
            return;
        }
        match top_level_block_at(layout, editor.doc().children.len(), y) {
            Some((index, rect)) => {
                self.hover = Some(GutterHover {
                    index,
                    top: rect.top(),
                });
                self.hide_at = None;
            }
            None => self.schedule_hide(now),
        }
    }

    /// Pointer left the surface or the gutter itself.
    pub fn pointer_leave(&mut self, now: Instant) {
        self.schedule_hide(now);
    }

    /// Pointer came back onto the gutter before the hide fired.
    pub fn enter_gutter(&mut self) {
        self.hide_at = None;
    }

    fn schedule_hide(&mut self, now: Instant) {
        if self.hover.is_some() && self.hide_at.is_none() {
            self.hide_at = Some(now + self.hide_delay);
        }
    }

    /// Run the pending hide once its delay passed. Returns true when the
    /// gutter was hidden.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(at) if now >= at && self.drag_from.is_none() => {
                self.hide_at = None;
                self.hover = None;
                true
            }
            _ => false,
        }
    }

    pub fn hide_pending(&self) -> bool {
        self.hide_at.is_some()
    }

    /// The "+" button: open an empty paragraph under the hovered block.
    pub fn insert_below(&mut self, editor: &mut Editor) -> Result<(), CommandError> {
        let Some(hover) = self.hover else {
            return Ok(());
        };
        let index = (hover.index + 1).min(editor.doc().children.len());
        let path = vec![index];
        let tx = Transaction::new(vec![Op::InsertNode {
            path: path.clone(),
            node: Node::paragraph(""),
        }])
        .selection_after(Selection::collapsed(Point::new(child_path(&path, 0), 0)))
        .source("gutter:insert_below");
        editor
            .apply(tx)
            .map_err(|err| CommandError::new(format!("Could not insert block: {err}")))
    }

    /// Grip pressed on the hovered block. Atomic blocks become node-selected;
    /// the returned payload identifies the move for the drop target.
    pub fn start_drag(&mut self, editor: &mut Editor) -> Option<DragPayload> {
        let from = self.hover?.index;
        let node = editor.doc().children.get(from)?;
        if matches!(node, Node::Void(_)) {
            if let Err(err) = editor.select_node(&[from]) {
                tracing::debug!(from, "drag source not selectable: {}", err.message());
            }
        }
        self.drag_from = Some(from);
        Some(DragPayload {
            mime: BLOCK_MOVE_MIME,
            data: from.to_string(),
        })
    }

    pub fn cancel_drag(&mut self) {
        self.drag_from = None;
    }

    /// Resolve a drop at vertical position `y`.
    pub fn drop(
        &mut self,
        editor: &mut Editor,
        layout: &dyn EditorLayout,
        payload: DropPayload,
        y: f32,
    ) -> Result<DropOutcome, CommandError> {
        self.drag_from = None;
        let from = match payload {
            DropPayload::BlockMove { from } => from,
            DropPayload::Files(files) => return Ok(DropOutcome::Ingest(files)),
            DropPayload::Other => return Ok(DropOutcome::Ignored),
        };
        let block_count = editor.doc().children.len();
        if from >= block_count {
            return Ok(DropOutcome::NoOp);
        }
        let Some((target, rect)) = top_level_block_at(layout, block_count, y) else {
            return Ok(DropOutcome::NoOp);
        };
        let gap = if y < rect.mid_y() { target } else { target + 1 };
        if gap == from || gap == from + 1 {
            return Ok(DropOutcome::NoOp);
        }
        if !editor.move_block(from, gap)? {
            return Ok(DropOutcome::NoOp);
        }
        let to = if gap > from { gap - 1 } else { gap };
        Ok(DropOutcome::Moved { from, to })
    }
}
