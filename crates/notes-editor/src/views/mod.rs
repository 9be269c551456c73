//! Widgets bound to the atomic nodes of the document.
//!
//! One view is mounted per atomic node id. Views keep only transient state
//! (fetch status, theme); everything that must persist is written back into
//! the node's attributes through [`NodeHandle::update_attributes`].

mod chart;
mod columns;
mod image;
mod link_preview;

use std::collections::BTreeMap;

use serde::Serialize;

use manos_notes_core::{AttrPatch, Attrs, Document, Editor, Node, NodeKind, find_node_by_id, node_at_path};

use crate::theme::ThemeState;

pub use chart::{ChartRender, ChartStatus, ChartView};
pub use columns::{ColumnsRender, render_columns};
pub use image::{ImageRender, ImageView};
pub use link_preview::{LinkPreviewRender, LinkPreviewView};

/// Addresses one atomic node by its stable id, wherever it currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    id: String,
    kind: NodeKind,
}

impl NodeHandle {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Current attributes, if the node still exists with the same kind.
    pub fn attrs<'a>(&self, editor: &'a Editor) -> Option<&'a Attrs> {
        let path = find_node_by_id(editor.doc(), &self.id)?;
        let node = node_at_path(editor.doc(), &path)?;
        if !node.is_kind(self.kind) {
            return None;
        }
        node.attrs()
    }

    /// Write `patch` into the node as a transaction. Returns false when the
    /// node is gone; the write is then dropped.
    pub fn update_attributes(&self, editor: &mut Editor, patch: AttrPatch) -> bool {
        self.write_attributes(editor, patch, true)
    }

    /// Write fetched data into the node without making it an undo step.
    pub fn store_fetched_attributes(&self, editor: &mut Editor, patch: AttrPatch) -> bool {
        self.write_attributes(editor, patch, false)
    }

    fn write_attributes(&self, editor: &mut Editor, patch: AttrPatch, add_to_history: bool) -> bool {
        let Some(path) = find_node_by_id(editor.doc(), &self.id) else {
            tracing::debug!(id = %self.id, "widget write after its node was removed, dropping");
            return false;
        };
        let written = if add_to_history {
            editor.set_node_attrs(&path, self.kind, patch)
        } else {
            editor.set_node_attrs_without_history(&path, self.kind, patch)
        };
        match written {
            Ok(landed) => landed,
            Err(err) => {
                tracing::warn!(id = %self.id, "widget attribute write failed: {err}");
                false
            }
        }
    }

    /// The widget's own delete control.
    pub fn remove(&self, editor: &mut Editor) -> bool {
        match editor.remove_node_by_id(&self.id) {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!(id = %self.id, "widget delete failed: {err}");
                false
            }
        }
    }
}

pub enum NodeView {
    Image(ImageView),
    Chart(ChartView),
    LinkPreview(LinkPreviewView),
}

impl NodeView {
    fn mount(id: &str, kind: NodeKind, theme: &ThemeState) -> Option<Self> {
        let handle = NodeHandle::new(id, kind);
        match kind {
            NodeKind::Image => Some(NodeView::Image(ImageView::new(handle))),
            NodeKind::ChartBlock => Some(NodeView::Chart(ChartView::new(handle, theme))),
            NodeKind::LinkPreviewBlock => Some(NodeView::LinkPreview(LinkPreviewView::new(handle))),
            _ => None,
        }
    }

    pub fn handle(&self) -> &NodeHandle {
        match self {
            NodeView::Image(v) => v.handle(),
            NodeView::Chart(v) => v.handle(),
            NodeView::LinkPreview(v) => v.handle(),
        }
    }

    pub fn render(&self, editor: &Editor) -> Option<WidgetRender> {
        match self {
            NodeView::Image(v) => v.render(editor).map(WidgetRender::Image),
            NodeView::Chart(v) => v.render(editor).map(WidgetRender::Chart),
            NodeView::LinkPreview(v) => v.render(editor).map(WidgetRender::LinkPreview),
        }
    }
}

/// What the host draws for one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum WidgetRender {
    Image(ImageRender),
    Chart(ChartRender),
    LinkPreview(LinkPreviewRender),
    Columns(ColumnsRender),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mounted: Vec<String>,
    pub unmounted: Vec<String>,
}

/// Registry of mounted widgets, reconciled against the document after every
/// transaction.
#[derive(Default)]
pub struct NodeViewRegistry {
    views: BTreeMap<String, NodeView>,
}

fn atomic_ids(nodes: &[Node], out: &mut Vec<(String, NodeKind)>) {
    for node in nodes {
        match node {
            Node::Void(v) => {
                if let Some(id) = node.id() {
                    out.push((id.to_string(), v.kind));
                }
            }
            Node::Element(el) => atomic_ids(&el.children, out),
            Node::Text(_) => {}
        }
    }
}

impl NodeViewRegistry {
    /// Mount views for new atomic nodes and unmount views whose node is gone.
    pub fn sync(&mut self, doc: &Document, theme: &ThemeState) -> SyncReport {
        let mut present = Vec::new();
        atomic_ids(&doc.children, &mut present);

        let mut report = SyncReport::default();
        let stale: Vec<String> = self
            .views
            .iter()
            .filter(|(id, view)| {
                !present
                    .iter()
                    .any(|(pid, kind)| pid == *id && *kind == view.handle().kind())
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            self.views.remove(&id);
            report.unmounted.push(id);
        }

        for (id, kind) in present {
            if self.views.contains_key(&id) {
                continue;
            }
            if let Some(view) = NodeView::mount(&id, kind, theme) {
                self.views.insert(id.clone(), view);
                report.mounted.push(id);
            }
        }
        report
    }

    /// Drop every view, e.g. when the whole note is replaced.
    pub fn clear(&mut self) -> Vec<String> {
        let ids = self.views.keys().cloned().collect();
        self.views.clear();
        ids
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NodeView> {
        self.views.get(id)
    }

    pub fn chart_mut(&mut self, id: &str) -> Option<&mut ChartView> {
        match self.views.get_mut(id) {
            Some(NodeView::Chart(view)) => Some(view),
            _ => None,
        }
    }

    pub fn charts_mut(&mut self) -> impl Iterator<Item = &mut ChartView> {
        self.views.values_mut().filter_map(|view| match view {
            NodeView::Chart(chart) => Some(chart),
            _ => None,
        })
    }

    /// Render models in document order, two-column layouts included.
    pub fn render(&self, editor: &Editor) -> Vec<WidgetRender> {
        let mut out = Vec::new();
        self.render_nodes(editor, &editor.doc().children, &mut Vec::new(), &mut out);
        out
    }

    fn render_nodes(&self, editor: &Editor, nodes: &[Node], path: &mut Vec<usize>, out: &mut Vec<WidgetRender>) {
        for (ix, node) in nodes.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Void(_) => {
                    if let Some(render) = node.id().and_then(|id| self.views.get(id)).and_then(|v| v.render(editor)) {
                        out.push(render);
                    }
                }
                Node::Element(el) => {
                    if el.kind == NodeKind::TwoColumnBlock {
                        out.push(WidgetRender::Columns(render_columns(path, el)));
                    }
                    self.render_nodes(editor, &el.children, path, out);
                }
                Node::Text(_) => {}
            }
            path.pop();
        }
    }
}
