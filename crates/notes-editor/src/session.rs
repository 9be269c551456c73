//! One mounted editor: the document engine plus every piece of view state
//! around it.

use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;

use manos_notes_core::{
    CommandError, Document, Editor, ImageAttrs, MarkupError, NodeKind, Point, Schema, Selection, TabOutcome,
};

use crate::bubble::{BubbleAction, BubbleMenu};
use crate::config::SessionConfig;
use crate::error::{FetchError, IngestError};
use crate::fetch::{ChartFigure, ChartSource, ImageFile, ImageUploader, LinkMetadata, LinkMetadataSource, fetch_chart_figure};
use crate::geometry::{EditorLayout, Point2, Rect};
use crate::gesture::{GestureKind, GestureSlot, ResizeAxis, ResizeGesture};
use crate::gutter::{DragPayload, DropOutcome, DropPayload, Gutter};
use crate::ingest::{ClipboardSink, Compression, Notice, PasteKind, classify_paste, compress_image, copy_image};
use crate::slash::{ChartOption, PaletteKey, PaletteOutcome, SlashEffect, SlashPalette};
use crate::theme::ThemeState;
use crate::views::{NodeView, NodeViewRegistry, WidgetRender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Tab { shift: bool },
    ArrowUp,
    ArrowDown,
    Escape,
}

#[derive(Debug, PartialEq)]
pub enum KeyOutcome {
    /// Not consumed; the host applies its default.
    Ignored,
    Handled,
    Tab(TabOutcome),
    Slash(SlashEffect),
}

/// A chart figure request started under document `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFetch {
    pub node_id: String,
    pub chart_id: String,
    pub generation: u64,
}

/// A URL paste waiting for its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub url: String,
    /// The text as pasted, inserted when the metadata is unavailable.
    pub raw: String,
    pub selection: Selection,
    pub generation: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PasteOutcome {
    Inserted,
    PendingLink(LinkRequest),
}

type ChangeListener = Box<dyn FnMut(&str)>;

pub struct EditorSession {
    editor: Editor,
    config: SessionConfig,
    theme: ThemeState,
    views: NodeViewRegistry,
    slash: SlashPalette,
    gutter: Gutter,
    bubble: BubbleMenu,
    gestures: GestureSlot,
    resize: Option<ResizeGesture>,
    on_change: Option<ChangeListener>,
    last_markup: Option<String>,
}

impl EditorSession {
    pub fn new(config: SessionConfig, theme: ThemeState) -> Self {
        let editor = Editor::with_config(
            Document::empty(),
            Selection::collapsed(Point::new(vec![0, 0], 0)),
            Schema::notes(),
            config.editor.clone(),
        );
        let mut session = Self {
            editor,
            slash: SlashPalette::new(&config),
            gutter: Gutter::new(config.gutter_hide_delay()),
            config,
            theme,
            views: NodeViewRegistry::default(),
            bubble: BubbleMenu::default(),
            gestures: GestureSlot::default(),
            resize: None,
            on_change: None,
            last_markup: None,
        };
        session.views.sync(session.editor.doc(), &session.theme);
        session.last_markup = session.editor.to_markup().ok();
        session
    }

    /// Open a session on `markup`. Unreadable markup starts an empty note.
    pub fn with_markup(config: SessionConfig, theme: ThemeState, markup: &str) -> Self {
        let mut session = Self::new(config, theme);
        if let Err(err) = session.load_markup(markup) {
            tracing::warn!("could not load note markup, starting empty: {err}");
        }
        session
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    pub fn views(&self) -> &NodeViewRegistry {
        &self.views
    }

    pub fn slash(&self) -> &SlashPalette {
        &self.slash
    }

    pub fn gutter(&self) -> &Gutter {
        &self.gutter
    }

    pub fn gutter_mut(&mut self) -> &mut Gutter {
        &mut self.gutter
    }

    pub fn bubble(&self) -> &BubbleMenu {
        &self.bubble
    }

    pub fn gestures(&self) -> &GestureSlot {
        &self.gestures
    }

    /// Called with the serialized note after every change that altered it.
    pub fn on_change(&mut self, listener: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    /// Swap in another note. Overlays, widgets and gestures of the previous
    /// note are discarded; the new markup is not reported as a change.
    pub fn load_markup(&mut self, markup: &str) -> Result<(), MarkupError> {
        self.editor.load_markup(markup)?;
        self.slash.close();
        self.slash.close_chart_picker();
        self.gutter.cancel_drag();
        self.bubble = BubbleMenu::default();
        self.resize = None;
        self.gestures.end();
        self.views.clear();
        self.views.sync(self.editor.doc(), &self.theme);
        self.last_markup = self.editor.to_markup().ok();
        Ok(())
    }

    pub fn markup(&self) -> Result<String, MarkupError> {
        self.editor.to_markup()
    }

    pub fn render_widgets(&self) -> Vec<WidgetRender> {
        self.views.render(&self.editor)
    }

    /// Reconcile everything that derives from the document after an edit.
    fn after_change(&mut self) {
        let report = self.views.sync(self.editor.doc(), &self.theme);
        for id in &report.unmounted {
            if self.gestures.end_for_node(id) {
                tracing::debug!(%id, "gesture ended with its widget");
            }
            if self.resize.as_ref().is_some_and(|r| &r.node_id == id) {
                self.resize = None;
            }
        }
        self.slash.update(&self.editor);
        self.bubble.selection_changed(&self.editor);
        self.emit_change();
    }

    fn emit_change(&mut self) {
        let markup = match self.editor.to_markup() {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!("could not serialize note: {err}");
                return;
            }
        };
        if self.last_markup.as_deref() == Some(markup.as_str()) {
            return;
        }
        if let Some(listener) = self.on_change.as_mut() {
            listener(&markup);
        }
        self.last_markup = Some(markup);
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.editor.set_selection(selection);
        self.slash.update(&self.editor);
        self.bubble.selection_changed(&self.editor);
    }

    pub fn type_text(&mut self, text: &str) -> Result<(), CommandError> {
        self.editor.insert_text(text)?;
        self.slash.on_text_input(&self.editor, text);
        self.after_change();
        Ok(())
    }

    pub fn handle_key(&mut self, key: Key, layout: Option<&dyn EditorLayout>) -> Result<KeyOutcome, CommandError> {
        let palette_key = match key {
            Key::Enter => Some(PaletteKey::Enter),
            Key::ArrowUp => Some(PaletteKey::Up),
            Key::ArrowDown => Some(PaletteKey::Down),
            Key::Escape => Some(PaletteKey::Escape),
            Key::Backspace | Key::Tab { .. } => None,
        };
        if let Some(palette_key) = palette_key {
            match self.slash.handle_key(&mut self.editor, palette_key, layout)? {
                PaletteOutcome::Ignored => {}
                PaletteOutcome::Handled => return Ok(KeyOutcome::Handled),
                PaletteOutcome::Executed(effect) => {
                    self.after_change();
                    return Ok(KeyOutcome::Slash(effect));
                }
            }
        }

        let outcome = match key {
            Key::Enter => {
                self.editor.split_block()?;
                KeyOutcome::Handled
            }
            Key::Backspace => {
                self.editor.delete_backward()?;
                KeyOutcome::Handled
            }
            Key::Tab { shift } => KeyOutcome::Tab(self.editor.handle_tab(shift)?),
            Key::Escape => {
                if self.slash.chart_picker().is_none() {
                    return Ok(KeyOutcome::Ignored);
                }
                self.slash.close_chart_picker();
                return Ok(KeyOutcome::Handled);
            }
            Key::ArrowUp | Key::ArrowDown => return Ok(KeyOutcome::Ignored),
        };
        self.after_change();
        Ok(outcome)
    }

    pub fn undo(&mut self) -> bool {
        let done = self.editor.undo();
        if done {
            self.after_change();
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.editor.redo();
        if done {
            self.after_change();
        }
        done
    }

    /// Run any editor command and reconcile afterwards.
    pub fn command<R>(&mut self, f: impl FnOnce(&mut Editor) -> Result<R, CommandError>) -> Result<R, CommandError> {
        let out = f(&mut self.editor)?;
        self.after_change();
        Ok(out)
    }

    pub fn bubble_action(&mut self, action: BubbleAction) -> Result<(), CommandError> {
        self.bubble.dispatch(&mut self.editor, action)?;
        self.after_change();
        Ok(())
    }

    pub fn pointer_down(&mut self, at: Point2, menu: Option<Rect>, layout: &dyn EditorLayout) {
        self.bubble.pointer_down(&self.editor, at, menu, layout.editor_rect());
    }

    pub fn slash_hover(&mut self, ix: usize) {
        self.slash.hover(ix);
    }

    pub fn pick_chart(&mut self, chart: &ChartOption) -> Result<String, CommandError> {
        let id = self.slash.pick_chart(&mut self.editor, chart)?;
        self.after_change();
        Ok(id)
    }

    /// The widget's delete control.
    pub fn remove_widget(&mut self, id: &str) -> bool {
        let removed = self.views.get(id).is_some_and(|view| view.handle().remove(&mut self.editor));
        if removed {
            self.after_change();
        }
        removed
    }

    pub fn copy_image(&self, id: &str, sink: &mut dyn ClipboardSink) -> Option<Notice> {
        let Some(NodeView::Image(view)) = self.views.get(id) else {
            return Some(Notice::new("Image not found"));
        };
        match view.attrs(&self.editor) {
            Some(attrs) => copy_image(sink, &attrs.src),
            None => Some(Notice::new("Image not found")),
        }
    }

    // Charts

    /// Start a fetch for every chart widget without a snapshot.
    pub fn pending_chart_fetches(&mut self) -> Vec<ChartFetch> {
        let generation = self.editor.generation();
        let editor = &self.editor;
        self.views
            .charts_mut()
            .filter_map(|view| {
                let chart_id = view.begin_fetch(editor)?;
                Some(ChartFetch {
                    node_id: view.handle().id().to_string(),
                    chart_id,
                    generation,
                })
            })
            .collect()
    }

    /// Apply a finished fetch. Results for another note or for a chart that
    /// was deleted meanwhile are dropped.
    pub fn complete_chart_fetch(&mut self, fetch: &ChartFetch, result: Result<ChartFigure, FetchError>) -> bool {
        if fetch.generation != self.editor.generation() {
            tracing::debug!(node_id = %fetch.node_id, "chart figure arrived for a previous note, dropping");
            return false;
        }
        let Some(view) = self.views.chart_mut(&fetch.node_id) else {
            tracing::debug!(node_id = %fetch.node_id, "chart figure arrived after its block was removed, dropping");
            return false;
        };
        let written = view.finish_fetch(&mut self.editor, result, Utc::now());
        self.after_change();
        written
    }

    /// Fetch every outstanding chart figure through `source`.
    pub async fn refresh_charts(&mut self, source: &dyn ChartSource) -> usize {
        let fetches = self.pending_chart_fetches();
        let results = join_all(fetches.iter().map(|f| fetch_chart_figure(source, &f.chart_id))).await;
        let mut written = 0;
        for (fetch, result) in fetches.iter().zip(results) {
            if self.complete_chart_fetch(fetch, result) {
                written += 1;
            }
        }
        written
    }

    /// The error state's retry action.
    pub fn retry_chart(&mut self, node_id: &str) -> Option<ChartFetch> {
        let generation = self.editor.generation();
        let view = self.views.chart_mut(node_id)?;
        if !view.retry() {
            return None;
        }
        let chart_id = view.begin_fetch(&self.editor)?;
        Some(ChartFetch {
            node_id: node_id.to_string(),
            chart_id,
            generation,
        })
    }

    /// Re-style charts after a theme switch; returns the ids to redraw.
    pub fn charts_to_restyle(&mut self) -> Vec<String> {
        self.views
            .charts_mut()
            .filter(|view| view.take_restyle())
            .map(|view| view.handle().id().to_string())
            .collect()
    }

    // Paste and drop

    /// Plain-text paste. A lone URL becomes a pending link preview request;
    /// everything else is inserted right away.
    pub fn paste_text(&mut self, text: &str) -> Result<PasteOutcome, CommandError> {
        match classify_paste(text) {
            PasteKind::LinkPreview { url, raw } => Ok(PasteOutcome::PendingLink(LinkRequest {
                url,
                raw,
                selection: self.editor.selection().clone(),
                generation: self.editor.generation(),
            })),
            PasteKind::PlainText(text) => {
                self.editor.insert_plain_text(&text)?;
                self.after_change();
                Ok(PasteOutcome::Inserted)
            }
        }
    }

    /// Finish a URL paste: a preview card on success, the raw URL as text
    /// otherwise. Returns false when the note changed in between.
    pub fn complete_link_paste(&mut self, request: LinkRequest, result: Result<LinkMetadata, FetchError>) -> Result<bool, CommandError> {
        if request.generation != self.editor.generation() {
            tracing::debug!(url = %request.url, "link metadata arrived for a previous note, dropping");
            return Ok(false);
        }
        self.editor.set_selection(request.selection);
        match result {
            Ok(metadata) => {
                self.editor.insert_link_preview(metadata.into_attrs(request.url))?;
            }
            Err(err) => {
                tracing::debug!(url = %request.url, "link metadata unavailable, pasting as text: {err}");
                self.editor.insert_text(&request.raw)?;
            }
        }
        self.after_change();
        Ok(true)
    }

    pub async fn paste_text_with(&mut self, text: &str, source: &dyn LinkMetadataSource) -> Result<(), CommandError> {
        if let PasteOutcome::PendingLink(request) = self.paste_text(text)? {
            let result = source.fetch_metadata(&request.url).await;
            self.complete_link_paste(request, result)?;
        }
        Ok(())
    }

    /// Compress, upload and insert pasted or dropped images, in order.
    /// Returns the new node id per file, or why that file was skipped.
    pub async fn ingest_images(&mut self, files: Vec<ImageFile>, uploader: &dyn ImageUploader) -> Vec<Result<String, IngestError>> {
        let compression = Compression::from(&self.config);
        let mut out = Vec::with_capacity(files.len());
        for file in files.into_iter().filter(ImageFile::is_image) {
            let generation = self.editor.generation();
            let file = compress_image(file, compression);
            let uploaded = match uploader.upload(&file).await {
                Ok(uploaded) => uploaded,
                Err(source) => {
                    tracing::warn!(name = %file.name, "image upload failed: {source}");
                    out.push(Err(IngestError::Upload {
                        name: file.name,
                        source,
                    }));
                    continue;
                }
            };
            if generation != self.editor.generation() {
                out.push(Err(IngestError::Stale(file.name)));
                continue;
            }
            let mut attrs = ImageAttrs::new(uploaded.url);
            attrs.alt = uploaded.filename.or(Some(file.name));
            let inserted = self.editor.insert_image(attrs).map_err(IngestError::from);
            if inserted.is_ok() {
                self.after_change();
            }
            out.push(inserted);
        }
        out
    }

    // Gutter

    /// Pointer moved over the editing surface at height `y`.
    pub fn hover_gutter(&mut self, layout: &dyn EditorLayout, y: f32, now: Instant) {
        self.gutter.pointer_move(&self.editor, layout, y, now);
    }

    pub fn gutter_insert_below(&mut self) -> Result<(), CommandError> {
        self.gutter.insert_below(&mut self.editor)?;
        self.after_change();
        Ok(())
    }

    /// Grip pressed. `release` drops the host's pointer capture when the
    /// drag ends for any reason.
    pub fn start_block_drag(&mut self, release: impl FnOnce() + 'static) -> Option<DragPayload> {
        let payload = self.gutter.start_drag(&mut self.editor)?;
        if let Some(from) = self.gutter.drag_source() {
            self.gestures.begin(GestureKind::BlockDrag { from }, release);
        }
        self.bubble.selection_changed(&self.editor);
        Some(payload)
    }

    pub fn drop_at(&mut self, layout: &dyn EditorLayout, payload: DropPayload, y: f32) -> Result<DropOutcome, CommandError> {
        if matches!(self.gestures.active(), Some(GestureKind::BlockDrag { .. })) {
            self.gestures.end();
        }
        let outcome = self.gutter.drop(&mut self.editor, layout, payload, y)?;
        if matches!(outcome, DropOutcome::Moved { .. }) {
            self.after_change();
        }
        Ok(outcome)
    }

    pub fn cancel_block_drag(&mut self) {
        self.gutter.cancel_drag();
        if matches!(self.gestures.active(), Some(GestureKind::BlockDrag { .. })) {
            self.gestures.end();
        }
    }

    // Resize

    /// Pointer down on an image or chart resize handle.
    pub fn begin_resize(&mut self, node_id: &str, origin: Point2, layout: &dyn EditorLayout, release: impl FnOnce() + 'static) -> bool {
        let (axis, kind) = match self.views.get(node_id) {
            Some(NodeView::Image(view)) => match view.attrs(&self.editor) {
                Some(attrs) => (
                    ResizeAxis::Width {
                        start_pct: f64::from(attrs.width),
                        content_width: layout.content_width(),
                    },
                    GestureKind::ImageResize {
                        node_id: node_id.to_string(),
                    },
                ),
                None => return false,
            },
            Some(NodeView::Chart(view)) => match view.attrs(&self.editor) {
                Some(attrs) => (
                    ResizeAxis::Height {
                        start_px: f64::from(attrs.height),
                    },
                    GestureKind::ChartResize {
                        node_id: node_id.to_string(),
                    },
                ),
                None => return false,
            },
            _ => return false,
        };
        self.end_resize();
        self.gestures.begin(kind, release);
        self.resize = Some(ResizeGesture::new(node_id, origin, axis));
        true
    }

    /// Returns true when the host should schedule an animation frame.
    pub fn resize_move(&mut self, pointer: Point2) -> bool {
        self.resize.as_mut().is_some_and(|r| r.pointer_move(pointer))
    }

    /// The animation frame: write the newest size into the node.
    pub fn resize_frame(&mut self) -> bool {
        let Some(resize) = self.resize.as_mut() else {
            return false;
        };
        let Some(value) = resize.frame() else {
            return false;
        };
        let node_id = resize.node_id.clone();
        let written = match self.views.get(&node_id) {
            Some(NodeView::Image(view)) => view.set_width(&mut self.editor, f64::from(value)),
            Some(NodeView::Chart(view)) => view.set_height(&mut self.editor, f64::from(value)),
            _ => false,
        };
        if written {
            self.after_change();
        }
        written
    }

    /// Pointer up or cancel. A value still waiting for its frame is written.
    pub fn end_resize(&mut self) {
        if self.resize.is_some() {
            self.resize_frame();
        }
        self.resize = None;
        if matches!(
            self.gestures.active(),
            Some(GestureKind::ImageResize { .. } | GestureKind::ChartResize { .. })
        ) {
            self.gestures.end();
        }
    }

    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.views.get(id).map(|v| v.handle().kind())
    }
}
