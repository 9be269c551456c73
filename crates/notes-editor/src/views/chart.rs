use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use manos_notes_core::{AttrPatch, ChartAttrs, Editor};

use super::NodeHandle;
use crate::error::FetchError;
use crate::fetch::ChartFigure;
use crate::theme::{Subscription, ThemeMode, ThemeState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartStatus {
    Idle,
    Loading,
    /// Every tier failed; the widget shows the message and a retry action.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRender {
    pub id: String,
    pub chart_id: String,
    pub chart_name: Option<String>,
    pub height_px: u32,
    pub figure_json: Option<String>,
    pub snapshot_at: Option<String>,
    pub theme: ThemeMode,
    #[serde(flatten)]
    pub status: ChartStatus,
    pub can_retry: bool,
}

/// Frozen chart embed. The figure is fetched once, stored in the node and
/// never re-fetched per render; the theme is applied at render time only.
pub struct ChartView {
    handle: NodeHandle,
    status: ChartStatus,
    theme: Rc<Cell<ThemeMode>>,
    restyle: Rc<Cell<bool>>,
    _subscription: Subscription,
}

impl ChartView {
    pub(super) fn new(handle: NodeHandle, theme_state: &ThemeState) -> Self {
        let theme = Rc::new(Cell::new(theme_state.mode()));
        let restyle = Rc::new(Cell::new(false));
        let subscription = {
            let theme = theme.clone();
            let restyle = restyle.clone();
            theme_state.subscribe(move |mode| {
                theme.set(mode);
                restyle.set(true);
            })
        };
        Self {
            handle,
            status: ChartStatus::Idle,
            theme,
            restyle,
            _subscription: subscription,
        }
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn status(&self) -> &ChartStatus {
        &self.status
    }

    pub fn attrs(&self, editor: &Editor) -> Option<ChartAttrs> {
        self.handle.attrs(editor).map(ChartAttrs::from_attrs)
    }

    /// Whether the figure still has to be fetched.
    pub fn needs_fetch(&self, editor: &Editor) -> bool {
        self.status == ChartStatus::Idle && self.attrs(editor).is_some_and(|a| !a.has_snapshot())
    }

    /// Mark the fetch as started; returns the chart id to resolve.
    pub fn begin_fetch(&mut self, editor: &Editor) -> Option<String> {
        if !self.needs_fetch(editor) {
            return None;
        }
        let chart_id = self.attrs(editor)?.chart_id;
        self.status = ChartStatus::Loading;
        Some(chart_id)
    }

    /// Store the fetched figure as a snapshot taken at `now`, or switch to
    /// the error state. Returns whether the node was updated.
    pub fn finish_fetch(
        &mut self,
        editor: &mut Editor,
        result: Result<ChartFigure, FetchError>,
        now: DateTime<Utc>,
    ) -> bool {
        match result {
            Ok(figure) => {
                self.status = ChartStatus::Idle;
                let patch = AttrPatch::set("figure_json", figure.figure_json)
                    .with("snapshot_at", now.to_rfc3339_opts(SecondsFormat::Secs, true));
                self.handle.store_fetched_attributes(editor, patch)
            }
            Err(err) => {
                tracing::warn!(id = %self.handle.id(), "chart snapshot unavailable: {err}");
                self.status = ChartStatus::Failed {
                    message: "Chart could not be loaded".to_string(),
                };
                false
            }
        }
    }

    /// The retry action of the error state. Returns true when a new fetch
    /// is due.
    pub fn retry(&mut self) -> bool {
        if matches!(self.status, ChartStatus::Failed { .. }) {
            self.status = ChartStatus::Idle;
            true
        } else {
            false
        }
    }

    pub fn set_height(&self, editor: &mut Editor, height_px: f64) -> bool {
        self.handle
            .update_attributes(editor, ChartAttrs::height_patch(height_px))
    }

    /// True once after each theme change; the host re-styles the plot.
    pub fn take_restyle(&self) -> bool {
        self.restyle.replace(false)
    }

    pub fn render(&self, editor: &Editor) -> Option<ChartRender> {
        let attrs = self.attrs(editor)?;
        Some(ChartRender {
            id: self.handle.id().to_string(),
            chart_id: attrs.chart_id,
            chart_name: attrs.chart_name,
            height_px: attrs.height,
            figure_json: attrs.figure_json,
            snapshot_at: attrs.snapshot_at,
            theme: self.theme.get(),
            can_retry: matches!(self.status, ChartStatus::Failed { .. }),
            status: self.status.clone(),
        })
    }
}
