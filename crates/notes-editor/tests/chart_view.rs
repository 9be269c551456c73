mod common;

use std::cell::RefCell;

use async_trait::async_trait;
use manos_notes_core::{ChartAttrs, Document, Node, NoteValue, find_node_by_id, node_at_path};
use manos_notes_editor::views::{ChartStatus, WidgetRender};
use manos_notes_editor::{
    ChartFigure, ChartSource, ChartTier, EditorSession, FetchError, ThemeMode,
};

use common::session;

/// Answers only on `succeed_on`, recording every tier asked.
struct TieredCharts {
    succeed_on: Option<ChartTier>,
    calls: RefCell<Vec<(ChartTier, String)>>,
}

impl TieredCharts {
    fn new(succeed_on: Option<ChartTier>) -> Self {
        Self {
            succeed_on,
            calls: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl ChartSource for TieredCharts {
    async fn fetch_figure(&self, tier: ChartTier, chart_id: &str) -> Result<String, FetchError> {
        self.calls.borrow_mut().push((tier, chart_id.to_string()));
        if self.succeed_on == Some(tier) {
            Ok(format!(r#"{{"data":[],"from":"{tier:?}"}}"#))
        } else {
            Err(FetchError::Status(503))
        }
    }
}

fn chart_attrs(session: &EditorSession, id: &str) -> ChartAttrs {
    let path = find_node_by_id(session.editor().doc(), id).unwrap();
    let node = node_at_path(session.editor().doc(), &path).unwrap();
    ChartAttrs::from_attrs(node.attrs().unwrap())
}

fn with_chart() -> (EditorSession, String) {
    let mut session = session();
    let id = session
        .command(|e| e.insert_chart("c1", Some("Rates".into())))
        .unwrap();
    (session, id)
}

#[tokio::test]
async fn third_tier_supplies_the_snapshot() {
    let (mut session, id) = with_chart();
    let charts = TieredCharts::new(Some(ChartTier::Refresh));

    assert_eq!(session.refresh_charts(&charts).await, 1);

    let tiers: Vec<ChartTier> = charts.calls.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(tiers, ChartTier::ORDER.to_vec());
    assert!(charts.calls.borrow().iter().all(|(_, c)| c == "c1"));

    let attrs = chart_attrs(&session, &id);
    assert_eq!(attrs.figure_json.as_deref(), Some(r#"{"data":[],"from":"Refresh"}"#));
    let snapshot_at = attrs.snapshot_at.unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(&snapshot_at).is_ok());

    // Frozen: nothing left to fetch.
    assert!(session.pending_chart_fetches().is_empty());
    assert_eq!(session.refresh_charts(&charts).await, 0);
    assert_eq!(charts.calls.borrow().len(), 3);
}

#[tokio::test]
async fn all_tiers_failing_shows_a_retry() {
    let (mut session, id) = with_chart();
    let charts = TieredCharts::new(None);

    assert_eq!(session.refresh_charts(&charts).await, 0);
    assert_eq!(charts.calls.borrow().len(), 3);

    let widgets = session.render_widgets();
    let [WidgetRender::Chart(chart)] = widgets.as_slice() else {
        panic!("expected one chart widget, got {widgets:?}");
    };
    assert!(chart.can_retry);
    assert_eq!(
        chart.status,
        ChartStatus::Failed {
            message: "Chart could not be loaded".into()
        }
    );
    assert_eq!(chart.figure_json, None);
    assert!(chart_attrs(&session, &id).snapshot_at.is_none());

    // Failed charts are not refetched until retried.
    assert!(session.pending_chart_fetches().is_empty());
    let fetch = session.retry_chart(&id).unwrap();
    assert_eq!(fetch.chart_id, "c1");
    let figure = ChartFigure {
        figure_json: "{}".into(),
        tier: ChartTier::Store,
    };
    assert!(session.complete_chart_fetch(&fetch, Ok(figure)));
    assert_eq!(chart_attrs(&session, &id).figure_json.as_deref(), Some("{}"));
}

#[test]
fn late_results_for_removed_charts_are_dropped() {
    let (mut session, id) = with_chart();
    let fetch = session.pending_chart_fetches().remove(0);

    assert!(session.remove_widget(&id));
    let figure = ChartFigure {
        figure_json: "{}".into(),
        tier: ChartTier::Dashboard,
    };
    assert!(!session.complete_chart_fetch(&fetch, Ok(figure)));
    assert!(find_node_by_id(session.editor().doc(), &id).is_none());
}

#[test]
fn late_results_for_a_previous_note_are_dropped() {
    let (mut session, id) = with_chart();
    let fetch = session.pending_chart_fetches().remove(0);

    // The new note happens to contain a chart with the same node id.
    let markup = session.markup().unwrap();
    session.load_markup(&markup).unwrap();
    assert!(find_node_by_id(session.editor().doc(), &id).is_some());

    let figure = ChartFigure {
        figure_json: "{}".into(),
        tier: ChartTier::Dashboard,
    };
    assert!(!session.complete_chart_fetch(&fetch, Ok(figure)));
    assert_eq!(chart_attrs(&session, &id).figure_json, None);
}

#[test]
fn theme_changes_restyle_without_touching_the_node() {
    let (mut session, id) = with_chart();
    let before = session.markup().unwrap();

    session.theme().set_mode(ThemeMode::Dark);
    assert_eq!(session.charts_to_restyle(), vec![id.clone()]);
    assert!(session.charts_to_restyle().is_empty());
    assert_eq!(session.markup().unwrap(), before);

    let widgets = session.render_widgets();
    let [WidgetRender::Chart(chart)] = widgets.as_slice() else {
        panic!("expected one chart widget");
    };
    assert_eq!(chart.theme, ThemeMode::Dark);

    assert_eq!(session.theme().subscriber_count(), 1);
    session.remove_widget(&id);
    assert_eq!(session.theme().subscriber_count(), 0);
}

#[test]
fn loaded_snapshots_are_not_refetched() {
    let mut attrs = ChartAttrs::new("c9", None);
    attrs.figure_json = Some("{}".into());
    attrs.snapshot_at = Some("2026-01-02T03:04:05Z".into());
    let markup = NoteValue::from_document(Document::new(vec![attrs.into_node(), Node::paragraph("")]))
        .to_markup()
        .unwrap();

    let mut session = session();
    session.load_markup(&markup).unwrap();
    assert_eq!(session.views().len(), 1);
    assert!(session.pending_chart_fetches().is_empty());
}

fn texts(session: &EditorSession) -> Vec<String> {
    session.editor().doc().children.iter().map(Node::text_content).collect()
}

#[test]
fn arriving_figures_stay_out_of_undo_history() {
    let (mut session, id) = with_chart();
    let fetch = session.pending_chart_fetches().remove(0);
    let before = texts(&session);

    session.type_text("abc").unwrap();
    let figure = ChartFigure {
        figure_json: "{}".into(),
        tier: ChartTier::Dashboard,
    };
    assert!(session.complete_chart_fetch(&fetch, Ok(figure)));

    // Undo reverts the typing, not the snapshot.
    assert!(session.undo());
    assert_eq!(texts(&session), before);
    assert_eq!(chart_attrs(&session, &id).figure_json.as_deref(), Some("{}"));
    assert!(session.pending_chart_fetches().is_empty());
}

#[test]
fn arriving_figures_keep_the_redo_stack() {
    let (mut session, id) = with_chart();
    let fetch = session.pending_chart_fetches().remove(0);
    session.type_text("abc").unwrap();
    let typed = texts(&session);
    assert!(session.undo());

    let figure = ChartFigure {
        figure_json: "{}".into(),
        tier: ChartTier::Store,
    };
    assert!(session.complete_chart_fetch(&fetch, Ok(figure)));
    assert!(session.editor().can_redo());
    assert!(session.redo());
    assert_eq!(texts(&session), typed);
    assert!(chart_attrs(&session, &id).has_snapshot());
}
