use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use manos_notes_core::EditorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("endpoint template `{0}` is missing the `{{id}}` placeholder")]
    MissingPlaceholder(String),
}

/// Paths of the backend endpoints the fetchers talk to. `{id}` is replaced by
/// the chart id, `{url}` by the percent-encoded link.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub chart_dashboard: String,
    pub chart_store: String,
    pub chart_refresh: String,
    pub link_metadata: String,
    pub image_upload: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            chart_dashboard: "/api/dashboard/charts/{id}/figure".into(),
            chart_store: "/api/charts/{id}/figure".into(),
            chart_refresh: "/api/charts/{id}/figure?refresh=true".into(),
            link_metadata: "/api/link-preview?url={url}".into(),
            image_upload: "/api/uploads/images".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub editor: EditorConfig,
    /// Delay before the gutter hides after the pointer leaves it.
    pub gutter_hide_delay_ms: u64,
    /// Images above this many bytes are downscaled before upload.
    pub compress_threshold_bytes: usize,
    pub compress_max_edge: u32,
    pub compress_quality: u8,
    /// Gap between an anchor and the menu placed next to it.
    pub menu_gap: f32,
    pub slash_menu_width: f32,
    pub slash_row_height: f32,
    pub slash_max_rows: usize,
    pub table_rows: usize,
    pub table_cols: usize,
    pub endpoints: EndpointConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default(),
            gutter_hide_delay_ms: 150,
            compress_threshold_bytes: 1_500_000,
            compress_max_edge: 2048,
            compress_quality: 82,
            menu_gap: 6.0,
            slash_menu_width: 260.0,
            slash_row_height: 36.0,
            slash_max_rows: 8,
            table_rows: 3,
            table_cols: 3,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let charts = [
            &self.endpoints.chart_dashboard,
            &self.endpoints.chart_store,
            &self.endpoints.chart_refresh,
        ];
        match charts.into_iter().find(|t| !t.contains("{id}")) {
            Some(template) => Err(ConfigError::MissingPlaceholder(template.clone())),
            None => Ok(()),
        }
    }

    pub fn gutter_hide_delay(&self) -> Duration {
        Duration::from_millis(self.gutter_hide_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SessionConfig::from_json(
            r#"{"gutter_hide_delay_ms": 400, "editor": {"max_undo": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.gutter_hide_delay(), Duration::from_millis(400));
        assert_eq!(config.editor.max_undo, 10);
        assert_eq!(config.editor.max_normalize_iterations, 100);
        assert_eq!(config.compress_max_edge, 2048);
        assert_eq!(config.endpoints.chart_store, "/api/charts/{id}/figure");
    }

    #[test]
    fn chart_templates_need_an_id() {
        let err = SessionConfig::from_json(r#"{"endpoints": {"chart_store": "/api/charts"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingPlaceholder(t) if t == "/api/charts"));
    }
}
