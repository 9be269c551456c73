use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AttrPatch, Attrs, Node};
use crate::schema::{
    DEFAULT_CHART_HEIGHT_PX, MAX_CHART_HEIGHT_PX, MAX_IMAGE_WIDTH_PCT, MIN_CHART_HEIGHT_PX,
    MIN_IMAGE_WIDTH_PCT, NodeKind,
};

/// Clamp any width candidate into the stored percentage range.
///
/// Non-finite input falls back to full width.
pub fn clamp_image_width(pct: f64) -> u32 {
    if !pct.is_finite() {
        return MAX_IMAGE_WIDTH_PCT as u32;
    }
    pct.round()
        .clamp(MIN_IMAGE_WIDTH_PCT as f64, MAX_IMAGE_WIDTH_PCT as f64) as u32
}

/// Clamp any height candidate into the stored pixel range.
///
/// Non-finite input falls back to the default chart height.
pub fn clamp_chart_height(px: f64) -> u32 {
    if !px.is_finite() {
        return DEFAULT_CHART_HEIGHT_PX as u32;
    }
    px.round()
        .clamp(MIN_CHART_HEIGHT_PX as f64, MAX_CHART_HEIGHT_PX as f64) as u32
}

pub fn new_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A heading's stored level. Integral floats such as `2.0` count.
pub(crate) fn stored_heading_level(attrs: &Attrs) -> Option<i64> {
    let level = attrs.get("level")?;
    level.as_i64().or_else(|| {
        level
            .as_f64()
            .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() <= i64::MAX as f64)
            .map(|v| v as i64)
    })
}

fn attr_string(attrs: &Attrs, key: &str) -> Option<String> {
    attrs
        .get(key)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn attr_number(attrs: &Attrs, key: &str) -> Option<f64> {
    match attrs.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches(['%', 'x', 'p']).parse().ok(),
        _ => None,
    }
}

fn put(attrs: &mut Attrs, key: &str, value: Option<String>) {
    if let Some(value) = value {
        attrs.insert(key.to_string(), Value::String(value));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttrs {
    pub id: Option<String>,
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    /// Percentage of the content width, always within [20, 100].
    pub width: u32,
}

impl ImageAttrs {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            id: Some(new_node_id()),
            src: src.into(),
            alt: None,
            title: None,
            width: MAX_IMAGE_WIDTH_PCT as u32,
        }
    }

    pub fn from_attrs(attrs: &Attrs) -> Self {
        Self {
            id: attr_string(attrs, "id"),
            src: attr_string(attrs, "src").unwrap_or_default(),
            alt: attr_string(attrs, "alt"),
            title: attr_string(attrs, "title"),
            width: attr_number(attrs, "width")
                .map(clamp_image_width)
                .unwrap_or(MAX_IMAGE_WIDTH_PCT as u32),
        }
    }

    pub fn into_attrs(self) -> Attrs {
        let mut attrs = Attrs::new();
        put(&mut attrs, "id", self.id);
        attrs.insert("src".to_string(), Value::String(self.src));
        put(&mut attrs, "alt", self.alt);
        put(&mut attrs, "title", self.title);
        attrs.insert(
            "width".to_string(),
            Value::from(clamp_image_width(self.width as f64)),
        );
        attrs
    }

    pub fn into_node(self) -> Node {
        Node::void(NodeKind::Image, self.into_attrs())
    }

    pub fn width_patch(width_pct: f64) -> AttrPatch {
        AttrPatch::set("width", clamp_image_width(width_pct))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAttrs {
    pub id: Option<String>,
    pub chart_id: String,
    pub chart_name: Option<String>,
    /// Frozen figure definition; `None` until the first successful fetch.
    pub figure_json: Option<String>,
    /// RFC 3339 timestamp of the snapshot.
    pub snapshot_at: Option<String>,
    pub height: u32,
}

impl ChartAttrs {
    pub fn new(chart_id: impl Into<String>, chart_name: Option<String>) -> Self {
        Self {
            id: Some(new_node_id()),
            chart_id: chart_id.into(),
            chart_name,
            figure_json: None,
            snapshot_at: None,
            height: DEFAULT_CHART_HEIGHT_PX as u32,
        }
    }

    pub fn from_attrs(attrs: &Attrs) -> Self {
        Self {
            id: attr_string(attrs, "id"),
            chart_id: attr_string(attrs, "chart_id").unwrap_or_default(),
            chart_name: attr_string(attrs, "chart_name"),
            figure_json: attr_string(attrs, "figure_json").filter(|s| !s.is_empty()),
            snapshot_at: attr_string(attrs, "snapshot_at"),
            height: attr_number(attrs, "height")
                .map(clamp_chart_height)
                .unwrap_or(DEFAULT_CHART_HEIGHT_PX as u32),
        }
    }

    pub fn into_attrs(self) -> Attrs {
        let mut attrs = Attrs::new();
        put(&mut attrs, "id", self.id);
        attrs.insert("chart_id".to_string(), Value::String(self.chart_id));
        put(&mut attrs, "chart_name", self.chart_name);
        put(&mut attrs, "figure_json", self.figure_json);
        put(&mut attrs, "snapshot_at", self.snapshot_at);
        attrs.insert(
            "height".to_string(),
            Value::from(clamp_chart_height(self.height as f64)),
        );
        attrs
    }

    pub fn into_node(self) -> Node {
        Node::void(NodeKind::ChartBlock, self.into_attrs())
    }

    pub fn has_snapshot(&self) -> bool {
        self.figure_json.is_some()
    }

    pub fn height_patch(height_px: f64) -> AttrPatch {
        AttrPatch::set("height", clamp_chart_height(height_px))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkPreviewAttrs {
    pub id: Option<String>,
    pub url: String,
    /// Badge shown on the card ("link", "video", "article", ...).
    pub kind: String,
    pub provider: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl LinkPreviewAttrs {
    pub fn from_attrs(attrs: &Attrs) -> Self {
        Self {
            id: attr_string(attrs, "id"),
            url: attr_string(attrs, "url").unwrap_or_default(),
            kind: attr_string(attrs, "kind").unwrap_or_else(|| "link".to_string()),
            provider: attr_string(attrs, "provider"),
            title: attr_string(attrs, "title"),
            subtitle: attr_string(attrs, "subtitle"),
            description: attr_string(attrs, "description"),
            image_url: attr_string(attrs, "image_url"),
        }
    }

    pub fn into_attrs(self) -> Attrs {
        let mut attrs = Attrs::new();
        put(&mut attrs, "id", self.id);
        attrs.insert("url".to_string(), Value::String(self.url));
        let kind = if self.kind.is_empty() {
            "link".to_string()
        } else {
            self.kind
        };
        attrs.insert("kind".to_string(), Value::String(kind));
        put(&mut attrs, "provider", self.provider);
        put(&mut attrs, "title", self.title);
        put(&mut attrs, "subtitle", self.subtitle);
        put(&mut attrs, "description", self.description);
        put(&mut attrs, "image_url", self.image_url);
        attrs
    }

    pub fn into_node(mut self) -> Node {
        if self.id.is_none() {
            self.id = Some(new_node_id());
        }
        Node::void(NodeKind::LinkPreviewBlock, self.into_attrs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_clamps_and_rounds() {
        assert_eq!(clamp_image_width(5.0), 20);
        assert_eq!(clamp_image_width(55.4), 55);
        assert_eq!(clamp_image_width(240.0), 100);
        assert_eq!(clamp_image_width(f64::NAN), 100);
    }

    #[test]
    fn height_clamps_and_rounds() {
        assert_eq!(clamp_chart_height(-10.0), 180);
        assert_eq!(clamp_chart_height(1_000.0), 900);
        assert_eq!(clamp_chart_height(f64::INFINITY), 360);
    }

    #[test]
    fn stored_string_widths_are_parsed() {
        let mut attrs = Attrs::new();
        attrs.insert("width".into(), Value::String("35%".into()));
        assert_eq!(ImageAttrs::from_attrs(&attrs).width, 35);
    }

    #[test]
    fn chart_attrs_survive_attr_map() {
        let mut chart = ChartAttrs::new("c1", Some("Spread".into()));
        chart.height = 2_000;
        let back = ChartAttrs::from_attrs(&chart.clone().into_attrs());
        assert_eq!(back.chart_id, "c1");
        assert_eq!(back.height, 900);
        assert!(!back.has_snapshot());
    }
}
