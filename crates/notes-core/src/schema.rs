use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every node kind a note document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    Blockquote,
    CodeBlock,
    HorizontalRule,
    Table,
    TableRow,
    TableCell,
    Image,
    ChartBlock,
    LinkPreviewBlock,
    TwoColumnBlock,
    Column,
}

impl NodeKind {
    pub const ALL: [NodeKind; 16] = [
        NodeKind::Paragraph,
        NodeKind::Heading,
        NodeKind::BulletList,
        NodeKind::OrderedList,
        NodeKind::ListItem,
        NodeKind::Blockquote,
        NodeKind::CodeBlock,
        NodeKind::HorizontalRule,
        NodeKind::Table,
        NodeKind::TableRow,
        NodeKind::TableCell,
        NodeKind::Image,
        NodeKind::ChartBlock,
        NodeKind::LinkPreviewBlock,
        NodeKind::TwoColumnBlock,
        NodeKind::Column,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading => "heading",
            NodeKind::BulletList => "bullet_list",
            NodeKind::OrderedList => "ordered_list",
            NodeKind::ListItem => "list_item",
            NodeKind::Blockquote => "blockquote",
            NodeKind::CodeBlock => "code_block",
            NodeKind::HorizontalRule => "horizontal_rule",
            NodeKind::Table => "table",
            NodeKind::TableRow => "table_row",
            NodeKind::TableCell => "table_cell",
            NodeKind::Image => "image",
            NodeKind::ChartBlock => "chart_block",
            NodeKind::LinkPreviewBlock => "link_preview_block",
            NodeKind::TwoColumnBlock => "two_column_block",
            NodeKind::Column => "column",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, NodeKind::BulletList | NodeKind::OrderedList)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    /// Atomic node, no children at all.
    None,
    /// Text leaves only.
    InlineOnly,
    /// Any block node.
    BlockOnly,
    ListItemsOnly,
    RowsOnly,
    CellsOnly,
    ColumnsOnly,
}

/// Describes one attribute a node kind understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Inclusive integer range the stored value is clamped into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp: Option<(i64, i64)>,
}

impl AttrSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            clamp: None,
        }
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn clamped(mut self, min: i64, max: i64) -> Self {
        self.clamp = Some((min, max));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: NodeKind,
    /// Atomic nodes have no editable text and are rendered by a widget.
    pub atomic: bool,
    pub children: ChildConstraint,
    #[serde(default)]
    pub attrs: Vec<AttrSpec>,
}

impl NodeSpec {
    pub fn new(kind: NodeKind, children: ChildConstraint) -> Self {
        Self {
            kind,
            atomic: children == ChildConstraint::None,
            children,
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, attr: AttrSpec) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn is_text_block(&self) -> bool {
        self.children == ChildConstraint::InlineOnly
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate node spec for kind {0:?}")]
    Duplicate(NodeKind),
    #[error("missing node spec for kind {0:?}")]
    Missing(NodeKind),
}

/// The closed set of node specs a document is validated against.
///
/// Built once and handed to [`crate::Editor::new`]; there is no runtime
/// registration of new kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    specs: Vec<NodeSpec>,
}

pub const MIN_HEADING_LEVEL: i64 = 1;
pub const MAX_HEADING_LEVEL: i64 = 3;
pub const MIN_IMAGE_WIDTH_PCT: i64 = 20;
pub const MAX_IMAGE_WIDTH_PCT: i64 = 100;
pub const MIN_CHART_HEIGHT_PX: i64 = 180;
pub const MAX_CHART_HEIGHT_PX: i64 = 900;
pub const DEFAULT_CHART_HEIGHT_PX: i64 = 360;

impl Schema {
    pub fn new(specs: impl IntoIterator<Item = NodeSpec>) -> Result<Self, SchemaError> {
        let mut slots: Vec<Option<NodeSpec>> = vec![None; NodeKind::ALL.len()];
        for spec in specs {
            let slot = &mut slots[spec.kind.index()];
            if slot.is_some() {
                return Err(SchemaError::Duplicate(spec.kind));
            }
            *slot = Some(spec);
        }

        let mut specs = Vec::with_capacity(slots.len());
        for (kind, slot) in NodeKind::ALL.iter().zip(slots) {
            specs.push(slot.ok_or(SchemaError::Missing(*kind))?);
        }
        Ok(Self { specs })
    }

    /// The schema used by research notes.
    pub fn notes() -> Self {
        use ChildConstraint::{BlockOnly, CellsOnly, ColumnsOnly, InlineOnly, ListItemsOnly, RowsOnly};
        use serde_json::json;

        let id = || AttrSpec::new("id");
        let mut specs = vec![
            NodeSpec::new(NodeKind::Paragraph, InlineOnly),
            NodeSpec::new(NodeKind::Heading, InlineOnly).attr(
                AttrSpec::new("level")
                    .default_value(json!(1))
                    .clamped(MIN_HEADING_LEVEL, MAX_HEADING_LEVEL),
            ),
            NodeSpec::new(NodeKind::BulletList, ListItemsOnly),
            NodeSpec::new(NodeKind::OrderedList, ListItemsOnly),
            NodeSpec::new(NodeKind::ListItem, BlockOnly),
            NodeSpec::new(NodeKind::Blockquote, BlockOnly),
            NodeSpec::new(NodeKind::CodeBlock, InlineOnly).attr(AttrSpec::new("language")),
            NodeSpec::new(NodeKind::HorizontalRule, ChildConstraint::None).attr(id()),
            NodeSpec::new(NodeKind::Table, RowsOnly),
            NodeSpec::new(NodeKind::TableRow, CellsOnly),
            NodeSpec::new(NodeKind::TableCell, BlockOnly),
            NodeSpec::new(NodeKind::Image, ChildConstraint::None)
                .attr(id())
                .attr(AttrSpec::new("src").default_value(json!("")))
                .attr(AttrSpec::new("alt"))
                .attr(AttrSpec::new("title"))
                .attr(
                    AttrSpec::new("width")
                        .default_value(json!(MAX_IMAGE_WIDTH_PCT))
                        .clamped(MIN_IMAGE_WIDTH_PCT, MAX_IMAGE_WIDTH_PCT),
                ),
            NodeSpec::new(NodeKind::ChartBlock, ChildConstraint::None)
                .attr(id())
                .attr(AttrSpec::new("chart_id").default_value(json!("")))
                .attr(AttrSpec::new("chart_name"))
                .attr(AttrSpec::new("figure_json"))
                .attr(AttrSpec::new("snapshot_at"))
                .attr(
                    AttrSpec::new("height")
                        .default_value(json!(DEFAULT_CHART_HEIGHT_PX))
                        .clamped(MIN_CHART_HEIGHT_PX, MAX_CHART_HEIGHT_PX),
                ),
            NodeSpec::new(NodeKind::LinkPreviewBlock, ChildConstraint::None)
                .attr(id())
                .attr(AttrSpec::new("url").default_value(json!("")))
                .attr(AttrSpec::new("kind").default_value(json!("link")))
                .attr(AttrSpec::new("provider"))
                .attr(AttrSpec::new("title"))
                .attr(AttrSpec::new("subtitle"))
                .attr(AttrSpec::new("description"))
                .attr(AttrSpec::new("image_url")),
            NodeSpec::new(NodeKind::TwoColumnBlock, ColumnsOnly),
            NodeSpec::new(NodeKind::Column, BlockOnly),
        ];

        // One entry per kind, so ordering by kind index makes lookup direct.
        specs.sort_by_key(|spec| spec.kind.index());
        Self { specs }
    }

    pub fn spec(&self, kind: NodeKind) -> &NodeSpec {
        &self.specs[kind.index()]
    }

    pub fn specs(&self) -> &[NodeSpec] {
        &self.specs
    }

    pub fn is_atomic(&self, kind: NodeKind) -> bool {
        self.spec(kind).atomic
    }

    pub fn is_text_block(&self, kind: NodeKind) -> bool {
        self.spec(kind).is_text_block()
    }

    /// Whether `child` may appear directly inside a node of kind `parent`.
    pub fn allows_child(&self, parent: NodeKind, child: NodeKind) -> bool {
        match self.spec(parent).children {
            ChildConstraint::None | ChildConstraint::InlineOnly => false,
            ChildConstraint::ListItemsOnly => child == NodeKind::ListItem,
            ChildConstraint::RowsOnly => child == NodeKind::TableRow,
            ChildConstraint::CellsOnly => child == NodeKind::TableCell,
            ChildConstraint::ColumnsOnly => child == NodeKind::Column,
            ChildConstraint::BlockOnly => !matches!(
                child,
                NodeKind::ListItem | NodeKind::TableRow | NodeKind::TableCell | NodeKind::Column
            ),
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::notes()
    }
}
