//! The "/" command palette and the chart picker it can open.

use serde::Serialize;

use manos_notes_core::{
    BlockType, CommandError, Editor, Node, NodeKind, Path, Point, Selection, node_at_path,
    point_for_global_offset, point_global_offset,
};

use crate::config::SessionConfig;
use crate::geometry::{EditorLayout, MenuPlacement, Rect, Size2, place_menu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashAction {
    SetBlock(BlockType),
    Table,
    Divider,
    Image,
    Callout,
    TwoColumns,
    Chart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlashCommand {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
    pub action: SlashAction,
}

impl SlashCommand {
    const fn new(label: &'static str, keywords: &'static [&'static str], action: SlashAction) -> Self {
        Self {
            label,
            keywords,
            action,
        }
    }

    /// Case-insensitive substring match on the label or any keyword.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.label.to_lowercase().contains(&query) || self.keywords.iter().any(|k| k.contains(&query))
    }
}

pub const SLASH_COMMANDS: &[SlashCommand] = &[
    SlashCommand::new("Text", &["paragraph", "plain", "p"], SlashAction::SetBlock(BlockType::Paragraph)),
    SlashCommand::new("Heading 1", &["h1", "title"], SlashAction::SetBlock(BlockType::Heading(1))),
    SlashCommand::new("Heading 2", &["h2", "subtitle"], SlashAction::SetBlock(BlockType::Heading(2))),
    SlashCommand::new("Heading 3", &["h3", "subheading"], SlashAction::SetBlock(BlockType::Heading(3))),
    SlashCommand::new("Bullet list", &["ul", "unordered", "-"], SlashAction::SetBlock(BlockType::BulletList)),
    SlashCommand::new("Numbered list", &["ol", "ordered", "1."], SlashAction::SetBlock(BlockType::OrderedList)),
    SlashCommand::new("Quote", &["blockquote", "cite"], SlashAction::SetBlock(BlockType::Blockquote)),
    SlashCommand::new("Code block", &["code", "snippet", "pre"], SlashAction::SetBlock(BlockType::CodeBlock)),
    SlashCommand::new("Table", &["grid", "rows", "columns"], SlashAction::Table),
    SlashCommand::new("Divider", &["hr", "rule", "separator"], SlashAction::Divider),
    SlashCommand::new("Image", &["picture", "photo", "upload"], SlashAction::Image),
    SlashCommand::new("Callout", &["note", "info", "tip"], SlashAction::Callout),
    SlashCommand::new("Two columns", &["layout", "side", "split"], SlashAction::TwoColumns),
    SlashCommand::new("Chart", &["plot", "graph", "figure"], SlashAction::Chart),
];

/// An open palette: where the "/" sits and what was typed after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashQuery {
    pub block_path: Path,
    /// Byte offset of the "/" within the block.
    pub trigger: usize,
    pub query: String,
    pub highlighted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKey {
    Up,
    Down,
    Enter,
    Escape,
}

/// What executing a command asks of the host.
#[derive(Debug, Clone, PartialEq)]
pub enum SlashEffect {
    Done,
    OpenImagePicker,
    /// The chart picker opened next to the caret.
    OpenChartPicker { anchor: Option<Rect> },
}

#[derive(Debug)]
pub enum PaletteOutcome {
    /// The key was not for the palette.
    Ignored,
    Handled,
    Executed(SlashEffect),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartOption {
    pub id: String,
    pub name: String,
}

/// Secondary picker listing charts to embed.
#[derive(Debug, Clone, Default)]
pub struct ChartPicker {
    pub anchor: Option<Rect>,
    pub query: String,
}

impl ChartPicker {
    pub fn filter<'a>(&self, charts: &'a [ChartOption]) -> Vec<&'a ChartOption> {
        let query = self.query.to_lowercase();
        charts
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&query) || c.id.to_lowercase().contains(&query))
            .collect()
    }
}

#[derive(Debug)]
pub struct SlashPalette {
    open: Option<SlashQuery>,
    chart_picker: Option<ChartPicker>,
    table_size: (usize, usize),
}

impl Default for SlashPalette {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

/// Block path, text and caret offset when the caret is collapsed in a
/// paragraph.
fn caret_in_paragraph(editor: &Editor) -> Option<(Path, String, usize)> {
    let Selection::Text { anchor, focus } = editor.selection() else {
        return None;
    };
    if anchor != focus {
        return None;
    }
    let block_path = focus.block_path().to_vec();
    let Some(Node::Element(el)) = node_at_path(editor.doc(), &block_path) else {
        return None;
    };
    if el.kind != NodeKind::Paragraph {
        return None;
    }
    let leaf = focus.path.last().copied().unwrap_or(0);
    let offset = point_global_offset(&el.children, leaf, focus.offset);
    let text = Node::Element(el.clone()).text_content();
    Some((block_path, text, offset))
}

impl SlashPalette {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            open: None,
            chart_picker: None,
            table_size: (config.table_rows, config.table_cols),
        }
    }

    pub fn query(&self) -> Option<&SlashQuery> {
        self.open.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open with a non-empty match list.
    pub fn is_visible(&self) -> bool {
        self.open.is_some() && !self.filtered().is_empty()
    }

    pub fn filtered(&self) -> Vec<&'static SlashCommand> {
        match &self.open {
            Some(q) => SLASH_COMMANDS.iter().filter(|c| c.matches(&q.query)).collect(),
            None => Vec::new(),
        }
    }

    pub fn highlighted(&self) -> Option<&'static SlashCommand> {
        let q = self.open.as_ref()?;
        self.filtered().get(q.highlighted).copied()
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    /// Called after text was typed. A "/" that starts a fresh run (block
    /// start or after whitespace) in a paragraph opens the palette.
    pub fn on_text_input(&mut self, editor: &Editor, typed: &str) {
        if typed != "/" || self.open.is_some() {
            self.update(editor);
            return;
        }
        let Some((block_path, text, caret)) = caret_in_paragraph(editor) else {
            return;
        };
        let Some(trigger) = caret.checked_sub(1) else {
            return;
        };
        if text.get(trigger..caret) != Some("/") {
            return;
        }
        let fresh_run = text[..trigger]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        if fresh_run {
            self.open = Some(SlashQuery {
                block_path,
                trigger,
                query: String::new(),
                highlighted: 0,
            });
        }
    }

    /// Re-read the query after any edit or selection change, closing the
    /// palette when the run from the "/" to the caret is no longer valid.
    pub fn update(&mut self, editor: &Editor) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let valid = caret_in_paragraph(editor).and_then(|(block_path, text, caret)| {
            if block_path != open.block_path || caret <= open.trigger {
                return None;
            }
            let run = text.get(open.trigger..caret)?;
            let query = run.strip_prefix('/')?;
            (!query.chars().any(char::is_whitespace)).then(|| query.to_string())
        });
        match valid {
            Some(query) => {
                if query != open.query {
                    open.query = query;
                    open.highlighted = 0;
                }
            }
            None => self.open = None,
        }
    }

    /// Mouse hover over row `ix`.
    pub fn hover(&mut self, ix: usize) {
        let len = self.filtered().len();
        if let Some(open) = self.open.as_mut() {
            if ix < len {
                open.highlighted = ix;
            }
        }
    }

    pub fn handle_key(&mut self, editor: &mut Editor, key: PaletteKey, layout: Option<&dyn EditorLayout>) -> Result<PaletteOutcome, CommandError> {
        if !self.is_visible() {
            if key == PaletteKey::Escape && self.open.is_some() {
                self.close();
                return Ok(PaletteOutcome::Handled);
            }
            return Ok(PaletteOutcome::Ignored);
        }
        let len = self.filtered().len();
        let Some(open) = self.open.as_mut() else {
            return Ok(PaletteOutcome::Ignored);
        };
        match key {
            PaletteKey::Down => {
                open.highlighted = (open.highlighted + 1) % len;
                Ok(PaletteOutcome::Handled)
            }
            PaletteKey::Up => {
                open.highlighted = (open.highlighted + len - 1) % len;
                Ok(PaletteOutcome::Handled)
            }
            PaletteKey::Escape => {
                self.close();
                Ok(PaletteOutcome::Handled)
            }
            PaletteKey::Enter => match self.highlighted() {
                Some(command) => self.execute(editor, command, layout).map(PaletteOutcome::Executed),
                None => Ok(PaletteOutcome::Ignored),
            },
        }
    }

    /// Remove "/" + query, then run the command's transform or insertion.
    pub fn execute(&mut self, editor: &mut Editor, command: &SlashCommand, layout: Option<&dyn EditorLayout>) -> Result<SlashEffect, CommandError> {
        let Some(open) = self.open.take() else {
            return Err(CommandError::new("Slash palette is not open"));
        };
        let Some(Node::Element(block)) = node_at_path(editor.doc(), &open.block_path) else {
            return Err(CommandError::new("Slash trigger block is gone"));
        };
        let start = point_for_global_offset(&open.block_path, &block.children, open.trigger);
        let end = point_for_global_offset(&open.block_path, &block.children, open.trigger + 1 + open.query.len());
        editor.delete_range(start, end)?;

        match command.action {
            SlashAction::SetBlock(block_type) => editor.set_block_type(block_type)?,
            SlashAction::Table => {
                let (rows, cols) = self.table_size;
                editor.insert_table(rows, cols)?
            }
            SlashAction::Divider => editor.insert_horizontal_rule()?,
            SlashAction::Callout => editor.insert_callout()?,
            SlashAction::TwoColumns => editor.insert_two_columns()?,
            SlashAction::Image => return Ok(SlashEffect::OpenImagePicker),
            SlashAction::Chart => {
                let anchor = layout.and_then(|l| editor.selection().focus().and_then(|p| l.caret_rect(p)));
                self.chart_picker = Some(ChartPicker {
                    anchor,
                    query: String::new(),
                });
                return Ok(SlashEffect::OpenChartPicker { anchor });
            }
        }
        Ok(SlashEffect::Done)
    }

    pub fn chart_picker(&self) -> Option<&ChartPicker> {
        self.chart_picker.as_ref()
    }

    pub fn chart_picker_mut(&mut self) -> Option<&mut ChartPicker> {
        self.chart_picker.as_mut()
    }

    pub fn close_chart_picker(&mut self) {
        self.chart_picker = None;
    }

    /// Insert the picked chart (without a snapshot) and close the picker.
    pub fn pick_chart(&mut self, editor: &mut Editor, chart: &ChartOption) -> Result<String, CommandError> {
        self.chart_picker = None;
        editor.insert_chart(&chart.id, Some(chart.name.clone()))
    }

    /// Where the palette goes: under the "/" or above it when it would
    /// overflow the viewport.
    pub fn placement(&self, editor: &Editor, layout: &dyn EditorLayout, config: &SessionConfig) -> Option<MenuPlacement> {
        let open = self.open.as_ref()?;
        let Some(Node::Element(block)) = node_at_path(editor.doc(), &open.block_path) else {
            return None;
        };
        let trigger: Point = point_for_global_offset(&open.block_path, &block.children, open.trigger);
        let anchor = layout.caret_rect(&trigger)?;
        let rows = self.filtered().len().min(config.slash_max_rows);
        let size = Size2::new(config.slash_menu_width, rows as f32 * config.slash_row_height);
        Some(place_menu(anchor, size, layout.viewport(), config.menu_gap))
    }
}
