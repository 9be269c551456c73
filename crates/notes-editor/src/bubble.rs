//! Floating formatting menu over the selection.

use serde::Serialize;

use manos_notes_core::{BlockType, CommandError, Editor, Selection, active_block_type};

use crate::geometry::{EditorLayout, MenuPlacement, Point2, Rect, Size2, place_above_midpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOp {
    RowAbove,
    RowBelow,
    ColLeft,
    ColRight,
    DeleteRow,
    DeleteCol,
    DeleteTable,
}

impl TableOp {
    pub const ALL: [TableOp; 7] = [
        TableOp::RowAbove,
        TableOp::RowBelow,
        TableOp::ColLeft,
        TableOp::ColRight,
        TableOp::DeleteRow,
        TableOp::DeleteCol,
        TableOp::DeleteTable,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum BubbleItem {
    Table { op: TableOp },
    Block { block_type: BlockType, label: &'static str, active: bool },
    FontFamily { value: Option<String> },
    FontSize { value: Option<u32> },
    Bold { active: bool },
    Italic { active: bool },
    Strikethrough { active: bool },
    Code { active: bool },
    Link { href: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleAction {
    Table(TableOp),
    SetBlock(BlockType),
    FontFamily(Option<String>),
    FontSize(Option<u32>),
    ToggleBold,
    ToggleItalic,
    ToggleStrikethrough,
    ToggleCode,
    /// The link prompt's answer; an empty answer removes the link.
    Link(String),
}

fn has_text_range(selection: &Selection) -> bool {
    matches!(selection, Selection::Text { .. }) && !selection.is_collapsed()
}

/// Menu state. Whether it shows is derived from the selection; the only
/// stored state is an explicit dismissal, which lasts until the selection
/// changes.
#[derive(Debug, Default)]
pub struct BubbleMenu {
    dismissed_for: Option<Selection>,
}

impl BubbleMenu {
    pub fn is_visible(&self, editor: &Editor) -> bool {
        let selection = editor.selection();
        if self.dismissed_for.as_ref() == Some(selection) {
            return false;
        }
        has_text_range(selection) || editor.in_table()
    }

    /// Pointer pressed somewhere. Outside both the menu and the editor the
    /// menu closes.
    pub fn pointer_down(&mut self, editor: &Editor, at: Point2, menu: Option<Rect>, editor_rect: Rect) {
        let on_menu = menu.is_some_and(|r| r.contains(at));
        if !on_menu && !editor_rect.contains(at) {
            self.dismissed_for = Some(editor.selection().clone());
        }
    }

    /// Forget a dismissal once the selection moved on.
    pub fn selection_changed(&mut self, editor: &Editor) {
        if self.dismissed_for.as_ref() != Some(editor.selection()) {
            self.dismissed_for = None;
        }
    }

    pub fn items(&self, editor: &Editor) -> Vec<BubbleItem> {
        if !self.is_visible(editor) {
            return Vec::new();
        }
        let mut items = Vec::new();
        if editor.in_table() {
            items.extend(TableOp::ALL.into_iter().map(|op| BubbleItem::Table { op }));
        }
        let active = active_block_type(editor);
        items.extend(BlockType::SWITCHER.into_iter().map(|block_type| BubbleItem::Block {
            block_type,
            label: block_type.label(),
            active: active == Some(block_type),
        }));
        if has_text_range(editor.selection()) {
            let marks = editor.active_marks();
            items.extend([
                BubbleItem::FontFamily {
                    value: marks.font_family.clone(),
                },
                BubbleItem::FontSize {
                    value: marks.font_size,
                },
                BubbleItem::Bold { active: marks.bold },
                BubbleItem::Italic { active: marks.italic },
                BubbleItem::Strikethrough {
                    active: marks.strikethrough,
                },
                BubbleItem::Code { active: marks.code },
                BubbleItem::Link {
                    href: editor.active_link(),
                },
            ]);
        }
        items
    }

    pub fn dispatch(&self, editor: &mut Editor, action: BubbleAction) -> Result<(), CommandError> {
        match action {
            BubbleAction::Table(op) => match op {
                TableOp::RowAbove => editor.insert_table_row_above(),
                TableOp::RowBelow => editor.insert_table_row_below(),
                TableOp::ColLeft => editor.insert_table_col_left(),
                TableOp::ColRight => editor.insert_table_col_right(),
                TableOp::DeleteRow => editor.delete_table_row(),
                TableOp::DeleteCol => editor.delete_table_col(),
                TableOp::DeleteTable => editor.delete_table(),
            },
            BubbleAction::SetBlock(block_type) => editor.set_block_type(block_type),
            BubbleAction::FontFamily(family) => editor.set_font_family(family),
            BubbleAction::FontSize(size) => editor.set_font_size(size),
            BubbleAction::ToggleBold => editor.toggle_bold(),
            BubbleAction::ToggleItalic => editor.toggle_italic(),
            BubbleAction::ToggleStrikethrough => editor.toggle_strikethrough(),
            BubbleAction::ToggleCode => editor.toggle_code(),
            BubbleAction::Link(input) => editor.set_link(&input),
        }
    }

    /// Centered above the midpoint of the selection ends.
    pub fn placement(&self, editor: &Editor, layout: &dyn EditorLayout, size: Size2, gap: f32) -> Option<MenuPlacement> {
        if !self.is_visible(editor) {
            return None;
        }
        let (start, end) = editor.selection().ordered()?;
        let start = layout.caret_rect(&start)?;
        let end = layout.caret_rect(&end)?;
        Some(place_above_midpoint(start, end, size, layout.viewport(), gap))
    }
}
