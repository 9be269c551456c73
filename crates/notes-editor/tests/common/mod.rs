#![allow(dead_code)]

use manos_notes_core::Point;
use manos_notes_editor::{EditorLayout, Rect, SessionConfig, EditorSession, ThemeState};

pub const BLOCK_HEIGHT: f32 = 40.0;
pub const CHAR_WIDTH: f32 = 8.0;

/// Top-level blocks stacked from `top`, one caret line per block.
pub struct StackLayout {
    pub top: f32,
    pub blocks: usize,
    pub viewport: Rect,
    pub content_width: f32,
}

impl StackLayout {
    pub fn new(blocks: usize) -> Self {
        Self {
            top: 0.0,
            blocks,
            viewport: Rect::new(0.0, 0.0, 800.0, 600.0),
            content_width: 600.0,
        }
    }

    pub fn starting_at(mut self, top: f32) -> Self {
        self.top = top;
        self
    }
}

impl EditorLayout for StackLayout {
    fn caret_rect(&self, point: &Point) -> Option<Rect> {
        let block = *point.path.first()?;
        Some(Rect::new(
            point.offset as f32 * CHAR_WIDTH,
            self.top + block as f32 * BLOCK_HEIGHT,
            1.0,
            20.0,
        ))
    }

    fn block_rect(&self, index: usize) -> Option<Rect> {
        (index < self.blocks).then(|| {
            Rect::new(0.0, self.top + index as f32 * BLOCK_HEIGHT, self.content_width, BLOCK_HEIGHT)
        })
    }

    fn content_width(&self) -> f32 {
        self.content_width
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn editor_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.content_width, self.viewport.height)
    }
}

pub fn session() -> EditorSession {
    EditorSession::new(SessionConfig::default(), ThemeState::default())
}

pub fn type_all(session: &mut EditorSession, keys: &[&str]) {
    for key in keys {
        session.type_text(key).unwrap();
    }
}
