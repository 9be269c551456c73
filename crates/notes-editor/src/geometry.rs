use serde::{Deserialize, Serialize};

use manos_notes_core::Point;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size2 {
    pub width: f32,
    pub height: f32,
}

impl Size2 {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Screen-space rectangle, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }

    pub fn contains_y(&self, y: f32) -> bool {
        y >= self.top() && y < self.bottom()
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Layout queries answered by the host that owns the rendered document.
pub trait EditorLayout {
    /// Screen rectangle of a caret placed at `point`.
    fn caret_rect(&self, point: &Point) -> Option<Rect>;
    /// Screen rectangle of the top-level block at `index`.
    fn block_rect(&self, index: usize) -> Option<Rect>;
    /// Width of the editable content column.
    fn content_width(&self) -> f32;
    fn viewport(&self) -> Rect;
    fn editor_rect(&self) -> Rect;
}

/// Index and rectangle of the top-level block under vertical position `y`.
pub fn top_level_block_at(layout: &dyn EditorLayout, block_count: usize, y: f32) -> Option<(usize, Rect)> {
    if !y.is_finite() {
        return None;
    }
    (0..block_count).find_map(|ix| {
        let rect = layout.block_rect(ix)?;
        (rect.is_finite() && rect.contains_y(y)).then_some((ix, rect))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MenuPlacement {
    pub rect: Rect,
    /// Opened upwards because there was no room below the anchor.
    pub flipped: bool,
}

fn clamp_x(x: f32, width: f32, viewport: Rect) -> f32 {
    let max = (viewport.right() - width).max(viewport.left());
    x.clamp(viewport.left(), max)
}

/// Place a menu of `size` below `anchor`, opening upwards instead when it
/// would run past the bottom of the viewport. The horizontal position is
/// clamped so the menu stays on screen.
pub fn place_menu(anchor: Rect, size: Size2, viewport: Rect, gap: f32) -> MenuPlacement {
    let below = anchor.bottom() + gap;
    let flipped = below + size.height > viewport.bottom() && anchor.top() - gap - size.height >= viewport.top();
    let y = if flipped {
        anchor.top() - gap - size.height
    } else {
        below
    };
    MenuPlacement {
        rect: Rect::new(clamp_x(anchor.left(), size.width, viewport), y, size.width, size.height),
        flipped,
    }
}

/// Center a menu of `size` above the midpoint between two caret rectangles,
/// falling back to below the lower one when the top of the viewport is hit.
pub fn place_above_midpoint(start: Rect, end: Rect, size: Size2, viewport: Rect, gap: f32) -> MenuPlacement {
    let mid_x = (start.left() + end.left()) / 2.0;
    let top = start.top().min(end.top());
    let above = top - gap - size.height;
    let flipped = above < viewport.top();
    let y = if flipped {
        start.bottom().max(end.bottom()) + gap
    } else {
        above
    };
    MenuPlacement {
        rect: Rect::new(
            clamp_x(mid_x - size.width / 2.0, size.width, viewport),
            y,
            size.width,
            size.height,
        ),
        flipped,
    }
}
