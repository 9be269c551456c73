use manos_notes_core::{clamp_chart_height, clamp_image_width};

use crate::geometry::Point2;

/// Keeps only the newest value between two animation frames.
#[derive(Debug)]
pub struct FrameCoalescer<T> {
    pending: Option<T>,
}

impl<T> Default for FrameCoalescer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> FrameCoalescer<T> {
    /// Store `value`; returns true when the caller has to request a frame.
    pub fn push(&mut self, value: T) -> bool {
        self.pending.replace(value).is_none()
    }

    /// Value to commit on the animation frame.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureKind {
    ImageResize { node_id: String },
    ChartResize { node_id: String },
    BlockDrag { from: usize },
}

impl GestureKind {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GestureKind::ImageResize { node_id } | GestureKind::ChartResize { node_id } => Some(node_id),
            GestureKind::BlockDrag { .. } => None,
        }
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// At most one pointer gesture, together with the single closure that
/// releases its capture and listeners.
#[derive(Default)]
pub struct GestureSlot {
    active: Option<(GestureKind, Cleanup)>,
}

impl GestureSlot {
    /// Start `kind`, ending whatever gesture was still running.
    pub fn begin(&mut self, kind: GestureKind, cleanup: impl FnOnce() + 'static) {
        self.end();
        self.active = Some((kind, Box::new(cleanup)));
    }

    /// End the active gesture and run its cleanup.
    pub fn end(&mut self) -> Option<GestureKind> {
        let (kind, cleanup) = self.active.take()?;
        cleanup();
        Some(kind)
    }

    pub fn active(&self) -> Option<&GestureKind> {
        self.active.as_ref().map(|(kind, _)| kind)
    }

    /// End the gesture if it belongs to node `id` (the node is being torn down).
    pub fn end_for_node(&mut self, id: &str) -> bool {
        if self.active().and_then(GestureKind::node_id) == Some(id) {
            self.end();
            true
        } else {
            false
        }
    }
}

impl Drop for GestureSlot {
    fn drop(&mut self) {
        self.end();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeAxis {
    /// Image width as a percentage of the content column.
    Width { start_pct: f64, content_width: f32 },
    /// Chart height in pixels.
    Height { start_px: f64 },
}

/// Clamped image width after dragging the edge handle from `start_x` to `x`.
pub fn image_width_for_drag(start_pct: f64, start_x: f32, x: f32, content_width: f32) -> u32 {
    if !(content_width.is_finite() && content_width > 0.0) {
        return clamp_image_width(start_pct);
    }
    let delta = f64::from(x - start_x) / f64::from(content_width) * 100.0;
    clamp_image_width(start_pct + delta)
}

/// Clamped chart height after dragging the bottom handle from `start_y` to `y`.
pub fn chart_height_for_drag(start_px: f64, start_y: f32, y: f32) -> u32 {
    clamp_chart_height(start_px + f64::from(y - start_y))
}

/// Pointer state of an image or chart resize between pointer-down and up.
#[derive(Debug)]
pub struct ResizeGesture {
    pub node_id: String,
    origin: Point2,
    axis: ResizeAxis,
    frames: FrameCoalescer<u32>,
    last: Option<u32>,
}

impl ResizeGesture {
    pub fn new(node_id: impl Into<String>, origin: Point2, axis: ResizeAxis) -> Self {
        Self {
            node_id: node_id.into(),
            origin,
            axis,
            frames: FrameCoalescer::default(),
            last: None,
        }
    }

    pub fn axis(&self) -> ResizeAxis {
        self.axis
    }

    /// Track a pointer move; returns true when a frame must be requested.
    pub fn pointer_move(&mut self, pointer: Point2) -> bool {
        let value = match self.axis {
            ResizeAxis::Width {
                start_pct,
                content_width,
            } => image_width_for_drag(start_pct, self.origin.x, pointer.x, content_width),
            ResizeAxis::Height { start_px } => chart_height_for_drag(start_px, self.origin.y, pointer.y),
        };
        if self.last == Some(value) && !self.frames.is_pending() {
            return false;
        }
        self.frames.push(value)
    }

    /// The value to write on this animation frame, if it changed.
    pub fn frame(&mut self) -> Option<u32> {
        let value = self.frames.take()?;
        if self.last == Some(value) {
            return None;
        }
        self.last = Some(value);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn coalescer_keeps_the_latest_value() {
        let mut frames = FrameCoalescer::default();
        assert!(frames.push(1));
        assert!(!frames.push(2));
        assert!(!frames.push(3));
        assert_eq!(frames.take(), Some(3));
        assert_eq!(frames.take(), None);
    }

    #[test]
    fn starting_a_gesture_cleans_up_the_previous_one() {
        let cleaned = Rc::new(Cell::new(0));
        let mut slot = GestureSlot::default();
        for from in 0..3 {
            let cleaned = cleaned.clone();
            slot.begin(GestureKind::BlockDrag { from }, move || cleaned.set(cleaned.get() + 1));
        }
        assert_eq!(cleaned.get(), 2);
        assert_eq!(slot.active(), Some(&GestureKind::BlockDrag { from: 2 }));

        drop(slot);
        assert_eq!(cleaned.get(), 3);
    }

    #[test]
    fn only_the_owning_node_ends_a_resize() {
        let mut slot = GestureSlot::default();
        slot.begin(
            GestureKind::ImageResize {
                node_id: "a".into(),
            },
            || {},
        );
        assert!(!slot.end_for_node("b"));
        assert!(slot.end_for_node("a"));
        assert!(slot.active().is_none());
    }

    #[test]
    fn width_follows_the_pointer_relative_to_the_content_width() {
        assert_eq!(image_width_for_drag(50.0, 100.0, 200.0, 400.0), 75);
        assert_eq!(image_width_for_drag(50.0, 100.0, -900.0, 400.0), 20);
        assert_eq!(image_width_for_drag(50.0, 100.0, 200.0, 0.0), 50);
    }

    #[test]
    fn one_write_per_frame() {
        let mut resize = ResizeGesture::new(
            "c",
            Point2::new(0.0, 100.0),
            ResizeAxis::Height { start_px: 360.0 },
        );
        assert!(resize.pointer_move(Point2::new(0.0, 110.0)));
        assert!(!resize.pointer_move(Point2::new(0.0, 140.0)));
        assert_eq!(resize.frame(), Some(400));
        assert_eq!(resize.frame(), None);

        // Same value again: nothing to write.
        assert!(!resize.pointer_move(Point2::new(0.0, 140.0)));
        assert_eq!(resize.frame(), None);
    }
}
