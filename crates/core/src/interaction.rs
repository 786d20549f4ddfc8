//! Pointer drawing state machine
//!
//! `Idle -> Drawing -> Committing -> Idle`. Pointer-down with a drawing tool
//! starts a draft, moves update it, and pointer-up runs the size check and
//! either yields a finished annotation or discards the draft. The draft is
//! only ever painted as a provisional overlay; it never enters a page's
//! annotation list from here. All points are canonical.

use crate::annotation::{Annotation, Color, Point, Rect};
use crate::tool::{Tool, ToolSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxKind {
    Rectangle,
    Highlight,
}

#[derive(Debug, Clone, PartialEq)]
enum Draft {
    Stroke { points: Vec<Point>, color: Color, width: f32 },
    Box { kind: BoxKind, start: Point, current: Point, color: Color },
    Line { start: Point, end: Point, color: Color },
}

impl Draft {
    fn start(tool: Tool, at: Point, settings: &ToolSettings) -> Option<Self> {
        let color = settings.color_for(tool);
        let draft = match tool {
            Tool::Pen => Draft::Stroke { points: vec![at], color, width: settings.stroke_width },
            Tool::Rectangle => Draft::Box { kind: BoxKind::Rectangle, start: at, current: at, color },
            Tool::Highlight => Draft::Box { kind: BoxKind::Highlight, start: at, current: at, color },
            Tool::Line => Draft::Line { start: at, end: at, color },
            Tool::Select | Tool::Text => return None,
        };
        Some(draft)
    }

    fn update(&mut self, at: Point) {
        match self {
            Draft::Stroke { points, .. } => {
                if points.last() != Some(&at) {
                    points.push(at);
                }
            }
            Draft::Box { current, .. } => *current = at,
            Draft::Line { end, .. } => *end = at,
        }
    }

    fn to_annotation(&self) -> Annotation {
        match self {
            Draft::Stroke { points, color, width } => {
                Annotation::Stroke { points: points.clone(), color: *color, width: *width }
            }
            Draft::Box { kind: BoxKind::Rectangle, start, current, color } => {
                Annotation::rectangle(*start, *current, *color)
            }
            Draft::Box { kind: BoxKind::Highlight, start, current, color } => {
                Annotation::highlight(*start, *current, *color)
            }
            Draft::Line { start, end, color } => Annotation::Line {
                x1: start.x,
                y1: start.y,
                x2: end.x,
                y2: end.y,
                color: *color,
            },
        }
    }

    /// Whether the finished draft is too small to keep
    fn is_degenerate(&self, min_size: f32) -> bool {
        match self {
            Draft::Stroke { points, .. } => match Rect::bounding(points) {
                Some(bounds) => points.len() < 2 || bounds.is_smaller_than(min_size),
                None => true,
            },
            Draft::Box { start, current, .. } => {
                let rect = Rect::from_corners(*start, *current);
                rect.width <= 0.0 || rect.height <= 0.0 || rect.is_smaller_than(min_size)
            }
            Draft::Line { start, end, .. } => {
                Rect::from_corners(*start, *end).is_smaller_than(min_size) || start == end
            }
        }
    }
}

/// Observable phase of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Drawing,
}

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    draft: Option<Draft>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InteractionState {
        if self.draft.is_some() {
            InteractionState::Drawing
        } else {
            InteractionState::Idle
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    /// Starts a draft for drawing tools
    ///
    /// Returns `false` for tools handled elsewhere (selection, text) and
    /// leaves the machine idle.
    pub fn pointer_down(&mut self, tool: Tool, at: Point, settings: &ToolSettings) -> bool {
        self.draft = Draft::start(tool, at, settings);
        self.draft.is_some()
    }

    /// Returns `true` when the provisional overlay changed
    pub fn pointer_move(&mut self, at: Point) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.update(at);
                true
            }
            None => false,
        }
    }

    /// Ends the draft and returns the annotation to commit, if it is large enough
    pub fn pointer_up(&mut self, at: Point, min_shape_size: f32) -> Option<Annotation> {
        let mut draft = self.draft.take()?;
        draft.update(at);

        if draft.is_degenerate(min_shape_size) {
            log::debug!("discarding annotation below {min_shape_size}px");
            return None;
        }

        Some(draft.to_annotation())
    }

    /// Drops the draft without committing
    pub fn cancel(&mut self) -> bool {
        self.draft.take().is_some()
    }

    /// In-progress annotation for the live overlay
    pub fn provisional(&self) -> Option<Annotation> {
        self.draft.as_ref().map(Draft::to_annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drag(tool: Tool, from: Point, to: Point) -> Option<Annotation> {
        let mut interaction = Interaction::new();
        assert!(interaction.pointer_down(tool, from, &ToolSettings::default()));
        interaction.pointer_move(to);
        interaction.pointer_up(to, 2.0)
    }

    #[test]
    fn test_rectangle_is_normalized() {
        let annotation = drag(Tool::Rectangle, Point::new(50.0, 50.0), Point::new(10.0, 10.0));
        assert_eq!(
            annotation,
            Some(Annotation::Rectangle {
                x: 10.0,
                y: 10.0,
                width: 40.0,
                height: 40.0,
                color: Color::RED,
            })
        );
    }

    #[test]
    fn test_zero_size_boxes_are_discarded() {
        let at = Point::new(10.0, 10.0);
        assert_eq!(drag(Tool::Rectangle, at, at), None);
        assert_eq!(drag(Tool::Highlight, at, at), None);
        assert_eq!(drag(Tool::Highlight, at, Point::new(11.0, 11.5)), None);
    }

    #[test]
    fn test_thin_box_is_discarded_even_with_zero_threshold() {
        let mut interaction = Interaction::new();
        interaction.pointer_down(Tool::Rectangle, Point::new(0.0, 0.0), &ToolSettings::default());
        assert_eq!(interaction.pointer_up(Point::new(40.0, 0.0), 0.0), None);
    }

    #[test]
    fn test_stroke_collects_points() {
        let mut interaction = Interaction::new();
        interaction.pointer_down(Tool::Pen, Point::new(0.0, 0.0), &ToolSettings::default());
        assert_eq!(interaction.state(), InteractionState::Drawing);
        interaction.pointer_move(Point::new(5.0, 5.0));
        interaction.pointer_move(Point::new(5.0, 5.0));
        interaction.pointer_move(Point::new(10.0, 0.0));

        let Some(Annotation::Stroke { points, width, .. }) =
            interaction.pointer_up(Point::new(10.0, 0.0), 2.0)
        else {
            panic!("expected a stroke");
        };
        assert_eq!(points.len(), 3);
        assert_eq!(width, 3.0);
        assert_eq!(interaction.state(), InteractionState::Idle);
    }

    #[test]
    fn test_single_point_stroke_is_discarded() {
        let at = Point::new(3.0, 3.0);
        assert_eq!(drag(Tool::Pen, at, at), None);
    }

    #[test]
    fn test_line_keeps_direction() {
        let annotation = drag(Tool::Line, Point::new(100.0, 100.0), Point::new(0.0, 0.0));
        assert_eq!(
            annotation,
            Some(Annotation::Line { x1: 100.0, y1: 100.0, x2: 0.0, y2: 0.0, color: Color::RED })
        );
    }

    #[test]
    fn test_non_drawing_tools_stay_idle() {
        let mut interaction = Interaction::new();
        let settings = ToolSettings::default();
        assert!(!interaction.pointer_down(Tool::Text, Point::new(1.0, 1.0), &settings));
        assert!(!interaction.pointer_down(Tool::Select, Point::new(1.0, 1.0), &settings));
        assert!(!interaction.pointer_move(Point::new(2.0, 2.0)));
        assert_eq!(interaction.pointer_up(Point::new(9.0, 9.0), 2.0), None);
    }

    #[test]
    fn test_provisional_tracks_pointer_and_cancel_discards() {
        let mut interaction = Interaction::new();
        interaction.pointer_down(Tool::Highlight, Point::new(0.0, 0.0), &ToolSettings::default());
        interaction.pointer_move(Point::new(20.0, 10.0));

        let preview = interaction.provisional().unwrap();
        assert_eq!(preview.shape_bounds(), Some(Rect::new(0.0, 0.0, 20.0, 10.0)));
        assert_eq!(preview.color(), Color::YELLOW);

        assert!(interaction.cancel());
        assert_eq!(interaction.provisional(), None);
        assert!(!interaction.cancel());
    }
}
