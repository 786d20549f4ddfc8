//! Transient text-entry surface
//!
//! The host shows an editable field over the entry's canonical position
//! (mapped through the display transform) and forwards typed content here.
//! Nothing touches the page until [`TextEntry::commit`].

use crate::annotation::{Annotation, Color, Point, Rect};
use crate::tool::ToolSettings;

/// Outcome of committing a text entry
#[derive(Debug, Clone, PartialEq)]
pub enum TextCommit {
    /// New annotation to append
    Added(Annotation),
    /// Replacement for the annotation at `index`
    Updated { index: usize, annotation: Annotation },
    /// Existing annotation emptied by the user
    Deleted { index: usize },
    /// Empty new entry, nothing to do
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    anchor: Point,
    extent: Point,
    /// Set while the pointer that opened the entry is still down
    sizing: bool,
    text: String,
    color: Color,
    font_size: f32,
    /// Existing box, kept as-is when editing
    fixed_box: Option<(Option<f32>, Option<f32>)>,
    editing: Option<usize>,
}

impl TextEntry {
    /// New entry anchored at `at`; dragging before release sizes its box
    pub fn begin(at: Point, settings: &ToolSettings) -> Self {
        Self {
            anchor: at,
            extent: at,
            sizing: true,
            text: String::new(),
            color: settings.color,
            font_size: settings.font_size,
            fixed_box: None,
            editing: None,
        }
    }

    /// Reopens the text annotation at `index` with its content prefilled
    ///
    /// Returns `None` if the annotation is not text.
    pub fn edit(index: usize, annotation: &Annotation) -> Option<Self> {
        let Annotation::Text { x, y, text, color, font_size, box_width, box_height } = annotation
        else {
            return None;
        };

        let anchor = Point::new(*x, *y);
        Some(Self {
            anchor,
            extent: anchor,
            sizing: false,
            text: text.clone(),
            color: *color,
            font_size: *font_size,
            fixed_box: Some((*box_width, *box_height)),
            editing: Some(index),
        })
    }

    pub fn is_sizing(&self) -> bool {
        self.sizing
    }

    /// Index of the annotation being edited, `None` for a new entry
    pub fn editing(&self) -> Option<usize> {
        self.editing
    }

    pub fn drag_to(&mut self, at: Point) {
        if self.sizing {
            self.extent = at;
        }
    }

    pub fn finish_sizing(&mut self, at: Point) {
        self.drag_to(at);
        self.sizing = false;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_font_size(&mut self, font_size: f32) {
        self.font_size = font_size;
    }

    /// Dragged area, normalized
    pub fn drag_rect(&self) -> Rect {
        Rect::from_corners(self.anchor, self.extent)
    }

    /// Top-left corner where the editable field and the annotation sit
    pub fn origin(&self) -> Point {
        let rect = self.drag_rect();
        Point::new(rect.x, rect.y)
    }

    /// Wrapping box, or `None` for point text
    ///
    /// A dragged box smaller than `min_text_box` in both axes is dropped and
    /// the entry becomes point text.
    pub fn text_box(&self, min_text_box: f32) -> (Option<f32>, Option<f32>) {
        if let Some(fixed) = self.fixed_box {
            return fixed;
        }
        let rect = self.drag_rect();
        if rect.is_smaller_than(min_text_box) {
            (None, None)
        } else {
            (Some(rect.width), Some(rect.height))
        }
    }

    pub fn commit(self, min_text_box: f32) -> TextCommit {
        if self.text.trim().is_empty() {
            return match self.editing {
                Some(index) => TextCommit::Deleted { index },
                None => TextCommit::Ignored,
            };
        }

        let (box_width, box_height) = self.text_box(min_text_box);
        let origin = self.origin();
        let annotation = Annotation::Text {
            x: origin.x,
            y: origin.y,
            text: self.text,
            color: self.color,
            font_size: self.font_size,
            box_width,
            box_height,
        };

        match self.editing {
            Some(index) => TextCommit::Updated { index, annotation },
            None => TextCommit::Added(annotation),
        }
    }
}
