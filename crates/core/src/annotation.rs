//! Annotation data model
//!
//! Every coordinate stored here is in canonical page space: pixels of the
//! page raster at the fixed render scale, origin at the top-left, y growing
//! downward. Display-space values never reach this module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Point in canonical page space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with non-negative size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }.normalized()
    }

    /// Rectangle spanning two arbitrary corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Bounding box of a point set, `None` when empty
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min, mut max) = (*first, *first);
        for point in &points[1..] {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }
        Some(Self::from_corners(min, max))
    }

    /// Reorders so that width and height are non-negative
    pub fn normalized(self) -> Self {
        Self::from_corners(
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Inclusive containment test
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// True when the rectangle is smaller than `min` along both axes
    pub fn is_smaller_than(&self, min: f32) -> bool {
        self.width < min && self.height < min
    }
}

/// RGBA color
///
/// Serialized as a CSS-style hex string: `#rrggbb` when opaque,
/// `#rrggbbaa` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 235, b: 59, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}: expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_owned());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| err())
        };

        let color = match hex.len() {
            3 => {
                let nibble = |i: usize| channel(i..i + 1).map(|v| v * 17);
                Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)
            }
            6 => Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?),
            8 => Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?),
            _ => return Err(err()),
        };

        Ok(color)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != u8::MAX {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// A user-authored mark on one page
///
/// Insertion order within a page is paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Annotation {
    /// Freehand pen stroke
    Stroke { points: Vec<Point>, color: Color, width: f32 },

    /// Rectangle outline
    Rectangle { x: f32, y: f32, width: f32, height: f32, color: Color },

    /// Translucent filled rectangle
    Highlight { x: f32, y: f32, width: f32, height: f32, color: Color },

    /// Straight line with an arrowhead at (x2, y2)
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Color },

    /// Text anchored at its top-left corner; wraps when `box_width` is set
    Text {
        x: f32,
        y: f32,
        text: String,
        color: Color,
        font_size: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        box_width: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        box_height: Option<f32>,
    },
}

/// Discriminant of [`Annotation`], useful for logging and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Stroke,
    Rectangle,
    Highlight,
    Line,
    Text,
}

impl Annotation {
    /// Rectangle annotation from two drag corners
    pub fn rectangle(a: Point, b: Point, color: Color) -> Self {
        let rect = Rect::from_corners(a, b);
        Annotation::Rectangle { x: rect.x, y: rect.y, width: rect.width, height: rect.height, color }
    }

    /// Highlight annotation from two drag corners
    pub fn highlight(a: Point, b: Point, color: Color) -> Self {
        let rect = Rect::from_corners(a, b);
        Annotation::Highlight { x: rect.x, y: rect.y, width: rect.width, height: rect.height, color }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Stroke { .. } => AnnotationKind::Stroke,
            Annotation::Rectangle { .. } => AnnotationKind::Rectangle,
            Annotation::Highlight { .. } => AnnotationKind::Highlight,
            Annotation::Line { .. } => AnnotationKind::Line,
            Annotation::Text { .. } => AnnotationKind::Text,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Annotation::Stroke { color, .. }
            | Annotation::Rectangle { color, .. }
            | Annotation::Highlight { color, .. }
            | Annotation::Line { color, .. }
            | Annotation::Text { color, .. } => *color,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Annotation::Text { .. })
    }

    /// Geometric extent of non-text annotations
    ///
    /// Text extent depends on font metrics, see
    /// [`text_bounds`](crate::text_layout::text_bounds).
    pub fn shape_bounds(&self) -> Option<Rect> {
        match self {
            Annotation::Stroke { points, .. } => Rect::bounding(points),
            Annotation::Rectangle { x, y, width, height, .. }
            | Annotation::Highlight { x, y, width, height, .. } => {
                Some(Rect::new(*x, *y, *width, *height))
            }
            Annotation::Line { x1, y1, x2, y2, .. } => {
                Some(Rect::from_corners(Point::new(*x1, *y1), Point::new(*x2, *y2)))
            }
            Annotation::Text { .. } => None,
        }
    }
}
