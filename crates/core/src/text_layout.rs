//! Text layout for text annotations
//!
//! Breaks text into lines for painting and computes the box used for
//! hit-testing. Explicit newlines always break. When a box width is set,
//! paragraphs are additionally word-wrapped to fit it.

use crate::annotation::{Annotation, Rect};

/// Line height multiplier (typically 1.2 for normal spacing)
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

/// Average character width relative to font size
pub const DEFAULT_CHAR_WIDTH_RATIO: f32 = 0.6;

/// Horizontal text metrics
pub trait TextMeasure {
    /// Advance width of `text` at `font_size`, in the same units as `font_size`
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Distance from the top of a line box to its baseline
    fn ascent(&self, font_size: f32) -> f32 {
        font_size * 0.8
    }
}

/// Fixed average-advance estimate, used when no font is available
#[derive(Debug, Clone, Copy)]
pub struct ApproxMeasure {
    pub char_width_ratio: f32,
}

impl Default for ApproxMeasure {
    fn default() -> Self {
        Self { char_width_ratio: DEFAULT_CHAR_WIDTH_RATIO }
    }
}

impl TextMeasure for ApproxMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.char_width_ratio
    }
}

/// Result of laying out one text annotation
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    /// Text split into lines (for rendering)
    pub lines: Vec<String>,

    /// Distance between consecutive baselines
    pub line_height: f32,

    /// Widest line
    pub width: f32,

    /// `lines.len() * line_height`
    pub height: f32,
}

impl TextLayout {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Lay out `text`, wrapping at `max_width` when given
pub fn layout_text(
    text: &str,
    font_size: f32,
    max_width: Option<f32>,
    line_height_multiplier: f32,
    measure: &dyn TextMeasure,
) -> TextLayout {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        match max_width {
            Some(max_width) if max_width > 0.0 => {
                lines.extend(wrap_paragraph(paragraph, max_width, font_size, measure));
            }
            _ => lines.push(paragraph.to_string()),
        }
    }

    let line_height = font_size * line_height_multiplier;
    let width = lines
        .iter()
        .map(|line| measure.text_width(line, font_size))
        .fold(0.0_f32, f32::max);
    let height = line_height * lines.len() as f32;

    TextLayout { lines, line_height, width, height }
}

/// Greedy word wrap
///
/// Words wider than the line are broken between characters.
fn wrap_paragraph(
    paragraph: &str,
    max_width: f32,
    font_size: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let fits = |candidate: &str| measure.text_width(candidate, font_size) <= max_width;

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        let candidate =
            if current.is_empty() { word.to_string() } else { format!("{current} {word}") };

        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current = word.to_string();
            continue;
        }

        // Split long word across multiple lines
        for ch in word.chars() {
            current.push(ch);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

/// Canonical-space box of a text annotation, `None` for other kinds
///
/// A user-drawn box wins over the measured extent when it is larger.
pub fn text_bounds(
    annotation: &Annotation,
    line_height_multiplier: f32,
    measure: &dyn TextMeasure,
) -> Option<Rect> {
    let Annotation::Text { x, y, text, font_size, box_width, box_height, .. } = annotation else {
        return None;
    };

    let layout = layout_text(text, *font_size, *box_width, line_height_multiplier, measure);
    let width = box_width.map_or(layout.width, |w| w.max(layout.width));
    let height = box_height.map_or(layout.height, |h| h.max(layout.height));

    Some(Rect::new(*x, *y, width, height))
}
