//! Active tool and its drawing settings

use crate::annotation::Color;
use crate::config::EditorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Pointer mode: selects and edits text annotations
    #[default]
    Select,
    Pen,
    Rectangle,
    Highlight,
    Line,
    Text,
}

impl Tool {
    /// Tools that draw through the pointer state machine
    pub fn draws(&self) -> bool {
        matches!(self, Tool::Pen | Tool::Rectangle | Tool::Highlight | Tool::Line)
    }
}

/// Style applied to newly created annotations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSettings {
    pub color: Color,
    pub highlight_color: Color,
    pub stroke_width: f32,
    pub font_size: f32,
}

impl ToolSettings {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            color: Color::RED,
            highlight_color: Color::YELLOW,
            stroke_width: config.default_stroke_width,
            font_size: config.default_font_size,
        }
    }

    /// Color the given tool paints with
    pub fn color_for(&self, tool: Tool) -> Color {
        match tool {
            Tool::Highlight => self.highlight_color,
            _ => self.color,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}
