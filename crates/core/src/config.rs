//! Editor configuration
//!
//! Configuration can be built programmatically, read from `PAGEMARK_*`
//! environment variables, or loaded from a JSON file. Any field missing from
//! a file keeps its default.

use crate::surface::ImageEncoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables for an editor session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Pixels per PDF point used when rasterizing pages. Canonical page space
    /// is measured in these pixels.
    pub render_scale: f32,
    /// Lowest allowed zoom
    pub min_zoom: f32,
    /// Highest allowed zoom
    pub max_zoom: f32,
    /// Multiplier applied by zoom in / zoom out
    pub zoom_step: f32,
    /// Undo snapshots kept per page
    pub undo_depth: usize,
    /// Shapes smaller than this in both axes are discarded (canonical px)
    pub min_shape_size: f32,
    /// Text boxes smaller than this in both axes fall back to point text (canonical px)
    pub min_text_box: f32,
    pub default_stroke_width: f32,
    pub default_font_size: f32,
    /// Multiplier applied to the highlight color's alpha
    pub highlight_opacity: f32,
    /// Line height as a multiple of the font size
    pub line_height: f32,
    /// Export suspends after this many pages
    pub export_yield_every: u32,
    pub export_encoding: ImageEncoding,
    /// Font used for text annotations; system fonts are searched when unset
    pub font_path: Option<PathBuf>,
    /// Queue neighbouring pages at normal priority after navigation
    pub prefetch_adjacent: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            min_zoom: 0.25,
            max_zoom: 5.0,
            zoom_step: 1.25,
            undo_depth: crate::history::DEFAULT_UNDO_DEPTH,
            min_shape_size: 2.0,
            min_text_box: 20.0,
            default_stroke_width: 3.0,
            default_font_size: 16.0,
            highlight_opacity: 0.35,
            line_height: crate::text_layout::DEFAULT_LINE_HEIGHT,
            export_yield_every: 4,
            export_encoding: ImageEncoding::Png,
            font_path: None,
            prefetch_adjacent: true,
        }
    }
}

impl EditorConfig {
    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    pub fn with_zoom_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Sets the minimum shape and text box sizes.
    pub fn with_thresholds(mut self, min_shape_size: f32, min_text_box: f32) -> Self {
        self.min_shape_size = min_shape_size;
        self.min_text_box = min_text_box;
        self
    }

    pub fn with_export_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.export_encoding = encoding;
        self
    }

    pub fn with_export_yield_every(mut self, pages: u32) -> Self {
        self.export_yield_every = pages;
        self
    }

    pub fn with_font_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.font_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_prefetch_adjacent(mut self, prefetch: bool) -> Self {
        self.prefetch_adjacent = prefetch;
        self
    }

    /// Returns the default config file location for the current platform.
    ///
    /// - macOS: ~/Library/Application Support/pagemark/config.json
    /// - Linux: ~/.config/pagemark/config.json
    /// - Windows: %APPDATA%\pagemark\config.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagemark")
            .join("config.json")
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PAGEMARK_RENDER_SCALE`
    /// - `PAGEMARK_UNDO_DEPTH`
    /// - `PAGEMARK_MIN_SHAPE_SIZE`
    /// - `PAGEMARK_MIN_TEXT_BOX`
    /// - `PAGEMARK_EXPORT_YIELD_EVERY`
    /// - `PAGEMARK_EXPORT_FORMAT`: `png` or `jpeg`
    /// - `PAGEMARK_JPEG_QUALITY`: 1-100, used with `jpeg` (default 90)
    /// - `PAGEMARK_FONT`: path to a TrueType/OpenType font
    /// - `PAGEMARK_PREFETCH`: `true` or `false`
    ///
    /// # Errors
    /// Returns an error if any variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value })
        }

        let mut config = Self::default();

        if let Some(value) = lookup("PAGEMARK_RENDER_SCALE") {
            config.render_scale = parse("PAGEMARK_RENDER_SCALE", value)?;
        }
        if let Some(value) = lookup("PAGEMARK_UNDO_DEPTH") {
            config.undo_depth = parse("PAGEMARK_UNDO_DEPTH", value)?;
        }
        if let Some(value) = lookup("PAGEMARK_MIN_SHAPE_SIZE") {
            config.min_shape_size = parse("PAGEMARK_MIN_SHAPE_SIZE", value)?;
        }
        if let Some(value) = lookup("PAGEMARK_MIN_TEXT_BOX") {
            config.min_text_box = parse("PAGEMARK_MIN_TEXT_BOX", value)?;
        }
        if let Some(value) = lookup("PAGEMARK_EXPORT_YIELD_EVERY") {
            config.export_yield_every = parse("PAGEMARK_EXPORT_YIELD_EVERY", value)?;
        }
        if let Some(value) = lookup("PAGEMARK_EXPORT_FORMAT") {
            config.export_encoding = match value.trim().to_ascii_lowercase().as_str() {
                "png" => ImageEncoding::Png,
                "jpeg" | "jpg" => {
                    let quality = match lookup("PAGEMARK_JPEG_QUALITY") {
                        Some(quality) => parse("PAGEMARK_JPEG_QUALITY", quality)?,
                        None => 90,
                    };
                    ImageEncoding::Jpeg { quality }
                }
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "PAGEMARK_EXPORT_FORMAT".to_string(),
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("PAGEMARK_FONT") {
            config.font_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("PAGEMARK_PREFETCH") {
            config.prefetch_adjacent = parse("PAGEMARK_PREFETCH", value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Rejects values the editor cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));

        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return fail("render_scale must be positive");
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return fail("zoom bounds must satisfy 0 < min_zoom <= max_zoom");
        }
        if self.zoom_step <= 1.0 {
            return fail("zoom_step must be greater than 1");
        }
        if self.undo_depth == 0 {
            return fail("undo_depth must be at least 1");
        }
        if self.min_shape_size < 0.0 || self.min_text_box < 0.0 {
            return fail("size thresholds must not be negative");
        }
        if self.default_stroke_width <= 0.0 || self.default_font_size <= 0.0 {
            return fail("default stroke width and font size must be positive");
        }
        if !(0.0..=1.0).contains(&self.highlight_opacity) {
            return fail("highlight_opacity must be within 0..=1");
        }
        if self.line_height <= 0.0 {
            return fail("line_height must be positive");
        }
        if self.export_yield_every == 0 {
            return fail("export_yield_every must be at least 1");
        }
        if let ImageEncoding::Jpeg { quality } = self.export_encoding {
            if !(1..=100).contains(&quality) {
                return fail("jpeg quality must be within 1..=100");
            }
        }
        Ok(())
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}
