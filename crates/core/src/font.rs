//! Font loading and glyph outlines for text annotations

use crate::text_layout::TextMeasure;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{Path as SkPath, PathBuilder};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported font data: {0}")]
    Parse(#[from] ttf_parser::FaceParsingError),
}

/// Well-known locations of a plain sans-serif face
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const USER_FONT_CANDIDATES: &[&str] = &["DejaVuSans.ttf", "LiberationSans-Regular.ttf"];

/// Shared, validated TrueType/OpenType font data
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace").field("bytes", &self.data.len()).finish()
    }
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        Face::parse(&data, 0)?;
        Ok(Self { data: Arc::new(data) })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path)
            .map_err(|source| FontError::Io { path: path.to_path_buf(), source })?;
        Self::from_bytes(data)
    }

    /// Configured font if given, otherwise the first usable system font
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(face) => return Some(face),
                Err(err) => log::warn!("configured font unusable, searching system fonts: {err}"),
            }
        }

        let user_dir = dirs::font_dir();
        let user_candidates = user_dir
            .iter()
            .flat_map(|dir| USER_FONT_CANDIDATES.iter().map(move |name| dir.join(name)));

        let found = user_candidates
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
            .filter(|path| path.is_file())
            .find_map(|path| match Self::load(&path) {
                Ok(face) => {
                    log::debug!("using text font {}", path.display());
                    Some(face)
                }
                Err(err) => {
                    log::debug!("skipping font candidate: {err}");
                    None
                }
            });

        if found.is_none() {
            log::warn!("no text font found; text annotations will not be painted");
        }
        found
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Filled outline of one line of text
    ///
    /// `origin_x` is the left edge and `baseline_y` the baseline, both in a
    /// y-down coordinate space. Returns `None` when no glyph has an outline.
    pub fn line_path(
        &self,
        text: &str,
        font_size: f32,
        origin_x: f32,
        baseline_y: f32,
    ) -> Option<SkPath> {
        let face = self.face()?;
        let scale = font_size / face.units_per_em().max(1) as f32;
        let mut builder = GlyphPathBuilder {
            builder: PathBuilder::new(),
            origin_x,
            baseline_y,
            scale,
        };

        for ch in text.chars() {
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            face.outline_glyph(glyph, &mut builder);
            let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32;
            builder.origin_x += advance * scale;
        }

        builder.builder.finish()
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let scale = font_size / face.units_per_em().max(1) as f32;
        text.chars()
            .map(|ch| {
                let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
                face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale
            })
            .sum()
    }

    fn ascent(&self, font_size: f32) -> f32 {
        match self.face() {
            Some(face) => face.ascender() as f32 * font_size / face.units_per_em().max(1) as f32,
            None => font_size * 0.8,
        }
    }
}

/// Adapts ttf-parser's y-up outlines into a y-down tiny-skia path
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_not_a_font() {
        assert!(matches!(FontFace::from_bytes(vec![0; 16]), Err(FontError::Parse(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = FontFace::load(Path::new("/definitely/not/here.ttf")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.ttf"));
    }

    #[test]
    fn test_discovered_font_measures_and_outlines() {
        // Only meaningful on hosts with a system font installed
        let Some(face) = FontFace::discover(None) else {
            return;
        };

        let narrow = face.text_width("i", 16.0);
        let wide = face.text_width("iii", 16.0);
        assert!(wide > narrow);
        assert!(face.ascent(16.0) > 0.0);

        let path = face.line_path("Hi", 16.0, 0.0, 16.0).expect("glyphs have outlines");
        let bounds = path.bounds();
        assert!(bounds.top() >= -1.0);
        assert!(bounds.bottom() <= 24.0);
    }
}
