//! Annotation paint routine
//!
//! The live overlay and the export compositor both call [`Painter::paint`];
//! they differ only in the transform. The transform maps canonical page
//! pixels onto the target pixmap.

use crate::annotation::{Annotation, Color, Rect};
use crate::config::EditorConfig;
use crate::font::FontFace;
use crate::surface::{RasterSurface, SurfaceError};
use crate::text_layout::{layout_text, text_bounds, ApproxMeasure, TextMeasure};
use std::f32::consts::FRAC_PI_6;
use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

/// Minimum arrowhead length in canonical pixels
const MIN_ARROW_HEAD: f32 = 12.0;

/// Paint parameters not carried by the annotations themselves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintStyle {
    /// Outline width of rectangles and lines
    pub shape_width: f32,
    pub highlight_opacity: f32,
    pub line_height: f32,
}

impl PaintStyle {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            shape_width: config.default_stroke_width,
            highlight_opacity: config.highlight_opacity,
            line_height: config.line_height,
        }
    }
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Painter {
    font: Option<FontFace>,
    approx: ApproxMeasure,
    style: PaintStyle,
}

impl Painter {
    pub fn new(font: Option<FontFace>, style: PaintStyle) -> Self {
        Self { font, approx: ApproxMeasure::default(), style }
    }

    /// Painter using the configured or discovered text font
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(FontFace::discover(config.font_path.as_deref()), PaintStyle::from_config(config))
    }

    pub fn style(&self) -> &PaintStyle {
        &self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Metrics used for wrapping and hit-testing
    pub fn measure(&self) -> &dyn TextMeasure {
        match &self.font {
            Some(font) => font,
            None => &self.approx,
        }
    }

    /// Box of a text annotation in canonical space
    pub fn text_bounds(&self, annotation: &Annotation) -> Option<Rect> {
        text_bounds(annotation, self.style.line_height, self.measure())
    }

    /// Draws `annotations` in order
    pub fn paint<'a, I>(&self, pixmap: &mut Pixmap, annotations: I, transform: Transform)
    where
        I: IntoIterator<Item = &'a Annotation>,
    {
        for annotation in annotations {
            self.paint_one(pixmap, annotation, transform);
        }
    }

    fn paint_one(&self, pixmap: &mut Pixmap, annotation: &Annotation, transform: Transform) {
        match annotation {
            Annotation::Stroke { points, color, width } => {
                let Some((first, rest)) = points.split_first() else {
                    return;
                };
                let mut pb = PathBuilder::new();
                pb.move_to(first.x, first.y);
                for point in rest {
                    pb.line_to(point.x, point.y);
                }
                if let Some(path) = pb.finish() {
                    let stroke = round_stroke(*width);
                    pixmap.stroke_path(&path, &fill_paint(*color, 1.0), &stroke, transform, None);
                }
            }
            Annotation::Rectangle { x, y, width, height, color } => {
                let Some(rect) = tiny_skia::Rect::from_xywh(*x, *y, *width, *height) else {
                    return;
                };
                let path = PathBuilder::from_rect(rect);
                let stroke = Stroke {
                    width: self.style.shape_width,
                    line_join: LineJoin::Miter,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &fill_paint(*color, 1.0), &stroke, transform, None);
            }
            Annotation::Highlight { x, y, width, height, color } => {
                let Some(rect) = tiny_skia::Rect::from_xywh(*x, *y, *width, *height) else {
                    return;
                };
                let paint = fill_paint(*color, self.style.highlight_opacity);
                pixmap.fill_rect(rect, &paint, transform, None);
            }
            Annotation::Line { x1, y1, x2, y2, color } => {
                self.paint_arrow(pixmap, (*x1, *y1), (*x2, *y2), *color, transform);
            }
            Annotation::Text { x, y, text, color, font_size, box_width, .. } => {
                let Some(font) = &self.font else {
                    return;
                };
                let layout =
                    layout_text(text, *font_size, *box_width, self.style.line_height, font);
                let ascent = font.ascent(*font_size);
                let paint = fill_paint(*color, 1.0);

                for (i, line) in layout.lines.iter().enumerate() {
                    let baseline = y + ascent + i as f32 * layout.line_height;
                    if let Some(path) = font.line_path(line, *font_size, *x, baseline) {
                        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                    }
                }
            }
        }
    }

    fn paint_arrow(
        &self,
        pixmap: &mut Pixmap,
        (x1, y1): (f32, f32),
        (x2, y2): (f32, f32),
        color: Color,
        transform: Transform,
    ) {
        let paint = fill_paint(color, 1.0);
        let width = self.style.shape_width;

        let mut shaft = PathBuilder::new();
        shaft.move_to(x1, y1);
        shaft.line_to(x2, y2);
        if let Some(path) = shaft.finish() {
            pixmap.stroke_path(&path, &paint, &round_stroke(width), transform, None);
        }

        let (dx, dy) = (x2 - x1, y2 - y1);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let angle = dy.atan2(dx);
        let head = MIN_ARROW_HEAD.max(width * 4.0);

        let mut pb = PathBuilder::new();
        pb.move_to(x2, y2);
        pb.line_to(x2 - head * (angle - FRAC_PI_6).cos(), y2 - head * (angle - FRAC_PI_6).sin());
        pb.line_to(x2 - head * (angle + FRAC_PI_6).cos(), y2 - head * (angle + FRAC_PI_6).sin());
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
    }

    /// Base raster plus annotations on a new surface of the given size
    ///
    /// `transform` maps canonical pixels to the output and is applied to the
    /// base raster as well.
    pub fn compose<'a, I>(
        &self,
        base: Option<&RasterSurface>,
        width: u32,
        height: u32,
        annotations: I,
        transform: Transform,
    ) -> Result<RasterSurface, SurfaceError>
    where
        I: IntoIterator<Item = &'a Annotation>,
    {
        let mut out = match base {
            Some(base)
                if base.width() == width && base.height() == height && transform.is_identity() =>
            {
                base.clone()
            }
            Some(base) => {
                let mut out = RasterSurface::new(width, height)?;
                let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
                out.pixmap_mut().draw_pixmap(0, 0, base.pixmap().as_ref(), &paint, transform, None);
                out
            }
            None => RasterSurface::new(width, height)?,
        };

        self.paint(out.pixmap_mut(), annotations, transform);
        Ok(out)
    }
}

fn round_stroke(width: f32) -> Stroke {
    Stroke { width, line_cap: LineCap::Round, line_join: LineJoin::Round, ..Stroke::default() }
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let alpha = (color.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Point;
    use image::{Rgba, RgbaImage};

    fn white(width: u32, height: u32) -> RasterSurface {
        RasterSurface::from_rgba_image(&RgbaImage::from_pixel(width, height, Rgba([255; 4])))
            .unwrap()
    }

    fn painter() -> Painter {
        Painter::new(None, PaintStyle::default())
    }

    fn is_red(pixel: [u8; 4]) -> bool {
        pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60
    }

    #[test]
    fn test_rectangle_outline() {
        let mut surface = white(100, 100);
        let rect = Annotation::rectangle(Point::new(10.0, 10.0), Point::new(50.0, 50.0), Color::RED);
        painter().paint(surface.pixmap_mut(), [&rect], Transform::identity());

        assert!(is_red(surface.pixel(10, 30).unwrap()));
        assert_eq!(surface.pixel(30, 30), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_highlight_is_translucent() {
        let mut surface = white(40, 40);
        let highlight =
            Annotation::highlight(Point::new(0.0, 0.0), Point::new(40.0, 40.0), Color::YELLOW);
        painter().paint(surface.pixmap_mut(), [&highlight], Transform::identity());

        let [r, _, b, a] = surface.pixel(20, 20).unwrap();
        assert_eq!((r, a), (255, 255));
        assert!(b > 150 && b < 220, "blue channel {b} should be partly covered");
    }

    #[test]
    fn test_line_has_arrowhead() {
        let mut surface = white(100, 100);
        let line = Annotation::Line { x1: 10.0, y1: 50.0, x2: 90.0, y2: 50.0, color: Color::RED };
        painter().paint(surface.pixmap_mut(), [&line], Transform::identity());

        assert!(is_red(surface.pixel(50, 50).unwrap()));
        // Off the shaft but inside the head
        assert!(is_red(surface.pixel(82, 46).unwrap()));
        assert_eq!(surface.pixel(20, 46), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_transform_scales_annotations() {
        let mut surface = white(200, 200);
        let rect = Annotation::rectangle(Point::new(10.0, 10.0), Point::new(50.0, 50.0), Color::RED);
        painter().paint(surface.pixmap_mut(), [&rect], Transform::from_scale(2.0, 2.0));

        assert!(is_red(surface.pixel(20, 60).unwrap()));
        assert!(!is_red(surface.pixel(10, 30).unwrap()));
    }

    #[test]
    fn test_text_without_font_is_skipped_but_measurable() {
        let mut surface = white(50, 50);
        let text = Annotation::Text {
            x: 5.0,
            y: 5.0,
            text: "abc".into(),
            color: Color::RED,
            font_size: 10.0,
            box_width: None,
            box_height: None,
        };
        let painter = painter();
        painter.paint(surface.pixmap_mut(), [&text], Transform::identity());

        assert_eq!(surface, white(50, 50));
        assert_eq!(painter.text_bounds(&text), Some(Rect::new(5.0, 5.0, 18.0, 12.0)));
    }

    #[test]
    fn test_compose_reuses_base_and_leaves_it_untouched() {
        let base = white(60, 60);
        let rect = Annotation::rectangle(Point::new(10.0, 10.0), Point::new(50.0, 50.0), Color::RED);

        let out = painter().compose(Some(&base), 60, 60, [&rect], Transform::identity()).unwrap();
        assert!(is_red(out.pixel(10, 30).unwrap()));
        assert_eq!(base.pixel(10, 30), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_compose_scales_base() {
        let base = white(10, 10);
        let out = painter()
            .compose(Some(&base), 20, 20, std::iter::empty(), Transform::from_scale(2.0, 2.0))
            .unwrap();
        assert_eq!(out.pixel(10, 10), Some([255, 255, 255, 255]));
    }
}
