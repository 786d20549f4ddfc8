//! Raster surfaces
//!
//! A [`RasterSurface`] is a fixed-size premultiplied RGBA buffer backed by a
//! `tiny_skia::Pixmap`. Page rasters, preview overlays and composited export
//! pages all use this type so they share one paint routine.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tiny_skia::{ColorU8, Pixmap};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Static image format used when a surface leaves the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ImageEncoding {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

#[derive(Clone, PartialEq)]
pub struct RasterSurface {
    pixmap: Pixmap,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RasterSurface {
    /// Transparent surface
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        Pixmap::new(width, height)
            .map(|pixmap| Self { pixmap })
            .ok_or(SurfaceError::InvalidSize { width, height })
    }

    /// Copy of a straight-alpha image, premultiplied
    pub fn from_rgba_image(image: &RgbaImage) -> Result<Self, SurfaceError> {
        let mut surface = Self::new(image.width(), image.height())?;
        for (dst, src) in surface.pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(surface)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Straight-alpha pixel, `None` outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Straight-alpha copy of the surface
    pub fn to_rgba_image(&self) -> RgbaImage {
        let width = self.width();
        RgbaImage::from_fn(width, self.height(), |x, y| {
            let color = self.pixmap.pixels()[(y * width + x) as usize].demultiply();
            Rgba([color.red(), color.green(), color.blue(), color.alpha()])
        })
    }

    /// Encode to PNG or JPEG bytes
    ///
    /// JPEG has no alpha channel; transparent pixels lose their alpha.
    pub fn encode(&self, encoding: ImageEncoding) -> Result<Vec<u8>, SurfaceError> {
        let image = self.to_rgba_image();
        let mut out = Vec::new();

        match encoding {
            ImageEncoding::Png => {
                DynamicImage::ImageRgba8(image)
                    .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
            }
            ImageEncoding::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                    .encode_image(&rgb)?;
            }
        }

        Ok(out)
    }
}
