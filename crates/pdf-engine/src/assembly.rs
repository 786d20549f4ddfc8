//! Output document assembly from full-page raster images

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF write failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised image encoding")]
    UnknownImage,
    #[error("unknown page reference {0}")]
    UnknownPage(usize),
    #[error("unknown image reference {0}")]
    UnknownImageRef(usize),
    #[error("document has no pages")]
    Empty,
}

/// Opaque handle to an image embedded in an assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(usize);

/// Opaque handle to a page added to an assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef(usize);

/// Builds a new document out of encoded page images.
///
/// Coordinates passed to [`draw_image`](Self::draw_image) are PDF points
/// with the origin at the bottom-left of the page.
pub trait DocumentAssembler {
    /// Embeds PNG or JPEG bytes and returns a handle usable on any page
    fn embed_image(&mut self, encoded: &[u8]) -> Result<ImageRef, AssemblyError>;

    fn add_page(&mut self, width_pt: f32, height_pt: f32) -> PageRef;

    fn draw_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), AssemblyError>;

    fn page_count(&self) -> usize;

    fn serialize(self) -> Result<Vec<u8>, AssemblyError>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    image: ImageRef,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Default)]
struct PendingPage {
    width_pt: f32,
    height_pt: f32,
    placements: Vec<Placement>,
}

/// [`DocumentAssembler`] that writes a PDF with lopdf
///
/// JPEG data is embedded as-is with `DCTDecode`. Everything else is decoded,
/// split into RGB and alpha planes and stored with `FlateDecode`.
pub struct LopdfAssembler {
    doc: Document,
    images: Vec<ObjectId>,
    pages: Vec<PendingPage>,
}

impl Default for LopdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfAssembler {
    pub fn new() -> Self {
        Self { doc: Document::with_version("1.7"), images: Vec::new(), pages: Vec::new() }
    }

    fn embed_jpeg(&mut self, encoded: &[u8]) -> Result<Option<ObjectId>, AssemblyError> {
        let decoder =
            ImageReader::with_format(Cursor::new(encoded), ImageFormat::Jpeg).into_decoder()?;
        let (width, height) = decoder.dimensions();
        let color_space = match decoder.color_type() {
            ColorType::L8 => "DeviceGray",
            ColorType::Rgb8 => "DeviceRGB",
            // CMYK and other layouts go through the re-encode path
            _ => return Ok(None),
        };

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };

        Ok(Some(self.doc.add_object(Stream::new(dict, encoded.to_vec()))))
    }

    fn embed_decoded(&mut self, encoded: &[u8]) -> Result<ObjectId, AssemblyError> {
        let rgba = image::load_from_memory(encoded)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if alpha.iter().any(|&a| a != u8::MAX) {
            let mask = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            let mask_id = self.doc.add_object(Stream::new(mask, deflate(&alpha)?));
            dict.set("SMask", mask_id);
        }

        Ok(self.doc.add_object(Stream::new(dict, deflate(&rgb)?)))
    }

    fn page_content(&self, page: &PendingPage) -> Result<Vec<u8>, AssemblyError> {
        let mut operations = Vec::with_capacity(page.placements.len() * 4);
        for placement in &page.placements {
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    placement.width.into(),
                    Object::Integer(0),
                    Object::Integer(0),
                    placement.height.into(),
                    placement.x.into(),
                    placement.y.into(),
                ],
            ));
            operations.push(Operation::new(
                "Do",
                vec![Object::Name(image_name(placement.image).into_bytes())],
            ));
            operations.push(Operation::new("Q", vec![]));
        }

        Ok(Content { operations }.encode()?)
    }
}

impl DocumentAssembler for LopdfAssembler {
    fn embed_image(&mut self, encoded: &[u8]) -> Result<ImageRef, AssemblyError> {
        let format = image::guess_format(encoded).map_err(|_| AssemblyError::UnknownImage)?;

        let object_id = match format {
            ImageFormat::Jpeg => match self.embed_jpeg(encoded)? {
                Some(id) => id,
                None => self.embed_decoded(encoded)?,
            },
            _ => self.embed_decoded(encoded)?,
        };

        self.images.push(object_id);
        Ok(ImageRef(self.images.len() - 1))
    }

    fn add_page(&mut self, width_pt: f32, height_pt: f32) -> PageRef {
        self.pages.push(PendingPage { width_pt, height_pt, placements: Vec::new() });
        PageRef(self.pages.len() - 1)
    }

    fn draw_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), AssemblyError> {
        if image.0 >= self.images.len() {
            return Err(AssemblyError::UnknownImageRef(image.0));
        }
        let pending = self.pages.get_mut(page.0).ok_or(AssemblyError::UnknownPage(page.0))?;
        pending.placements.push(Placement { image, x, y, width, height });
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn serialize(mut self) -> Result<Vec<u8>, AssemblyError> {
        if self.pages.is_empty() {
            return Err(AssemblyError::Empty);
        }

        let pages_id = self.doc.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let content = self.page_content(page)?;
            let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

            let mut xobjects = Dictionary::new();
            for placement in &page.placements {
                xobjects.set(image_name(placement.image), self.images[placement.image.0]);
            }

            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    page.width_pt.into(),
                    page.height_pt.into(),
                ],
                "Resources" => dictionary! { "XObject" => xobjects },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        log::debug!("assembled {} pages into {} bytes", count, buffer.len());
        Ok(buffer)
    }
}

fn image_name(image: ImageRef) -> String {
    format!("Im{}", image.0)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, AssemblyError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, pixel);
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 85).encode_image(&image).unwrap();
        out
    }

    fn xobject_filter(doc: &Document, page_number: u32) -> Vec<u8> {
        let pages = doc.get_pages();
        let page = doc.get_dictionary(pages[&page_number]).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let (_, reference) = xobjects.iter().next().unwrap();
        let stream = doc.get_object(reference.as_reference().unwrap()).unwrap();
        let stream = stream.as_stream().unwrap();
        stream.dict.get(b"Filter").unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn assembles_pages_in_order_with_sizes() {
        let mut assembler = LopdfAssembler::new();
        let png = assembler.embed_image(&png_bytes(4, 4, Rgba([255, 0, 0, 255]))).unwrap();
        let jpeg = assembler.embed_image(&jpeg_bytes(8, 8)).unwrap();

        let first = assembler.add_page(612.0, 792.0);
        assembler.draw_image(first, png, 0.0, 0.0, 612.0, 792.0).unwrap();
        let second = assembler.add_page(300.0, 200.0);
        assembler.draw_image(second, jpeg, 0.0, 0.0, 300.0, 200.0).unwrap();
        assert_eq!(assembler.page_count(), 2);

        let bytes = assembler.serialize().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        assert_eq!(xobject_filter(&doc, 1), b"FlateDecode".to_vec());
        assert_eq!(xobject_filter(&doc, 2), b"DCTDecode".to_vec());
    }

    #[test]
    fn translucent_png_gets_soft_mask() {
        let mut assembler = LopdfAssembler::new();
        let image = assembler.embed_image(&png_bytes(2, 2, Rgba([0, 0, 0, 128]))).unwrap();
        let page = assembler.add_page(10.0, 10.0);
        assembler.draw_image(page, image, 0.0, 0.0, 10.0, 10.0).unwrap();

        let doc = Document::load_mem(&assembler.serialize().unwrap()).unwrap();
        let has_mask = doc.objects.values().any(|object| {
            object.as_stream().map(|stream| stream.dict.has(b"SMask")).unwrap_or(false)
        });
        assert!(has_mask);
    }

    #[test]
    fn empty_assembler_refuses_to_serialize() {
        let assembler = LopdfAssembler::new();
        assert!(matches!(assembler.serialize(), Err(AssemblyError::Empty)));
    }

    #[test]
    fn garbage_image_is_rejected() {
        let mut assembler = LopdfAssembler::new();
        let err = assembler.embed_image(b"nope").expect_err("not an image");
        assert!(matches!(err, AssemblyError::UnknownImage));
    }

    #[test]
    fn unknown_page_reference_is_rejected() {
        let mut assembler = LopdfAssembler::new();
        let image = assembler.embed_image(&png_bytes(1, 1, Rgba([0, 0, 0, 255]))).unwrap();
        let err = assembler.draw_image(PageRef(3), image, 0.0, 0.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, AssemblyError::UnknownPage(3)));
    }
}
