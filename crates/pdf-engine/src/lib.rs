//! Document library adapters
//!
//! The editor core never parses or encodes PDF itself. It talks to two
//! collaborators defined here: a [`PdfEngine`] that opens documents and
//! rasterizes pages, and a [`DocumentAssembler`] that builds an output
//! document from full-page images.

pub mod assembly;

pub use assembly::{AssemblyError, DocumentAssembler, ImageRef, LopdfAssembler, PageRef};

use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Engine-issued token for an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Page size in PDF points (1/72 inch), after page rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter, used when a page has no readable MediaBox
    pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    fn swapped(self) -> Self {
        Self { width_pt: self.height_pt, height_pt: self.width_pt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// Zero-based page index
    pub page_index: u32,
    /// Pixels per PDF point
    pub scale: f32,
}

impl RenderRequest {
    fn effective_scale(&self) -> f32 {
        if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }
}

/// Where a document's bytes come from
#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl OpenSource {
    pub fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self {
            OpenSource::Path(path) => std::fs::read(path),
            OpenSource::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<PathBuf> for OpenSource {
    fn from(path: PathBuf) -> Self {
        OpenSource::Path(path)
    }
}

impl From<&Path> for OpenSource {
    fn from(path: &Path) -> Self {
        OpenSource::Path(path.to_owned())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(bytes: Vec<u8>) -> Self {
        OpenSource::Bytes(bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("unknown document handle {0}")]
    InvalidHandle(DocumentHandle),
    #[error("page index {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported by this engine")]
    EncryptedUnsupported,
    #[error("{0}")]
    Backend(String),
}

/// Document parsing and rasterization backend
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError>;

    /// Rasterizes one page at `request.scale` pixels per point
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

struct LoadedDocument {
    #[cfg_attr(not(feature = "pdfium"), allow(dead_code))]
    bytes: Vec<u8>,
    pages: Vec<PageSize>,
}

impl LoadedDocument {
    fn page(&self, index: u32) -> Result<PageSize, PdfEngineError> {
        self.pages.get(index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: index,
            page_count: self.pages.len() as u32,
        })
    }
}

/// Pure-Rust engine backed by lopdf
///
/// Parses structure and page geometry. It has no content renderer, so
/// rasterization produces a blank page of the correct size with a thin
/// frame. Enable the `pdfium` feature for real page content.
#[derive(Default)]
pub struct LopdfEngine {
    last_handle: u64,
    documents: HashMap<DocumentHandle, LoadedDocument>,
}

impl fmt::Debug for LopdfEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LopdfEngine").field("open_documents", &self.documents.len()).finish()
    }
}

const FRAME: Rgba<u8> = Rgba([220, 220, 220, 255]);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self, handle: DocumentHandle) -> Result<&LoadedDocument, PdfEngineError> {
        self.documents.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle))
    }
}

/// Cheap pre-parse check; lopdf cannot decrypt and would report garbage
fn declares_encryption(bytes: &[u8]) -> bool {
    const MARKER: &[u8] = b"/Encrypt";
    bytes.windows(MARKER.len()).any(|window| window == MARKER)
}

/// Sizes of every page, honouring inherited MediaBox and Rotate entries
fn read_page_sizes(doc: &Document) -> Result<Vec<PageSize>, PdfEngineError> {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(PdfEngineError::Backend("document has no pages".into()));
    }

    pages.values().map(|&page_id| page_geometry(doc, page_id)).collect()
}

fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageSize, PdfEngineError> {
    let page = doc.get_dictionary(page_id)?;

    let size = inherited(doc, page, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .and_then(|array| rect_size(array))
        .unwrap_or(PageSize::LETTER);

    let rotation = inherited(doc, page, b"Rotate").and_then(|object| object.as_i64().ok());
    Ok(match rotation.map(|degrees| degrees.rem_euclid(360)) {
        Some(90) | Some(270) => size.swapped(),
        _ => size,
    })
}

/// Looks `key` up on the page, then on its ancestors in the page tree
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    // Bounded so a cyclic Parent chain cannot hang the engine
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(match value {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            });
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rect_size(array: &[Object]) -> Option<PageSize> {
    let [x0, y0, x1, y1] = array else {
        return None;
    };
    let coord = |object: &Object| object.as_float().ok();
    let width = (coord(x1)? - coord(x0)?).abs();
    let height = (coord(y1)? - coord(y0)?).abs();
    (width > 0.0 && height > 0.0).then_some(PageSize { width_pt: width, height_pt: height })
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = source.into_bytes()?;
        if declares_encryption(&bytes) {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let pages = read_page_sizes(&Document::load_mem(&bytes)?)?;

        self.last_handle += 1;
        let handle = DocumentHandle(self.last_handle);
        log::debug!("lopdf opened document {handle}: {} pages", pages.len());
        self.documents.insert(handle, LoadedDocument { bytes, pages });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.document(handle)?.pages.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
        self.document(handle)?.page(page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let size = self.page_size(handle, request.page_index)?;
        let scale = request.effective_scale();
        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;

        let framed = width >= 4 && height >= 4;
        Ok(RgbaImage::from_fn(width, height, |x, y| {
            let edge = x == 0 || y == 0 || x == width - 1 || y == height - 1;
            if framed && edge {
                FRAME
            } else {
                PAPER
            }
        }))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        match self.documents.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(PdfEngineError::InvalidHandle(handle)),
        }
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Geometry from lopdf, page content from PDFium
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        structure: LopdfEngine,
    }

    fn backend(err: PdfiumError) -> PdfEngineError {
        PdfEngineError::Backend(format!("pdfium: {err}"))
    }

    impl PdfiumEngine {
        /// Binds a PDFium library next to the executable, then the system one
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let local = Pdfium::pdfium_platform_library_name_at_path("./");
            let bindings = Pdfium::bind_to_library(local)
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(backend)?;
            Ok(Self { pdfium: Pdfium::new(bindings), structure: LopdfEngine::new() })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.structure.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.structure.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.structure.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let loaded = self.structure.document(handle)?;
            loaded.page(request.page_index)?;
            let index = u16::try_from(request.page_index).map_err(|_| {
                PdfEngineError::PageOutOfRange {
                    page: request.page_index,
                    page_count: loaded.pages.len() as u32,
                }
            })?;

            let document = self.pdfium.load_pdf_from_byte_slice(&loaded.bytes, None).map_err(backend)?;
            let page = document.pages().get(index).map_err(backend)?;
            let config = PdfRenderConfig::new().scale_page_by_factor(request.effective_scale());
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            Ok(bitmap.as_image().to_rgba8())
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.structure.close(handle)
        }
    }
}

/// Best available engine for the current build
///
/// Prefers PDFium when the `pdfium` feature is enabled and the library can
/// be bound, otherwise falls back to [`LopdfEngine`].
pub fn system_engine() -> Box<dyn PdfEngine> {
    #[cfg(feature = "pdfium")]
    {
        match pdfium_backend::PdfiumEngine::from_system_library() {
            Ok(engine) => return Box::new(engine),
            Err(err) => log::warn!("PDFium unavailable, using lopdf engine: {err}"),
        }
    }

    Box::new(LopdfEngine::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// Pages tree with the MediaBox on the root and per-page overrides
    fn build_pdf(pages: &[(Option<[i64; 4]>, Option<i64>)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let tree_id = doc.new_object_id();
        let mut kids = Vec::new();

        for (media_box, rotate) in pages {
            let contents = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => tree_id,
                "Contents" => contents,
            };
            if let Some(rect) = media_box {
                page.set("MediaBox", rect.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>());
            }
            if let Some(degrees) = rotate {
                page.set("Rotate", *degrees);
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let inherited_box: Vec<Object> = [0, 0, 200, 100].into_iter().map(Object::Integer).collect();
        doc.objects.insert(
            tree_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
                "MediaBox" => inherited_box,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => tree_id });
        doc.trailer.set("Root", catalog);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn open(engine: &mut LopdfEngine, bytes: Vec<u8>) -> DocumentHandle {
        engine.open(OpenSource::Bytes(bytes)).unwrap()
    }

    #[test]
    fn test_page_geometry_inherits_and_rotates() {
        let mut engine = LopdfEngine::new();
        let handle = open(
            &mut engine,
            build_pdf(&[(None, None), (Some([0, 0, 612, 792]), None), (None, Some(90))]),
        );

        assert_eq!(engine.page_count(handle).unwrap(), 3);
        assert_eq!(engine.page_size(handle, 0).unwrap(), PageSize { width_pt: 200.0, height_pt: 100.0 });
        assert_eq!(engine.page_size(handle, 1).unwrap(), PageSize::LETTER);
        assert_eq!(engine.page_size(handle, 2).unwrap(), PageSize { width_pt: 100.0, height_pt: 200.0 });
    }

    #[test]
    fn test_render_is_scaled_and_framed() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, build_pdf(&[(None, None)]));

        let image = engine.render_page(handle, RenderRequest { page_index: 0, scale: 1.5 }).unwrap();
        assert_eq!(image.dimensions(), (300, 150));
        assert_eq!(image.get_pixel(0, 0), &FRAME);
        assert_eq!(image.get_pixel(150, 75), &PAPER);

        let fallback = engine.render_page(handle, RenderRequest { page_index: 0, scale: -2.0 }).unwrap();
        assert_eq!(fallback.dimensions(), (200, 100));
    }

    #[test]
    fn test_page_out_of_range() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, build_pdf(&[(None, None), (None, None)]));

        let err = engine.page_size(handle, 5).unwrap_err();
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 5, page_count: 2 }));
        assert!(engine.render_page(handle, RenderRequest { page_index: 2, scale: 1.0 }).is_err());
    }

    #[test]
    fn test_rejects_garbage_and_encryption() {
        let mut engine = LopdfEngine::new();
        let garbage = engine.open(OpenSource::Bytes(b"definitely not a pdf".to_vec()));
        assert!(matches!(garbage, Err(PdfEngineError::Parse(_))));

        let encrypted = engine.open(OpenSource::Bytes(b"%PDF-1.7\ntrailer << /Encrypt 4 0 R >>".to_vec()));
        assert!(matches!(encrypted, Err(PdfEngineError::EncryptedUnsupported)));
    }

    #[test]
    fn test_handles_are_released_on_close() {
        let mut engine = LopdfEngine::new();
        let first = open(&mut engine, build_pdf(&[(None, None)]));
        let second = open(&mut engine, build_pdf(&[(None, None)]));
        assert_ne!(first, second);

        engine.close(first).unwrap();
        assert!(matches!(engine.page_count(first), Err(PdfEngineError::InvalidHandle(h)) if h == first));
        assert!(engine.close(first).is_err());
        assert_eq!(engine.page_count(second).unwrap(), 1);
    }

    #[test]
    fn test_open_from_path() {
        let dir = std::env::temp_dir().join(format!("pdf-engine-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("one.pdf");
        std::fs::write(&path, build_pdf(&[(None, None)])).unwrap();

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::from(path.as_path())).unwrap();
        assert_eq!(engine.page_count(handle).unwrap(), 1);

        let missing = engine.open(OpenSource::from(dir.join("missing.pdf")));
        assert!(matches!(missing, Err(PdfEngineError::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
