use lopdf::{dictionary, Document, Object, Stream};
use pdf_engine::{
    DocumentHandle, LopdfEngine, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest,
    RgbaImage,
};

/// US Letter PDF with `pages` empty pages
pub fn letter_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("in-memory save");
    buffer
}

/// lopdf engine that refuses to rasterize one page
pub struct FailingPageEngine {
    inner: LopdfEngine,
    failing_index: u32,
}

impl FailingPageEngine {
    pub fn new(failing_page: u32) -> Self {
        Self { inner: LopdfEngine::new(), failing_index: failing_page - 1 }
    }
}

impl PdfEngine for FailingPageEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.inner.open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.inner.page_count(handle)
    }

    fn page_size(&self, handle: DocumentHandle, index: u32) -> Result<PageSize, PdfEngineError> {
        self.inner.page_size(handle, index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        if request.page_index == self.failing_index {
            return Err(PdfEngineError::Backend("corrupt content stream".into()));
        }
        self.inner.render_page(handle, request)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.inner.close(handle)
    }
}
