//! Loaded source document
//!
//! Wraps the engine's opaque handle with what the editor needs up front:
//! page count, per-page sizes and the original bytes for verbatim export.

use crate::error::{EditorError, EditorResult};
use pdf_engine::{DocumentHandle, OpenSource, PageSize, PdfEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable once opened; replaced wholesale when another document is opened
#[derive(Debug, Clone)]
pub struct Document {
    handle: DocumentHandle,
    page_sizes: Vec<PageSize>,
    source: Arc<Vec<u8>>,
    path: Option<PathBuf>,
}

impl Document {
    /// Opens `source` through `engine`
    ///
    /// Any failure here is [`EditorError::InvalidDocument`].
    pub fn open(engine: &mut dyn PdfEngine, source: OpenSource) -> EditorResult<Self> {
        let (bytes, path) = match source {
            OpenSource::Path(path) => {
                let bytes = std::fs::read(&path)
                    .map_err(|err| EditorError::InvalidDocument(err.into()))?;
                (bytes, Some(path))
            }
            OpenSource::Bytes(bytes) => (bytes, None),
        };

        let handle = engine
            .open(OpenSource::Bytes(bytes.clone()))
            .map_err(EditorError::InvalidDocument)?;

        let page_sizes = match Self::read_page_sizes(engine, handle) {
            Ok(sizes) => sizes,
            Err(err) => {
                if let Err(close_err) = engine.close(handle) {
                    log::debug!("closing rejected document failed: {close_err}");
                }
                return Err(EditorError::InvalidDocument(err));
            }
        };

        log::info!(
            "opened {} ({} pages)",
            path.as_deref().map_or_else(|| "<memory>".into(), |p| p.display().to_string()),
            page_sizes.len()
        );

        Ok(Self { handle, page_sizes, source: Arc::new(bytes), path })
    }

    fn read_page_sizes(
        engine: &dyn PdfEngine,
        handle: DocumentHandle,
    ) -> Result<Vec<PageSize>, pdf_engine::PdfEngineError> {
        let count = engine.page_count(handle)?;
        (0..count).map(|index| engine.page_size(handle, index)).collect()
    }

    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    /// Size in points of the page at zero-based `index`
    pub fn page_size(&self, index: usize) -> Option<PageSize> {
        self.page_sizes.get(index).copied()
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    /// Original bytes, exported verbatim when nothing was annotated
    pub fn source_bytes(&self) -> &Arc<Vec<u8>> {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `<stem>-annotated.pdf`, or `document-annotated.pdf` without a path
    pub fn suggested_output_name(&self) -> String {
        let stem = self
            .path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        format!("{stem}-annotated.pdf")
    }
}
