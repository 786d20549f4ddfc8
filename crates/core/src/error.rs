//! Editor error types

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::surface::SurfaceError;
use pagemark_scheduler::WorkKind;
use pdf_engine::{AssemblyError, PdfEngineError};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The source could not be opened; no page store exists
    #[error("invalid document: {0}")]
    InvalidDocument(#[source] PdfEngineError),

    /// One page failed to rasterize; the page stays pending
    #[error("failed to render page {page}: {source}")]
    RasterizationFailure {
        page: u32,
        #[source]
        source: PdfEngineError,
    },

    /// One page failed during export; the whole export is aborted
    #[error("failed to composite page {page}: {reason}")]
    CompositingFailure { page: u32, reason: String },

    #[error("failed to assemble output document: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("{0} is already in progress")]
    Busy(WorkKind),

    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("raster surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("save failed: {0}")]
    SaveFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl EditorError {
    /// Failures contained to one page that leave the session usable
    pub fn is_page_local(&self) -> bool {
        matches!(self, EditorError::RasterizationFailure { .. })
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
