//! Compositing/export pipeline
//!
//! Flattens every page into a full-page image and assembles a new document.
//! Pages are processed in order, one per unit of work, and the job hands
//! control back to its caller whenever the yield policy asks. The job holds
//! the processing gate from [`ExportJob::start`] until it finishes or is
//! dropped, so no render pass runs in between.

use crate::annotation::Annotation;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{EditorError, EditorResult};
use crate::page::PageStore;
use crate::paint::Painter;
use crate::render::rasterize;
use crate::surface::ImageEncoding;
use pagemark_scheduler::{Flow, GateGuard, ProcessingGate, WorkKind, YieldPolicy};
use pdf_engine::{DocumentAssembler, DocumentHandle, PdfEngine};
use std::sync::Arc;
use tiny_skia::Transform;

/// Session state an export step reads
pub struct ExportContext<'a> {
    pub engine: &'a dyn PdfEngine,
    pub document: &'a Document,
    /// Pages without a raster yet are rasterized for the export only
    pub pages: &'a PageStore,
    pub painter: &'a Painter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub bytes: Arc<Vec<u8>>,
    /// No page carried annotations; `bytes` are the source document
    pub reused_source: bool,
    /// Pages that went through compositing
    pub composited_pages: u32,
    pub page_count: u32,
}

pub enum ExportStep<A> {
    /// Yielded with pages remaining; call [`ExportJob::resume`] again
    Suspended(ExportJob<A>),
    Finished(ExportOutput),
}

impl<A> std::fmt::Debug for ExportStep<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStep::Suspended(job) => write!(f, "Suspended(next_page={})", job.next_index + 1),
            ExportStep::Finished(output) => f.debug_tuple("Finished").field(output).finish(),
        }
    }
}

pub struct ExportJob<A> {
    _guard: GateGuard,
    assembler: A,
    next_index: usize,
    composited: u32,
    encoding: ImageEncoding,
    render_scale: f32,
    /// Document seen by the first resume; later resumes must see the same one
    source: Option<(DocumentHandle, u32)>,
}

impl<A: DocumentAssembler> ExportJob<A> {
    /// Claims the processing gate
    ///
    /// Fails with [`EditorError::Busy`] while rendering or another export runs.
    pub fn start(gate: &ProcessingGate, assembler: A, config: &EditorConfig) -> EditorResult<Self> {
        let guard = gate
            .try_acquire(WorkKind::Exporting)
            .ok_or_else(|| EditorError::Busy(gate.active().unwrap_or(WorkKind::Exporting)))?;

        Ok(Self {
            _guard: guard,
            assembler,
            next_index: 0,
            composited: 0,
            encoding: config.export_encoding,
            render_scale: config.render_scale,
            source: None,
        })
    }

    /// Pages already handed to the assembler
    pub fn pages_done(&self) -> usize {
        self.next_index
    }

    /// Processes pages until done or the policy suspends
    ///
    /// Any failure aborts the whole export; the gate is released when the
    /// consumed job drops.
    pub fn resume(
        mut self,
        ctx: ExportContext<'_>,
        mut policy: impl YieldPolicy,
    ) -> EditorResult<ExportStep<A>> {
        let page_count = ctx.document.page_count();
        let seen = (ctx.document.handle(), page_count);
        match self.source {
            Some(source) if source != seen => {
                let err = EditorError::CompositingFailure {
                    page: self.next_index as u32 + 1,
                    reason: "document changed while the export was suspended".into(),
                };
                log::error!("export aborted: {err}");
                return Err(err);
            }
            Some(_) => {}
            None => self.source = Some(seen),
        }

        if self.next_index == 0 && !ctx.pages.any_annotated() {
            log::info!("no annotations; exporting source document unchanged");
            return Ok(ExportStep::Finished(ExportOutput {
                bytes: Arc::clone(ctx.document.source_bytes()),
                reused_source: true,
                composited_pages: 0,
                page_count,
            }));
        }

        policy.begin_slice();
        while self.next_index < page_count as usize {
            if let Err(err) = self.export_page(&ctx, self.next_index) {
                log::error!("export aborted: {err}");
                return Err(err);
            }
            self.next_index += 1;

            if self.next_index < page_count as usize && policy.after_unit() == Flow::Suspend {
                log::debug!("export yielding after page {}", self.next_index);
                return Ok(ExportStep::Suspended(self));
            }
        }

        let composited = self.composited;
        let bytes = self.assembler.serialize().map_err(|err| {
            log::error!("export aborted: {err}");
            EditorError::Assembly(err)
        })?;
        log::info!("exported {page_count} pages ({composited} composited, {} bytes)", bytes.len());

        Ok(ExportStep::Finished(ExportOutput {
            bytes: Arc::new(bytes),
            reused_source: false,
            composited_pages: composited,
            page_count,
        }))
    }

    fn export_page(&mut self, ctx: &ExportContext<'_>, index: usize) -> EditorResult<()> {
        let number = index as u32 + 1;
        let fail = |reason: String| EditorError::CompositingFailure { page: number, reason };

        let page = ctx.pages.get(number).ok_or_else(|| fail("page missing from store".into()))?;

        let rendered;
        let base = match page.surface() {
            Some(surface) => surface,
            None => {
                rendered = rasterize(ctx.engine, ctx.document, number, self.render_scale)
                    .map_err(|err| fail(err.to_string()))?;
                &rendered
            }
        };

        if !ctx.painter.has_font() && page.annotations().iter().any(Annotation::is_text) {
            return Err(fail("no text font available to paint text annotations".into()));
        }

        let encoded = if page.has_annotations() {
            let flattened = ctx
                .painter
                .compose(
                    Some(base),
                    base.width(),
                    base.height(),
                    page.annotations(),
                    Transform::identity(),
                )
                .map_err(|err| fail(err.to_string()))?;
            self.composited += 1;
            flattened.encode(self.encoding)
        } else {
            base.encode(self.encoding)
        }
        .map_err(|err| fail(err.to_string()))?;

        let (width_pt, height_pt) = match ctx.document.page_size(index) {
            Some(size) => (size.width_pt, size.height_pt),
            None => (
                base.width() as f32 / self.render_scale,
                base.height() as f32 / self.render_scale,
            ),
        };

        let image = self.assembler.embed_image(&encoded).map_err(|err| fail(err.to_string()))?;
        let page_ref = self.assembler.add_page(width_pt, height_pt);
        self.assembler
            .draw_image(page_ref, image, 0.0, 0.0, width_pt, height_pt)
            .map_err(|err| fail(err.to_string()))?;

        log::debug!("exported page {number}");
        Ok(())
    }
}
