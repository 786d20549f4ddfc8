//! Render scheduler
//!
//! Drains the page render queue one page at a time. Each run holds the
//! processing gate, so rendering never interleaves with an export, and
//! consults a yield policy after every rasterized page.

use crate::document::Document;
use crate::error::EditorError;
use crate::page::{PageStatus, PageStore};
use crate::surface::RasterSurface;
use pagemark_scheduler::{
    Enqueued, Flow, PageNumber, Priority, ProcessingGate, RenderQueue, RenderTask,
    SchedulerStats, WorkKind, YieldPolicy,
};
use pdf_engine::{PdfEngine, PdfEngineError, RenderRequest};

/// Everything a run needs from the session
pub struct RenderContext<'a> {
    pub engine: &'a dyn PdfEngine,
    pub document: &'a Document,
    pub pages: &'a mut PageStore,
    pub gate: &'a ProcessingGate,
    pub render_scale: f32,
    /// Page whose completion triggers a repaint
    pub current_page: PageNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    /// Queue is empty
    #[default]
    Drained,
    /// Yield policy handed control back with work remaining
    Suspended,
    /// Another long-running task holds the gate; nothing ran
    Busy,
}

/// Outcome of one [`RenderScheduler::run`]
#[derive(Debug, Default)]
pub struct RenderPass {
    pub state: PassState,
    /// Pages rasterized during this pass, in order
    pub rendered: Vec<PageNumber>,
    /// Per-page failures; those pages are pending again
    pub failures: Vec<EditorError>,
    /// The current page became ready
    pub repaint: bool,
}

impl RenderPass {
    pub fn has_more(&self) -> bool {
        self.state != PassState::Drained
    }
}

#[derive(Debug, Default)]
pub struct RenderScheduler {
    queue: RenderQueue,
    stats: SchedulerStats,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task or upgrades the priority of a queued one
    pub fn enqueue(&mut self, page: PageNumber, priority: impl Into<Priority>) -> Enqueued {
        let priority = priority.into();
        let outcome = self.queue.enqueue(page, priority);
        match outcome {
            Enqueued::Inserted => self.stats.enqueued += 1,
            Enqueued::Promoted => self.stats.promoted += 1,
            Enqueued::AlreadyQueued => {}
        }
        log::debug!("enqueue page {page} ({priority:?}): {outcome:?}");
        outcome
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued tasks in execution order
    pub fn tasks(&self) -> Vec<RenderTask> {
        self.queue.tasks()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Drops every queued task
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Rasterizes queued pages until the queue drains or the policy suspends
    pub fn run(&mut self, ctx: RenderContext<'_>, mut policy: impl YieldPolicy) -> RenderPass {
        let mut pass = RenderPass::default();
        if self.queue.is_empty() {
            return pass;
        }

        let Some(_guard) = ctx.gate.try_acquire(WorkKind::Rendering) else {
            log::debug!("render pass deferred: {:?} in progress", ctx.gate.active());
            pass.state = PassState::Busy;
            return pass;
        };

        policy.begin_slice();
        while let Some(task) = self.queue.pop() {
            let number = task.page_number;
            let Some(page) = ctx.pages.get_mut(number) else {
                log::debug!("skipping render of unknown page {number}");
                self.stats.skipped += 1;
                continue;
            };
            if page.status() != PageStatus::Pending {
                log::debug!("skipping render of page {number}: {:?}", page.status());
                self.stats.skipped += 1;
                continue;
            }

            page.begin_render();
            match rasterize(ctx.engine, ctx.document, number, ctx.render_scale) {
                Ok(surface) => {
                    page.finish_render(surface);
                    self.stats.completed += 1;
                    pass.rendered.push(number);
                    if number == ctx.current_page {
                        pass.repaint = true;
                    }
                }
                Err(err) => {
                    page.fail_render();
                    self.stats.failed += 1;
                    log::warn!("{err}");
                    pass.failures.push(err);
                }
            }

            if policy.after_unit() == Flow::Suspend && !self.queue.is_empty() {
                pass.state = PassState::Suspended;
                return pass;
            }
        }

        pass
    }
}

/// Rasterizes one page at `scale` pixels per point
pub fn rasterize(
    engine: &dyn PdfEngine,
    document: &Document,
    page: PageNumber,
    scale: f32,
) -> Result<RasterSurface, EditorError> {
    let request = RenderRequest { page_index: page.saturating_sub(1), scale };
    let image = engine
        .render_page(document.handle(), request)
        .map_err(|source| EditorError::RasterizationFailure { page, source })?;

    RasterSurface::from_rgba_image(&image).map_err(|err| EditorError::RasterizationFailure {
        page,
        source: PdfEngineError::Backend(err.to_string()),
    })
}
