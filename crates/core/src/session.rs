//! Editor session
//!
//! [`EditorSession`] is the explicit context object for one open document:
//! it owns the engine, page store, view state, render queue, pointer state
//! and processing gate. Nothing is global; dropping the session tears it all
//! down and closes the document.

use crate::annotation::{Annotation, Color, Point, Rect};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{EditorError, EditorResult};
use crate::export::{ExportContext, ExportJob, ExportOutput, ExportStep};
use crate::input::{Key, KeyEvent, PointerEvent, PointerKind};
use crate::interaction::{Interaction, InteractionState};
use crate::page::{Page, PageStore};
use crate::paint::Painter;
use crate::persistence::{self, AnnotationSet};
use crate::render::{RenderContext, RenderPass, RenderScheduler};
use crate::save::{SaveChannel, SaveOutcome};
use crate::surface::RasterSurface;
use crate::text_entry::{TextCommit, TextEntry};
use crate::tool::{Tool, ToolSettings};
use crate::transform::{client_to_surface, fit_scale, DisplayTransform, Size};
use crate::view::ViewState;
use pagemark_scheduler::{
    Enqueued, EveryN, PageNumber, Priority, ProcessingGate, SchedulerStats, YieldPolicy,
};
use pdf_engine::{LopdfAssembler, OpenSource, PdfEngine};
use std::path::PathBuf;

pub struct EditorSession {
    config: EditorConfig,
    engine: Box<dyn PdfEngine>,
    document: Document,
    pages: PageStore,
    view: ViewState,
    scheduler: RenderScheduler,
    gate: ProcessingGate,
    painter: Painter,
    interaction: Interaction,
    text_entry: Option<TextEntry>,
    tool: Tool,
    settings: ToolSettings,
    /// Index of the selected text annotation on the current page
    selection: Option<usize>,
    viewport: Size,
    surface_origin: Point,
    base_fit_scale: f32,
    needs_repaint: bool,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("pages", &self.pages.len())
            .field("current_page", &self.current_page())
            .field("tool", &self.tool)
            .field("zoom", &self.view.zoom())
            .finish()
    }
}

impl EditorSession {
    /// Opens `source` and queues the first page at high priority
    pub fn open(
        mut engine: Box<dyn PdfEngine>,
        source: impl Into<OpenSource>,
        config: EditorConfig,
    ) -> EditorResult<Self> {
        config.validate()?;
        let document = Document::open(engine.as_mut(), source.into())?;
        let painter = Painter::from_config(&config);

        let mut session = Self {
            pages: PageStore::new(document.page_sizes(), config.render_scale, config.undo_depth),
            view: ViewState::new(&config),
            settings: ToolSettings::from_config(&config),
            engine,
            document,
            scheduler: RenderScheduler::new(),
            gate: ProcessingGate::new(),
            painter,
            interaction: Interaction::new(),
            text_entry: None,
            tool: Tool::default(),
            selection: None,
            viewport: Size::default(),
            surface_origin: Point::default(),
            base_fit_scale: 1.0,
            needs_repaint: true,
            config,
        };
        session.show_page(0);
        Ok(session)
    }

    /// Replaces the open document wholesale
    ///
    /// On failure the current document stays open and untouched. Fails with
    /// [`EditorError::Busy`] while a render pass or export holds the gate.
    pub fn replace_document(&mut self, source: impl Into<OpenSource>) -> EditorResult<()> {
        if let Some(kind) = self.gate.active() {
            return Err(EditorError::Busy(kind));
        }
        let document = Document::open(self.engine.as_mut(), source.into())?;
        let previous = std::mem::replace(&mut self.document, document);
        if let Err(err) = self.engine.close(previous.handle()) {
            log::debug!("closing previous document failed: {err}");
        }

        self.pages = PageStore::new(
            self.document.page_sizes(),
            self.config.render_scale,
            self.config.undo_depth,
        );
        self.scheduler.clear();
        self.interaction.cancel();
        self.text_entry = None;
        self.selection = None;
        self.view.reset();
        self.show_page(0);
        Ok(())
    }

    /// Tears the session down and releases the document
    pub fn close(self) {
        log::info!("closing editor session");
    }

    pub fn set_painter(&mut self, painter: Painter) {
        self.painter = painter;
        self.needs_repaint = true;
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn page(&self, page: PageNumber) -> Option<&Page> {
        self.pages.get(page)
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn current_page(&self) -> PageNumber {
        self.view.current_page()
    }

    pub fn current(&self) -> Option<&Page> {
        self.pages.get(self.current_page())
    }

    fn current_mut(&mut self) -> Option<&mut Page> {
        self.pages.get_mut(self.view.current_page())
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn gate(&self) -> &ProcessingGate {
        &self.gate
    }

    pub fn interaction_state(&self) -> InteractionState {
        self.interaction.state()
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn text_entry(&self) -> Option<&TextEntry> {
        self.text_entry.as_ref()
    }

    // Rendering

    /// Queues `page` unless it is already rendered or rendering
    pub fn request_render(&mut self, page: PageNumber, priority: Priority) -> Option<Enqueued> {
        let status = self.pages.get(page)?.status();
        if status != crate::page::PageStatus::Pending {
            return None;
        }
        Some(self.scheduler.enqueue(page, priority))
    }

    /// Runs queued renders until drained or `policy` suspends
    pub fn pump_renders(&mut self, policy: impl YieldPolicy) -> RenderPass {
        let ctx = RenderContext {
            engine: self.engine.as_ref(),
            document: &self.document,
            pages: &mut self.pages,
            gate: &self.gate,
            render_scale: self.config.render_scale,
            current_page: self.view.current_page(),
        };
        let pass = self.scheduler.run(ctx, policy);

        if pass.repaint {
            self.refit();
            self.needs_repaint = true;
        }
        pass
    }

    /// Returns and clears the pending repaint flag
    pub fn take_repaint(&mut self) -> bool {
        std::mem::take(&mut self.needs_repaint)
    }

    // Navigation

    fn show_page(&mut self, index: usize) {
        self.commit_text();
        self.interaction.cancel();
        self.selection = None;
        self.view.set_current_index(index);

        let number = index as PageNumber + 1;
        self.request_render(number, Priority::High);
        if self.config.prefetch_adjacent {
            if number > 1 {
                self.request_render(number - 1, Priority::Normal);
            }
            self.request_render(number + 1, Priority::Normal);
        }

        self.refit();
        self.needs_repaint = true;
    }

    /// Shows `page` (1-based)
    pub fn go_to(&mut self, page: PageNumber) -> EditorResult<()> {
        if page == 0 || page > self.page_count() {
            return Err(EditorError::PageOutOfRange { page, page_count: self.page_count() });
        }
        self.show_page(page as usize - 1);
        Ok(())
    }

    /// Returns `false` on the last page
    pub fn next_page(&mut self) -> bool {
        let current = self.current_page();
        if current >= self.page_count() {
            return false;
        }
        self.show_page(current as usize);
        true
    }

    /// Returns `false` on the first page
    pub fn prev_page(&mut self) -> bool {
        let index = self.view.current_index();
        if index == 0 {
            return false;
        }
        self.show_page(index - 1);
        true
    }

    // View

    fn refit(&mut self) {
        let canonical = self.current().map(Page::canonical_size).unwrap_or_default();
        self.base_fit_scale = fit_scale(self.viewport, canonical);
    }

    /// Size of the area the page is fitted into at zoom 1
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Size::new(width, height);
        self.refit();
        self.needs_repaint = true;
    }

    /// Client position of the page surface's top-left corner, pan included
    pub fn set_surface_origin(&mut self, x: f32, y: f32) {
        self.surface_origin = Point::new(x, y);
    }

    pub fn base_fit_scale(&self) -> f32 {
        self.base_fit_scale
    }

    pub fn display_transform(&self) -> DisplayTransform {
        DisplayTransform::new(self.base_fit_scale, self.view.zoom())
    }

    /// Canonical position of a client-space pointer
    pub fn to_canonical(&self, client: Point) -> Point {
        self.display_transform().to_canonical(client_to_surface(client, self.surface_origin))
    }

    /// Client position of a canonical point
    pub fn to_client(&self, canonical: Point) -> Point {
        let local = self.display_transform().to_display(canonical);
        Point::new(local.x + self.surface_origin.x, local.y + self.surface_origin.y)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.needs_repaint = true;
        self.view.set_zoom(zoom)
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.needs_repaint = true;
        self.view.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.needs_repaint = true;
        self.view.zoom_out()
    }

    pub fn reset_zoom(&mut self) {
        self.view.reset_zoom();
        self.needs_repaint = true;
    }

    /// Moves the page surface; stored annotation data is unaffected
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.view.pan_by(dx, dy);
        self.needs_repaint = true;
    }

    // Tools

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        self.commit_text();
        if self.interaction.cancel() {
            self.needs_repaint = true;
        }
        if tool != Tool::Select {
            self.selection = None;
        }
        self.tool = tool;
    }

    /// Color for new annotations of the active tool
    pub fn set_color(&mut self, color: Color) {
        match self.tool {
            Tool::Highlight => self.settings.highlight_color = color,
            _ => self.settings.color = color,
        }
        if let Some(entry) = self.text_entry.as_mut() {
            entry.set_color(color);
        }
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        if width > 0.0 {
            self.settings.stroke_width = width;
        }
    }

    pub fn set_font_size(&mut self, font_size: f32) {
        if font_size > 0.0 {
            self.settings.font_size = font_size;
            if let Some(entry) = self.text_entry.as_mut() {
                entry.set_font_size(font_size);
            }
        }
    }

    // Input

    /// Applies one pointer event; returns `true` when the page needs a repaint
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        let at = self.to_canonical(event.client());

        let repaint = match event.kind {
            PointerKind::Down => match self.tool {
                Tool::Select => self.select_at(at),
                Tool::Text => {
                    self.commit_text();
                    self.text_entry = Some(TextEntry::begin(at, &self.settings));
                    true
                }
                tool => self.interaction.pointer_down(tool, at, &self.settings),
            },
            PointerKind::Move => {
                if let Some(entry) = self.text_entry.as_mut().filter(|entry| entry.is_sizing()) {
                    entry.drag_to(at);
                    true
                } else {
                    self.interaction.pointer_move(at)
                }
            }
            PointerKind::Up => {
                if let Some(entry) = self.text_entry.as_mut().filter(|entry| entry.is_sizing()) {
                    entry.finish_sizing(at);
                    true
                } else if self.interaction.is_drawing() {
                    let min_size = self.config.min_shape_size;
                    if let Some(annotation) = self.interaction.pointer_up(at, min_size) {
                        self.commit_annotation(annotation);
                    }
                    true
                } else {
                    false
                }
            }
        };

        self.needs_repaint |= repaint;
        repaint
    }

    /// Applies one key event; returns `true` when it was handled
    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        if event.is_command('z') {
            return if event.modifiers.shift { self.redo() } else { self.undo() };
        }
        if event.is_command('y') {
            return self.redo();
        }

        match event.key {
            Key::Escape => {
                if self.cancel_text() {
                    true
                } else if self.interaction.cancel() {
                    self.needs_repaint = true;
                    true
                } else {
                    self.selection.take().is_some()
                }
            }
            Key::Enter if event.modifiers.command() && self.text_entry.is_some() => {
                self.commit_text();
                true
            }
            // The text field owns these while it is open
            Key::Delete | Key::Backspace if self.text_entry.is_none() => self.delete_selected(),
            _ => false,
        }
    }

    fn commit_annotation(&mut self, annotation: Annotation) {
        let number = self.current_page();
        if let Some(page) = self.current_mut() {
            log::debug!("adding {:?} to page {number}", annotation.kind());
            page.push(annotation);
            self.needs_repaint = true;
        }
    }

    /// Index of the topmost text annotation containing `at` on the current page
    pub fn hit_test(&self, at: Point) -> Option<usize> {
        let page = self.current()?;
        page.annotations()
            .iter()
            .enumerate()
            .filter(|(_, annotation)| annotation.is_text())
            .filter(|(_, annotation)| {
                self.painter.text_bounds(annotation).is_some_and(|bounds| bounds.contains(at))
            })
            .map(|(index, _)| index)
            .last()
    }

    /// Selects the text under `at`; a second click on the selection opens it for editing
    fn select_at(&mut self, at: Point) -> bool {
        let hit = self.hit_test(at);
        if let Some(index) = hit.filter(|_| hit == self.selection) {
            return self.edit_text(index);
        }
        let changed = hit != self.selection;
        self.selection = hit;
        changed
    }

    // Editing

    pub fn undo(&mut self) -> bool {
        self.interaction.cancel();
        self.selection = None;
        let undone = self.current_mut().is_some_and(Page::undo);
        self.needs_repaint |= undone;
        undone
    }

    pub fn redo(&mut self) -> bool {
        self.interaction.cancel();
        self.selection = None;
        let redone = self.current_mut().is_some_and(Page::redo);
        self.needs_repaint |= redone;
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.current().is_some_and(Page::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.current().is_some_and(Page::can_redo)
    }

    pub fn delete_selected(&mut self) -> bool {
        let Some(index) = self.selection.take() else {
            return false;
        };
        let removed = self.current_mut().and_then(|page| page.remove(index)).is_some();
        self.needs_repaint |= removed;
        removed
    }

    /// Removes every annotation on the current page as one undoable step
    pub fn clear_page(&mut self) -> bool {
        self.selection = None;
        let cleared = self.current_mut().is_some_and(Page::clear);
        self.needs_repaint |= cleared;
        cleared
    }

    // Text entry

    /// Opens a point-text entry at canonical `at`, committing any open entry
    pub fn begin_text(&mut self, at: Point) {
        self.commit_text();
        let mut entry = TextEntry::begin(at, &self.settings);
        entry.finish_sizing(at);
        self.text_entry = Some(entry);
    }

    /// Reopens the text annotation at `index` on the current page
    ///
    /// `index` refers to the list before the open entry, if any, is
    /// committed. A commit that deletes an earlier annotation shifts it down.
    pub fn edit_text(&mut self, index: usize) -> bool {
        let index = match self.commit_text() {
            Some(TextCommit::Deleted { index: removed }) if removed == index => return false,
            Some(TextCommit::Deleted { index: removed }) if removed < index => index - 1,
            _ => index,
        };

        let entry = self
            .current()
            .and_then(|page| page.annotations().get(index))
            .and_then(|annotation| TextEntry::edit(index, annotation));
        match entry {
            Some(entry) => {
                self.selection = Some(index);
                self.text_entry = Some(entry);
                true
            }
            None => false,
        }
    }

    /// Replaces the content of the open entry; `false` when none is open
    pub fn update_text(&mut self, text: &str) -> bool {
        match self.text_entry.as_mut() {
            Some(entry) => {
                entry.set_text(text);
                true
            }
            None => false,
        }
    }

    /// Commits the open entry, if any, to the current page
    pub fn commit_text(&mut self) -> Option<TextCommit> {
        let entry = self.text_entry.take()?;
        let commit = entry.commit(self.config.min_text_box);
        let page = self.current_mut()?;

        let changed = match &commit {
            TextCommit::Added(annotation) => {
                page.push(annotation.clone());
                true
            }
            TextCommit::Updated { index, annotation } => page.replace(*index, annotation.clone()),
            TextCommit::Deleted { index } => page.remove(*index).is_some(),
            TextCommit::Ignored => false,
        };
        if matches!(commit, TextCommit::Deleted { .. }) {
            self.selection = None;
        }
        self.needs_repaint |= changed;
        Some(commit)
    }

    /// Closes the open entry without touching the page
    pub fn cancel_text(&mut self) -> bool {
        self.text_entry.take().is_some()
    }

    /// Client position where the host should place the editable field
    pub fn text_entry_position(&self) -> Option<Point> {
        self.text_entry.as_ref().map(|entry| self.to_client(entry.origin()))
    }

    // Painting

    fn display_pixels(&self) -> (u32, u32) {
        let canonical = self.current().map(Page::canonical_size).unwrap_or_default();
        let size = self.display_transform().display_size(canonical);
        (size.width.round().max(1.0) as u32, size.height.round().max(1.0) as u32)
    }

    fn visible_annotations(&self) -> (Vec<&Annotation>, Option<Annotation>) {
        let committed = self.current().map(|page| page.annotations().iter().collect()).unwrap_or_default();
        (committed, self.interaction.provisional())
    }

    /// Annotation layer at display scale on a transparent surface
    ///
    /// Includes the in-progress drawing. The host composites it over the page raster.
    pub fn render_overlay(&self) -> EditorResult<RasterSurface> {
        let (width, height) = self.display_pixels();
        let (committed, provisional) = self.visible_annotations();
        let transform = self.display_transform().to_skia();

        let mut surface = RasterSurface::new(width, height)?;
        self.painter.paint(
            surface.pixmap_mut(),
            committed.into_iter().chain(provisional.as_ref()),
            transform,
        );
        Ok(surface)
    }

    /// Page raster with annotations at display scale
    ///
    /// The raster is left out while the page is still pending.
    pub fn render_view(&self) -> EditorResult<RasterSurface> {
        let (width, height) = self.display_pixels();
        let (committed, provisional) = self.visible_annotations();
        let base = self.current().and_then(Page::surface);

        Ok(self.painter.compose(
            base,
            width,
            height,
            committed.into_iter().chain(provisional.as_ref()),
            self.display_transform().to_skia(),
        )?)
    }

    /// Bounds of the selected text annotation, in canonical space
    pub fn selection_bounds(&self) -> Option<Rect> {
        let index = self.selection?;
        let annotation = self.current()?.annotations().get(index)?;
        self.painter.text_bounds(annotation)
    }

    // Export

    /// Claims the processing gate for an export
    ///
    /// Commits any open text entry and drops an in-progress drawing first.
    pub fn start_export(&mut self) -> EditorResult<ExportJob<LopdfAssembler>> {
        self.commit_text();
        self.interaction.cancel();
        ExportJob::start(&self.gate, LopdfAssembler::new(), &self.config)
    }

    pub fn resume_export(
        &self,
        job: ExportJob<LopdfAssembler>,
        policy: impl YieldPolicy,
    ) -> EditorResult<ExportStep<LopdfAssembler>> {
        let ctx = ExportContext {
            engine: self.engine.as_ref(),
            document: &self.document,
            pages: &self.pages,
            painter: &self.painter,
        };
        job.resume(ctx, policy)
    }

    /// Runs an export to completion, reporting `(done, total)` at each yield
    pub fn export_with_progress(
        &mut self,
        mut progress: impl FnMut(usize, usize),
    ) -> EditorResult<ExportOutput> {
        let total = self.pages.len();
        let mut job = self.start_export()?;
        loop {
            match self.resume_export(job, EveryN::new(self.config.export_yield_every))? {
                ExportStep::Suspended(next) => {
                    progress(next.pages_done(), total);
                    job = next;
                }
                ExportStep::Finished(output) => {
                    progress(total, total);
                    return Ok(output);
                }
            }
        }
    }

    pub fn export_all(&mut self) -> EditorResult<ExportOutput> {
        self.export_with_progress(|_, _| {})
    }

    /// Exports and hands the bytes to `channel`
    pub fn save(&mut self, channel: &mut dyn SaveChannel) -> EditorResult<SaveOutcome> {
        let output = self.export_with_progress(|done, total| channel.progress(done, total))?;
        let name = self.document.suggested_output_name();
        let outcome = channel.save(&output.bytes, &name).map_err(EditorError::SaveFailed)?;

        match &outcome {
            SaveOutcome::Saved { location } => log::info!("saved {location}"),
            SaveOutcome::Cancelled => log::info!("save cancelled"),
        }
        Ok(outcome)
    }

    // Persistence

    /// Every page's annotations
    pub fn annotation_set(&self) -> AnnotationSet {
        AnnotationSet::from_pages(self.pages.iter().map(Page::annotations))
    }

    /// Loads annotations into the pages, replacing what is there
    ///
    /// Fails without changing anything if the set names a page the document lacks.
    pub fn restore_annotations(&mut self, set: &AnnotationSet) -> EditorResult<()> {
        let page_count = self.page_count();
        if let Some(&page) = set.pages.keys().find(|&&page| page == 0 || page > page_count) {
            return Err(EditorError::PageOutOfRange { page, page_count });
        }

        self.text_entry = None;
        self.interaction.cancel();
        self.selection = None;
        for number in 1..=page_count {
            if let Some(page) = self.pages.get_mut(number) {
                page.restore_annotations(set.page(number).to_vec());
            }
        }
        self.needs_repaint = true;
        Ok(())
    }

    /// Writes the sidecar next to the source file; `None` for in-memory documents
    pub fn save_sidecar(&self) -> EditorResult<Option<PathBuf>> {
        let Some(path) = self.document.path() else {
            return Ok(None);
        };
        Ok(Some(persistence::save_annotations(path, &self.annotation_set())?))
    }

    /// Restores annotations from the sidecar if one exists
    pub fn load_sidecar(&mut self) -> EditorResult<bool> {
        let Some(path) = self.document.path() else {
            return Ok(false);
        };
        match persistence::load_annotations(path)? {
            Some(set) => {
                self.restore_annotations(&set)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        if let Err(err) = self.engine.close(self.document.handle()) {
            log::debug!("closing document failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::render::PassState;
    use crate::save::MemorySaveChannel;
    use crate::test_support::sample_pdf;
    use pagemark_scheduler::{DrainAll, EveryN, WorkKind};
    use pdf_engine::LopdfEngine;
    use pretty_assertions::assert_eq;

    /// Three 300x150 canonical pages shown at display scale 1
    fn session(pages: u32) -> EditorSession {
        let mut session =
            EditorSession::open(Box::new(LopdfEngine::new()), sample_pdf(pages), EditorConfig::default())
                .unwrap();
        session.set_painter(Painter::default());
        session.set_viewport(300.0, 150.0);
        session
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(Key::Character(ch)).with_modifiers(Modifiers { ctrl: true, ..Modifiers::NONE })
    }

    fn drag(session: &mut EditorSession, from: (f32, f32), to: (f32, f32)) {
        session.handle_pointer(PointerEvent::down(from.0, from.1));
        session.handle_pointer(PointerEvent::moved((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0));
        session.handle_pointer(PointerEvent::up(to.0, to.1));
    }

    fn place_text(session: &mut EditorSession, at: (f32, f32), text: &str) {
        session.set_tool(Tool::Text);
        session.handle_pointer(PointerEvent::down(at.0, at.1));
        session.handle_pointer(PointerEvent::up(at.0, at.1));
        session.update_text(text);
        session.commit_text();
    }

    #[test]
    fn test_open_queues_current_page_first() {
        let mut session = session(3);
        let order: Vec<_> = session.scheduler().tasks().iter().map(|task| task.page_number).collect();
        assert_eq!(order, vec![1, 2]);

        let pass = session.pump_renders(DrainAll);
        assert_eq!(pass.rendered, vec![1, 2]);
        assert!(pass.repaint);
        assert!(session.current().unwrap().is_ready());
        assert!(!session.page(3).unwrap().is_ready());
    }

    #[test]
    fn test_rectangle_commit_undo_redo() {
        let mut session = session(3);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        let expected = Annotation::Rectangle { x: 10.0, y: 10.0, width: 40.0, height: 40.0, color: Color::RED };
        assert_eq!(session.current().unwrap().annotations(), &[expected.clone()]);

        assert!(session.undo());
        assert!(session.current().unwrap().annotations().is_empty());
        assert!(session.redo());
        assert_eq!(session.current().unwrap().annotations(), &[expected]);
        assert!(!session.redo());
    }

    #[test]
    fn test_pointer_maps_through_zoom_and_origin() {
        let mut session = session(1);
        session.set_viewport(150.0, 75.0);
        assert_eq!(session.base_fit_scale(), 0.5);
        session.set_zoom(2.0);
        session.set_surface_origin(20.0, 30.0);

        assert_eq!(session.to_canonical(Point::new(120.0, 80.0)), Point::new(100.0, 50.0));
        assert_eq!(session.to_client(Point::new(100.0, 50.0)), Point::new(120.0, 80.0));
    }

    #[test]
    fn test_navigation_bounds() {
        let mut session = session(3);
        assert!(!session.prev_page());
        session.go_to(3).unwrap();
        assert_eq!(session.current_page(), 3);
        assert!(!session.next_page());
        assert!(session.prev_page());
        assert_eq!(session.current_page(), 2);

        let err = session.go_to(4).unwrap_err();
        assert!(matches!(err, EditorError::PageOutOfRange { page: 4, page_count: 3 }));
        assert!(session.go_to(0).is_err());
    }

    #[test]
    fn test_page_switch_drops_in_progress_drawing() {
        let mut session = session(2);
        session.set_tool(Tool::Pen);
        session.handle_pointer(PointerEvent::down(10.0, 10.0));
        session.handle_pointer(PointerEvent::moved(40.0, 40.0));
        assert_eq!(session.interaction_state(), InteractionState::Drawing);

        assert!(session.next_page());
        session.handle_pointer(PointerEvent::up(60.0, 60.0));
        assert_eq!(session.interaction_state(), InteractionState::Idle);
        assert_eq!(session.pages().annotation_count(), 0);
    }

    #[test]
    fn test_escape_cancels_drawing() {
        let mut session = session(1);
        session.set_tool(Tool::Line);
        session.handle_pointer(PointerEvent::down(10.0, 10.0));
        session.handle_pointer(PointerEvent::moved(80.0, 40.0));

        assert!(session.handle_key(KeyEvent::new(Key::Escape)));
        session.handle_pointer(PointerEvent::up(80.0, 40.0));
        assert!(!session.current().unwrap().has_annotations());
    }

    #[test]
    fn test_tiny_shapes_are_discarded() {
        let mut session = session(1);
        session.set_tool(Tool::Highlight);
        drag(&mut session, (10.0, 10.0), (11.0, 11.0));
        assert!(!session.current().unwrap().has_annotations());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_keyboard_undo_redo() {
        let mut session = session(1);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        assert!(session.handle_key(ctrl('z')));
        assert!(!session.current().unwrap().has_annotations());
        assert!(session.handle_key(ctrl('y')));
        assert!(session.current().unwrap().has_annotations());

        session.undo();
        let redo = KeyEvent::new(Key::Character('Z'))
            .with_modifiers(Modifiers { meta: true, shift: true, ..Modifiers::NONE });
        assert!(session.handle_key(redo));
        assert!(session.current().unwrap().has_annotations());
    }

    #[test]
    fn test_text_placement_and_hit_test() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (20.0, 20.0), "hello");

        let page = session.current().unwrap();
        assert!(matches!(&page.annotations()[0], Annotation::Text { text, .. } if text == "hello"));
        assert_eq!(session.hit_test(Point::new(25.0, 25.0)), Some(0));
        assert_eq!(session.hit_test(Point::new(200.0, 100.0)), None);
    }

    #[test]
    fn test_overlapping_text_hits_topmost() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (20.0, 20.0), "first");
        place_text(&mut session, (22.0, 22.0), "second");
        assert_eq!(session.hit_test(Point::new(25.0, 25.0)), Some(1));
    }

    #[test]
    fn test_select_then_edit_to_empty_deletes() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (20.0, 20.0), "hello");

        session.set_tool(Tool::Select);
        session.handle_pointer(PointerEvent::down(25.0, 25.0));
        assert_eq!(session.selection(), Some(0));
        assert!(session.selection_bounds().is_some());

        session.handle_pointer(PointerEvent::down(25.0, 25.0));
        assert_eq!(session.text_entry().and_then(TextEntry::editing), Some(0));
        assert_eq!(session.text_entry().map(TextEntry::text), Some("hello"));

        session.update_text("   ");
        assert_eq!(session.commit_text(), Some(TextCommit::Deleted { index: 0 }));
        assert!(!session.current().unwrap().has_annotations());
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_emptying_earlier_text_keeps_later_edit_on_target() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (10.0, 10.0), "A0");
        place_text(&mut session, (10.0, 60.0), "A1");
        place_text(&mut session, (10.0, 110.0), "A2");

        session.set_tool(Tool::Select);
        assert!(session.edit_text(0));
        session.update_text("");

        session.handle_pointer(PointerEvent::down(15.0, 65.0));
        assert_eq!(session.selection(), Some(1));
        session.handle_pointer(PointerEvent::down(15.0, 65.0));
        assert_eq!(session.text_entry().and_then(TextEntry::editing), Some(0));
        assert_eq!(session.text_entry().map(TextEntry::text), Some("A1"));

        session.update_text("A1-edited");
        session.commit_text();
        let texts: Vec<_> = session
            .current()
            .unwrap()
            .annotations()
            .iter()
            .filter_map(|annotation| match annotation {
                Annotation::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["A1-edited", "A2"]);
    }

    #[test]
    fn test_editing_deleted_entry_opens_nothing() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (10.0, 10.0), "only");

        assert!(session.edit_text(0));
        session.update_text("");
        assert!(!session.edit_text(0));
        assert!(session.text_entry().is_none());
        assert!(!session.current().unwrap().has_annotations());
    }

    #[test]
    fn test_unchanged_text_commit_adds_no_undo_step() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (20.0, 20.0), "same");

        assert!(session.edit_text(0));
        session.commit_text();
        assert!(session.undo());
        assert!(!session.current().unwrap().has_annotations());
    }

    #[test]
    fn test_delete_key_removes_selection() {
        let mut session = session(1);
        session.set_font_size(10.0);
        place_text(&mut session, (20.0, 20.0), "note");
        session.set_tool(Tool::Select);
        session.handle_pointer(PointerEvent::down(25.0, 25.0));

        assert!(session.handle_key(KeyEvent::new(Key::Delete)));
        assert!(!session.current().unwrap().has_annotations());
        assert!(!session.handle_key(KeyEvent::new(Key::Delete)));
    }

    #[test]
    fn test_empty_new_text_is_ignored() {
        let mut session = session(1);
        session.begin_text(Point::new(5.0, 5.0));
        assert_eq!(session.commit_text(), Some(TextCommit::Ignored));
        assert_eq!(session.commit_text(), None);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_clear_page_is_one_step() {
        let mut session = session(1);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        drag(&mut session, (60.0, 60.0), (90.0, 90.0));

        assert!(session.clear_page());
        assert!(!session.clear_page());
        assert!(session.undo());
        assert_eq!(session.current().unwrap().annotations().len(), 2);
    }

    #[test]
    fn test_overlay_tracks_display_size() {
        let mut session = session(1);
        session.set_zoom(2.0);
        let overlay = session.render_overlay().unwrap();
        assert_eq!((overlay.width(), overlay.height()), (600, 300));

        session.pump_renders(DrainAll);
        session.reset_zoom();
        let view = session.render_view().unwrap();
        assert_eq!((view.width(), view.height()), (300, 150));
        assert_eq!(view.pixel(150, 75), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_export_holds_gate_against_rendering() {
        let mut session = session(2);
        let job = session.start_export().unwrap();

        let pass = session.pump_renders(DrainAll);
        assert_eq!(pass.state, PassState::Busy);
        let err = session.start_export().err().unwrap();
        assert!(matches!(err, EditorError::Busy(WorkKind::Exporting)));

        drop(job);
        assert_eq!(session.pump_renders(DrainAll).state, PassState::Drained);
    }

    #[test]
    fn test_document_cannot_be_replaced_mid_export() {
        let mut session = session(3);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        let job = session.start_export().unwrap();
        let job = match session.resume_export(job, EveryN::one()).unwrap() {
            ExportStep::Suspended(job) => job,
            other => panic!("expected suspension, got {other:?}"),
        };

        let err = session.replace_document(sample_pdf(1)).unwrap_err();
        assert!(matches!(err, EditorError::Busy(WorkKind::Exporting)));
        assert_eq!(session.page_count(), 3);

        let mut job = job;
        let output = loop {
            match session.resume_export(job, DrainAll).unwrap() {
                ExportStep::Suspended(next) => job = next,
                ExportStep::Finished(output) => break output,
            }
        };
        assert_eq!(output.page_count, 3);
        assert_eq!(lopdf::Document::load_mem(&output.bytes).unwrap().get_pages().len(), 3);

        session.replace_document(sample_pdf(1)).unwrap();
        assert_eq!(session.page_count(), 1);
    }

    #[test]
    fn test_save_pristine_document() {
        let mut session = session(2);
        let mut channel = MemorySaveChannel::default();

        let outcome = session.save(&mut channel).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { location: "document-annotated.pdf".into() });
        assert_eq!(channel.saved[0].1, sample_pdf(2));
        assert_eq!(channel.progress.last(), Some(&(2, 2)));
    }

    #[test]
    fn test_cancelled_save_is_not_an_error() {
        let mut session = session(1);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        let mut channel = MemorySaveChannel { cancel: true, ..MemorySaveChannel::default() };
        assert_eq!(session.save(&mut channel).unwrap(), SaveOutcome::Cancelled);
        assert!(!session.gate().is_processing());
    }

    #[test]
    fn test_restore_rejects_unknown_pages() {
        let mut session = session(2);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        let mut set = session.annotation_set();
        let first = set.page(1).to_vec();
        set.pages.insert(9, first);
        assert!(session.restore_annotations(&set).is_err());
        assert_eq!(session.pages().annotation_count(), 1);

        set.pages.remove(&9);
        let moved = set.pages.remove(&1).unwrap();
        set.pages.insert(2, moved);
        session.restore_annotations(&set).unwrap();
        assert!(!session.page(1).unwrap().has_annotations());
        assert!(session.page(2).unwrap().has_annotations());
        assert!(!session.page(2).unwrap().can_undo());
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, sample_pdf(1)).unwrap();

        let mut session =
            EditorSession::open(Box::new(LopdfEngine::new()), path.as_path(), EditorConfig::default())
                .unwrap();
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        let written = session.save_sidecar().unwrap().unwrap();
        assert!(written.exists());
        session.close();

        let mut reopened =
            EditorSession::open(Box::new(LopdfEngine::new()), path.as_path(), EditorConfig::default())
                .unwrap();
        assert!(reopened.load_sidecar().unwrap());
        assert_eq!(reopened.pages().annotation_count(), 1);
    }

    #[test]
    fn test_replace_document_resets_state() {
        let mut session = session(1);
        session.set_tool(Tool::Rectangle);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        session.set_zoom(2.0);

        session.replace_document(sample_pdf(4)).unwrap();
        assert_eq!(session.page_count(), 4);
        assert_eq!(session.pages().annotation_count(), 0);
        assert_eq!(session.view().zoom(), 1.0);
        assert!(session.replace_document(b"not a pdf".to_vec()).is_err());
        assert_eq!(session.page_count(), 4);
    }
}
