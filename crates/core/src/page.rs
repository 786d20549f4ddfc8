//! Page store
//!
//! One [`Page`] per document page, created when the document opens. Every
//! mutation of a page's annotation list snapshots the previous list onto the
//! page's undo history first.

use crate::annotation::Annotation;
use crate::history::History;
use crate::surface::RasterSurface;
use crate::transform::Size;
use pdf_engine::PageSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    Pending,
    Rendering,
    Ready,
}

#[derive(Debug, Clone)]
pub struct Page {
    number: u32,
    status: PageStatus,
    surface: Option<RasterSurface>,
    annotations: Vec<Annotation>,
    history: History<Vec<Annotation>>,
    canonical_size: Size,
}

impl Page {
    pub fn new(number: u32, canonical_size: Size, undo_depth: usize) -> Self {
        Self {
            number,
            status: PageStatus::Pending,
            surface: None,
            annotations: Vec::new(),
            history: History::new(undo_depth),
            canonical_size,
        }
    }

    /// 1-based page number
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == PageStatus::Ready
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.surface.as_ref()
    }

    /// Page size in canonical pixels, known before rasterization
    pub fn canonical_size(&self) -> Size {
        self.canonical_size
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn has_annotations(&self) -> bool {
        !self.annotations.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn begin_render(&mut self) {
        self.status = PageStatus::Rendering;
    }

    /// Stores the raster; its size becomes the canonical size
    pub fn finish_render(&mut self, surface: RasterSurface) {
        self.canonical_size = Size::new(surface.width() as f32, surface.height() as f32);
        self.surface = Some(surface);
        self.status = PageStatus::Ready;
    }

    /// Back to pending so the page can be requested again
    pub fn fail_render(&mut self) {
        self.status = PageStatus::Pending;
    }

    fn snapshot(&mut self) {
        self.history.record(self.annotations.clone());
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.snapshot();
        self.annotations.push(annotation);
    }

    /// Returns `false` and leaves history untouched when `index` is out of
    /// range or the stored annotation already equals `annotation`
    pub fn replace(&mut self, index: usize, annotation: Annotation) -> bool {
        match self.annotations.get(index) {
            Some(current) if *current != annotation => {}
            _ => return false,
        }
        self.snapshot();
        self.annotations[index] = annotation;
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Annotation> {
        if index >= self.annotations.len() {
            return None;
        }
        self.snapshot();
        Some(self.annotations.remove(index))
    }

    /// Removes every annotation as one undoable step; no-op when already empty
    pub fn clear(&mut self) -> bool {
        if self.annotations.is_empty() {
            return false;
        }
        self.snapshot();
        self.annotations.clear();
        true
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.annotations)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.annotations)
    }

    /// Replaces annotations wholesale and forgets history, used when loading
    pub fn restore_annotations(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
        self.history.clear();
    }
}

/// Pages of the open document, addressed by 1-based page number
#[derive(Debug, Clone, Default)]
pub struct PageStore {
    pages: Vec<Page>,
}

impl PageStore {
    /// Creates a pending page per size, scaling points to canonical pixels
    pub fn new(page_sizes: &[PageSize], render_scale: f32, undo_depth: usize) -> Self {
        let pages = page_sizes
            .iter()
            .enumerate()
            .map(|(index, size)| {
                let canonical = Size::new(
                    (size.width_pt * render_scale).round(),
                    (size.height_pt * render_scale).round(),
                );
                Page::new(index as u32 + 1, canonical, undo_depth)
            })
            .collect();
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, page_number: u32) -> Option<&Page> {
        let index = (page_number as usize).checked_sub(1)?;
        self.pages.get(index)
    }

    pub fn get_mut(&mut self, page_number: u32) -> Option<&mut Page> {
        let index = (page_number as usize).checked_sub(1)?;
        self.pages.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn any_annotated(&self) -> bool {
        self.pages.iter().any(Page::has_annotations)
    }

    pub fn annotation_count(&self) -> usize {
        self.pages.iter().map(|page| page.annotations.len()).sum()
    }
}
