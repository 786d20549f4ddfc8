//! Per-session view state

use crate::config::EditorConfig;

/// Zoom, pan and current page of an editor session
///
/// Owned by the session and reset when it closes; nothing here is global.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    /// Zero-based index of the displayed page
    current_index: usize,
    min_zoom: f32,
    max_zoom: f32,
    zoom_step: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl ViewState {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            current_index: 0,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Clamps into the configured bounds and returns the applied zoom
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * self.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / self.zoom_step)
    }

    /// Back to fit-to-viewport with no pan
    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// 1-based number of the displayed page
    pub fn current_page(&self) -> u32 {
        self.current_index as u32 + 1
    }

    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    /// Initial state, keeping the configured bounds
    pub fn reset(&mut self) {
        self.reset_zoom();
        self.current_index = 0;
    }
}
