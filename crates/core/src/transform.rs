//! Display/canonical coordinate mapping
//!
//! Canonical page space is the fixed raster resolution pages are rendered
//! at. Display space is that raster scaled by `base_fit_scale * zoom`. Pan
//! moves the on-screen surface itself and never enters these functions:
//! pointer positions are first made relative to the surface's on-screen
//! origin with [`client_to_surface`], then scaled.

use crate::annotation::Point;

/// Width and height in one coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

pub fn to_canonical(display: Point, display_scale: f32) -> Point {
    Point::new(display.x / display_scale, display.y / display_scale)
}

pub fn to_display(canonical: Point, display_scale: f32) -> Point {
    Point::new(canonical.x * display_scale, canonical.y * display_scale)
}

/// Scale that fits `page` entirely inside `viewport` at zoom 1
///
/// Returns 1.0 when either size is empty or not finite.
pub fn fit_scale(viewport: Size, page: Size) -> f32 {
    if viewport.is_degenerate() || page.is_degenerate() {
        return 1.0;
    }
    (viewport.width / page.width).min(viewport.height / page.height)
}

/// Pointer position relative to the top-left of the page surface
pub fn client_to_surface(client: Point, surface_origin: Point) -> Point {
    Point::new(client.x - surface_origin.x, client.y - surface_origin.y)
}

/// Snapshot of the scale factors in effect for one repaint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub base_fit_scale: f32,
    pub zoom: f32,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self { base_fit_scale: 1.0, zoom: 1.0 }
    }
}

impl DisplayTransform {
    pub fn new(base_fit_scale: f32, zoom: f32) -> Self {
        Self { base_fit_scale, zoom }
    }

    pub fn display_scale(&self) -> f32 {
        self.base_fit_scale * self.zoom
    }

    pub fn to_canonical(&self, display: Point) -> Point {
        to_canonical(display, self.display_scale())
    }

    pub fn to_display(&self, canonical: Point) -> Point {
        to_display(canonical, self.display_scale())
    }

    /// On-screen size of a canonical surface
    pub fn display_size(&self, canonical: Size) -> Size {
        let scale = self.display_scale();
        Size::new(canonical.width * scale, canonical.height * scale)
    }

    /// Same mapping as [`to_display`](Self::to_display) for the paint routine
    pub fn to_skia(&self) -> tiny_skia::Transform {
        let scale = self.display_scale();
        tiny_skia::Transform::from_scale(scale, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fit_scale_picks_limiting_axis() {
        let page = Size::new(918.0, 1188.0);
        assert_eq!(fit_scale(Size::new(918.0, 1188.0), page), 1.0);
        assert_eq!(fit_scale(Size::new(459.0, 2000.0), page), 0.5);
        assert_eq!(fit_scale(Size::new(2000.0, 594.0), page), 0.5);
    }

    #[test]
    fn test_fit_scale_degenerate_is_identity() {
        assert_eq!(fit_scale(Size::new(0.0, 100.0), Size::new(10.0, 10.0)), 1.0);
        assert_eq!(fit_scale(Size::new(100.0, 100.0), Size::new(f32::NAN, 10.0)), 1.0);
    }

    #[test]
    fn test_zoomed_click_resolves_to_canonical() {
        let transform = DisplayTransform::new(0.5, 2.0);
        assert_eq!(transform.display_scale(), 1.0);
        assert_eq!(transform.to_canonical(Point::new(100.0, 100.0)), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_client_to_surface_subtracts_origin() {
        let local = client_to_surface(Point::new(150.0, 80.0), Point::new(50.0, 30.0));
        assert_eq!(local, Point::new(100.0, 50.0));
    }

    #[test]
    fn test_display_size_and_skia_agree() {
        let transform = DisplayTransform::new(0.5, 3.0);
        assert_eq!(transform.display_size(Size::new(100.0, 40.0)), Size::new(150.0, 60.0));

        let mut points = [tiny_skia::Point::from_xy(10.0, 20.0)];
        transform.to_skia().map_points(&mut points);
        assert_eq!((points[0].x, points[0].y), (15.0, 30.0));
    }

    proptest! {
        #[test]
        fn test_round_trip_is_identity(
            x in -5000.0f32..5000.0,
            y in -5000.0f32..5000.0,
            base in 0.05f32..4.0,
            zoom in 0.25f32..5.0,
        ) {
            let transform = DisplayTransform::new(base, zoom);
            let p = Point::new(x, y);
            let back = transform.to_canonical(transform.to_display(p));

            let tolerance = 1e-3 * (1.0 + x.abs().max(y.abs()));
            prop_assert!((back.x - p.x).abs() <= tolerance);
            prop_assert!((back.y - p.y).abs() <= tolerance);
        }

        #[test]
        fn test_canonical_ignores_surface_position(
            x in 0.0f32..1000.0,
            y in 0.0f32..1000.0,
            pan_x in -500.0f32..500.0,
            pan_y in -500.0f32..500.0,
        ) {
            // Panning moves the surface origin and the pointer together
            let transform = DisplayTransform::new(1.0, 2.0);
            let origin = Point::new(pan_x, pan_y);
            let client = Point::new(x + pan_x, y + pan_y);

            let panned = transform.to_canonical(client_to_surface(client, origin));
            let unpanned = transform.to_canonical(Point::new(x, y));
            prop_assert!((panned.x - unpanned.x).abs() < 1e-2);
            prop_assert!((panned.y - unpanned.y).abs() < 1e-2);
        }
    }
}
