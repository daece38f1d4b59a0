use crate::core::{
    bounds::Bounds,
    geo::{LatLng, Point},
    viewport::Viewport,
};

/// Screen-space culling helpers.
///
/// Visibility is decided in container pixels so the overscan margin means the
/// same thing at every zoom level.
pub struct Culling;

impl Culling {
    /// Viewport rectangle grown by `overscan_px` on every side
    pub fn overscanned_bounds(viewport: &Viewport, overscan_px: f64) -> Bounds {
        viewport.pixel_bounds().expanded(overscan_px.max(0.0))
    }

    /// Returns `true` if a point lies inside the viewport rectangle.
    pub fn point_visible(bounds: &Bounds, p: &Point) -> bool {
        bounds.contains(p)
    }

    /// Returns `true` if the coordinate projects inside the viewport plus overscan
    pub fn point_in_bounds(viewport: &Viewport, position: &LatLng, overscan_px: f64) -> bool {
        let bounds = Self::overscanned_bounds(viewport, overscan_px);
        bounds.contains(&viewport.lat_lng_to_pixel(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris_view() -> Viewport {
        Viewport::new(LatLng::new(48.8566, 2.3522), 14.0, Point::new(800.0, 600.0))
    }

    #[test]
    fn test_center_is_visible() {
        let viewport = paris_view();
        assert!(Culling::point_in_bounds(&viewport, &viewport.center, 0.0));
    }

    #[test]
    fn test_overscan_keeps_edge_points() {
        let viewport = paris_view();
        let just_outside = viewport.pixel_to_lat_lng(&Point::new(820.0, 300.0));

        assert!(!Culling::point_in_bounds(&viewport, &just_outside, 0.0));
        assert!(Culling::point_in_bounds(&viewport, &just_outside, 64.0));
    }

    #[test]
    fn test_far_away_point_is_culled() {
        let viewport = paris_view();
        let bounds = Culling::overscanned_bounds(&viewport, 64.0);
        let new_york = viewport.lat_lng_to_pixel(&LatLng::new(40.7128, -74.0060));
        assert!(!Culling::point_visible(&bounds, &new_york));
        assert!(Culling::point_visible(&bounds, &Point::new(-64.0, 664.0)));
    }
}
