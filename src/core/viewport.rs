use crate::core::{
    bounds::Bounds,
    constants::TILE_SIZE,
    geo::{LatLng, Point},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Read-only snapshot of the map view: center, zoom, and screen dimensions.
///
/// The map engine produces one of these on every settle event. Everything the
/// marker engine needs from the projection (forward and inverse) hangs off it,
/// so components never talk to the renderer to convert coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 22.0),
            size,
            min_zoom: 0.0,
            max_zoom: 22.0,
        }
    }

    /// Sets the center of the viewport, clamped to the projectable world
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(
            LatLng::clamp_lat(center.lat),
            center.lng.clamp(-180.0, 180.0),
        );
    }

    /// Sets the zoom level, clamping to valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    /// Gets the scale factor for the current zoom level
    pub fn scale(&self) -> f64 {
        2_f64.powf(self.zoom)
    }

    /// Projects a LatLng to world pixel coordinates at the given zoom level
    /// (Web Mercator, EPSG:3857). World pixels do not depend on the center, so
    /// anything bucketed in this space stays put while the map pans.
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE * 2_f64.powf(z);

        let lat = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let x = (lat_lng.lng + 180.0) / 360.0;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;

        Point::new(x * world, y * world)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE * 2_f64.powf(z);

        let lng = pixel.x / world * 360.0 - 180.0;
        let n = PI - 2.0 * PI * pixel.y / world;
        let lat = n.sinh().atan().to_degrees();

        LatLng::new(lat, lng)
    }

    /// World pixel of the viewport's top-left anchor; floored to keep
    /// container coordinates on whole pixels
    pub fn pixel_origin(&self) -> Point {
        self.project(&self.center, None).floor()
    }

    /// Converts a geographical coordinate to screen pixel coordinates (container relative)
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        let layer_point = self.project(lat_lng, None).subtract(&self.pixel_origin());
        Point::new(
            layer_point.x + self.size.x / 2.0,
            layer_point.y + self.size.y / 2.0,
        )
    }

    /// Converts screen pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let layer_point = Point::new(pixel.x - self.size.x / 2.0, pixel.y - self.size.y / 2.0);
        self.unproject(&layer_point.add(&self.pixel_origin()), None)
    }

    /// Screen-space rectangle covered by the viewport
    pub fn pixel_bounds(&self) -> Bounds {
        Bounds::from_coords(0.0, 0.0, self.size.x, self.size.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0.0, Point::new(800.0, 600.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_creation() {
        let viewport = Viewport::new(
            LatLng::new(40.7128, -74.0060),
            10.0,
            Point::new(800.0, 600.0),
        );

        assert_eq!(viewport.zoom, 10.0);
        assert_eq!(viewport.center.lat, 40.7128);
        assert_eq!(viewport.size.x, 800.0);
    }

    #[test]
    fn test_coordinate_conversion() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(512.0, 512.0));

        let center_lat_lng = viewport.pixel_to_lat_lng(&Point::new(256.0, 256.0));
        assert!((center_lat_lng.lat - 0.0).abs() < 0.01);
        assert!((center_lat_lng.lng - 0.0).abs() < 0.01);

        let pixel = viewport.lat_lng_to_pixel(&LatLng::new(0.0, 0.0));
        assert!((pixel.x - 256.0).abs() < 1.0);
        assert!((pixel.y - 256.0).abs() < 1.0);
    }

    #[test]
    fn test_project_round_trip() {
        let viewport = Viewport::new(LatLng::new(35.0, 139.0), 12.0, Point::new(800.0, 600.0));
        let tokyo = LatLng::new(35.6762, 139.6503);
        let back = viewport.pixel_to_lat_lng(&viewport.lat_lng_to_pixel(&tokyo));
        assert!((back.lat - tokyo.lat).abs() < 1e-9);
        assert!((back.lng - tokyo.lng).abs() < 1e-9);
    }

    #[test]
    fn test_world_width_doubles_per_zoom() {
        let viewport = Viewport::default();
        let east = LatLng::new(0.0, 180.0);
        assert!((viewport.project(&east, Some(0.0)).x - 256.0).abs() < 1e-9);
        assert!((viewport.project(&east, Some(2.0)).x - 1024.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_limits() {
        let mut viewport = Viewport::default();
        viewport.min_zoom = 2.0;
        viewport.max_zoom = 15.0;

        viewport.set_zoom(1.0);
        assert_eq!(viewport.zoom, 2.0);

        viewport.set_zoom(20.0);
        assert_eq!(viewport.zoom, 15.0);
    }
}
