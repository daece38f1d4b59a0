//! Seams to the collaborators the engine does not own
//!
//! The renderer, the photo list and the image fetcher all live outside this
//! crate. The engine reaches them only through these traits, which keeps the
//! core testable against [`crate::core::headless::HeadlessMap`] and simple
//! in-test doubles.

use crate::{
    core::{geo::LatLng, viewport::Viewport},
    data::store::{PointId, ThumbnailRef},
    input::events::{EventKind, ListenerId},
    markers::thumbnail::Thumbnail,
    spatial::clustering::Cluster,
    Result,
};
use async_trait::async_trait;
use std::time::Duration;

/// The map rendering engine as seen by the marker engine
pub trait MapEngine {
    /// Current view snapshot; carries the projection and its inverse
    fn viewport(&self) -> Viewport;

    /// Binds a listener for `kind`; events come back through
    /// `MarkerEngine::handle_event`
    fn subscribe(&mut self, kind: EventKind) -> ListenerId;

    /// Removes a listener; returns `false` if it was not bound
    fn unsubscribe(&mut self, listener: ListenerId) -> bool;

    /// Puts a marker for `point_id` on the live map surface
    fn add_marker(&mut self, point_id: PointId, position: LatLng);

    fn remove_marker(&mut self, point_id: PointId);

    /// `None` asks the surface to show its placeholder
    fn set_marker_thumbnail(&mut self, point_id: PointId, thumbnail: Option<&Thumbnail>);

    fn set_marker_highlight(&mut self, point_id: PointId, highlighted: bool);

    /// Replaces the cluster glyph layer
    fn show_clusters(&mut self, clusters: &[Cluster]);

    fn clear_clusters(&mut self);

    /// Starts an animated recenter/zoom
    fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration);

    /// Stops a running camera animation where it is
    fn stop_animation(&mut self);

    /// Releases the engine handle
    fn dispose(&mut self);
}

/// The external photo list kept in step with the map
pub trait GalleryList {
    fn scroll_to_item(&mut self, point_id: PointId);

    fn highlight_item(&mut self, point_id: Option<PointId>);
}

/// Fetches thumbnail bytes for one reference
#[async_trait]
pub trait ThumbnailSource: Send + Sync + 'static {
    async fn fetch(&self, thumbnail: &ThumbnailRef) -> Result<Thumbnail>;
}
