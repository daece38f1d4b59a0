use crate::{
    core::geo::{LatLng, Point},
    data::store::{GeoPoint, PointId, ThumbnailRef},
    markers::thumbnail::Thumbnail,
};

/// Identifies one scheduled thumbnail load. A completion is applied only if
/// its ticket is still the one the handle is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

/// The persistent stand-in for one point's potential presence on the map.
///
/// Handles live for the whole point set; attaching and detaching flips
/// fields here and talks to the map surface, it never allocates or frees a
/// handle.
#[derive(Debug, Clone)]
pub struct MarkerHandle {
    pub point_id: PointId,
    pub position: LatLng,
    pub thumbnail_ref: ThumbnailRef,
    pub attached: bool,
    pub thumbnail_loaded: bool,
    /// Last load failed; the surface shows a placeholder
    pub load_failed: bool,
    pub highlighted: bool,
    /// Container position cached at the last visibility update
    pub screen_pos: Option<Point>,
    pub(crate) pending: Option<LoadTicket>,
    pub(crate) thumbnail: Option<Thumbnail>,
}

impl MarkerHandle {
    pub fn new(point: &GeoPoint) -> Self {
        Self {
            point_id: point.id,
            position: point.position,
            thumbnail_ref: point.thumbnail.clone(),
            attached: false,
            thumbnail_loaded: false,
            load_failed: false,
            highlighted: false,
            screen_pos: None,
            pending: None,
            thumbnail: None,
        }
    }

    /// A load has been scheduled and has not completed yet
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    /// Drops the image and forgets any in-flight load
    pub(crate) fn release(&mut self) -> Option<Thumbnail> {
        self.pending = None;
        self.thumbnail_loaded = false;
        self.thumbnail.take()
    }
}
