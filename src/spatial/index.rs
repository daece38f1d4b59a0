use crate::{
    core::geo::{LatLng, LatLngBounds},
    data::store::GeoPoint,
};

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A store slot indexed by its geographic position
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub position: LatLng,
    /// Slot of the point in the store
    pub slot: usize,
}

impl IndexedPoint {
    /// Tree coordinates. Latitude is clamped the same way the projection
    /// clamps it, so polar points sit where their markers are drawn.
    fn key(&self) -> [f64; 2] {
        [self.position.lng, LatLng::clamp_lat(self.position.lat)]
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.key())
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let [lng, lat] = self.key();
        let dx = lng - point[0];
        let dy = lat - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree over a point set in (lng, lat) space, with latitude limited to
/// the Web Mercator range.
///
/// Built in bulk for one point set; tagged with the store generation it was
/// built from so callers can tell when it went stale.
pub struct PointIndex {
    rtree: RTree<IndexedPoint>,
    generation: u64,
}

impl PointIndex {
    pub fn build(points: &[GeoPoint], generation: u64) -> Self {
        let items = points
            .iter()
            .enumerate()
            .map(|(slot, p)| IndexedPoint {
                position: p.position,
                slot,
            })
            .collect();

        Self {
            rtree: RTree::bulk_load(items),
            generation,
        }
    }

    /// Store slots whose position lies within `bounds`
    pub fn query(&self, bounds: &LatLngBounds) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [bounds.south_west.lng, bounds.south_west.lat],
            [bounds.north_east.lng, bounds.north_east.lat],
        );
        self.rtree
            .locate_in_envelope(&envelope)
            .map(|item| item.slot)
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }
}
