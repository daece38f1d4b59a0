//! Decides which marker handles should be attached for a viewport.
//!
//! Below the individual-zoom threshold the map shows cluster glyphs and no
//! individual markers; at or above it every point that projects inside the
//! viewport (plus an overscan margin) gets its marker attached. The
//! controller only ever reports the difference against what it attached last
//! time, so a point that stays visible is never detached and re-attached.

use crate::{
    core::{bounds::Bounds, config::VisibilityConfig, viewport::Viewport},
    data::store::{GeoPoint, PointId},
    prelude::BTreeSet,
    spatial::{clustering::Cluster, culling::Culling},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// Cluster glyphs only
    Aggregate,
    /// One marker per on-screen point
    Individual,
}

/// Attach/detach work for one recompute; both lists are sorted and disjoint
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityDiff {
    pub mode: RenderMode,
    pub to_attach: Vec<PointId>,
    pub to_detach: Vec<PointId>,
}

impl VisibilityDiff {
    pub fn is_empty(&self) -> bool {
        self.to_attach.is_empty() && self.to_detach.is_empty()
    }
}

/// A visibility recompute that can be advanced in bounded chunks
#[derive(Debug)]
pub struct VisibilityScan {
    viewport: Viewport,
    mode: RenderMode,
    bounds: Bounds,
    cursor: usize,
    visible: BTreeSet<PointId>,
}

impl VisibilityScan {
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Tests up to `budget` more points; returns `true` once every point has
    /// been looked at. Aggregate scans have nothing to test.
    pub fn advance(&mut self, points: &[GeoPoint], budget: usize) -> bool {
        if self.mode == RenderMode::Aggregate {
            return true;
        }

        let end = self.cursor.saturating_add(budget.max(1)).min(points.len());
        for point in &points[self.cursor.min(end)..end] {
            let screen = self.viewport.lat_lng_to_pixel(&point.position);
            if Culling::point_visible(&self.bounds, &screen) {
                self.visible.insert(point.id);
            }
        }
        self.cursor = end;
        self.cursor >= points.len()
    }
}

#[derive(Debug)]
pub struct VisibilityController {
    config: VisibilityConfig,
    attached: BTreeSet<PointId>,
    mode: RenderMode,
    last_viewport: Option<Viewport>,
    dirty: bool,
}

impl VisibilityController {
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            attached: BTreeSet::new(),
            mode: RenderMode::Aggregate,
            last_viewport: None,
            dirty: false,
        }
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    pub fn mode_for(&self, zoom: f64) -> RenderMode {
        if zoom >= self.config.individual_zoom_threshold {
            RenderMode::Individual
        } else {
            RenderMode::Aggregate
        }
    }

    /// Intermediate pan/zoom frame: remember that the view moved, do nothing else
    pub fn note_viewport_changing(&mut self) {
        self.dirty = true;
    }

    /// The view came to rest; whether it recomputes is up to `should_recompute`
    pub fn note_viewport_settled(&mut self) {
        self.dirty = false;
    }

    /// `false` when `viewport` is the snapshot the current attachment was computed for
    pub fn should_recompute(&self, viewport: &Viewport) -> bool {
        self.last_viewport.as_ref() != Some(viewport)
    }

    pub fn begin(&self, viewport: Viewport) -> VisibilityScan {
        let mode = self.mode_for(viewport.zoom);
        let bounds = Culling::overscanned_bounds(&viewport, self.config.overscan_px);
        VisibilityScan {
            viewport,
            mode,
            bounds,
            cursor: 0,
            visible: BTreeSet::new(),
        }
    }

    /// Turns a completed scan into the minimal diff and records the new
    /// attachment snapshot. `clusters` only matters in aggregate mode.
    pub fn finish(&mut self, scan: VisibilityScan, clusters: &[Cluster]) -> VisibilityDiff {
        let wanted = match scan.mode {
            RenderMode::Individual => scan.visible,
            RenderMode::Aggregate if self.config.singletons_as_markers => clusters
                .iter()
                .filter(|c| c.is_single())
                .filter(|c| {
                    let screen = scan.viewport.lat_lng_to_pixel(&c.centroid);
                    Culling::point_visible(&scan.bounds, &screen)
                })
                .flat_map(|c| c.member_ids.iter().copied())
                .collect(),
            RenderMode::Aggregate => BTreeSet::new(),
        };

        let to_attach: Vec<PointId> = wanted.difference(&self.attached).copied().collect();
        let to_detach: Vec<PointId> = self.attached.difference(&wanted).copied().collect();

        if scan.mode != self.mode {
            log::debug!(
                "render mode {:?} -> {:?} at zoom {:.2}",
                self.mode,
                scan.mode,
                scan.viewport.zoom
            );
        }

        self.attached = wanted;
        self.mode = scan.mode;
        self.last_viewport = Some(scan.viewport);
        self.dirty = false;

        VisibilityDiff {
            mode: self.mode,
            to_attach,
            to_detach,
        }
    }

    /// One-shot recompute for callers that do not need chunking
    pub fn update(
        &mut self,
        viewport: &Viewport,
        clusters: &[Cluster],
        points: &[GeoPoint],
    ) -> VisibilityDiff {
        let mut scan = self.begin(viewport.clone());
        while !scan.advance(points, usize::MAX) {}
        self.finish(scan, clusters)
    }

    /// Forgets the attachment snapshot; used when the point set is replaced
    /// or every marker was detached behind the controller's back
    pub fn reset(&mut self) {
        self.attached.clear();
        self.mode = RenderMode::Aggregate;
        self.last_viewport = None;
        self.dirty = false;
    }

    pub fn attached(&self) -> &BTreeSet<PointId> {
        &self.attached
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::geo::{LatLng, Point},
        data::store::{GeoPointStore, RawItem},
        spatial::clustering::cluster,
    };

    fn config() -> VisibilityConfig {
        VisibilityConfig {
            individual_zoom_threshold: 12.0,
            overscan_px: 0.0,
            chunk_size: 4,
            singletons_as_markers: false,
        }
    }

    fn street_points() -> GeoPointStore {
        let mut store = GeoPointStore::new();
        store.load((0..10).map(|i| RawItem::new(i, 2.30 + i as f64 * 0.01, 48.85)));
        store
    }

    fn view(lng: f64, zoom: f64) -> Viewport {
        Viewport::new(LatLng::new(48.85, lng), zoom, Point::new(400.0, 300.0))
    }

    #[test]
    fn test_aggregate_mode_attaches_nothing() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());

        let diff = controller.update(&view(2.35, 5.0), &[], store.points());
        assert_eq!(diff.mode, RenderMode::Aggregate);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_individual_mode_matches_culling() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());
        let viewport = view(2.35, 14.0);

        let diff = controller.update(&viewport, &[], store.points());
        let expected: Vec<PointId> = store
            .points()
            .iter()
            .filter(|p| Culling::point_in_bounds(&viewport, &p.position, 0.0))
            .map(|p| p.id)
            .collect();
        assert!(!expected.is_empty());
        assert!(expected.len() < store.len());
        assert_eq!(diff.to_attach, expected);
        assert!(diff.to_detach.is_empty());
    }

    #[test]
    fn test_pan_diff_is_minimal() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());
        controller.update(&view(2.35, 14.0), &[], store.points());
        let before = controller.attached().clone();

        let diff = controller.update(&view(2.36, 14.0), &[], store.points());
        let after = controller.attached().clone();

        let kept: Vec<_> = before.intersection(&after).copied().collect();
        assert!(!kept.is_empty());
        for id in &kept {
            assert!(!diff.to_attach.contains(id));
            assert!(!diff.to_detach.contains(id));
        }
        assert_eq!(diff.to_attach, vec![7]);
        assert_eq!(diff.to_detach, vec![4]);
    }

    #[test]
    fn test_zooming_out_detaches_everything() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());
        let attached = controller.update(&view(2.35, 14.0), &[], store.points());

        let diff = controller.update(&view(2.35, 4.0), &[], store.points());
        assert_eq!(diff.mode, RenderMode::Aggregate);
        assert_eq!(diff.to_detach, attached.to_attach);
        assert!(controller.attached().is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_skips_recompute() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());
        let viewport = view(2.35, 14.0);
        assert!(controller.should_recompute(&viewport));

        controller.update(&viewport, &[], store.points());
        assert!(!controller.should_recompute(&viewport));
        assert!(controller.should_recompute(&view(2.36, 14.0)));

        controller.reset();
        assert!(controller.should_recompute(&viewport));
    }

    #[test]
    fn test_changing_marks_dirty_until_settle() {
        let store = street_points();
        let mut controller = VisibilityController::new(config());
        controller.note_viewport_changing();
        assert!(controller.is_dirty());
        assert!(controller.attached().is_empty());

        controller.update(&view(2.35, 14.0), &[], store.points());
        assert!(!controller.is_dirty());

        // A settle that is skipped still ends the motion
        controller.note_viewport_changing();
        assert!(!controller.should_recompute(&view(2.35, 14.0)));
        controller.note_viewport_settled();
        assert!(!controller.is_dirty());
    }

    #[test]
    fn test_chunked_scan_matches_one_shot() {
        let store = street_points();
        let viewport = view(2.35, 14.0);

        let mut one_shot = VisibilityController::new(config());
        let expected = one_shot.update(&viewport, &[], store.points());

        let mut chunked = VisibilityController::new(config());
        let mut scan = chunked.begin(viewport);
        let mut steps = 1;
        while !scan.advance(store.points(), 4) {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(chunked.finish(scan, &[]), expected);
    }

    #[test]
    fn test_singletons_as_markers_in_aggregate_mode() {
        let mut store = GeoPointStore::new();
        store.load(vec![
            RawItem::new(1, 2.35, 48.85),
            RawItem::new(2, 2.3501, 48.8501),
            RawItem::new(3, 139.69, 35.68),
            RawItem::new(4, 12.0, 48.85),
        ]);
        let viewport = view(2.35, 4.0);
        let clusters = cluster(store.points(), &viewport, 50.0);

        let mut controller = VisibilityController::new(VisibilityConfig {
            singletons_as_markers: true,
            ..config()
        });
        let diff = controller.update(&viewport, &clusters, store.points());
        assert_eq!(diff.mode, RenderMode::Aggregate);
        // Tokyo is a singleton too, but off screen
        assert_eq!(diff.to_attach, vec![4]);
    }
}
