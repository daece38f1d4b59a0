use crate::{
    core::config::FocusConfig,
    data::store::{GeoPointStore, PointId},
    markers::pool::MarkerPool,
    prelude::Instant,
    traits::{GalleryList, MapEngine},
    MapError, Result,
};

#[derive(Debug, Clone, Copy)]
struct FocusState {
    point_id: PointId,
    started: Instant,
}

/// Keeps the photo list and the map pointing at the same photo.
///
/// List → map: [`focus_point`](Self::focus_point) flies the camera to the
/// photo. Map → list: [`on_marker_activated`](Self::on_marker_activated)
/// scrolls the list to it. Either way the photo becomes the single
/// highlighted item on both sides.
pub struct GallerySynchronizer {
    list: Box<dyn GalleryList>,
    config: FocusConfig,
    focus: Option<FocusState>,
    highlighted: Option<PointId>,
}

impl GallerySynchronizer {
    pub fn new(list: Box<dyn GalleryList>, config: FocusConfig) -> Self {
        Self {
            list,
            config,
            focus: None,
            highlighted: None,
        }
    }

    /// Recenters the map on `point_id` and highlights it. A focus that is
    /// still animating is stopped and replaced, never queued.
    pub fn focus_point(
        &mut self,
        point_id: PointId,
        store: &GeoPointStore,
        engine: &mut dyn MapEngine,
        pool: &mut MarkerPool,
    ) -> Result<()> {
        let point = store
            .find_by_id(point_id)
            .ok_or(MapError::UnknownPoint(point_id))?;

        if let Some(previous) = self.focus.take() {
            engine.stop_animation();
            log::debug!(
                "focus on {} superseded by {} after {:?}",
                previous.point_id,
                point_id,
                previous.started.elapsed()
            );
        }

        self.move_highlight(Some(point_id), engine, pool);
        engine.fly_to(point.position, self.config.zoom, self.config.duration());
        self.focus = Some(FocusState {
            point_id,
            started: Instant::now(),
        });
        Ok(())
    }

    /// The camera came to rest; returns the point whose focus just completed
    pub fn on_focus_settled(&mut self) -> Option<PointId> {
        self.focus.take().map(|focus| focus.point_id)
    }

    /// A marker was clicked on the map: bring its photo into view in the list
    pub fn on_marker_activated(
        &mut self,
        point_id: PointId,
        store: &GeoPointStore,
        engine: &mut dyn MapEngine,
        pool: &mut MarkerPool,
    ) -> Result<()> {
        if store.find_by_id(point_id).is_none() {
            return Err(MapError::UnknownPoint(point_id));
        }
        self.list.scroll_to_item(point_id);
        self.move_highlight(Some(point_id), engine, pool);
        Ok(())
    }

    fn move_highlight(&mut self, next: Option<PointId>, engine: &mut dyn MapEngine, pool: &mut MarkerPool) {
        if self.highlighted == next {
            return;
        }
        if let Some(previous) = self.highlighted {
            // The previous point may be gone after a point-set replacement
            if let Err(e) = pool.set_highlight(previous, false, engine) {
                log::debug!("clearing highlight: {}", e);
            }
        }
        if let Some(point_id) = next {
            if let Err(e) = pool.set_highlight(point_id, true, engine) {
                log::warn!("highlight failed: {}", e);
            }
        }
        self.list.highlight_item(next);
        self.highlighted = next;
    }

    /// Stops a pending focus and clears the highlight on both sides
    pub fn clear(&mut self, engine: &mut dyn MapEngine, pool: &mut MarkerPool) {
        if self.focus.take().is_some() {
            engine.stop_animation();
        }
        self.move_highlight(None, engine, pool);
    }

    /// Drops focus and highlight after the point set was replaced; the old
    /// handles no longer exist, so only the list is told
    pub fn forget(&mut self) {
        self.focus = None;
        if self.highlighted.take().is_some() {
            self.list.highlight_item(None);
        }
    }

    pub fn highlighted(&self) -> Option<PointId> {
        self.highlighted
    }

    /// Point of the focus animation still in flight, if any
    pub fn focusing(&self) -> Option<PointId> {
        self.focus.map(|focus| focus.point_id)
    }
}
