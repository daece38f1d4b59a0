//! In-memory map engine without any rendering.
//!
//! Used by the test suite and the demo app. Clones share state, so a caller
//! can hand one clone to the marker engine and keep another to inspect what
//! the engine did to the "map".

use crate::{
    core::{
        geo::{LatLng, Point},
        viewport::Viewport,
    },
    data::store::PointId,
    input::events::{EventKind, ListenerId, MapEvent},
    markers::thumbnail::Thumbnail,
    prelude::HashMap,
    spatial::clustering::Cluster,
    traits::MapEngine,
};
use std::{cell::RefCell, rc::Rc, time::Duration};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessMarker {
    pub position: LatLng,
    pub has_thumbnail: bool,
    pub placeholder: bool,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlyTarget {
    pub center: LatLng,
    pub zoom: f64,
    pub duration: Duration,
}

/// A call the marker engine made on the map, in issue order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapCall {
    Subscribe(EventKind),
    Unsubscribe(EventKind),
    AddMarker(PointId),
    RemoveMarker(PointId),
    Dispose,
}

#[derive(Debug, Default)]
struct HeadlessState {
    viewport: Viewport,
    listeners: HashMap<ListenerId, EventKind>,
    next_listener: u64,
    markers: HashMap<PointId, HeadlessMarker>,
    cluster_glyphs: Vec<Cluster>,
    animation: Option<FlyTarget>,
    stopped_animations: usize,
    dispose_calls: usize,
    calls: Vec<MapCall>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessMap {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport) -> Self {
        let map = Self::default();
        map.state.borrow_mut().viewport = viewport;
        map
    }

    /// Jumps to a view and returns the settle event the real engine would emit
    pub fn set_view(&self, center: LatLng, zoom: f64) -> MapEvent {
        let mut state = self.state.borrow_mut();
        state.viewport.set_center(center);
        state.viewport.set_zoom(zoom);
        MapEvent::ViewportSettled {
            viewport: state.viewport.clone(),
        }
    }

    /// Moves the view as an intermediate drag frame
    pub fn drag_to(&self, center: LatLng) -> MapEvent {
        let mut state = self.state.borrow_mut();
        state.viewport.set_center(center);
        MapEvent::ViewportChanging {
            viewport: state.viewport.clone(),
        }
    }

    /// Completes the running camera animation, if any, and returns its settle event
    pub fn finish_animation(&self) -> Option<MapEvent> {
        let target = self.state.borrow_mut().animation.take()?;
        Some(self.set_view(target.center, target.zoom))
    }

    pub fn animation(&self) -> Option<FlyTarget> {
        self.state.borrow().animation.clone()
    }

    pub fn stopped_animations(&self) -> usize {
        self.state.borrow().stopped_animations
    }

    pub fn active_listeners(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn listeners_for(&self, kind: EventKind) -> usize {
        self.state
            .borrow()
            .listeners
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn marker_count(&self) -> usize {
        self.state.borrow().markers.len()
    }

    pub fn marker(&self, point_id: PointId) -> Option<HeadlessMarker> {
        self.state.borrow().markers.get(&point_id).cloned()
    }

    pub fn has_marker(&self, point_id: PointId) -> bool {
        self.state.borrow().markers.contains_key(&point_id)
    }

    pub fn cluster_glyphs(&self) -> usize {
        self.state.borrow().cluster_glyphs.len()
    }

    pub fn dispose_calls(&self) -> usize {
        self.state.borrow().dispose_calls
    }

    pub fn current_viewport(&self) -> Viewport {
        self.state.borrow().viewport.clone()
    }

    /// Lifecycle calls received so far
    pub fn calls(&self) -> Vec<MapCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn resize(&self, size: Point) {
        self.state.borrow_mut().viewport.set_size(size);
    }
}

impl MapEngine for HeadlessMap {
    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport.clone()
    }

    fn subscribe(&mut self, kind: EventKind) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.insert(id, kind);
        state.calls.push(MapCall::Subscribe(kind));
        id
    }

    fn unsubscribe(&mut self, listener: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.listeners.remove(&listener) {
            Some(kind) => {
                state.calls.push(MapCall::Unsubscribe(kind));
                true
            }
            None => false,
        }
    }

    fn add_marker(&mut self, point_id: PointId, position: LatLng) {
        let mut state = self.state.borrow_mut();
        state.markers.entry(point_id).or_default().position = position;
        state.calls.push(MapCall::AddMarker(point_id));
    }

    fn remove_marker(&mut self, point_id: PointId) {
        let mut state = self.state.borrow_mut();
        state.markers.remove(&point_id);
        state.calls.push(MapCall::RemoveMarker(point_id));
    }

    fn set_marker_thumbnail(&mut self, point_id: PointId, thumbnail: Option<&Thumbnail>) {
        if let Some(marker) = self.state.borrow_mut().markers.get_mut(&point_id) {
            marker.has_thumbnail = thumbnail.is_some();
            marker.placeholder = thumbnail.is_none();
        }
    }

    fn set_marker_highlight(&mut self, point_id: PointId, highlighted: bool) {
        if let Some(marker) = self.state.borrow_mut().markers.get_mut(&point_id) {
            marker.highlighted = highlighted;
        }
    }

    fn show_clusters(&mut self, clusters: &[Cluster]) {
        self.state.borrow_mut().cluster_glyphs = clusters.to_vec();
    }

    fn clear_clusters(&mut self) {
        self.state.borrow_mut().cluster_glyphs.clear();
    }

    fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration) {
        self.state.borrow_mut().animation = Some(FlyTarget {
            center,
            zoom,
            duration,
        });
    }

    fn stop_animation(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.animation.take().is_some() {
            state.stopped_animations += 1;
        }
    }

    fn dispose(&mut self) {
        let mut state = self.state.borrow_mut();
        state.dispose_calls += 1;
        state.calls.push(MapCall::Dispose);
        state.markers.clear();
        state.cluster_glyphs.clear();
        state.animation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let inspector = HeadlessMap::default();
        let mut engine_side = inspector.clone();

        engine_side.subscribe(EventKind::PointerMove);
        engine_side.add_marker(1, LatLng::new(1.0, 1.0));

        assert_eq!(inspector.active_listeners(), 1);
        assert!(inspector.has_marker(1));
        assert_eq!(
            inspector.calls(),
            vec![MapCall::Subscribe(EventKind::PointerMove), MapCall::AddMarker(1)]
        );
    }

    #[test]
    fn test_fly_to_and_finish() {
        let mut map = HeadlessMap::default();
        map.fly_to(LatLng::new(10.0, 20.0), 9.0, Duration::from_millis(300));
        assert!(map.animation().is_some());

        let event = map.finish_animation().unwrap();
        match event {
            MapEvent::ViewportSettled { viewport } => {
                assert_eq!(viewport.zoom, 9.0);
                assert_eq!(viewport.center, LatLng::new(10.0, 20.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(map.finish_animation().is_none());
    }
}
