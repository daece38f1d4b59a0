//! The per-mount marker engine.
//!
//! One [`MarkerEngine`] owns everything for one map view: the point store,
//! the current clusters, the visibility controller, the marker pool, the
//! subscription registry, the selection tool and the gallery synchronizer.
//! The host forwards map events into [`MarkerEngine::handle_event`] and calls
//! [`MarkerEngine::pump`] once per event-loop turn; everything else happens
//! synchronously inside those calls.

use crate::{
    core::{config::EngineOptions, viewport::Viewport},
    data::store::{GeoPointStore, PointId, RawItem},
    input::{
        events::{EngineCommand, EventKind, MapEvent},
        registry::{EventHandler, ScopeKey, SubscriptionRegistry, SubscriptionToken},
    },
    markers::{
        pool::MarkerPool,
        thumbnail::ThumbnailLoader,
        visibility::{RenderMode, VisibilityController, VisibilityDiff, VisibilityScan},
    },
    plugins::radius_select::{RadiusSelectTool, SelectionState},
    spatial::clustering::{Cluster, ClusterPass, PassProgress},
    sync::gallery::GallerySynchronizer,
    traits::{GalleryList, MapEngine},
    MapError, Result,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// Constructed, no map engine mounted yet
    Uninitialized,
    Ready,
    /// The map engine failed to come up; every operation is a no-op
    Degraded,
    Disposed,
}

/// Snapshot of what the engine is currently holding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub generation: u64,
    pub points: usize,
    pub clusters: usize,
    pub mode: RenderMode,
    pub attached: usize,
    pub loaded_thumbnails: usize,
    pub loading_thumbnails: usize,
    pub subscriptions: usize,
    pub pass_pending: bool,
    /// Intermediate frames seen since the last settle
    pub view_moving: bool,
}

/// A settle that has not been fully applied yet
struct PendingUpdate {
    clustering: Option<ClusterPass>,
    scan: VisibilityScan,
}

pub struct MarkerEngine {
    state: EngineState,
    options: EngineOptions,
    map: Option<Box<dyn MapEngine>>,
    store: GeoPointStore,
    clusters: Vec<Cluster>,
    pending: Option<PendingUpdate>,
    visibility: VisibilityController,
    pool: MarkerPool,
    registry: SubscriptionRegistry,
    selection: RadiusSelectTool,
    gallery: GallerySynchronizer,
}

impl MarkerEngine {
    pub fn new(
        options: EngineOptions,
        loader: Box<dyn ThumbnailLoader>,
        gallery: Box<dyn GalleryList>,
    ) -> Self {
        Self {
            state: EngineState::Uninitialized,
            visibility: VisibilityController::new(options.visibility.clone()),
            pool: MarkerPool::new(loader, options.thumbnails.clone()),
            registry: SubscriptionRegistry::new(),
            selection: RadiusSelectTool::new(options.selection.clone()),
            gallery: GallerySynchronizer::new(gallery, options.focus.clone()),
            options,
            map: None,
            store: GeoPointStore::new(),
            clusters: Vec::new(),
            pending: None,
        }
    }

    /// Brings up the map engine through `factory` and initializes against it.
    ///
    /// A previously mounted map is torn down first. If the factory fails the
    /// engine degrades instead of failing the host: the error is logged and
    /// returned, and every later operation is inert.
    pub fn mount<F>(&mut self, factory: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn MapEngine>>,
    {
        if self.state == EngineState::Disposed {
            return Err(MapError::Disposed);
        }
        let selection_was_active = self.selection.is_active();
        self.release_map();

        match factory() {
            Ok(mut map) => {
                if selection_was_active {
                    self.selection.activate(&mut self.registry, &mut *map);
                }
                self.map = Some(map);
                self.init()
            }
            Err(e) => {
                log::error!("map engine failed to initialize, markers disabled: {}", e);
                self.state = EngineState::Degraded;
                Err(e)
            }
        }
    }

    /// (Re)binds the engine's own handlers and recomputes for the current view.
    ///
    /// Every registered subscription is removed first, so calling this any
    /// number of times never accumulates handlers. Host subscriptions do not
    /// survive a re-init.
    pub fn init(&mut self) -> Result<()> {
        if self.state == EngineState::Disposed {
            return Err(MapError::Disposed);
        }
        let Some(map) = self.map.as_deref_mut() else {
            return Err(MapError::EngineInit("no map engine mounted".into()));
        };

        let selection_was_active = self.selection.deactivate(&mut self.registry, map);
        self.registry.unregister_all(map, None);

        for (kind, handler) in Self::engine_handlers() {
            self.registry.register(map, kind, handler, Some(ScopeKey::ENGINE));
        }
        if selection_was_active {
            self.selection.activate(&mut self.registry, map);
        }

        if self.pool.generation() != self.store.generation() {
            self.pool.rebuild(self.store.points(), self.store.generation(), map);
            self.visibility.reset();
        }

        self.state = EngineState::Ready;
        log::info!(
            "marker engine ready: {} points, {} subscriptions",
            self.store.len(),
            self.registry.len()
        );

        let viewport = map.viewport();
        self.settle(viewport);
        Ok(())
    }

    fn engine_handlers() -> Vec<(EventKind, EventHandler)> {
        vec![
            (
                EventKind::ViewportChanging,
                Box::new(|_: &MapEvent| Some(EngineCommand::ViewportChanging)) as EventHandler,
            ),
            (
                EventKind::ViewportSettled,
                Box::new(|event: &MapEvent| match event {
                    MapEvent::ViewportSettled { viewport } => {
                        Some(EngineCommand::Settle(viewport.clone()))
                    }
                    _ => None,
                }) as EventHandler,
            ),
            (
                EventKind::MarkerActivated,
                Box::new(|event: &MapEvent| match event {
                    MapEvent::MarkerActivated { point_id } => {
                        Some(EngineCommand::ActivateMarker(*point_id))
                    }
                    _ => None,
                }) as EventHandler,
            ),
        ]
    }

    /// Replaces the point set. Returns the number of points kept.
    pub fn load_points<I>(&mut self, raw_items: I) -> usize
    where
        I: IntoIterator<Item = RawItem>,
    {
        if self.state == EngineState::Disposed {
            return 0;
        }
        self.store.load(raw_items);
        self.on_points_replaced();
        self.store.len()
    }

    /// Replaces the point set from a JSON feed
    pub fn load_json(&mut self, source: &str) -> Result<usize> {
        if self.state == EngineState::Disposed {
            return Err(MapError::Disposed);
        }
        self.store.load_json(source)?;
        self.on_points_replaced();
        Ok(self.store.len())
    }

    fn on_points_replaced(&mut self) {
        self.gallery.forget();
        self.selection.invalidate_index();
        self.pending = None;
        self.clusters.clear();
        self.visibility.reset();

        if self.state != EngineState::Ready {
            return;
        }
        let Some(map) = self.map.as_deref_mut() else {
            return;
        };
        map.clear_clusters();
        self.pool.rebuild(self.store.points(), self.store.generation(), map);

        let viewport = map.viewport();
        self.settle(viewport);
    }

    /// Routes one map event through the registry and applies what the
    /// handlers asked for
    pub fn handle_event(&mut self, event: &MapEvent) {
        if self.state != EngineState::Ready {
            return;
        }
        for command in self.registry.dispatch(event) {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::ViewportChanging => self.visibility.note_viewport_changing(),
            EngineCommand::Settle(viewport) => {
                if let Some(point_id) = self.gallery.on_focus_settled() {
                    log::debug!("focus on {} settled", point_id);
                }
                self.settle(viewport);
            }
            EngineCommand::UpdateSelection(position) => {
                let Some(map) = self.map.as_deref() else {
                    return;
                };
                let viewport = map.viewport();
                self.selection.on_pointer_move(
                    position,
                    &viewport,
                    self.store.points(),
                    self.store.generation(),
                );
            }
            EngineCommand::ActivateMarker(point_id) => {
                let Some(map) = self.map.as_deref_mut() else {
                    return;
                };
                if let Err(e) =
                    self.gallery
                        .on_marker_activated(point_id, &self.store, map, &mut self.pool)
                {
                    log::warn!("marker activation ignored: {}", e);
                }
            }
        }
    }

    /// Starts the recompute for a settled view. Runs the first chunk right
    /// away; [`pump`](Self::pump) finishes larger point sets.
    fn settle(&mut self, viewport: Viewport) {
        self.visibility.note_viewport_settled();
        let unchanged = match &self.pending {
            Some(pending) => pending.scan.viewport() == &viewport,
            None => !self.visibility.should_recompute(&viewport),
        };
        if unchanged {
            log::trace!("settle on an unchanged view skipped");
            return;
        }

        let scan = self.visibility.begin(viewport.clone());
        let clustering = match scan.mode() {
            RenderMode::Aggregate => Some(ClusterPass::new(
                viewport,
                self.options.cluster.pixel_radius,
            )),
            RenderMode::Individual => {
                self.clusters.clear();
                None
            }
        };
        self.pending = Some(PendingUpdate { clustering, scan });
        self.advance_pending(self.options.visibility.chunk_size);
    }

    /// Returns `true` when nothing is left pending
    fn advance_pending(&mut self, budget: usize) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return true;
        };
        let points = self.store.points();

        if let Some(pass) = pending.clustering.as_mut() {
            match pass.advance(points, budget) {
                PassProgress::Pending { processed, total } => {
                    log::trace!("cluster pass {}/{}", processed, total);
                    self.pending = Some(pending);
                    return false;
                }
                PassProgress::Ready(clusters) => {
                    self.clusters = clusters;
                    pending.clustering = None;
                }
            }
        }

        if !pending.scan.advance(points, budget) {
            self.pending = Some(pending);
            return false;
        }

        let viewport = pending.scan.viewport().clone();
        let diff = self.visibility.finish(pending.scan, &self.clusters);
        self.apply_diff(diff, &viewport);
        true
    }

    fn apply_diff(&mut self, diff: VisibilityDiff, viewport: &Viewport) {
        let Some(map) = self.map.as_deref_mut() else {
            return;
        };

        for id in &diff.to_detach {
            if let Err(e) = self.pool.detach(*id, map) {
                log::warn!("detach skipped: {}", e);
            }
        }
        for id in &diff.to_attach {
            if let Err(e) = self.pool.attach(*id, map) {
                log::warn!("attach skipped: {}", e);
            }
        }

        match diff.mode {
            RenderMode::Aggregate if self.options.visibility.singletons_as_markers => {
                let glyphs: Vec<Cluster> = self
                    .clusters
                    .iter()
                    .filter(|c| !c.is_single())
                    .cloned()
                    .collect();
                map.show_clusters(&glyphs);
            }
            RenderMode::Aggregate => map.show_clusters(&self.clusters),
            RenderMode::Individual => map.clear_clusters(),
        }
        self.pool.refresh_screen_positions(viewport);

        log::debug!(
            "view settled at zoom {:.2}: {:?}, {} clusters, +{} -{} markers",
            viewport.zoom,
            diff.mode,
            self.clusters.len(),
            diff.to_attach.len(),
            diff.to_detach.len()
        );
    }

    /// One event-loop turn: advances a pending recompute by one chunk and
    /// applies finished thumbnail loads. Returns the number of thumbnails
    /// applied.
    pub fn pump(&mut self) -> usize {
        if self.state != EngineState::Ready {
            return 0;
        }
        self.advance_pending(self.options.visibility.chunk_size);

        match self.map.as_deref_mut() {
            Some(map) => self.pool.apply_completions(map),
            None => 0,
        }
    }

    /// Runs pending work to completion
    pub fn flush(&mut self) -> usize {
        if self.state != EngineState::Ready {
            return 0;
        }
        while !self.advance_pending(usize::MAX) {}
        match self.map.as_deref_mut() {
            Some(map) => self.pool.apply_completions(map),
            None => 0,
        }
    }

    /// Binds a host handler; it goes through the same registry as the engine's
    /// own handlers and is removed by teardown
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> Result<SubscriptionToken> {
        match self.state {
            EngineState::Disposed => return Err(MapError::Disposed),
            EngineState::Ready => {}
            _ => return Err(MapError::EngineInit("map engine not available".into())),
        }
        let map = self
            .map
            .as_deref_mut()
            .ok_or_else(|| MapError::EngineInit("map engine not available".into()))?;
        Ok(self.registry.register(map, kind, handler, Some(ScopeKey::HOST)))
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        match self.map.as_deref_mut() {
            Some(map) => self.registry.unregister(map, token),
            None => false,
        }
    }

    pub fn activate_selection(&mut self) -> bool {
        if self.state != EngineState::Ready {
            return false;
        }
        match self.map.as_deref_mut() {
            Some(map) => self.selection.activate(&mut self.registry, map),
            None => false,
        }
    }

    pub fn deactivate_selection(&mut self) -> bool {
        match self.map.as_deref_mut() {
            Some(map) => self.selection.deactivate(&mut self.registry, map),
            None => false,
        }
    }

    pub fn selection(&self) -> Option<&SelectionState> {
        self.selection.state()
    }

    pub fn set_selection_radius(&mut self, radius_px: f64) {
        self.selection.set_radius(radius_px);
    }

    /// Flies the map to a point picked in the photo list
    pub fn focus_point(&mut self, point_id: PointId) -> Result<()> {
        match self.state {
            EngineState::Disposed => return Err(MapError::Disposed),
            EngineState::Ready => {}
            _ => return Ok(()),
        }
        let Some(map) = self.map.as_deref_mut() else {
            return Ok(());
        };
        self.gallery
            .focus_point(point_id, &self.store, map, &mut self.pool)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &GeoPointStore {
        &self.store
    }

    pub fn pool(&self) -> &MarkerPool {
        &self.pool
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn mode(&self) -> RenderMode {
        self.visibility.mode()
    }

    pub fn is_attached(&self, point_id: PointId) -> bool {
        self.pool.is_attached(point_id)
    }

    pub fn highlighted(&self) -> Option<PointId> {
        self.gallery.highlighted()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state,
            generation: self.store.generation(),
            points: self.store.len(),
            clusters: self.clusters.len(),
            mode: self.visibility.mode(),
            attached: self.pool.attached_count(),
            loaded_thumbnails: self.pool.loaded_count(),
            loading_thumbnails: self.pool.handles().iter().filter(|h| h.is_loading()).count(),
            subscriptions: self.registry.len(),
            pass_pending: self.pending.is_some(),
            view_moving: self.visibility.is_dirty(),
        }
    }

    /// Unbinds everything from the current map and disposes it, keeping the
    /// point set and the pool's handles
    fn release_map(&mut self) {
        let Some(mut boxed) = self.map.take() else {
            return;
        };
        let map: &mut dyn MapEngine = &mut *boxed;

        self.selection.deactivate(&mut self.registry, map);
        self.gallery.clear(map, &mut self.pool);
        self.pool.detach_all(map);
        self.registry.unregister_all(map, None);
        map.dispose();

        self.pending = None;
        self.clusters.clear();
        self.visibility.reset();
    }

    /// Tears the engine down: selection off, every marker detached, every
    /// subscription removed, map engine disposed. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }

        if let Some(mut boxed) = self.map.take() {
            let map: &mut dyn MapEngine = &mut *boxed;
            self.selection.deactivate(&mut self.registry, map);
            self.gallery.clear(map, &mut self.pool);
            let detached = self.pool.detach_all(map);
            self.pool.dispose(map);
            let released = self.registry.unregister_all(map, None);
            map.dispose();
            log::info!(
                "marker engine disposed: {} markers detached, {} subscriptions released",
                detached,
                released
            );
        }

        self.pending = None;
        self.clusters.clear();
        self.visibility.reset();
        self.state = EngineState::Disposed;
    }
}

impl Drop for MarkerEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
