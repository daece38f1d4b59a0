use crate::{
    core::{config::ThumbnailConfig, viewport::Viewport},
    data::store::{GeoPoint, PointId},
    markers::{
        handle::{LoadTicket, MarkerHandle},
        thumbnail::{ThumbnailCache, ThumbnailCompletion, ThumbnailLoader, ThumbnailRequest},
    },
    prelude::HashMap,
    traits::MapEngine,
    MapError, Result,
};
use crossbeam_channel::{Receiver, Sender};

/// Owns one [`MarkerHandle`] per point of the current point set.
///
/// The handles form a dense arena in store order. Attach and detach only
/// toggle a handle and mirror the change onto the map surface; the arena is
/// rebuilt only when the whole point set is replaced.
pub struct MarkerPool {
    handles: Vec<MarkerHandle>,
    slots: HashMap<PointId, usize>,
    generation: u64,
    next_ticket: u64,
    loader: Box<dyn ThumbnailLoader>,
    done_tx: Sender<ThumbnailCompletion>,
    done_rx: Receiver<ThumbnailCompletion>,
    cache: ThumbnailCache,
    config: ThumbnailConfig,
}

impl MarkerPool {
    pub fn new(loader: Box<dyn ThumbnailLoader>, config: ThumbnailConfig) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            handles: Vec::new(),
            slots: HashMap::default(),
            generation: 0,
            next_ticket: 0,
            loader,
            done_tx,
            done_rx,
            cache: ThumbnailCache::new(config.cache_capacity),
            config,
        }
    }

    /// Disposes every existing handle, then builds a fresh arena for `points`
    pub fn rebuild(&mut self, points: &[GeoPoint], generation: u64, surface: &mut dyn MapEngine) {
        let disposed = self.dispose_handles(surface);

        self.handles = points.iter().map(MarkerHandle::new).collect();
        self.slots = points
            .iter()
            .enumerate()
            .map(|(slot, p)| (p.id, slot))
            .collect();
        self.generation = generation;

        log::debug!(
            "marker pool rebuilt for point set #{}: {} handles ({} disposed)",
            generation,
            self.handles.len(),
            disposed
        );
    }

    fn slot(&self, point_id: PointId) -> Result<usize> {
        self.slots
            .get(&point_id)
            .copied()
            .ok_or(MapError::UnknownPoint(point_id))
    }

    /// Puts the point's marker on the map and starts its thumbnail load if
    /// needed. Returns `false` when it was already attached.
    pub fn attach(&mut self, point_id: PointId, surface: &mut dyn MapEngine) -> Result<bool> {
        let slot = self.slot(point_id)?;
        let handle = &mut self.handles[slot];
        if handle.attached {
            return Ok(false);
        }

        handle.attached = true;
        surface.add_marker(point_id, handle.position);
        if handle.highlighted {
            surface.set_marker_highlight(point_id, true);
        }

        if handle.thumbnail_loaded {
            surface.set_marker_thumbnail(point_id, handle.thumbnail.as_ref());
            return Ok(true);
        }
        if handle.is_loading() {
            return Ok(true);
        }
        if handle.thumbnail_ref.is_empty() {
            handle.load_failed = true;
            surface.set_marker_thumbnail(point_id, None);
            return Ok(true);
        }

        if let Some(cached) = self.cache.get(&handle.thumbnail_ref) {
            surface.set_marker_thumbnail(point_id, Some(&cached));
            handle.thumbnail = Some(cached);
            handle.thumbnail_loaded = true;
            return Ok(true);
        }

        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        handle.pending = Some(ticket);
        self.loader.schedule(
            ThumbnailRequest {
                point_id,
                generation: self.generation,
                ticket,
                thumbnail: handle.thumbnail_ref.clone(),
            },
            self.done_tx.clone(),
        );
        Ok(true)
    }

    /// Takes the marker off the map; the handle stays in the arena.
    /// Returns `false` when it was not attached.
    pub fn detach(&mut self, point_id: PointId, surface: &mut dyn MapEngine) -> Result<bool> {
        let slot = self.slot(point_id)?;
        let handle = &mut self.handles[slot];
        if !handle.attached {
            return Ok(false);
        }

        handle.attached = false;
        handle.screen_pos = None;
        handle.load_failed = false;
        surface.remove_marker(point_id);

        if self.config.release_on_detach {
            if let Some(thumbnail) = handle.release() {
                self.cache.put(thumbnail);
            }
        } else {
            handle.pending = None;
        }
        Ok(true)
    }

    pub fn is_attached(&self, point_id: PointId) -> bool {
        self.slots
            .get(&point_id)
            .map_or(false, |&slot| self.handles[slot].attached)
    }

    /// Detaches every attached handle; returns how many were detached
    pub fn detach_all(&mut self, surface: &mut dyn MapEngine) -> usize {
        let attached = self.attached_ids();
        for id in &attached {
            if let Err(e) = self.detach(*id, surface) {
                log::warn!("detach of {} failed: {}", id, e);
            }
        }
        attached.len()
    }

    /// Applies finished thumbnail loads that are still wanted.
    ///
    /// A completion is live only if it belongs to the current point set, its
    /// handle is still attached and still waiting on that exact ticket.
    /// Anything else is a load that lost a race with detach, re-attach or a
    /// point-set replacement, and is dropped.
    pub fn apply_completions(&mut self, surface: &mut dyn MapEngine) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.done_rx.try_recv() {
            if self.apply_completion(completion, surface) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_completion(&mut self, completion: ThumbnailCompletion, surface: &mut dyn MapEngine) -> bool {
        let ThumbnailCompletion {
            point_id,
            generation,
            ticket,
            result,
        } = completion;

        if generation != self.generation {
            log::debug!("discarding thumbnail for {} from point set #{}", point_id, generation);
            return false;
        }
        let Some(&slot) = self.slots.get(&point_id) else {
            return false;
        };
        let handle = &mut self.handles[slot];
        if !handle.attached || handle.pending != Some(ticket) {
            log::debug!("discarding stale thumbnail load {:?} for {}", ticket, point_id);
            return false;
        }
        handle.pending = None;

        match result {
            Ok(thumbnail) => {
                surface.set_marker_thumbnail(point_id, Some(&thumbnail));
                handle.thumbnail = Some(thumbnail);
                handle.thumbnail_loaded = true;
                handle.load_failed = false;
            }
            Err(e) => {
                log::warn!("thumbnail for point {} failed: {}", point_id, e);
                handle.load_failed = true;
                surface.set_marker_thumbnail(point_id, None);
            }
        }
        true
    }

    pub fn set_highlight(
        &mut self,
        point_id: PointId,
        highlighted: bool,
        surface: &mut dyn MapEngine,
    ) -> Result<()> {
        let slot = self.slot(point_id)?;
        let handle = &mut self.handles[slot];
        handle.highlighted = highlighted;
        if handle.attached {
            surface.set_marker_highlight(point_id, highlighted);
        }
        Ok(())
    }

    /// Caches container positions of attached handles for `viewport`
    pub fn refresh_screen_positions(&mut self, viewport: &Viewport) {
        for handle in self.handles.iter_mut().filter(|h| h.attached) {
            handle.screen_pos = Some(viewport.lat_lng_to_pixel(&handle.position));
        }
    }

    /// Releases every handle and pending load; the pool ends up empty
    pub fn dispose(&mut self, surface: &mut dyn MapEngine) {
        self.dispose_handles(surface);
        self.cache.clear();
    }

    fn dispose_handles(&mut self, surface: &mut dyn MapEngine) -> usize {
        for handle in self.handles.iter_mut().filter(|h| h.attached) {
            surface.remove_marker(handle.point_id);
            handle.attached = false;
        }
        self.loader.cancel_all();
        while self.done_rx.try_recv().is_ok() {}

        let disposed = self.handles.len();
        self.handles.clear();
        self.slots.clear();
        disposed
    }

    pub fn handle(&self, point_id: PointId) -> Option<&MarkerHandle> {
        self.slots.get(&point_id).map(|&slot| &self.handles[slot])
    }

    pub fn handles(&self) -> &[MarkerHandle] {
        &self.handles
    }

    pub fn attached_ids(&self) -> Vec<PointId> {
        self.handles
            .iter()
            .filter(|h| h.attached)
            .map(|h| h.point_id)
            .collect()
    }

    pub fn attached_count(&self) -> usize {
        self.handles.iter().filter(|h| h.attached).count()
    }

    pub fn loaded_count(&self) -> usize {
        self.handles.iter().filter(|h| h.thumbnail_loaded).count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::headless::HeadlessMap,
        data::store::{GeoPointStore, RawItem, ThumbnailRef},
        markers::thumbnail::{QueuedThumbnailLoader, Thumbnail},
    };

    fn setup(config: ThumbnailConfig) -> (MarkerPool, QueuedThumbnailLoader, HeadlessMap, GeoPointStore) {
        let loader = QueuedThumbnailLoader::new();
        let mut pool = MarkerPool::new(Box::new(loader.clone()), config);
        let mut map = HeadlessMap::default();
        let mut store = GeoPointStore::new();
        store.load(vec![
            RawItem::new(1, 2.35, 48.85).with_thumbnail("t/1.jpg"),
            RawItem::new(2, 2.36, 48.86).with_thumbnail("t/2.jpg"),
            RawItem::new(3, 2.37, 48.87),
        ]);
        pool.rebuild(store.points(), store.generation(), &mut map);
        (pool, loader, map, store)
    }

    #[test]
    fn test_pool_sized_to_point_set() {
        let (pool, _, _, store) = setup(ThumbnailConfig::default());
        assert_eq!(pool.len(), store.len());
        assert_eq!(pool.attached_count(), 0);
    }

    #[test]
    fn test_attach_twice_schedules_one_load() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());

        assert!(pool.attach(1, &mut map).unwrap());
        assert!(!pool.attach(1, &mut map).unwrap());

        assert_eq!(loader.scheduled(), 1);
        assert!(pool.is_attached(1));
        assert!(map.has_marker(1));
    }

    #[test]
    fn test_loaded_only_on_success() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        assert!(!pool.handle(1).unwrap().thumbnail_loaded);

        loader.succeed_all();
        assert_eq!(pool.apply_completions(&mut map), 1);
        assert!(pool.handle(1).unwrap().thumbnail_loaded);
        assert!(map.marker(1).unwrap().has_thumbnail);
    }

    #[test]
    fn test_failed_load_shows_placeholder() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        pool.attach(2, &mut map).unwrap();

        loader.complete_next(Err(MapError::Thumbnail("404".into())));
        loader.succeed_all();
        pool.apply_completions(&mut map);

        let failed = pool.handle(1).unwrap();
        assert!(!failed.thumbnail_loaded);
        assert!(failed.load_failed);
        assert!(map.marker(1).unwrap().placeholder);
        assert!(pool.handle(2).unwrap().thumbnail_loaded);
    }

    #[test]
    fn test_missing_thumbnail_reference_is_placeholder_without_load() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(3, &mut map).unwrap();
        assert_eq!(loader.scheduled(), 0);
        assert!(pool.handle(3).unwrap().load_failed);
    }

    #[test]
    fn test_detach_before_load_completes_discards_result() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        pool.detach(1, &mut map).unwrap();

        loader.succeed_all();
        assert_eq!(pool.apply_completions(&mut map), 0);
        let handle = pool.handle(1).unwrap();
        assert!(!handle.thumbnail_loaded);
        assert!(!map.has_marker(1));
    }

    #[test]
    fn test_reattach_ignores_superseded_ticket() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        pool.detach(1, &mut map).unwrap();
        pool.attach(1, &mut map).unwrap();
        assert_eq!(loader.scheduled(), 2);

        // First request belongs to the old attachment
        loader.complete_next(Ok(Thumbnail::new(ThumbnailRef::new("t/1.jpg"), vec![0])));
        assert_eq!(pool.apply_completions(&mut map), 0);
        assert!(pool.handle(1).unwrap().is_loading());

        loader.succeed_all();
        assert_eq!(pool.apply_completions(&mut map), 1);
        assert!(pool.handle(1).unwrap().thumbnail_loaded);
    }

    #[test]
    fn test_detach_releases_into_cache_and_reattach_reuses_it() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        loader.succeed_all();
        pool.apply_completions(&mut map);

        pool.detach(1, &mut map).unwrap();
        let released = pool.handle(1).unwrap();
        assert!(!released.thumbnail_loaded);
        assert!(released.thumbnail().is_none());

        pool.attach(1, &mut map).unwrap();
        assert_eq!(loader.scheduled(), 1, "cache hit must not refetch");
        assert!(pool.handle(1).unwrap().thumbnail_loaded);
    }

    #[test]
    fn test_release_disabled_without_cache_keeps_image() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig {
            release_on_detach: false,
            cache_capacity: 0,
        });
        pool.attach(1, &mut map).unwrap();
        loader.succeed_all();
        pool.apply_completions(&mut map);

        pool.detach(1, &mut map).unwrap();
        assert!(pool.handle(1).unwrap().thumbnail_loaded);
        pool.attach(1, &mut map).unwrap();
        assert_eq!(loader.scheduled(), 1);
        assert!(map.marker(1).unwrap().has_thumbnail);
    }

    #[test]
    fn test_release_without_cache_reloads() {
        let (mut pool, loader, mut map, _) = setup(ThumbnailConfig {
            release_on_detach: true,
            cache_capacity: 0,
        });
        pool.attach(1, &mut map).unwrap();
        loader.succeed_all();
        pool.apply_completions(&mut map);
        pool.detach(1, &mut map).unwrap();
        pool.attach(1, &mut map).unwrap();
        assert_eq!(loader.scheduled(), 2);
    }

    #[test]
    fn test_rebuild_disposes_and_discards_old_generation() {
        let (mut pool, loader, mut map, mut store) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        pool.attach(2, &mut map).unwrap();
        let old_requests = loader.requests();

        store.load(vec![RawItem::new(1, 0.0, 0.0).with_thumbnail("t/new.jpg")]);
        pool.rebuild(store.points(), store.generation(), &mut map);
        assert_eq!(map.marker_count(), 0);
        assert_eq!(pool.len(), 1);
        assert_eq!(loader.pending(), 0, "rebuild cancels queued loads");

        // A late completion from the previous set must not land on the new handle
        pool.attach(1, &mut map).unwrap();
        let stale = ThumbnailCompletion::new(
            &old_requests[0],
            Ok(Thumbnail::new(ThumbnailRef::new("t/1.jpg"), vec![9])),
        );
        pool.done_tx.send(stale).unwrap();
        assert_eq!(pool.apply_completions(&mut map), 0);
        assert!(!pool.handle(1).unwrap().thumbnail_loaded);
    }

    #[test]
    fn test_unknown_point_is_error() {
        let (mut pool, _, mut map, _) = setup(ThumbnailConfig::default());
        assert!(matches!(pool.attach(99, &mut map), Err(MapError::UnknownPoint(99))));
        assert!(!pool.is_attached(99));
    }

    #[test]
    fn test_highlight_survives_detach() {
        let (mut pool, _, mut map, _) = setup(ThumbnailConfig::default());
        pool.set_highlight(2, true, &mut map).unwrap();
        pool.attach(2, &mut map).unwrap();
        assert!(map.marker(2).unwrap().highlighted);
    }

    #[test]
    fn test_detach_all() {
        let (mut pool, _, mut map, _) = setup(ThumbnailConfig::default());
        pool.attach(1, &mut map).unwrap();
        pool.attach(2, &mut map).unwrap();
        assert_eq!(pool.detach_all(&mut map), 2);
        assert_eq!(map.marker_count(), 0);
        assert_eq!(pool.len(), 3);
    }
}
