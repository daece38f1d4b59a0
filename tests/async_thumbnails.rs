use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use trailview::{prelude::*, runtime::tokio_impl::TokioSpawner};

/// Serves a few bytes per reference after a short delay; references ending in
/// `.missing` fail
struct SlowSource {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl ThumbnailSource for SlowSource {
    async fn fetch(&self, thumbnail: &ThumbnailRef) -> Result<Thumbnail> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if thumbnail.as_str().ends_with(".missing") {
            return Err(MapError::Thumbnail(format!("404 for {}", thumbnail.as_str())));
        }
        Ok(Thumbnail::new(thumbnail.clone(), thumbnail.as_str().as_bytes().to_vec()))
    }
}

struct NoList;

impl GalleryList for NoList {
    fn scroll_to_item(&mut self, _: PointId) {}
    fn highlight_item(&mut self, _: Option<PointId>) {}
}

fn city_block() -> Vec<RawItem> {
    (0..12u64)
        .map(|i| {
            let suffix = if i == 7 { "missing" } else { "jpg" };
            RawItem::new(i, 2.340 + (i % 4) as f64 * 0.001, 48.856 + (i / 4) as f64 * 0.001)
                .with_thumbnail(format!("https://img.example/{}.{}", i, suffix))
        })
        .collect()
}

async fn pump_until<F>(engine: &mut MarkerEngine, mut done: F)
where
    F: FnMut(&MarkerEngine) -> bool,
{
    for _ in 0..200 {
        engine.pump();
        if done(&*engine) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("engine did not reach the expected state: {:?}", engine.stats());
}

#[tokio::test]
async fn test_spawned_loads_complete_on_the_event_loop() {
    let _ = env_logger::builder().is_test(true).try_init();

    let fetches = Arc::new(AtomicUsize::new(0));
    let spawner = Arc::new(TokioSpawner::current().unwrap());
    let loader = TaskThumbnailLoader::new(
        SlowSource {
            fetches: fetches.clone(),
        },
        spawner,
    );

    let map = HeadlessMap::new(Viewport::new(
        LatLng::new(48.857, 2.3415),
        17.0,
        Point::new(1024.0, 768.0),
    ));
    let mut engine = MarkerEngine::new(
        EngineProfile::Balanced.resolve(),
        Box::new(loader),
        Box::new(NoList),
    );
    let surface = map.clone();
    engine
        .mount(move || Ok(Box::new(surface) as Box<dyn MapEngine>))
        .unwrap();
    engine.load_points(city_block());
    engine.flush();

    let attached = engine.stats().attached;
    assert_eq!(attached, 12);

    pump_until(&mut engine, |e| e.stats().loading_thumbnails == 0).await;

    let stats = engine.stats();
    assert_eq!(stats.loaded_thumbnails, 11);
    assert_eq!(fetches.load(Ordering::SeqCst), 12);
    assert!(engine.pool().handle(7).unwrap().load_failed);
    assert!(map.marker(7).unwrap().placeholder);
    assert!(map.marker(0).unwrap().has_thumbnail);
}

#[tokio::test]
async fn test_reattach_after_release_uses_cache() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let spawner = Arc::new(TokioSpawner::current().unwrap());
    let loader = TaskThumbnailLoader::new(
        SlowSource {
            fetches: fetches.clone(),
        },
        spawner,
    );

    let map = HeadlessMap::new(Viewport::new(
        LatLng::new(48.857, 2.3415),
        17.0,
        Point::new(1024.0, 768.0),
    ));
    let mut engine = MarkerEngine::new(EngineOptions::default(), Box::new(loader), Box::new(NoList));
    let surface = map.clone();
    engine
        .mount(move || Ok(Box::new(surface) as Box<dyn MapEngine>))
        .unwrap();
    engine.load_points(city_block());
    engine.flush();
    pump_until(&mut engine, |e| e.stats().loading_thumbnails == 0).await;
    let first_round = fetches.load(Ordering::SeqCst);

    // Out to aggregate mode and back: loaded images come from the cache
    engine.handle_event(&map.set_view(LatLng::new(48.857, 2.3415), 4.0));
    engine.flush();
    assert_eq!(engine.stats().loaded_thumbnails, 0);

    engine.handle_event(&map.set_view(LatLng::new(48.857, 2.3415), 17.0));
    engine.flush();
    pump_until(&mut engine, |e| e.stats().loading_thumbnails == 0).await;

    assert_eq!(engine.stats().loaded_thumbnails, 11);
    // Only the failed reference is fetched again
    assert_eq!(fetches.load(Ordering::SeqCst), first_round + 1);
}
