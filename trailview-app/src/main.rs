use anyhow::Context;
use async_trait::async_trait;
use fxhash::FxHashMap;
use std::{sync::Arc, time::Duration};
use trailview::{
    prelude::*,
    runtime::tokio_impl::TokioSpawner,
};

/// Stand-in for the image CDN: fabricates a few bytes after a short delay
struct SyntheticThumbnails {
    latency: Duration,
}

#[async_trait]
impl ThumbnailSource for SyntheticThumbnails {
    async fn fetch(&self, thumbnail: &ThumbnailRef) -> trailview::Result<Thumbnail> {
        tokio::time::sleep(self.latency).await;
        Ok(Thumbnail::new(
            thumbnail.clone(),
            thumbnail.as_str().as_bytes().to_vec(),
        ))
    }
}

/// Photo list that just logs what the map asks of it
struct LoggingList;

impl GalleryList for LoggingList {
    fn scroll_to_item(&mut self, point_id: PointId) {
        log::info!("list: scroll to {}", point_id);
    }

    fn highlight_item(&mut self, point_id: Option<PointId>) {
        log::info!("list: highlight {:?}", point_id);
    }
}

/// Deterministic worldwide feed: a lattice of photos with every 17th one
/// missing its location
fn synthetic_feed(count: u64) -> Vec<RawItem> {
    (0..count)
        .map(|i| {
            let item = RawItem::new(
                i,
                -175.0 + (i * 37 % 350) as f64,
                -80.0 + (i * 23 % 160) as f64,
            )
            .with_thumbnail(format!("https://img.example/{}.jpg", i))
            .with_name(format!("Photo {}", i));
            if i % 17 == 0 {
                RawItem {
                    lng: None,
                    ..item
                }
            } else {
                item
            }
        })
        .collect()
}

async fn drain(engine: &mut MarkerEngine) {
    engine.flush();
    for _ in 0..100 {
        engine.pump();
        if engine.stats().loading_thumbnails == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    log::warn!("thumbnails still loading: {}", engine.stats().loading_thumbnails);
}

fn report(label: &str, engine: &MarkerEngine) -> anyhow::Result<()> {
    let mut sizes: FxHashMap<usize, usize> = FxHashMap::default();
    for cluster in engine.clusters() {
        *sizes.entry(cluster.member_count()).or_default() += 1;
    }
    let mut histogram: Vec<_> = sizes.into_iter().collect();
    histogram.sort_unstable();

    println!("== {}", label);
    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    if !histogram.is_empty() {
        println!("cluster sizes (size, count): {:?}", histogram);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = match std::env::var("TRAILVIEW_CONFIG") {
        Ok(path) => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            EngineOptions::from_json(&source).context("parsing engine config")?
        }
        Err(_) => EngineProfile::Balanced.resolve(),
    };

    let spawner = TokioSpawner::current().context("no tokio runtime")?;
    let loader = TaskThumbnailLoader::new(
        SyntheticThumbnails {
            latency: Duration::from_millis(20),
        },
        Arc::new(spawner),
    );

    let map = HeadlessMap::new(Viewport::new(
        LatLng::new(20.0, 0.0),
        2.0,
        Point::new(1280.0, 800.0),
    ));
    let mut engine = MarkerEngine::new(options, Box::new(loader), Box::new(LoggingList));
    let surface = map.clone();
    engine
        .mount(move || Ok(Box::new(surface) as Box<dyn MapEngine>))
        .context("mounting the headless map")?;

    let kept = match std::env::args().nth(1) {
        Some(path) => {
            let feed =
                std::fs::read_to_string(&path).with_context(|| format!("reading feed {}", path))?;
            engine.load_json(&feed).context("loading point feed")?
        }
        None => engine.load_points(synthetic_feed(2_000)),
    };
    log::info!("{} geotagged points loaded", kept);

    drain(&mut engine).await;
    report("world view", &engine)?;

    let Some(target) = engine.store().points().first().map(|p| p.id) else {
        println!("feed has no geotagged points");
        return Ok(());
    };

    engine.focus_point(target)?;
    if let Some(settle) = map.finish_animation() {
        engine.handle_event(&settle);
    }
    drain(&mut engine).await;
    report(&format!("focused on point {}", target), &engine)?;

    engine.activate_selection();
    engine.handle_event(&MapEvent::PointerMove {
        position: Point::new(640.0, 400.0),
    });
    if let Some(selection) = engine.selection() {
        println!(
            "lasso of {}px around the center selects {} points",
            selection.radius_px,
            selection.matched.len()
        );
    }
    engine.deactivate_selection();

    engine.handle_event(&map.set_view(LatLng::new(20.0, 0.0), 2.0));
    drain(&mut engine).await;
    report("back to world view", &engine)?;

    engine.dispose();
    println!(
        "disposed: {} listeners and {} markers left on the map",
        map.active_listeners(),
        map.marker_count()
    );
    Ok(())
}
