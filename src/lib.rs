//! # trailview
//!
//! Viewport-driven marker engine for maps of geotagged photos.
//!
//! The engine keeps a working set of geo-referenced points, groups them into
//! clusters at low zoom, attaches individual markers for whatever is on screen
//! at high zoom, lazily loads thumbnails for attached markers only, maps a
//! circular pointer gesture back to a set of points, and keeps an external
//! photo list in step with the map. Rendering, tile fetching and the HTTP API
//! stay outside; they are reached through the traits in [`traits`].

pub mod core;
pub mod data;
pub mod input;
pub mod markers;
pub mod plugins;
pub mod runtime;
pub mod spatial;
pub mod sync;
pub mod traits;

pub mod prelude;

pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::Bounds,
    config::{EngineOptions, EngineProfile},
    engine::{EngineState, EngineStats, MarkerEngine},
    geo::{LatLng, LatLngBounds, Point},
    headless::{HeadlessMap, MapCall},
    viewport::Viewport,
};

pub use data::store::{GeoPoint, GeoPointStore, PointId, RawItem, ThumbnailRef};

pub use input::{
    events::{EngineCommand, EventKind, MapEvent},
    registry::{ScopeKey, SubscriptionRegistry, SubscriptionToken},
};

pub use markers::{
    handle::MarkerHandle,
    pool::MarkerPool,
    thumbnail::{QueuedThumbnailLoader, TaskThumbnailLoader, Thumbnail, ThumbnailLoader},
    visibility::{RenderMode, VisibilityController, VisibilityDiff},
};

pub use plugins::radius_select::{RadiusSelectTool, SelectionState};

pub use spatial::clustering::{cluster, Cluster, ClusterPass};

pub use sync::gallery::GallerySynchronizer;

pub use traits::{GalleryList, MapEngine, ThumbnailSource};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Map engine failed to initialize: {0}")]
    EngineInit(String),

    #[error("Unknown point id: {0}")]
    UnknownPoint(PointId),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("Engine has been disposed")]
    Disposed,
}

/// Error type alias for convenience
pub type Error = MapError;
