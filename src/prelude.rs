//! Prelude module for common trailview types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use trailview::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{
        ClusterConfig, EngineOptions, EngineProfile, FocusConfig, SelectionConfig,
        ThumbnailConfig, VisibilityConfig,
    },
    engine::{EngineState, EngineStats, MarkerEngine},
    geo::{LatLng, LatLngBounds, Point},
    headless::{HeadlessMap, MapCall},
    viewport::Viewport,
};

pub use crate::data::store::{GeoPoint, GeoPointStore, PointId, PointMetadata, RawItem, ThumbnailRef};

pub use crate::input::{
    events::{EngineCommand, EventKind, ListenerId, MapEvent},
    registry::{EventHandler, ScopeKey, SubscriptionRegistry, SubscriptionToken},
};

pub use crate::markers::{
    handle::{LoadTicket, MarkerHandle},
    pool::MarkerPool,
    thumbnail::{
        CompletionSender, QueuedThumbnailLoader, TaskThumbnailLoader, Thumbnail, ThumbnailCache,
        ThumbnailCompletion, ThumbnailLoader, ThumbnailRequest,
    },
    visibility::{RenderMode, VisibilityController, VisibilityDiff},
};

pub use crate::plugins::radius_select::{RadiusSelectTool, SelectionState};

pub use crate::spatial::{
    clustering::{cluster, Cluster, ClusterPass, PassProgress},
    culling::Culling,
    index::PointIndex,
};

pub use crate::sync::gallery::GallerySynchronizer;

pub use crate::traits::{GalleryList, MapEngine, ThumbnailSource};

pub use crate::runtime::{AsyncHandle, AsyncSpawner};

pub use crate::{Error as MapError, Result};

pub use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
pub use std::pin::Pin;
