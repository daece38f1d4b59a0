//! Configuration for the marker engine
//!
//! Every tunable the engine uses lives here: cluster cell size, the zoom at
//! which individual markers take over, overscan, thumbnail retention, the
//! radius tool and focus animation. Hosts either pick a preset through
//! [`EngineProfile`] or load a JSON document with [`EngineOptions::from_json`];
//! missing fields fall back to the balanced defaults.

use crate::core::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CLUSTER_RADIUS_PX, DEFAULT_FOCUS_DURATION_MS, DEFAULT_FOCUS_ZOOM,
    DEFAULT_INDIVIDUAL_ZOOM, DEFAULT_OVERSCAN_PX, DEFAULT_SELECTION_INDEX_THRESHOLD,
    DEFAULT_SELECTION_RADIUS_PX, DEFAULT_THUMBNAIL_CACHE,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineProfile {
    #[default]
    Balanced,
    /// Large point sets: coarser clusters, smaller chunks, index-backed selection
    Dense,
    /// Small point sets: individual markers earlier, generous overscan
    Sparse,
    Custom(EngineOptions),
}

impl EngineProfile {
    pub fn resolve(&self) -> EngineOptions {
        match self {
            Self::Balanced => EngineOptions::default(),
            Self::Dense => EngineOptions {
                cluster: ClusterConfig { pixel_radius: 80.0 },
                visibility: VisibilityConfig {
                    individual_zoom_threshold: 14.0,
                    overscan_px: 32.0,
                    chunk_size: 1024,
                    singletons_as_markers: false,
                },
                thumbnails: ThumbnailConfig {
                    release_on_detach: true,
                    cache_capacity: 512,
                },
                selection: SelectionConfig {
                    radius_px: DEFAULT_SELECTION_RADIUS_PX,
                    index_threshold: 2_000,
                },
                focus: FocusConfig::default(),
            },
            Self::Sparse => EngineOptions {
                cluster: ClusterConfig { pixel_radius: 40.0 },
                visibility: VisibilityConfig {
                    individual_zoom_threshold: 9.0,
                    overscan_px: 128.0,
                    chunk_size: DEFAULT_CHUNK_SIZE,
                    singletons_as_markers: true,
                },
                thumbnails: ThumbnailConfig {
                    release_on_detach: false,
                    cache_capacity: 0,
                },
                selection: SelectionConfig::default(),
                focus: FocusConfig::default(),
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub cluster: ClusterConfig,
    pub visibility: VisibilityConfig,
    pub thumbnails: ThumbnailConfig,
    pub selection: SelectionConfig,
    pub focus: FocusConfig,
}

impl EngineOptions {
    /// Parses options from JSON; absent sections and fields keep their defaults
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Grid cell size and merge distance, in screen pixels
    pub pixel_radius: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            pixel_radius: DEFAULT_CLUSTER_RADIUS_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Zoom at or above which individual markers are attached
    pub individual_zoom_threshold: f64,
    /// Screen-space padding around the viewport in which markers stay attached
    pub overscan_px: f64,
    /// Points handled per cooperative step of a cluster pass or visibility scan
    pub chunk_size: usize,
    /// Attach in-bounds size-1 clusters as markers while in aggregate mode
    pub singletons_as_markers: bool,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            individual_zoom_threshold: DEFAULT_INDIVIDUAL_ZOOM,
            overscan_px: DEFAULT_OVERSCAN_PX,
            chunk_size: DEFAULT_CHUNK_SIZE,
            singletons_as_markers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Drop the loaded image from a handle when it is detached
    pub release_on_detach: bool,
    /// Released images retained for re-attach; 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            release_on_detach: true,
            cache_capacity: DEFAULT_THUMBNAIL_CACHE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub radius_px: f64,
    /// Point count at which selection queries go through the R-tree
    pub index_threshold: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            radius_px: DEFAULT_SELECTION_RADIUS_PX,
            index_threshold: DEFAULT_SELECTION_INDEX_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub zoom: f64,
    pub duration_ms: u64,
}

impl FocusConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_FOCUS_ZOOM,
            duration_ms: DEFAULT_FOCUS_DURATION_MS,
        }
    }
}
