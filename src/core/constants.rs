//! Engine-wide defaults. Anything a host may want to tune is surfaced again
//! through `core::config`; these are only the values the presets start from.

/// Default square tile size in pixels; the world is `TILE_SIZE * 2^zoom` pixels wide.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Grid cell size used by the clusterer, in pixels.
pub const DEFAULT_CLUSTER_RADIUS_PX: f64 = 50.0;

/// Zoom at which the engine switches from cluster glyphs to individual markers.
pub const DEFAULT_INDIVIDUAL_ZOOM: f64 = 12.0;

/// Extra padding around the viewport inside which markers stay attached.
pub const DEFAULT_OVERSCAN_PX: f64 = 64.0;

/// Points processed per cooperative chunk of a cluster pass.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub const DEFAULT_SELECTION_RADIUS_PX: f64 = 80.0;

/// Point count at which the radius tool switches from a linear scan to the R-tree.
pub const DEFAULT_SELECTION_INDEX_THRESHOLD: usize = 10_000;

/// Released thumbnails kept around for cheap re-attach.
pub const DEFAULT_THUMBNAIL_CACHE: usize = 256;

pub const DEFAULT_FOCUS_ZOOM: f64 = 15.0;

pub const DEFAULT_FOCUS_DURATION_MS: u64 = 400;
