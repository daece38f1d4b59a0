//! Marker handles, their lazy thumbnails, and the visibility decisions that
//! drive attach/detach.

pub mod handle;
pub mod pool;
pub mod thumbnail;
pub mod visibility;

pub use handle::{LoadTicket, MarkerHandle};
pub use pool::MarkerPool;
pub use thumbnail::{
    QueuedThumbnailLoader, TaskThumbnailLoader, Thumbnail, ThumbnailCache, ThumbnailLoader,
};
pub use visibility::{RenderMode, VisibilityController, VisibilityDiff, VisibilityScan};
