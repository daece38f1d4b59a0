//! Map ↔ photo list synchronization

pub mod gallery;

pub use gallery::GallerySynchronizer;
