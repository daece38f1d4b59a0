//! Interaction tools layered on top of the marker engine

pub mod radius_select;

pub use radius_select::{RadiusSelectTool, SelectionState};
