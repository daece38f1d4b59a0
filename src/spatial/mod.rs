pub mod clustering;
pub mod culling;
pub mod index;
