pub mod bounds;
pub mod config;
pub mod constants;
pub mod engine;
pub mod geo;
pub mod headless;
pub mod viewport;
