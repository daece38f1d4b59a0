pub mod events;
pub mod registry;

// Re-export the essential types
pub use events::{EngineCommand, EventKind, ListenerId, MapEvent};
pub use registry::{EventHandler, ScopeKey, SubscriptionRegistry, SubscriptionToken};
