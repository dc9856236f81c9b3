pub mod click;
pub mod engine;
pub mod events;
pub mod impression;
pub mod orchestrator;
pub mod session;
pub mod viewability;

// Re-export the engine surface so callers rarely need the submodules.
pub use engine::{DeliveryEngine, DeliveryPorts, RenderedAd, USER_ID_STORAGE_KEY};
pub use events::{DeliveryEvent, EventKind};
pub use orchestrator::RequestOverrides;
pub use viewability::ViewabilityOutcome;
