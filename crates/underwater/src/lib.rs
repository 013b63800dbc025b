//! Underwater state: authoritative classification, smoothed overlay, environment.

mod environment;
mod overlay;
mod tracker;

pub use environment::{Environment, EnvironmentConfig, Fog};
pub use overlay::{MAX_OVERLAY_OPACITY, OverlayConfig, SmoothedOverlay};
pub use tracker::{Classification, TrackerUpdate, UnderwaterTracker};
