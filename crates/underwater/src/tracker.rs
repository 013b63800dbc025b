//! Per-frame underwater classification.
//!
//! The height comparison is the only input that decides underwater logic.
//! The smoothed overlay rides along for presentation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tidewater_shade::{GraphError, UniformSet, uniform};

use crate::overlay::{OverlayConfig, SmoothedOverlay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Above,
    Below,
}

impl Classification {
    /// `Below` iff the camera is strictly lower than the water; a tie is `Above`.
    pub fn classify(camera_height: f32, water_height: f32) -> Self {
        if camera_height < water_height {
            Classification::Below
        } else {
            Classification::Above
        }
    }

    pub fn is_below(self) -> bool {
        self == Classification::Below
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Above => write!(f, "above"),
            Classification::Below => write!(f, "below"),
        }
    }
}

/// Result of one [`UnderwaterTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerUpdate {
    pub classification: Classification,
    /// Whether the classification flipped on this update.
    pub changed: bool,
    pub overlay_opacity: f32,
}

#[derive(Debug, Clone)]
pub struct UnderwaterTracker {
    water_height: f32,
    classification: Classification,
    overlay: SmoothedOverlay,
    updates: u64,
    transitions: u64,
}

impl UnderwaterTracker {
    pub fn new(water_height: f32, overlay: OverlayConfig) -> Self {
        Self {
            water_height,
            classification: Classification::Above,
            overlay: SmoothedOverlay::new(overlay),
            updates: 0,
            transitions: 0,
        }
    }

    pub fn water_height(&self) -> f32 {
        self.water_height
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn overlay_opacity(&self) -> f32 {
        self.overlay.value()
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Classify the camera and advance the overlay by `dt` seconds.
    pub fn update(&mut self, camera_height: f32, dt: f32) -> TrackerUpdate {
        let next = Classification::classify(camera_height, self.water_height);
        // The first update establishes the state rather than flipping it.
        let changed = self.updates > 0 && next != self.classification;
        if changed {
            self.transitions += 1;
            tracing::info!(
                from = %self.classification,
                to = %next,
                camera_height,
                water_height = self.water_height,
                "camera crossed the water surface"
            );
        }
        self.classification = next;
        self.updates += 1;
        let overlay_opacity = self.overlay.update(next.is_below(), dt);
        tracing::debug!(
            classification = %next,
            overlay_opacity,
            "underwater state updated"
        );
        TrackerUpdate {
            classification: next,
            changed,
            overlay_opacity,
        }
    }

    /// Publish the current state into the frame's uniforms.
    pub fn write_uniforms(&self, uniforms: &mut UniformSet) -> Result<(), GraphError> {
        uniforms.set(uniform::UNDERWATER, self.classification.is_below())?;
        uniforms.set(uniform::OVERLAY_OPACITY, self.overlay.value())?;
        uniforms.set(uniform::WATER_HEIGHT, self.water_height)
    }
}

impl Default for UnderwaterTracker {
    fn default() -> Self {
        Self::new(0.0, OverlayConfig::default())
    }
}
