//! Time-smoothed opacity of the underwater overlay.

use serde::{Deserialize, Serialize};

/// Upper bound of the overlay opacity.
pub const MAX_OVERLAY_OPACITY: f32 = 0.95;

/// Ramp rates of the underwater overlay, in opacity per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Opacity reached while submerged; clamped to [`MAX_OVERLAY_OPACITY`].
    pub target: f32,
    pub rise_per_second: f32,
    pub fall_per_second: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            target: MAX_OVERLAY_OPACITY,
            rise_per_second: 1.2,
            fall_per_second: 3.0,
        }
    }
}

/// Opacity that eases toward its target at frame-rate independent rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedOverlay {
    target: f32,
    rise: f32,
    fall: f32,
    value: f32,
}

impl SmoothedOverlay {
    pub fn new(config: OverlayConfig) -> Self {
        // `f32::max` maps NaN to the other operand.
        Self {
            target: config.target.max(0.0).min(MAX_OVERLAY_OPACITY),
            rise: config.rise_per_second.max(0.0),
            fall: config.fall_per_second.max(0.0),
            value: 0.0,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target_for(&self, below: bool) -> f32 {
        if below { self.target } else { 0.0 }
    }

    /// Advance by `dt` seconds. Never overshoots the target; a negative or
    /// non-finite `dt` leaves the value untouched.
    pub fn update(&mut self, below: bool, dt: f32) -> f32 {
        if !dt.is_finite() || dt < 0.0 {
            tracing::trace!(dt, "ignoring overlay step");
            return self.value;
        }
        let target = self.target_for(below);
        self.value = if self.value < target {
            (self.value + self.rise * dt).min(target)
        } else {
            (self.value - self.fall * dt).max(target)
        }
        .clamp(0.0, MAX_OVERLAY_OPACITY);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

impl Default for SmoothedOverlay {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}
