//! Depth-aware refraction of the scene behind the water.
//!
//! All depths are linear, normalized to `[0, 1]` between the camera's near
//! and far planes, so the bands in [`WaterConfig`] are fractions of the view
//! range rather than world units.

use tidewater_shade::{Field, GraphError, uniform};

use crate::surface::{WaterConfig, WaterSurface};

/// The fields a water material needs, built from one [`WaterSurface`].
#[derive(Debug, Clone)]
pub struct WaterShading {
    /// Linear depth of the scene behind the water minus that of the water itself.
    pub depth_water: Field,
    /// Shoreline to deep-water blend factor.
    pub depth_effect: Field,
    pub refraction_uv: Field,
    /// Like `depth_water`, but sampled at the refracted UV.
    pub depth_test_for_refraction: Field,
    pub depth_refraction: Field,
    /// Refracted UV, or the plain screen UV when the refracted sample is in front of the water.
    pub final_uv: Field,
    pub final_color: Field,
    pub backdrop_alpha: Field,
    /// Water color over the refracted backdrop, weighted by `backdrop_alpha`.
    pub output: Field,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthCompositor {
    pub refraction_strength: f32,
    pub shore_band: (f32, f32),
    pub refraction_band: (f32, f32),
}

impl Default for DepthCompositor {
    fn default() -> Self {
        Self::from_config(&WaterConfig::default())
    }
}

fn linear_depth(raw: &Field) -> Result<Field, GraphError> {
    raw.linearize_depth(uniform::camera_near(), uniform::camera_far())
}

impl DepthCompositor {
    pub fn from_config(config: &WaterConfig) -> Self {
        Self {
            refraction_strength: config.refraction_strength,
            shore_band: config.shore_band,
            refraction_band: config.refraction_band,
        }
    }

    pub fn build(&self, surface: &WaterSurface) -> Result<WaterShading, GraphError> {
        let screen_uv = Field::screen_uv();
        let water_depth = linear_depth(&Field::fragment_depth())?;

        let depth_water = linear_depth(&screen_uv.sample_scene_depth()?)?.sub(&water_depth)?;
        let depth_effect = depth_water.remap_clamp(self.shore_band.0, self.shore_band.1)?;

        let refraction_uv = screen_uv.add(surface.wave_intensity().mul(self.refraction_strength)?)?;
        let depth_test_for_refraction =
            linear_depth(&refraction_uv.sample_scene_depth()?)?.sub(&water_depth)?;
        let depth_refraction = depth_test_for_refraction
            .remap_clamp(self.refraction_band.0, self.refraction_band.1)?;

        let final_uv = depth_test_for_refraction
            .less_than(0.0)?
            .select(&screen_uv, &refraction_uv)?;

        let tint = Field::scalar(1.0).mix(surface.water_color(), &depth_refraction)?;
        let refracted = final_uv.sample_scene_color()?.mul(tint)?;
        let final_color = screen_uv
            .sample_scene_color()?
            .mix(refracted, &depth_effect)?;
        let backdrop_alpha = depth_refraction.one_minus()?;
        let output = surface.water_color().mix(&final_color, &backdrop_alpha)?;

        Ok(WaterShading {
            depth_water,
            depth_effect,
            refraction_uv,
            depth_test_for_refraction,
            depth_refraction,
            final_uv,
            final_color,
            backdrop_alpha,
            output,
        })
    }
}
