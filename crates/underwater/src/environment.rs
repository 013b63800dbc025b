//! Fog and background chosen from the authoritative classification.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tidewater_shade::{Field, GraphError, hex_color, remap_clamp};

use crate::tracker::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub fog_color: u32,
    pub fog_near: f32,
    pub fog_far: f32,
    /// Background color looking straight down.
    pub sky_low: u32,
    /// Background color looking straight up.
    pub sky_high: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            fog_color: 0x0487e2,
            fog_near: 7.0,
            fog_far: 25.0,
            sky_low: 0x0487e2,
            sky_high: 0x0066ff,
        }
    }
}

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// 0 up to `near`, 1 from `far` on.
    pub fn factor(&self, distance: f32) -> f32 {
        remap_clamp(distance, self.near, self.far)
    }

    pub fn apply(&self, color: Vec3, distance: f32) -> Vec3 {
        color.lerp(self.color, self.factor(distance))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub classification: Classification,
    /// Present only below the water.
    pub fog: Option<Fog>,
    pub sky_low: Vec3,
    pub sky_high: Vec3,
}

impl Environment {
    pub fn for_state(classification: Classification, config: &EnvironmentConfig) -> Self {
        let fog = classification.is_below().then(|| Fog {
            color: hex_color(config.fog_color),
            near: config.fog_near,
            far: config.fog_far,
        });
        Self {
            classification,
            fog,
            sky_low: hex_color(config.sky_low),
            sky_high: hex_color(config.sky_high),
        }
    }

    /// Background seen along `direction`, blended by its up component.
    pub fn background(&self, direction: Vec3) -> Vec3 {
        let up = direction.normalize_or_zero().y;
        self.sky_low.lerp(self.sky_high, up)
    }

    /// Background gradient as a field of the world normal.
    pub fn background_field(&self) -> Result<Field, GraphError> {
        Field::vector(self.sky_low).mix(Field::vector(self.sky_high), Field::world_normal().y()?)
    }

    /// Fog applied to a surface `distance` units from the camera.
    pub fn shade(&self, color: Vec3, distance: f32) -> Vec3 {
        match &self.fog {
            Some(fog) => fog.apply(color, distance),
            None => color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_shade::{FragmentInput, TextureSampler, UniformSet, compile};

    struct Empty;

    impl TextureSampler for Empty {
        fn scene_color(&self, _uv: glam::Vec2) -> Vec3 {
            Vec3::ZERO
        }
        fn scene_depth(&self, _uv: glam::Vec2) -> f32 {
            1.0
        }
    }

    #[test]
    fn fog_only_below_water() {
        let config = EnvironmentConfig::default();
        let above = Environment::for_state(Classification::Above, &config);
        assert!(above.fog.is_none());
        assert_eq!(above.shade(Vec3::ONE, 100.0), Vec3::ONE);

        let below = Environment::for_state(Classification::Below, &config);
        let fog = below.fog.unwrap();
        assert_eq!(fog.color, hex_color(0x0487e2));
        assert_eq!((fog.near, fog.far), (7.0, 25.0));
    }

    #[test]
    fn fog_is_linear_between_near_and_far() {
        let below = Environment::for_state(Classification::Below, &EnvironmentConfig::default());
        let fog = below.fog.unwrap();
        assert_eq!(fog.factor(3.0), 0.0);
        assert!((fog.factor(16.0) - 0.5).abs() < 1e-6);
        assert_eq!(fog.factor(40.0), 1.0);
        assert!(below.shade(Vec3::ONE, 50.0).abs_diff_eq(fog.color, 1e-6));
    }

    #[test]
    fn background_blends_by_direction() {
        let env = Environment::for_state(Classification::Above, &EnvironmentConfig::default());
        assert_eq!(env.background(Vec3::Z), env.sky_low);
        assert!(env.background(Vec3::Y).abs_diff_eq(env.sky_high, 1e-6));
    }

    #[test]
    fn background_field_matches_cpu_gradient() {
        let env = Environment::for_state(Classification::Above, &EnvironmentConfig::default());
        let program = compile(&env.background_field().unwrap()).unwrap();
        let bound = program.bind(&UniformSet::new()).unwrap();
        let dir = Vec3::new(0.0, 0.6, 0.8);
        let fragment = FragmentInput {
            world_normal: dir,
            ..FragmentInput::default()
        };
        let v = bound.evaluate(&fragment, &Empty).as_vector();
        assert!(v.abs_diff_eq(env.background(dir), 1e-5));
    }

    #[test]
    fn config_from_json_keeps_defaults() {
        let config: EnvironmentConfig = serde_json::from_str(r#"{ "fog_far": 40.0 }"#).unwrap();
        assert_eq!(config.fog_far, 40.0);
        assert_eq!(config.fog_near, 7.0);
    }
}
