//! Layered Worley waves over a thin water slab.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tidewater_shade::{Field, GraphError, hex_color, uniform, worley};

use crate::error::WaterError;

/// Smallest slab thickness accepted for a [`WaterPlane`].
pub const MIN_SLAB_THICKNESS: f32 = 1e-3;

/// One octave of animated cellular noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseLayer {
    pub frequency: f32,
    /// Scroll speed per unit of scaled time.
    pub speed: f32,
    pub amplitude: f32,
}

impl NoiseLayer {
    pub const fn new(frequency: f32, speed: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            speed,
            amplitude,
        }
    }

    /// `amplitude · worley(floor_uv · frequency + timer · speed)`.
    pub fn field(&self, floor_uv: &Field, timer: &Field) -> Result<Field, GraphError> {
        floor_uv
            .mul(self.frequency)?
            .add(timer.mul(self.speed)?)?
            .worley()?
            .mul(self.amplitude)
    }

    pub fn sample(&self, floor_uv: Vec3, timer: f32) -> f32 {
        worley(floor_uv * self.frequency + Vec3::splat(timer * self.speed)) * self.amplitude
    }
}

/// Appearance and geometry parameters of the water.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Surface tint as `0xRRGGBB`.
    pub base_color: u32,
    /// Multiplier applied to elapsed time before it drives the noise.
    pub time_scale: f32,
    pub layers: [NoiseLayer; 2],
    /// Screen-UV offset per unit of wave intensity.
    pub refraction_strength: f32,
    /// Linear-depth band mapping water depth to the backdrop blend.
    pub shore_band: (f32, f32),
    /// Linear-depth band mapping the refracted depth test to the tint amount.
    pub refraction_band: (f32, f32),
    pub height: f32,
    pub extent: Vec2,
    pub thickness: f32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            base_color: 0x74ccf4,
            time_scale: 0.8,
            layers: [NoiseLayer::new(4.0, 0.5, 0.5), NoiseLayer::new(2.0, 0.1, 0.5)],
            refraction_strength: 0.1,
            shore_band: (-0.002, 0.04),
            refraction_band: (0.0, 0.1),
            height: 0.0,
            extent: Vec2::splat(100.0),
            thickness: 0.001,
        }
    }
}

/// Which face of the slab a viewer sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlabFace {
    Top,
    Bottom,
}

/// A thin horizontal box centered on the origin in x/z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterPlane {
    height: f32,
    extent: Vec2,
    thickness: f32,
}

impl WaterPlane {
    pub fn new(height: f32, extent: Vec2, thickness: f32) -> Result<Self, WaterError> {
        if !height.is_finite() {
            return Err(WaterError::InvalidHeight(height));
        }
        if !extent.is_finite() || extent.x <= 0.0 || extent.y <= 0.0 {
            return Err(WaterError::InvalidExtent {
                width: extent.x,
                depth: extent.y,
            });
        }
        // Also rejects NaN.
        if !(thickness >= MIN_SLAB_THICKNESS) {
            return Err(WaterError::SlabTooThin(thickness));
        }
        Ok(Self {
            height,
            extent,
            thickness,
        })
    }

    pub fn from_config(config: &WaterConfig) -> Result<Self, WaterError> {
        Self::new(config.height, config.extent, config.thickness)
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn extent(&self) -> Vec2 {
        self.extent
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    pub fn face_height(&self, face: SlabFace) -> f32 {
        match face {
            SlabFace::Top => self.height + self.thickness * 0.5,
            SlabFace::Bottom => self.height - self.thickness * 0.5,
        }
    }

    /// The face turned towards a viewer at `eye_height`.
    pub fn visible_face(&self, eye_height: f32) -> SlabFace {
        if eye_height >= self.height {
            SlabFace::Top
        } else {
            SlabFace::Bottom
        }
    }

    pub fn covers(&self, x: f32, z: f32) -> bool {
        x.abs() <= self.extent.x * 0.5 && z.abs() <= self.extent.y * 0.5
    }

    /// Distance along `dir` to the visible face, if the ray hits it within the extent.
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<(f32, SlabFace)> {
        let face = self.visible_face(origin.y);
        if dir.y.abs() <= f32::EPSILON {
            return None;
        }
        let t = (self.face_height(face) - origin.y) / dir.y;
        if !t.is_finite() || t <= 0.0 {
            return None;
        }
        let hit = origin + dir * t;
        self.covers(hit.x, hit.z).then_some((t, face))
    }
}

/// Wave fields for one water plane.
///
/// Built once at setup; only the `time` uniform changes between frames.
#[derive(Debug, Clone)]
pub struct WaterSurface {
    plane: WaterPlane,
    config: WaterConfig,
    timer: Field,
    layers: [Field; 2],
    wave_intensity: Field,
    water_color: Field,
}

impl WaterSurface {
    pub fn new(plane: WaterPlane, config: WaterConfig) -> Result<Self, WaterError> {
        let floor_uv = Field::world_position().xzy()?;
        let timer = uniform::time().mul(config.time_scale)?;
        let layers = [
            config.layers[0].field(&floor_uv, &timer)?,
            config.layers[1].field(&floor_uv, &timer)?,
        ];
        let wave_intensity = layers[0].add(&layers[1])?;
        let water_color = Field::color(config.base_color).mul(wave_intensity.add(0.5)?)?;
        tracing::debug!(
            height = plane.height(),
            thickness = plane.thickness(),
            "built water surface fields"
        );
        Ok(Self {
            plane,
            config,
            timer,
            layers,
            wave_intensity,
            water_color,
        })
    }

    pub fn from_config(config: WaterConfig) -> Result<Self, WaterError> {
        Self::new(WaterPlane::from_config(&config)?, config)
    }

    pub fn plane(&self) -> &WaterPlane {
        &self.plane
    }

    pub fn config(&self) -> &WaterConfig {
        &self.config
    }

    /// Scaled time shared by every consumer of the wave pattern.
    pub fn timer(&self) -> &Field {
        &self.timer
    }

    pub fn layers(&self) -> &[Field; 2] {
        &self.layers
    }

    pub fn wave_intensity(&self) -> &Field {
        &self.wave_intensity
    }

    pub fn water_color(&self) -> &Field {
        &self.water_color
    }

    pub fn base_color(&self) -> Vec3 {
        hex_color(self.config.base_color)
    }

    /// CPU reference of [`wave_intensity`](Self::wave_intensity).
    pub fn sample_wave_intensity(&self, world: Vec3, time: f32) -> f32 {
        let floor_uv = Vec3::new(world.x, world.z, world.y);
        let timer = time * self.config.time_scale;
        self.config
            .layers
            .iter()
            .map(|layer| layer.sample(floor_uv, timer))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_shade::{FragmentInput, TextureSampler, UniformSet, Value, compile};

    struct NoTextures;

    impl TextureSampler for NoTextures {
        fn scene_color(&self, _uv: glam::Vec2) -> Vec3 {
            Vec3::ZERO
        }
        fn scene_depth(&self, _uv: glam::Vec2) -> f32 {
            1.0
        }
    }

    fn at(world: Vec3) -> FragmentInput {
        FragmentInput {
            world_position: world,
            ..FragmentInput::default()
        }
    }

    fn sweep() -> impl Iterator<Item = (Vec3, f32)> {
        (0..400).map(|i| {
            let s = i as f32 * 0.173;
            let world = Vec3::new(s.sin() * 30.0, 0.0, (s * 0.7).cos() * 30.0 + s);
            (world, s * 0.5)
        })
    }

    #[test]
    fn rejects_degenerate_slabs() {
        let extent = Vec2::splat(100.0);
        assert!(matches!(
            WaterPlane::new(0.0, extent, 0.0),
            Err(WaterError::SlabTooThin(_))
        ));
        assert!(matches!(
            WaterPlane::new(0.0, extent, 1e-4),
            Err(WaterError::SlabTooThin(_))
        ));
        assert!(matches!(
            WaterPlane::new(0.0, extent, f32::NAN),
            Err(WaterError::SlabTooThin(_))
        ));
        assert!(matches!(
            WaterPlane::new(0.0, Vec2::new(0.0, 1.0), 0.01),
            Err(WaterError::InvalidExtent { .. })
        ));
        assert!(WaterPlane::new(0.0, extent, MIN_SLAB_THICKNESS).is_ok());
    }

    #[test]
    fn default_config_matches_reference_slab() {
        let plane = WaterPlane::from_config(&WaterConfig::default()).unwrap();
        assert_eq!(plane.height(), 0.0);
        assert_eq!(plane.thickness(), 0.001);
        assert_eq!(plane.extent(), Vec2::splat(100.0));
    }

    #[test]
    fn viewer_sees_the_face_on_its_side() {
        let plane = WaterPlane::new(0.0, Vec2::splat(10.0), 0.01).unwrap();
        assert_eq!(plane.visible_face(5.0), SlabFace::Top);
        assert_eq!(plane.visible_face(0.0), SlabFace::Top);
        assert_eq!(plane.visible_face(-1.0), SlabFace::Bottom);

        let (t, face) = plane.intersect(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y).unwrap();
        assert_eq!(face, SlabFace::Top);
        assert!((t - 4.995).abs() < 1e-4);

        let (_, face) = plane.intersect(Vec3::new(0.0, -1.0, 0.0), Vec3::Y).unwrap();
        assert_eq!(face, SlabFace::Bottom);

        assert!(plane.intersect(Vec3::new(0.0, 5.0, 0.0), Vec3::Y).is_none());
        assert!(plane.intersect(Vec3::new(0.0, 5.0, 0.0), Vec3::X).is_none());
        assert!(
            plane
                .intersect(Vec3::new(100.0, 5.0, 0.0), Vec3::NEG_Y)
                .is_none()
        );
    }

    #[test]
    fn each_layer_and_the_sum_stay_bounded() {
        let config = WaterConfig::default();
        let surface = WaterSurface::from_config(config.clone()).unwrap();
        for (world, time) in sweep() {
            let floor_uv = Vec3::new(world.x, world.z, world.y);
            for layer in &config.layers {
                let v = layer.sample(floor_uv, time * config.time_scale);
                assert!((0.0..=0.5).contains(&v), "layer value {v}");
            }
            let w = surface.sample_wave_intensity(world, time);
            assert!((0.0..=1.0).contains(&w), "wave intensity {w}");
        }
    }

    #[test]
    fn field_matches_cpu_reference() {
        let surface = WaterSurface::from_config(WaterConfig::default()).unwrap();
        let program = compile(surface.wave_intensity()).unwrap();
        for (world, time) in sweep().step_by(37) {
            let mut u = UniformSet::new();
            u.set(uniform::TIME, time).unwrap();
            let v = program
                .bind(&u)
                .unwrap()
                .evaluate(&at(world), &NoTextures)
                .as_scalar();
            let expected = surface.sample_wave_intensity(world, time);
            assert!((v - expected).abs() < 1e-5, "{v} vs {expected}");
        }
    }

    #[test]
    fn water_color_scales_base_by_intensity() {
        let surface = WaterSurface::from_config(WaterConfig::default()).unwrap();
        let program = compile(surface.water_color()).unwrap();
        let mut u = UniformSet::new();
        u.set(uniform::TIME, 1.5).unwrap();
        let world = Vec3::new(3.2, 0.0, -7.1);
        let Value::Vector3(color) = program.bind(&u).unwrap().evaluate(&at(world), &NoTextures)
        else {
            panic!("water color must be a vector");
        };
        let expected = surface.base_color() * (surface.sample_wave_intensity(world, 1.5) + 0.5);
        assert!(color.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn config_loads_from_partial_json() {
        let config: WaterConfig = serde_json::from_str(r#"{ "height": 2.0 }"#).unwrap();
        assert_eq!(config.height, 2.0);
        assert_eq!(config.time_scale, 0.8);
        assert_eq!(config.layers[1], NoiseLayer::new(2.0, 0.1, 0.5));
    }
}
