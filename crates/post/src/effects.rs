//! Field builders for the individual full-screen effects.

use glam::{Vec2, Vec3};
use tidewater_shade::{Field, GraphError, uniform};

const CENTER: Vec3 = Vec3::new(0.5, 0.5, 0.0);

/// Scene depth at the screen UV, linearized with the camera planes.
pub fn linear_scene_depth() -> Result<Field, GraphError> {
    Field::screen_uv()
        .sample_scene_depth()?
        .linearize_depth(uniform::camera_near(), uniform::camera_far())
}

/// `1 − saturate(distance(uv, center) · k)`.
pub fn vignette(k: f32) -> Result<Field, GraphError> {
    Field::screen_uv()
        .distance(Field::vector(CENTER))?
        .mul(k)?
        .saturate()?
        .one_minus()
}

/// CPU reference of [`vignette`].
pub fn vignette_at(uv: Vec2, k: f32) -> f32 {
    1.0 - (uv.extend(0.0).distance(CENTER) * k).clamp(0.0, 1.0)
}

/// Average of `taps` scene-color samples spread symmetrically along `direction`,
/// `spread` UV units to either side at the outermost tap.
pub fn directional_blur(taps: u32, direction: Vec2, spread: &Field) -> Result<Field, GraphError> {
    let uv = Field::screen_uv();
    if taps <= 1 {
        return uv.sample_scene_color();
    }
    let step = Field::vector(direction.extend(0.0)).mul(spread)?;
    let mut sum: Option<Field> = None;
    for i in 0..taps {
        let k = 2.0 * i as f32 / (taps - 1) as f32 - 1.0;
        let sample = uv.add(step.mul(k)?)?.sample_scene_color()?;
        sum = Some(match sum {
            Some(acc) => acc.add(sample)?,
            None => sample,
        });
    }
    match sum {
        Some(total) => total.div(taps as f32),
        None => uv.sample_scene_color(),
    }
}

/// Radial mask strongest at the screen center and fading with scene depth.
pub fn water_mask(band: (f32, f32)) -> Result<Field, GraphError> {
    let radial = Field::screen_uv()
        .distance(Field::vector(CENTER))?
        .one_minus()?
        .mul(3.0)?
        .saturate()?;
    let depth_fade = linear_scene_depth()?.remap_clamp(band.0, band.1)?.one_minus()?;
    radial.mul(depth_fade)
}
