//! Caustic ripples on submerged geometry, phase-locked to the surface waves.

use tidewater_shade::{Field, GraphError, uniform};

use crate::surface::WaterSurface;

/// Fade band above the water line, in world units.
const FADE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct Caustics {
    /// Caustic strength in `[0, 1]`: 1 well below the water, 0 above it.
    pub transition: Field,
    pub color: Field,
}

/// Build caustics over `base_color`, reusing the surface's wave intensity.
pub fn project_caustics(
    surface: &WaterSurface,
    base_color: &Field,
) -> Result<Caustics, GraphError> {
    let relative_height = Field::world_position()
        .y()?
        .sub(uniform::water_height())?;
    let submerged = relative_height.add(FADE)?.saturate()?.one_minus()?;
    let facing_up = Field::world_normal().y()?.saturate()?;
    let transition = relative_height
        .greater_equal(0.0)?
        .select(submerged.mul(facing_up)?, &submerged)?;
    let lit = base_color.add(surface.wave_intensity())?;
    let color = base_color.mix(lit, &transition)?;
    Ok(Caustics { transition, color })
}

/// Like [`project_caustics`], degrading to the plain `base_color` if the fields
/// cannot be built.
pub fn project_caustics_or_plain(surface: &WaterSurface, base_color: &Field) -> Field {
    match project_caustics(surface, base_color) {
        Ok(caustics) => caustics.color,
        Err(err) => {
            tracing::warn!(%err, "caustics disabled, using plain surface color");
            base_color.clone()
        }
    }
}

/// CPU reference of [`Caustics::transition`].
pub fn caustics_transition(relative_height: f32, normal_y: f32) -> f32 {
    let t = 1.0 - (relative_height + FADE).clamp(0.0, 1.0);
    if relative_height >= 0.0 {
        t * normal_y.clamp(0.0, 1.0)
    } else {
        t
    }
}
