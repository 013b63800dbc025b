//! Procedural water: wave fields, depth-based refraction and caustics.

mod caustics;
mod depth;
mod error;
mod surface;

pub use caustics::{
    Caustics, caustics_transition, project_caustics, project_caustics_or_plain,
};
pub use depth::{DepthCompositor, WaterShading};
pub use error::WaterError;
pub use surface::{
    MIN_SLAB_THICKNESS, NoiseLayer, SlabFace, WaterConfig, WaterPlane, WaterSurface,
};
