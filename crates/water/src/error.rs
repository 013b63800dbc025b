use tidewater_shade::GraphError;

use crate::surface::MIN_SLAB_THICKNESS;

#[derive(Debug, thiserror::Error)]
pub enum WaterError {
    #[error("water slab thickness {0} is below the minimum of {MIN_SLAB_THICKNESS}")]
    SlabTooThin(f32),
    #[error("water plane extent must be finite and positive, got {width} x {depth}")]
    InvalidExtent { width: f32, depth: f32 },
    #[error("water plane height must be finite, got {0}")]
    InvalidHeight(f32),
    #[error("failed to build water field: {0}")]
    Graph(#[from] GraphError),
}
