//! wgpu backend.
//!
//! Compiled field programs run as full-screen passes: `emit_wgsl` supplies the
//! shader, this crate supplies the device, textures and readback.
//!
//! # Invariants
//! - Pipelines are validated inside an error scope; a rejected pipeline falls
//!   back to CPU evaluation and is never retried.
//! - The GPU path reads the same uniform snapshot as the CPU path.

mod device;
mod error;
mod pipeline;
mod renderer;

pub use device::GpuContext;
pub use error::GpuError;
pub use pipeline::{
    FieldPipeline, OUTPUT_FORMAT, color_texels, depad_rows, padded_bytes_per_row, uniform_slots,
};
pub use renderer::GpuRenderer;
