//! Typed per-pixel expression graphs.
//!
//! Fields are built once at setup with the operators on [`Field`], compiled
//! into a flat [`Program`], and then either evaluated on the CPU against a
//! frame's [`UniformSet`] or emitted as WGSL for the GPU backend.

mod desc;
mod error;
mod field;
mod noise;
mod program;
pub mod uniform;
mod wgsl;

pub use desc::{GraphDesc, NodeDesc, NodeKind};
pub use error::GraphError;
pub use field::{BinaryOp, Builtin, CompareOp, Field, FieldType, Texture, UnaryOp, hex_color};
pub use noise::{WORLEY_WGSL, worley};
pub use program::{
    BoundProgram, BufferSampler, FragmentInput, Instruction, Op, Program, Reg, TextureSampler,
    UniformDecl, compile, linearize_depth, remap_clamp,
};
pub use uniform::{UniformSet, Value};
pub use wgsl::{
    FRAGMENT_ENTRY, SCENE_COLOR_BINDING, SCENE_DEPTH_BINDING, UNIFORM_BINDING, VERTEX_ENTRY,
    emit_wgsl,
};

pub fn crate_info() -> &'static str {
    "tidewater-shade v0.1.0"
}
