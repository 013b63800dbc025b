//! Screen-space post-processing selected by the underwater state.

mod chain;
mod compositor;
pub mod effects;
mod error;

pub use chain::{MAX_BLUR_TAPS, PassChain, PassKind, RenderPass};
pub use compositor::{CompositorState, PostCompositor, PostConfig};
pub use error::CompositorError;
