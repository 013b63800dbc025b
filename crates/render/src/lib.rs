//! Frame loop and renderers.
//!
//! # Invariants
//! - Renderers read a [`SceneContext`]; they never mutate it.
//! - Uniform values change only in the uniform-update phase
//!   ([`FrameLoop::update`]), never during a present.
//! - Nothing is presented until the scene has loaded.

mod buffers;
mod config;
mod context;
mod error;
mod frame;
mod image;
mod raycast;
mod renderer;

pub use buffers::SceneBuffers;
pub use config::SceneConfig;
pub use context::SceneContext;
pub use error::FrameError;
pub use frame::{FrameLoop, LoadState};
pub use image::Image;
pub use raycast::{Hit, intersect};
pub use renderer::{CpuRenderer, DebugTextRenderer, Renderer};

pub fn crate_info() -> &'static str {
    "tidewater-render v0.1.0"
}
