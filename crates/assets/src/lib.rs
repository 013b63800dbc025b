//! Scene assets: description files, loading with progress, water tagging.
//!
//! Meshes are identified by content-addressed hashes. The renderer consumes
//! a resolved [`SceneData`], never raw files.

mod error;
mod loader;
mod scene;
mod tag;

pub use error::AssetError;
pub use loader::{AssetLoader, FileLoader, LoadEvent, MemoryLoader, load_scene};
pub use scene::{AssetId, MaterialDesc, MeshDesc, SceneData, SceneFile, SceneMesh, Shape};
pub use tag::{SurfaceTag, TaggingPolicy, WaterMatch};

pub fn crate_info() -> &'static str {
    "tidewater-assets v0.1.0"
}
