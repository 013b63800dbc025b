use std::path::Path;

use serde::{Deserialize, Serialize};
use tidewater_assets::TaggingPolicy;
use tidewater_common::{CameraState, Viewport};
use tidewater_post::{PassChain, PostConfig};
use tidewater_underwater::{EnvironmentConfig, OverlayConfig};
use tidewater_water::WaterConfig;

use crate::error::FrameError;

/// Every tunable of a scene, loadable from one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub water: WaterConfig,
    pub overlay: OverlayConfig,
    pub post: PostConfig,
    pub passes: PassChain,
    pub environment: EnvironmentConfig,
    pub tagging: TaggingPolicy,
    pub viewport: Viewport,
    pub camera: CameraState,
    /// Apply caustics to submerged geometry.
    pub caustics: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            water: WaterConfig::default(),
            overlay: OverlayConfig::default(),
            post: PostConfig::default(),
            passes: PassChain::underwater(),
            environment: EnvironmentConfig::default(),
            tagging: TaggingPolicy::default(),
            viewport: Viewport::new(640, 360),
            camera: CameraState::default(),
            caustics: true,
        }
    }
}

impl SceneConfig {
    pub fn from_json(json: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FrameError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SceneConfig::from_json(
            r#"{ "water": { "height": 1.5 }, "post": { "blur_taps": 4 }, "caustics": false }"#,
        )
        .unwrap();
        assert_eq!(config.water.height, 1.5);
        assert_eq!(config.water.time_scale, 0.8);
        assert_eq!(config.post.blur_taps, 4);
        assert!(!config.caustics);
        assert_eq!(config.passes, PassChain::underwater());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut config = SceneConfig::default();
        config.environment.fog_far = 30.0;
        config.save(tmp.path()).unwrap();
        assert_eq!(SceneConfig::load(tmp.path()).unwrap(), config);
    }
}
