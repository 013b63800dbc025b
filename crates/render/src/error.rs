use tidewater_shade::GraphError;
use tidewater_water::WaterError;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("scene is not ready: {0}")]
    NotReady(String),
    #[error("invalid camera: {0}")]
    InvalidCamera(String),
    #[error(transparent)]
    Water(#[from] WaterError),
    #[error("uniform update failed: {0}")]
    Graph(#[from] GraphError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
