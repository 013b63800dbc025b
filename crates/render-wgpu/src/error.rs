use tidewater_shade::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("pipeline rejected by validation: {0}")]
    Validation(String),
    #[error("readback failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("readback callback dropped")]
    MapCallbackDropped,
    #[error("viewport {width}x{height} has no pixels")]
    EmptyViewport { width: u32, height: u32 },
    #[error("buffer holds {actual} texels, viewport needs {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}
