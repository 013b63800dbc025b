use tidewater_shade::GraphError;

use crate::chain::MAX_BLUR_TAPS;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositorError {
    #[error("pass chain is empty")]
    EmptyChain,
    #[error("pass `{0}` is defined more than once")]
    DuplicatePass(String),
    #[error("pass `{pass}` reads `{input}`, which is not an earlier pass")]
    UnknownInput { pass: String, input: String },
    #[error("pass chain has no composite pass")]
    MissingComposite,
    #[error("composite pass `{0}` is not the last pass")]
    CompositeNotTerminal(String),
    #[error("pass chain has more than one composite pass")]
    MultipleComposites,
    #[error("blur pass `{0}` needs a scene depth input")]
    BlurWithoutDepth(String),
    #[error("pass `{0}` needs a scene color input")]
    MissingColorInput(String),
    #[error("blur tap count {0} is outside 1..={MAX_BLUR_TAPS}")]
    InvalidTaps(u32),
    #[error("failed to build composite field: {0}")]
    Graph(#[from] GraphError),
}
