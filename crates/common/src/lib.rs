//! Shared value types passed between the tidewater crates.
//!
//! Nothing here owns frame state; the host builds these and hands them to the
//! core explicitly.

mod types;

pub use types::{CameraState, Viewport};
