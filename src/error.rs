//! Error types for the scaling core

use thiserror::Error;

/// Error type for scaler precondition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    /// Target dimensions must both be nonzero
    #[error("invalid target size {0}x{1}: dimensions must be nonzero")]
    InvalidTargetSize(u32, u32),
    /// Raw byte length does not match width*height*4
    #[error("buffer size mismatch: got {len} bytes for {width}x{height} RGBA")]
    BufferSizeMismatch { len: usize, width: u32, height: u32 },
}
