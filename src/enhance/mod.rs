//! Detail-enhancement post passes for downscaled results.
//!
//! Two reusable filters: edge-preserving bilateral smoothing and a
//! wavelet-style detail sharpen. Both are pure functions over a
//! [`PixelBuffer`](crate::buffer::PixelBuffer) - float math internally,
//! rounded back to 8-bit on output, no shared state.

mod bilateral;
mod wavelet;

pub use bilateral::apply_bilateral;
pub use wavelet::apply_wavelet_sharpen;

/// Alpha floor for the filters: pixels below this are passed through
/// untouched and excluded as neighbors.
pub(crate) const FILTER_ALPHA_MIN: u8 = 10;
