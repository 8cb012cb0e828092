//! superpix - pixel-art-preserving image downscaler
//!
//! This library provides functionality to:
//! - Downscale images onto a coarse pixel grid while keeping thin
//!   edges and high-contrast strokes readable
//! - Extract, reduce and band-limit color palettes
//! - Post-process small results with bilateral smoothing or wavelet
//!   sharpening

pub mod buffer;
pub mod cli;
pub mod color;
pub mod enhance;
pub mod error;
pub mod grid;
pub mod output;
pub mod palette;
pub mod scale;
