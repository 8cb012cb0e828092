//! Grid-constrained superpixel downscalers.
//!
//! Every scaler shares the same contract: a pure, synchronous pass
//! over the source buffer producing a new target-size buffer, one
//! color per target cell. No internal parallelism, no shared state
//! between invocations; callers that want concurrency run independent
//! invocations on their own buffer copies.

pub mod contrast_aware;
pub mod edge_priority;
pub mod palette_area;
pub mod sharpener;

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

/// Default Manhattan-RGB admission threshold for region growth.
pub const DEFAULT_SUPERPIXEL_THRESHOLD: u32 = 35;

/// Which detail-enhancement pass the sharpening composite applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeblurMethod {
    #[default]
    None,
    Bilateral,
    Wavelet,
}

/// Tunables recognized by the scalers.
///
/// Loadable from TOML (the CLI's `--options` file) and overridable
/// per flag; unknown fields are rejected by serde so typos surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleOptions {
    /// Manhattan RGB distance admitting a neighbor into a grown region.
    pub superpixel_threshold: u32,
    /// Bilateral smoothing strength, 0.0 to 1.0.
    pub bilateral_strength: f32,
    /// Wavelet sharpening strength, 0.0 to 1.5.
    pub wavelet_strength: f32,
    /// Enhancement pass selected by the sharpening composite.
    pub deblur_method: DeblurMethod,
    /// Colors kept per hue/lightness band in the final snap;
    /// 0 disables quantization entirely.
    pub max_colors_per_shade: usize,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            superpixel_threshold: DEFAULT_SUPERPIXEL_THRESHOLD,
            bilateral_strength: 0.5,
            wavelet_strength: 0.5,
            deblur_method: DeblurMethod::None,
            max_colors_per_shade: 0,
        }
    }
}

/// Invalid target dimensions are a precondition violation, surfaced
/// immediately and synchronously.
pub(crate) fn validate_target(target_w: u32, target_h: u32) -> Result<(), ScaleError> {
    if target_w == 0 || target_h == 0 {
        return Err(ScaleError::InvalidTargetSize(target_w, target_h));
    }
    Ok(())
}
