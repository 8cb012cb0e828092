//! Sharpening composite: grow, deblur, quantize.
//!
//! Runs the edge-priority grower, optionally applies one enhancement
//! pass to the small result, then optionally snaps the output to a
//! band-limited palette extracted from the enhanced image itself. Each
//! stage is skippable through [`ScaleOptions`], so with everything
//! disabled this is exactly the edge-priority scaler.

use crate::buffer::PixelBuffer;
use crate::enhance::{apply_bilateral, apply_wavelet_sharpen};
use crate::error::ScaleError;
use crate::palette::{extract_palette, optimize_palette_banded, snap_to_palette};

use super::{edge_priority, DeblurMethod, ScaleOptions};

/// Normalized boost ceiling for the wavelet pass; small targets halo
/// badly above this.
const WAVELET_CLAMP: f32 = 0.1;

/// Downscale `input` to `target_w` x `target_h` with deblur and
/// quantization per `options`.
pub fn scale(
    input: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    options: &ScaleOptions,
) -> Result<PixelBuffer, ScaleError> {
    let base = edge_priority::scale(input, target_w, target_h, options)?;

    let mut result = match options.deblur_method {
        DeblurMethod::Bilateral if options.bilateral_strength > 0.0 => {
            apply_bilateral(&base, options.bilateral_strength)
        }
        DeblurMethod::Wavelet if options.wavelet_strength > 0.0 => {
            apply_wavelet_sharpen(&base, options.wavelet_strength, WAVELET_CLAMP)
        }
        _ => base,
    };

    if options.max_colors_per_shade > 0 {
        let palette = extract_palette(&result);
        let banded = optimize_palette_banded(&palette, options.max_colors_per_shade);
        snap_to_palette(&mut result, &banded);
    }

    Ok(result)
}
