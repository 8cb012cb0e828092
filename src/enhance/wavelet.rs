//! Wavelet-style detail boost for small images.
//!
//! One level of separable [1,2,1]/4 blur gives the low-pass `L1`;
//! `detail = original - L1` is boosted by `gain = 2 * strength`,
//! soft-limited with a rational sigmoid to cap halo amplitude, then
//! added back to the original. The base detail is already inside the
//! original signal, so only the extra boost is clamped and strong
//! edges never get duller than the input. Alpha passes through
//! unmodified.

use crate::buffer::PixelBuffer;

/// Rational sigmoid `x / (1 + |x|/limit)`: approaches `limit`
/// smoothly instead of cutting off hard.
fn soft_limit(x: f32, limit: f32) -> f32 {
    if limit <= 0.0001 {
        return 0.0;
    }
    x / (1.0 + x.abs() / limit)
}

/// Separable [1,2,1]/4 blur over interleaved RGBA floats, edges
/// clamped.
fn fast_blur(src: &[f32], dst: &mut [f32], w: usize, h: usize) {
    let mut temp = vec![0f32; src.len()];

    // H-pass src -> temp
    for y in 0..h {
        let y_off = y * w;
        for x in 0..w {
            let idx = (y_off + x) * 4;
            let xm1 = if x > 0 { x - 1 } else { 0 };
            let xp1 = if x < w - 1 { x + 1 } else { w - 1 };
            let idx_l = (y_off + xm1) * 4;
            let idx_r = (y_off + xp1) * 4;
            for c in 0..4 {
                temp[idx + c] = (src[idx_l + c] + 2.0 * src[idx + c] + src[idx_r + c]) * 0.25;
            }
        }
    }

    // V-pass temp -> dst
    for y in 0..h {
        let y_off = y * w;
        let ym1 = if y > 0 { y - 1 } else { 0 };
        let yp1 = if y < h - 1 { y + 1 } else { h - 1 };
        let y_off_t = ym1 * w;
        let y_off_b = yp1 * w;
        for x in 0..w {
            let idx = (y_off + x) * 4;
            let idx_t = (y_off_t + x) * 4;
            let idx_b = (y_off_b + x) * 4;
            for c in 0..4 {
                dst[idx + c] = (temp[idx_t + c] + 2.0 * temp[idx + c] + temp[idx_b + c]) * 0.25;
            }
        }
    }
}

/// Sharpen `input` with strength in [0, 1.5] and a normalized boost
/// ceiling `clamp_max`. Zero strength reproduces the input exactly.
pub fn apply_wavelet_sharpen(input: &PixelBuffer, strength: f32, clamp_max: f32) -> PixelBuffer {
    let w = input.width() as usize;
    let h = input.height() as usize;
    let len = w * h * 4;

    let inv255 = 1.0 / 255.0;
    let mut src = vec![0f32; len];
    for (i, slot) in src.iter_mut().enumerate() {
        *slot = input.data()[i] as f32 * inv255;
    }

    let mut l1 = vec![0f32; len];
    fast_blur(&src, &mut l1, w, h);

    let mut out = PixelBuffer::new(input.width(), input.height());
    let gain = strength * 2.0;

    for i in (0..len).step_by(4) {
        for c in 0..3 {
            let idx = i + c;
            let d1 = src[idx] - l1[idx];
            let boost = soft_limit(d1 * gain, clamp_max);
            let res = (src[idx] + boost).clamp(0.0, 1.0);
            out.data_mut()[idx] = (res * 255.0 + 0.5) as u8;
        }
        // Alpha copy
        out.data_mut()[i + 3] = input.data()[i + 3];
    }

    out
}
