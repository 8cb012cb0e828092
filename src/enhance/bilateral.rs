//! Edge-preserving bilateral smoothing.
//!
//! Neighbors are weighted by a Gaussian over spatial distance times a
//! Gaussian over color distance, so flat regions smooth out while
//! sharp color boundaries stay put. Both sigmas scale with the
//! caller's strength knob.

use crate::buffer::PixelBuffer;
use crate::color;

use super::FILTER_ALPHA_MIN;

/// Smooth `input` with strength in [0, 1]. Zero strength
/// short-circuits to a copy of the input.
///
/// Transparent pixels (alpha below the filter floor) are copied
/// through and never pulled into a neighbor's weighted sum; a pixel
/// with no valid neighbors keeps its own value.
pub fn apply_bilateral(input: &PixelBuffer, strength: f32) -> PixelBuffer {
    if strength <= 0.0 {
        return input.clone();
    }

    let width = input.width() as i32;
    let height = input.height() as i32;
    let mut out = PixelBuffer::new(input.width(), input.height());

    let spatial_sigma = 2.0 * (1.0 + strength * 2.0);
    let range_sigma = 25.0 * (1.0 + strength);
    let window_radius = (spatial_sigma * 2.0).ceil() as i32;
    let window_size = (window_radius * 2 + 1) as usize;

    let spatial_sigma_sq2 = 2.0 * spatial_sigma * spatial_sigma;
    let mut spatial_weights = vec![0f32; window_size * window_size];
    let mut idx = 0;
    for dy in -window_radius..=window_radius {
        for dx in -window_radius..=window_radius {
            let dist = (dx * dx + dy * dy) as f32;
            spatial_weights[idx] = (-dist / spatial_sigma_sq2).exp();
            idx += 1;
        }
    }

    // Squared RGB distance is bounded, so the range Gaussian is a
    // straight table lookup.
    let range_sigma_sq2 = 2.0 * range_sigma * range_sigma;
    let max_color_dist = 255 * 255 * 3;
    let mut range_lookup = vec![0f32; max_color_dist + 1];
    for (i, slot) in range_lookup.iter_mut().enumerate() {
        *slot = (-(i as f32) / range_sigma_sq2).exp();
    }

    for y in 0..height {
        for x in 0..width {
            let center_pos = (y * width + x) as usize;
            let center = input.word(center_pos);

            if color::alpha(center) < FILTER_ALPHA_MIN {
                out.set_word(center_pos, center);
                continue;
            }

            let mut sum_r = 0f32;
            let mut sum_g = 0f32;
            let mut sum_b = 0f32;
            let mut sum_weight = 0f32;

            let mut weight_idx = 0usize;
            for dy in -window_radius..=window_radius {
                let ny = y + dy;
                if ny < 0 || ny >= height {
                    weight_idx += window_size;
                    continue;
                }
                let row_offset = (ny * width) as usize;
                for dx in -window_radius..=window_radius {
                    let nx = x + dx;
                    if nx < 0 || nx >= width {
                        weight_idx += 1;
                        continue;
                    }

                    let neighbor = input.word(row_offset + nx as usize);
                    if color::alpha(neighbor) < FILTER_ALPHA_MIN {
                        weight_idx += 1;
                        continue;
                    }

                    let color_dist = color::dist_sq(neighbor, center) as usize;
                    let weight = spatial_weights[weight_idx] * range_lookup[color_dist];

                    sum_r += color::red(neighbor) as f32 * weight;
                    sum_g += color::green(neighbor) as f32 * weight;
                    sum_b += color::blue(neighbor) as f32 * weight;
                    sum_weight += weight;

                    weight_idx += 1;
                }
            }

            if sum_weight > 0.0 {
                let inv = 1.0 / sum_weight;
                let fr = (sum_r * inv) as u32;
                let fg = (sum_g * inv) as u32;
                let fb = (sum_b * inv) as u32;
                out.set_word(
                    center_pos,
                    color::pack(fr as u8, fg as u8, fb as u8, color::alpha(center)),
                );
            } else {
                out.set_word(center_pos, center);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buf: &mut PixelBuffer, words: &[u32]) {
        for (i, &w) in words.iter().enumerate() {
            buf.set_word(i, w);
        }
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let mut buf = PixelBuffer::new(3, 3);
        fill(
            &mut buf,
            &(0..9).map(|i| color::pack(i * 20, 255 - i * 20, i, 255)).collect::<Vec<_>>(),
        );
        let out = apply_bilateral(&buf, 0.0);
        assert_eq!(out, buf);
    }

    #[test]
    fn test_hard_edge_is_preserved() {
        // Left half black, right half white: the range weight keeps
        // the halves from bleeding into each other.
        let mut buf = PixelBuffer::new(8, 4);
        for y in 0..4 {
            for x in 0..8 {
                let v = if x < 4 { 0 } else { 255 };
                buf.set_word(buf.index(x, y), color::pack(v, v, v, 255));
            }
        }
        let out = apply_bilateral(&buf, 0.8);
        for y in 0..4 {
            for x in 0..8u32 {
                let w = out.word_at(x, y);
                let expected = if x < 4 { 0i32 } else { 255 };
                assert!(
                    (color::red(w) as i32 - expected).abs() <= 1,
                    "pixel ({x},{y}) bled across the edge: {}",
                    color::red(w)
                );
            }
        }
    }

    #[test]
    fn test_transparent_pixels_pass_through() {
        let mut buf = PixelBuffer::new(3, 1);
        fill(
            &mut buf,
            &[
                color::pack(100, 100, 100, 255),
                color::pack(42, 43, 44, FILTER_ALPHA_MIN - 1),
                color::pack(100, 100, 100, 255),
            ],
        );
        let out = apply_bilateral(&buf, 0.5);
        assert_eq!(out.word(1), buf.word(1), "transparent center untouched");
        assert!((color::red(out.word(0)) as i32 - 100).abs() <= 1);
    }

    #[test]
    fn test_smooths_low_contrast_noise() {
        // Mild salt noise on a flat field is pulled toward the field.
        let mut buf = PixelBuffer::new(5, 5);
        for i in 0..25 {
            buf.set_word(i, color::pack(100, 100, 100, 255));
        }
        buf.set_word(12, color::pack(112, 112, 112, 255));
        let out = apply_bilateral(&buf, 1.0);
        let center = color::red(out.word(12));
        assert!(center < 112, "noise pixel should move toward the field, got {center}");
    }
}
