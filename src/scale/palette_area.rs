//! Area-majority downscaling against a fixed palette.
//!
//! Every source pixel is first indexed to its nearest palette entry
//! (or to transparent when mostly see-through), then each target pixel
//! takes the palette index covering the largest fraction of its
//! source footprint. Cell boundaries are real-valued here: a source
//! pixel straddling two target cells contributes its overlap fraction
//! to each, so the majority vote is exact rather than snapped to the
//! integer grid.

use crate::buffer::PixelBuffer;
use crate::color;
use crate::error::ScaleError;
use crate::palette::{find_closest_index, PaletteColor};

use super::validate_target;

/// Alpha threshold for the indexing pass. Mostly-transparent source
/// pixels vote for transparency rather than for a palette color.
const INDEX_ALPHA_MIN: u8 = 128;

/// Downscale `input` to `target_w` x `target_h`, emitting only colors
/// from `palette` (opaque) or fully transparent pixels. An empty
/// palette yields a fully transparent result.
pub fn scale(
    input: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    palette: &[PaletteColor],
) -> Result<PixelBuffer, ScaleError> {
    validate_target(target_w, target_h)?;

    let src_w = input.width() as usize;
    let src_h = input.height() as usize;

    // Index map: palette position per source pixel, or None for
    // transparent.
    let mut indexed: Vec<Option<u16>> = Vec::with_capacity(src_w * src_h);
    for i in 0..input.len() {
        let word = input.word(i);
        if color::alpha(word) < INDEX_ALPHA_MIN {
            indexed.push(None);
            continue;
        }
        let idx = find_closest_index(
            color::red(word),
            color::green(word),
            color::blue(word),
            palette,
        );
        indexed.push(idx.map(|i| i as u16));
    }

    let palette_words: Vec<u32> = palette.iter().map(|c| c.word()).collect();
    let mut out = PixelBuffer::new(target_w, target_h);
    let mut weights = vec![0f64; palette.len()];

    let x_step = src_w as f64 / target_w as f64;
    let y_step = src_h as f64 / target_h as f64;

    for ty in 0..target_h {
        let y0 = ty as f64 * y_step;
        let y1 = y0 + y_step;
        for tx in 0..target_w {
            let x0 = tx as f64 * x_step;
            let x1 = x0 + x_step;

            weights.iter_mut().for_each(|w| *w = 0.0);
            let mut transparent_weight = 0f64;

            let mut sy = y0.floor() as usize;
            while (sy as f64) < y1 && sy < src_h {
                let wy = overlap(sy as f64, y0, y1);
                let mut sx = x0.floor() as usize;
                while (sx as f64) < x1 && sx < src_w {
                    let w = wy * overlap(sx as f64, x0, x1);
                    match indexed[sy * src_w + sx] {
                        Some(p) => weights[p as usize] += w,
                        None => transparent_weight += w,
                    }
                    sx += 1;
                }
                sy += 1;
            }

            // First maximum wins: palette order breaks exact ties.
            let mut best_idx = None;
            let mut best_weight = 0f64;
            for (i, &w) in weights.iter().enumerate() {
                if w > best_weight {
                    best_weight = w;
                    best_idx = Some(i);
                }
            }

            let out_idx = out.index(tx, ty);
            let word = match best_idx {
                Some(i) if transparent_weight <= best_weight => palette_words[i],
                _ => 0,
            };
            out.set_word(out_idx, word);
        }
    }

    Ok(out)
}

/// Length of the overlap between the unit span [edge, edge+1] and
/// [lo, hi].
#[inline]
fn overlap(edge: f64, lo: f64, hi: f64) -> f64 {
    (hi.min(edge + 1.0) - lo.max(edge)).max(0.0)
}
