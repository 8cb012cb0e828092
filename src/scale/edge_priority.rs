//! Edge-priority region growth.
//!
//! Each target cell grows a region outward from the most locally
//! contrasted opaque pixel in the cell, admitting 4-connected
//! neighbors whose Manhattan RGB distance to the seed stays under the
//! threshold, in best-first order by a score that prefers luminance
//! coherence, high local contrast and proximity to the cell center.
//! Pixels the growth never reached are folded into the average anyway,
//! so every source pixel in the cell contributes exactly once and the
//! output color is the plain mean of the whole cell, while the seed
//! choice decides which edge survives when the cell straddles one.

use crate::buffer::{PixelBuffer, ALPHA_MIN};
use crate::color;
use crate::error::ScaleError;
use crate::grid::{Cell, CellGrid};

use super::{validate_target, ScaleOptions};

/// Priority score given to a seed so it always pops first.
const SEED_SCORE: f32 = 1000.0;

/// Binary max-heap over parallel index/score arrays. Rebuilt per cell
/// via `clear`, so the backing allocations are reused across the whole
/// grid.
struct GrowthHeap {
    idx: Vec<u32>,
    score: Vec<f32>,
}

impl GrowthHeap {
    fn new() -> Self {
        Self { idx: Vec::new(), score: Vec::new() }
    }

    fn clear(&mut self) {
        self.idx.clear();
        self.score.clear();
    }

    fn push(&mut self, idx: u32, score: f32) {
        self.idx.push(idx);
        self.score.push(score);
        let mut i = self.idx.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.score[i] <= self.score[parent] {
                break;
            }
            self.idx.swap(i, parent);
            self.score.swap(i, parent);
            i = parent;
        }
    }

    fn pop(&mut self) -> Option<u32> {
        if self.idx.is_empty() {
            return None;
        }
        let top = self.idx[0];
        let last = self.idx.len() - 1;
        self.idx.swap(0, last);
        self.score.swap(0, last);
        self.idx.pop();
        self.score.pop();

        let len = self.idx.len();
        let mut i = 0;
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut largest = i;
            if self.score[left] > self.score[largest] {
                largest = left;
            }
            if right < len && self.score[right] > self.score[largest] {
                largest = right;
            }
            if largest == i {
                break;
            }
            self.idx.swap(i, largest);
            self.score.swap(i, largest);
            i = largest;
        }
        Some(top)
    }
}

/// Mean absolute Rec.709 luminance difference to the 8-connected
/// in-bounds neighbors, on the 0..255 scale.
fn local_contrast(input: &PixelBuffer, x: u32, y: u32) -> f32 {
    let lum = color::luma709(input.word_at(x, y));
    let mut sum = 0f32;
    let mut count = 0u32;
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= input.width() as i64 || ny >= input.height() as i64 {
                continue;
            }
            let nlum = color::luma709(input.word_at(nx as u32, ny as u32));
            sum += (nlum - lum).abs();
            count += 1;
        }
    }
    sum / count.max(1) as f32
}

/// Pick the opaque pixel with the highest local contrast in the cell.
/// Ties keep the first candidate in scan order (strict `>`). Returns
/// `None` when the cell holds no opaque pixel.
fn pick_seed(input: &PixelBuffer, cell: &Cell) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for y in cell.min_y..=cell.max_y {
        for x in cell.min_x..=cell.max_x {
            let idx = input.index(x, y);
            if input.alpha(idx) < ALPHA_MIN {
                continue;
            }
            let contrast = local_contrast(input, x, y);
            match best {
                Some((_, c)) if contrast <= c => {}
                _ => best = Some((idx, contrast)),
            }
        }
    }
    best.map(|(idx, _)| idx)
}

/// Downscale `input` to `target_w` x `target_h`.
pub fn scale(
    input: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    options: &ScaleOptions,
) -> Result<PixelBuffer, ScaleError> {
    validate_target(target_w, target_h)?;

    let grid = CellGrid::new(input.width(), input.height(), target_w, target_h);
    let mut out = PixelBuffer::new(target_w, target_h);
    let threshold = options.superpixel_threshold;

    // One visited map for the whole image; cells partition the source,
    // so a pixel claimed by its own cell is never revisited.
    let mut visited = vec![false; input.len()];
    let mut heap = GrowthHeap::new();

    for ty in 0..target_h {
        for tx in 0..target_w {
            let cell = *grid.cell(tx, ty);
            // Fallback when the cell is fully transparent: grow from
            // its geometric-center pixel instead.
            let seed_idx = pick_seed(input, &cell).unwrap_or_else(|| {
                let cx = (cell.min_x + cell.max_x) / 2;
                let cy = (cell.min_y + cell.max_y) / 2;
                input.index(cx, cy)
            });

            let seed = input.word(seed_idx);
            let seed_lum = color::luma709(seed) / 255.0;
            let (center_x, center_y) = cell.center();

            let mut sum_r = 0u64;
            let mut sum_g = 0u64;
            let mut sum_b = 0u64;
            let mut sum_a = 0u64;
            let mut count = 0u64;

            heap.clear();
            heap.push(seed_idx as u32, SEED_SCORE);

            while let Some(idx32) = heap.pop() {
                let idx = idx32 as usize;
                if visited[idx] {
                    continue;
                }
                visited[idx] = true;

                let word = input.word(idx);
                sum_r += color::red(word) as u64;
                sum_g += color::green(word) as u64;
                sum_b += color::blue(word) as u64;
                sum_a += color::alpha(word) as u64;
                count += 1;

                let px = idx32 % input.width();
                let py = idx32 / input.width();
                for (dx, dy) in [(0i64, -1i64), (1, 0), (0, 1), (-1, 0)] {
                    let nx = px as i64 + dx;
                    let ny = py as i64 + dy;
                    if nx < (cell.min_x as i64)
                        || nx > (cell.max_x as i64)
                        || ny < (cell.min_y as i64)
                        || ny > (cell.max_y as i64)
                    {
                        continue;
                    }
                    let nx = nx as u32;
                    let ny = ny as u32;
                    let nidx = input.index(nx, ny);
                    if visited[nidx] {
                        continue;
                    }

                    let nword = input.word(nidx);
                    if color::manhattan(seed, nword) > threshold {
                        continue;
                    }

                    let nlum = color::luma709(nword) / 255.0;
                    let lum_coherence = 1.0 / (0.01 + (nlum - seed_lum).abs());
                    let contrast = local_contrast(input, nx, ny) / 255.0;
                    let dx_c = nx as f32 - center_x;
                    let dy_c = ny as f32 - center_y;
                    let dist_to_center = (dx_c * dx_c + dy_c * dy_c).sqrt();

                    let score = lum_coherence
                        * (1.0 + contrast * 5.0)
                        * (1.0 / (0.5 + dist_to_center));
                    heap.push(nidx as u32, score);
                }
            }

            // Pixels the growth rejected or never reached still belong
            // to this cell's color.
            for y in cell.min_y..=cell.max_y {
                for x in cell.min_x..=cell.max_x {
                    let idx = input.index(x, y);
                    if visited[idx] {
                        continue;
                    }
                    visited[idx] = true;
                    let word = input.word(idx);
                    sum_r += color::red(word) as u64;
                    sum_g += color::green(word) as u64;
                    sum_b += color::blue(word) as u64;
                    sum_a += color::alpha(word) as u64;
                    count += 1;
                }
            }

            // Degenerate upscale targets clamp cells to overlap, so a
            // cell can find all of its pixels already visited; average
            // the cell directly in that case.
            if count == 0 {
                for y in cell.min_y..=cell.max_y {
                    for x in cell.min_x..=cell.max_x {
                        let word = input.word_at(x, y);
                        sum_r += color::red(word) as u64;
                        sum_g += color::green(word) as u64;
                        sum_b += color::blue(word) as u64;
                        sum_a += color::alpha(word) as u64;
                        count += 1;
                    }
                }
            }

            let out_idx = out.index(tx, ty);
            out.set_word(
                out_idx,
                color::pack(
                    (sum_r / count) as u8,
                    (sum_g / count) as u8,
                    (sum_b / count) as u8,
                    (sum_a / count) as u8,
                ),
            );
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, word: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for i in 0..(width * height) as usize {
            buf.set_word(i, word);
        }
        buf
    }

    #[test]
    fn test_heap_pops_in_score_order() {
        let mut heap = GrowthHeap::new();
        heap.push(1, 0.5);
        heap.push(2, 3.0);
        heap.push(3, 1.5);
        heap.push(4, 1000.0);
        assert_eq!(heap.pop(), Some(4));
        assert_eq!(heap.pop(), Some(2));
        assert_eq!(heap.pop(), Some(3));
        assert_eq!(heap.pop(), Some(1));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_rejects_zero_target() {
        let buf = solid(4, 4, color::pack(0, 0, 0, 255));
        let err = scale(&buf, 0, 2, &ScaleOptions::default()).unwrap_err();
        assert_eq!(err, ScaleError::InvalidTargetSize(0, 2));
    }

    #[test]
    fn test_single_cell_is_plain_mean() {
        // Reachable or not, every pixel lands in the average exactly
        // once, so a 1x1 target is the image mean.
        let mut buf = PixelBuffer::new(2, 2);
        for (i, v) in [0u8, 10, 20, 30].into_iter().enumerate() {
            buf.set_word(i, color::pack(v, v, v, 255));
        }
        let out = scale(&buf, 1, 1, &ScaleOptions::default()).unwrap();
        assert_eq!(out.word(0), color::pack(15, 15, 15, 255));
    }

    #[test]
    fn test_disconnected_pixels_still_counted() {
        // White / black / white in one cell: the two whites are not
        // 4-connected under the threshold but both must contribute.
        let mut buf = PixelBuffer::new(3, 1);
        buf.set_word(0, color::pack(255, 255, 255, 255));
        buf.set_word(1, color::pack(0, 0, 0, 255));
        buf.set_word(2, color::pack(255, 255, 255, 255));
        let out = scale(&buf, 1, 1, &ScaleOptions::default()).unwrap();
        assert_eq!(color::red(out.word(0)), 170);
    }

    #[test]
    fn test_white_line_keeps_its_column() {
        // 10x10 black field with a white 1px column at x=5, scaled to
        // 10x1: the column's cell seeds on the line, the rest stay
        // black.
        let mut buf = solid(10, 10, color::pack(0, 0, 0, 255));
        for y in 0..10 {
            buf.set_word(buf.index(5, y), color::pack(255, 255, 255, 255));
        }
        let out = scale(&buf, 10, 1, &ScaleOptions::default()).unwrap();
        for x in 0..10u32 {
            let r = color::red(out.word(x as usize));
            if x == 5 {
                assert_eq!(r, 255, "line column must stay white");
            } else {
                assert_eq!(r, 0, "column {x} must stay black");
            }
        }
    }

    #[test]
    fn test_transparent_image_stays_transparent() {
        let buf = PixelBuffer::new(6, 6);
        let out = scale(&buf, 2, 2, &ScaleOptions::default()).unwrap();
        for i in 0..4 {
            assert_eq!(out.word(i), 0);
        }
    }

    #[test]
    fn test_deterministic() {
        let mut buf = PixelBuffer::new(16, 16);
        for i in 0..256usize {
            let v = ((i * 37) % 256) as u8;
            buf.set_word(i, color::pack(v, v.wrapping_mul(3), 255 - v, 255));
        }
        let a = scale(&buf, 5, 5, &ScaleOptions::default()).unwrap();
        let b = scale(&buf, 5, 5, &ScaleOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_upscale_target_does_not_panic() {
        let buf = solid(2, 2, color::pack(40, 80, 120, 255));
        let out = scale(&buf, 5, 5, &ScaleOptions::default()).unwrap();
        assert_eq!(out.width(), 5);
        for i in 0..25 {
            assert_eq!(out.word(i), color::pack(40, 80, 120, 255));
        }
    }
}
