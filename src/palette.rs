//! Palette extraction and reduction.
//!
//! Palettes are ordered sequences of `PaletteColor`, produced fresh
//! per image or pipeline stage. Reduction is deliberately cheap:
//! greedy first-in-list clustering rather than a global optimum, plus
//! a hue/lightness banding variant for when rare highlights and
//! shadows must survive.

use std::collections::HashMap;

use serde::Serialize;

use crate::buffer::{PixelBuffer, ALPHA_MIN};
use crate::color;

/// One palette entry with its occurrence frequency in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Occurrence count; 0 when the color was synthesized by merging.
    pub count: u32,
}

impl PaletteColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, count: 0 }
    }

    /// Packed opaque word for buffer writes.
    pub fn word(&self) -> u32 {
        color::pack(self.r, self.g, self.b, 255)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    fn dist_sq(&self, other: &PaletteColor) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// Extract the frequency-weighted set of unique colors from a buffer.
///
/// Single pass in scan order (first occurrence fixes a color's
/// position), keyed by packed RGB. Pixels with alpha below
/// [`ALPHA_MIN`] never contribute.
pub fn extract_palette(buffer: &PixelBuffer) -> Vec<PaletteColor> {
    let mut palette: Vec<PaletteColor> = Vec::new();
    let mut seen: HashMap<u32, usize> = HashMap::new();

    for i in 0..buffer.len() {
        let word = buffer.word(i);
        if color::alpha(word) < ALPHA_MIN {
            continue;
        }
        let key = word & 0x00ff_ffff;
        match seen.get(&key) {
            Some(&at) => palette[at].count += 1,
            None => {
                seen.insert(key, palette.len());
                palette.push(PaletteColor {
                    r: color::red(word),
                    g: color::green(word),
                    b: color::blue(word),
                    count: 1,
                });
            }
        }
    }

    palette
}

/// Merge colors closer than `threshold` (Euclidean RGB distance) into
/// their cluster seed's component-wise mean.
///
/// Greedy: the first remaining color seeds each cluster, so the result
/// depends on palette order. That is intentional - it keeps the pass
/// O(n^2) worst case with no search structure.
pub fn optimize_palette(palette: &[PaletteColor], threshold: u32) -> Vec<PaletteColor> {
    let threshold_sq = threshold * threshold;
    let mut optimized = Vec::new();
    let mut remaining: Vec<PaletteColor> = palette.to_vec();

    while !remaining.is_empty() {
        let base = remaining.remove(0);
        let mut group = vec![base];
        let mut next_remaining = Vec::new();

        for c in remaining {
            if base.dist_sq(&c) <= threshold_sq {
                group.push(c);
            } else {
                next_remaining.push(c);
            }
        }

        let n = group.len() as u32;
        let sum_r: u32 = group.iter().map(|c| c.r as u32).sum();
        let sum_g: u32 = group.iter().map(|c| c.g as u32).sum();
        let sum_b: u32 = group.iter().map(|c| c.b as u32).sum();
        let count: u32 = group.iter().map(|c| c.count).sum();
        optimized.push(PaletteColor {
            r: ((sum_r as f64 / n as f64).round()) as u8,
            g: ((sum_g as f64 / n as f64).round()) as u8,
            b: ((sum_b as f64 / n as f64).round()) as u8,
            count,
        });

        remaining = next_remaining;
    }

    optimized
}

/// Iteratively merge with a growing threshold until the palette fits
/// `target_count`.
///
/// Schedule: start at 2, +5 per round, an extra +20 after 5 rounds
/// without progress, hard stop at 500. Whatever still exceeds the
/// target after that is truncated - arbitrary but deterministic.
pub fn reduce_palette_to_count(palette: &[PaletteColor], target_count: usize) -> Vec<PaletteColor> {
    let target_count = target_count.max(1);
    if palette.len() <= target_count {
        return palette.to_vec();
    }

    let mut current = palette.to_vec();
    let mut threshold = 2u32;
    let mut last_len = current.len();
    let mut stagnant_rounds = 0;

    while current.len() > target_count {
        current = optimize_palette(&current, threshold);
        threshold += 5;

        if current.len() == last_len {
            stagnant_rounds += 1;
        } else {
            stagnant_rounds = 0;
        }
        last_len = current.len();

        if stagnant_rounds > 5 {
            threshold += 20;
        }
        if threshold > 500 {
            break;
        }
    }

    current.truncate(target_count);
    current
}

/// Keep the `max_per_band` most frequent colors in each of
/// 12 hue x 4 lightness HSL bands, independently per band.
///
/// Unlike global reduction this preserves visually distinct highlights
/// and shadows even when they are globally rare. Band order and the
/// within-band sort are deterministic.
pub fn optimize_palette_banded(palette: &[PaletteColor], max_per_band: usize) -> Vec<PaletteColor> {
    if max_per_band == 0 {
        return palette.to_vec();
    }

    // BTreeMap keeps band iteration order stable across runs.
    let mut bands: std::collections::BTreeMap<(u8, u8), Vec<PaletteColor>> =
        std::collections::BTreeMap::new();

    for &c in palette {
        let (h, l) = color::hue_lightness(c.r, c.g, c.b);
        let hue_band = (h * 12.0).floor() as u8; // 0-11
        let light_band = (l * 4.0).floor() as u8; // 0-3 (4 for pure white)
        bands.entry((hue_band, light_band)).or_default().push(c);
    }

    let mut optimized = Vec::new();
    for (_, mut group) in bands {
        // Stable sort: ties keep extraction order.
        group.sort_by(|a, b| b.count.cmp(&a.count));
        group.truncate(max_per_band);
        optimized.extend(group);
    }

    optimized
}

/// Index of the closest palette entry by squared RGB distance; first
/// minimum wins, an exact match short-circuits the scan. `None` only
/// for an empty palette.
pub fn find_closest_index(r: u8, g: u8, b: u8, palette: &[PaletteColor]) -> Option<usize> {
    let probe = PaletteColor::new(r, g, b);
    let mut best: Option<(u32, usize)> = None;

    for (i, p) in palette.iter().enumerate() {
        let d = probe.dist_sq(p);
        if d == 0 {
            return Some(i);
        }
        match best {
            Some((bd, _)) if bd <= d => {}
            _ => best = Some((d, i)),
        }
    }

    best.map(|(_, i)| i)
}

/// Closest palette entry by squared RGB distance. See
/// [`find_closest_index`].
pub fn find_closest_color(r: u8, g: u8, b: u8, palette: &[PaletteColor]) -> Option<PaletteColor> {
    find_closest_index(r, g, b, palette).map(|i| palette[i])
}

/// Rewrite every sufficiently opaque pixel to its nearest palette
/// color, keeping its alpha; everything else becomes fully
/// transparent. No-op on an empty palette.
pub fn snap_to_palette(buffer: &mut PixelBuffer, palette: &[PaletteColor]) {
    if palette.is_empty() {
        return;
    }

    for i in 0..buffer.len() {
        let word = buffer.word(i);
        if color::alpha(word) > ALPHA_MIN {
            if let Some(best) =
                find_closest_color(color::red(word), color::green(word), color::blue(word), palette)
            {
                buffer.set_word(i, (word & 0xff00_0000) | (best.word() & 0x00ff_ffff));
            }
        } else {
            buffer.set_word(i, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf_from_words(words: &[u32], w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for (i, &word) in words.iter().enumerate() {
            buf.set_word(i, word);
        }
        buf
    }

    #[test]
    fn test_extract_counts_and_skips_transparent() {
        let red = color::pack(255, 0, 0, 255);
        let blue = color::pack(0, 0, 255, 255);
        let ghost = color::pack(9, 9, 9, ALPHA_MIN - 1);
        let buf = buf_from_words(&[red, blue, red, ghost], 2, 2);

        let palette = extract_palette(&buf);
        assert_eq!(palette.len(), 2);
        assert_eq!((palette[0].r, palette[0].count), (255, 2));
        assert_eq!((palette[1].b, palette[1].count), (255, 1));
    }

    #[test]
    fn test_extract_is_first_seen_ordered() {
        let a = color::pack(1, 2, 3, 255);
        let b = color::pack(4, 5, 6, 255);
        let buf = buf_from_words(&[b, a, b, a], 2, 2);
        let palette = extract_palette(&buf);
        assert_eq!((palette[0].r, palette[1].r), (4, 1));
    }

    #[test]
    fn test_optimize_merges_within_threshold() {
        let palette = vec![
            PaletteColor { r: 10, g: 10, b: 10, count: 3 },
            PaletteColor { r: 12, g: 10, b: 10, count: 1 },
            PaletteColor { r: 200, g: 10, b: 10, count: 2 },
        ];
        let out = optimize_palette(&palette, 5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].r, 11); // mean of 10 and 12
        assert_eq!(out[0].count, 4);
        assert_eq!(out[1].r, 200);
    }

    #[test]
    fn test_optimize_is_seed_order_dependent() {
        // 0 and 20 both within 12 of 10, but 0 and 20 are not within 12
        // of each other: the first-in-list seed decides the grouping.
        let chain = vec![
            PaletteColor::new(10, 0, 0),
            PaletteColor::new(0, 0, 0),
            PaletteColor::new(20, 0, 0),
        ];
        let out = optimize_palette(&chain, 12);
        assert_eq!(out.len(), 1, "seed at 10 captures both ends of the chain");

        let chain_rev = vec![
            PaletteColor::new(0, 0, 0),
            PaletteColor::new(10, 0, 0),
            PaletteColor::new(20, 0, 0),
        ];
        let out = optimize_palette(&chain_rev, 12);
        assert_eq!(out.len(), 2, "seed at 0 cannot reach 20");
    }

    #[test]
    fn test_reduce_converges_for_any_target() {
        let palette: Vec<PaletteColor> = (0..255)
            .map(|i| PaletteColor { r: i, g: 255 - i, b: i / 2, count: 1 })
            .collect();
        for n in [1usize, 2, 8, 64, 300] {
            let out = reduce_palette_to_count(&palette, n);
            assert!(out.len() <= n.max(1), "target {n} produced {}", out.len());
            assert!(!out.is_empty());
        }
    }

    #[test]
    fn test_reduce_noop_when_already_small() {
        let palette = vec![PaletteColor::new(1, 2, 3), PaletteColor::new(9, 9, 9)];
        assert_eq!(reduce_palette_to_count(&palette, 4), palette);
    }

    #[test]
    fn test_banded_preserves_rare_highlight() {
        // A rare near-white highlight shares no band with the common
        // dark reds, so it survives a 1-per-band reduction.
        let palette = vec![
            PaletteColor { r: 120, g: 10, b: 10, count: 500 },
            PaletteColor { r: 122, g: 12, b: 12, count: 400 },
            PaletteColor { r: 250, g: 250, b: 250, count: 2 },
        ];
        let out = optimize_palette_banded(&palette, 1);
        assert!(out.iter().any(|c| c.r == 120), "dominant red kept");
        assert!(!out.iter().any(|c| c.r == 122), "runner-up red dropped");
        assert!(out.iter().any(|c| c.r == 250), "rare highlight kept");
    }

    #[test]
    fn test_banded_zero_disables() {
        let palette = vec![PaletteColor::new(1, 2, 3)];
        assert_eq!(optimize_palette_banded(&palette, 0), palette);
    }

    #[test]
    fn test_find_closest_exact_roundtrip() {
        let buf = buf_from_words(
            &[
                color::pack(17, 34, 51, 255),
                color::pack(200, 100, 50, 255),
                color::pack(0, 0, 0, 255),
                color::pack(255, 255, 255, 255),
            ],
            2,
            2,
        );
        let palette = extract_palette(&buf);
        // A color literally present in the image comes back exactly.
        let hit = find_closest_color(200, 100, 50, &palette).unwrap();
        assert_eq!((hit.r, hit.g, hit.b), (200, 100, 50));
    }

    #[test]
    fn test_find_closest_first_minimum_wins() {
        let palette = vec![PaletteColor::new(10, 0, 0), PaletteColor::new(30, 0, 0)];
        let hit = find_closest_color(20, 0, 0, &palette).unwrap();
        assert_eq!(hit.r, 10);
        assert_eq!(find_closest_color(0, 0, 0, &[]), None);
    }

    #[test]
    fn test_snap_rewrites_opaque_and_clears_transparent() {
        let mut buf = buf_from_words(
            &[color::pack(9, 9, 9, 200), color::pack(80, 80, 80, ALPHA_MIN)],
            2,
            1,
        );
        let palette = vec![PaletteColor::new(0, 0, 0), PaletteColor::new(255, 255, 255)];
        snap_to_palette(&mut buf, &palette);
        assert_eq!(buf.word(0), color::pack(0, 0, 0, 200), "snapped, alpha kept");
        assert_eq!(buf.word(1), 0, "alpha at the floor is cleared");
    }
}
