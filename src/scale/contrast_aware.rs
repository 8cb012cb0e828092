//! Contrast-aware downscaling.
//!
//! Four sequential phases over the cell grid:
//!
//! 1. per-cell statistics: plain average, the most contrasted color
//!    pair among a reduced candidate set, and which of the pair is the
//!    high-contrast "ink" color;
//! 2. connectivity: classify every ink pixel by position in its cell
//!    and count its ink neighbors inside and across cell borders;
//! 3. fill rules: resolve each cell to ink, background average, or
//!    leave it underfilled for the next phase;
//! 4. cross-cell pairing: adjacent underfilled cells with similar ink
//!    merge so thin diagonal strokes keep one-cell width; loners fall
//!    back to their background average.
//!
//! All f32 comparisons in the tie chains are strict, so resolution
//! order is fixed by cell index and the pass is fully deterministic.

use crate::buffer::{PixelBuffer, ALPHA_MIN};
use crate::color;
use crate::error::ScaleError;
use crate::grid::{Cell, CellGrid};

use super::{validate_target, ScaleOptions};

/// Two ink colors are "the same stroke" when their squared RGB
/// distance is under 30^2.
const SIMILARITY_SQ: u32 = 900;

/// Resolution state of one cell as the phases advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellState {
    Unresolved,
    /// Resolved to the ink color.
    FilledHc,
    /// Resolved to the whole-cell average (no ink present).
    FilledAvg,
    /// Resolved to the background average after losing its ink claim.
    FilledAvgNoHc,
    /// Has ink but not enough evidence; phase 4 decides.
    Underfilled,
}

/// Placement and connectivity of one ink pixel inside its cell.
#[derive(Debug, Clone, Copy)]
struct InkPixel {
    /// On the cell's border ring.
    is_edge: bool,
    /// Exact center of an odd-by-odd cell.
    is_center: bool,
    /// 4-connected ink neighbors inside the same cell.
    n_intra: u8,
    /// 4-connected ink neighbors in adjacent cells, judged against the
    /// neighbor cell's own ink color.
    n_inter: u8,
}

/// Per-cell working record, arena-indexed alongside the grid.
#[derive(Debug, Clone)]
struct Superpixel {
    avg_all: u32,
    hc_color: u32,
    hc_count: u32,
    avg_without_hc: u32,
    max_contrast: u32,
    state: CellState,
    fill_color: u32,
    ink_pixels: Vec<InkPixel>,
}

/// Phase identifiers handed to the debug capture callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePhase {
    Stats,
    Connectivity,
    FillRules,
    CrossCell,
}

impl ResolvePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ResolvePhase::Stats => "stats",
            ResolvePhase::Connectivity => "connectivity",
            ResolvePhase::FillRules => "fill-rules",
            ResolvePhase::CrossCell => "cross-cell",
        }
    }
}

/// Callback receiving a source-resolution snapshot after each phase.
pub type PhaseCapture<'a> = &'a mut dyn FnMut(ResolvePhase, &PixelBuffer);

/// Downscale `input` to `target_w` x `target_h`.
pub fn scale(
    input: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    options: &ScaleOptions,
) -> Result<PixelBuffer, ScaleError> {
    scale_with_capture(input, target_w, target_h, options, None)
}

/// Like [`scale`], invoking `capture` with a source-sized snapshot
/// after each phase: resolved cells painted flat with their fill
/// color, unresolved cells showing the original pixels.
pub fn scale_with_capture(
    input: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    _options: &ScaleOptions,
    mut capture: Option<PhaseCapture<'_>>,
) -> Result<PixelBuffer, ScaleError> {
    validate_target(target_w, target_h)?;

    let grid = CellGrid::new(input.width(), input.height(), target_w, target_h);

    // Phase 1: per-cell statistics.
    let mut cells: Vec<Superpixel> = Vec::with_capacity(grid.len());
    for ty in 0..target_h {
        for tx in 0..target_w {
            cells.push(cell_stats(input, grid.cell(tx, ty)));
        }
    }
    if let Some(cb) = capture.as_mut() {
        cb(ResolvePhase::Stats, &snapshot(input, &grid, &cells));
    }

    // Phase 2: ink-pixel connectivity.
    for ty in 0..target_h {
        for tx in 0..target_w {
            let idx = grid.index(tx, ty);
            let hc = cells[idx].hc_color;
            let pixels = collect_ink_pixels(input, &grid, grid.cell(tx, ty), hc, &cells);
            cells[idx].ink_pixels = pixels;
        }
    }
    if let Some(cb) = capture.as_mut() {
        cb(ResolvePhase::Connectivity, &snapshot(input, &grid, &cells));
    }

    // Phase 3: local fill rules.
    for ty in 0..target_h {
        for tx in 0..target_w {
            let idx = grid.index(tx, ty);
            apply_fill_rules(&mut cells[idx], grid.cell(tx, ty));
        }
    }
    if let Some(cb) = capture.as_mut() {
        cb(ResolvePhase::FillRules, &snapshot(input, &grid, &cells));
    }

    // Phase 4: cross-cell pairing of the leftovers.
    resolve_underfilled(&grid, &mut cells);
    if let Some(cb) = capture.as_mut() {
        cb(ResolvePhase::CrossCell, &snapshot(input, &grid, &cells));
    }

    let mut out = PixelBuffer::new(target_w, target_h);
    for (i, sp) in cells.iter().enumerate() {
        out.set_word(i, sp.fill_color);
    }
    Ok(out)
}

/// Whole-cell statistics over the opaque pixels only.
fn cell_stats(input: &PixelBuffer, cell: &Cell) -> Superpixel {
    let mut pixels: Vec<u32> = Vec::with_capacity(cell.pixel_count());
    let mut sum_r = 0u64;
    let mut sum_g = 0u64;
    let mut sum_b = 0u64;
    let mut sum_a = 0u64;
    for y in cell.min_y..=cell.max_y {
        for x in cell.min_x..=cell.max_x {
            let word = input.word_at(x, y);
            if color::alpha(word) < ALPHA_MIN {
                continue;
            }
            sum_r += color::red(word) as u64;
            sum_g += color::green(word) as u64;
            sum_b += color::blue(word) as u64;
            sum_a += color::alpha(word) as u64;
            pixels.push(word);
        }
    }

    // Fully transparent cell: everything stays zero and the fill rules
    // resolve it to transparent via the no-ink path.
    if pixels.is_empty() {
        return Superpixel {
            avg_all: 0,
            hc_color: 0,
            hc_count: 0,
            avg_without_hc: 0,
            max_contrast: 0,
            state: CellState::Unresolved,
            fill_color: 0,
            ink_pixels: Vec::new(),
        };
    }

    let n = pixels.len() as u64;
    let avg_all = color::pack(
        (sum_r / n) as u8,
        (sum_g / n) as u8,
        (sum_b / n) as u8,
        (sum_a / n) as u8,
    );

    let (p1, p2, max_contrast) = extreme_pair(&pixels);
    let hc_color = pick_ink(p1, p2, &pixels);

    let mut hc_count = 0u32;
    let mut bg_r = 0u64;
    let mut bg_g = 0u64;
    let mut bg_b = 0u64;
    let mut bg_a = 0u64;
    let mut bg_n = 0u64;
    for &p in &pixels {
        if color::dist_sq(p, hc_color) < SIMILARITY_SQ {
            hc_count += 1;
        } else {
            bg_r += color::red(p) as u64;
            bg_g += color::green(p) as u64;
            bg_b += color::blue(p) as u64;
            bg_a += color::alpha(p) as u64;
            bg_n += 1;
        }
    }
    let avg_without_hc = if bg_n > 0 {
        color::pack(
            (bg_r / bg_n) as u8,
            (bg_g / bg_n) as u8,
            (bg_b / bg_n) as u8,
            (bg_a / bg_n) as u8,
        )
    } else {
        avg_all
    };

    Superpixel {
        avg_all,
        hc_color,
        hc_count,
        avg_without_hc,
        max_contrast,
        state: CellState::Unresolved,
        fill_color: hc_color,
        ink_pixels: Vec::new(),
    }
}

/// Most contrasted color pair in the cell.
///
/// Exhaustive pairing over the whole cell would be quadratic; the
/// extreme pair always involves a pixel that is extremal in some
/// channel or in luma, so only those candidates (at most eight) are
/// paired.
fn extreme_pair(pixels: &[u32]) -> (u32, u32, u32) {
    if pixels.len() == 1 {
        return (pixels[0], pixels[0], 0);
    }

    let mut cand = [0usize; 8];
    {
        let mut min_l = f32::MAX;
        let mut max_l = f32::MIN;
        for (i, &p) in pixels.iter().enumerate() {
            let r = color::red(p);
            let g = color::green(p);
            let b = color::blue(p);
            if r < color::red(pixels[cand[0]]) {
                cand[0] = i;
            }
            if r > color::red(pixels[cand[1]]) {
                cand[1] = i;
            }
            if g < color::green(pixels[cand[2]]) {
                cand[2] = i;
            }
            if g > color::green(pixels[cand[3]]) {
                cand[3] = i;
            }
            if b < color::blue(pixels[cand[4]]) {
                cand[4] = i;
            }
            if b > color::blue(pixels[cand[5]]) {
                cand[5] = i;
            }
            let l = color::luma601(p);
            if l < min_l {
                min_l = l;
                cand[6] = i;
            }
            if l > max_l {
                max_l = l;
                cand[7] = i;
            }
        }
    }

    let mut best = (pixels[0], pixels[0], 0u32);
    for (i, &a) in cand.iter().enumerate() {
        for &b in cand.iter().skip(i + 1) {
            let d = color::dist_sq(pixels[a], pixels[b]);
            if d > best.2 {
                best = (pixels[a], pixels[b], d);
            }
        }
    }
    best
}

/// Which of the extreme pair is the ink: the darker by Rec.601 luma,
/// falling back to the rarer-vs-commoner count when the lumas are
/// within one level of each other.
fn pick_ink(p1: u32, p2: u32, pixels: &[u32]) -> u32 {
    let l1 = color::luma601(p1);
    let l2 = color::luma601(p2);
    if (l1 - l2).abs() > 1.0 {
        return if l1 < l2 { p1 } else { p2 };
    }
    let c1 = pixels.iter().filter(|&&p| p == p1).count();
    let c2 = pixels.iter().filter(|&&p| p == p2).count();
    if c1 >= c2 {
        p1
    } else {
        p2
    }
}

/// True when the source pixel (x, y) is an ink pixel of whichever cell
/// owns it, judged against that cell's own ink color.
fn is_ink_at(
    input: &PixelBuffer,
    grid: &CellGrid,
    cells: &[Superpixel],
    x: i64,
    y: i64,
) -> Option<(u32, u32)> {
    if x < 0 || y < 0 {
        return None;
    }
    let (tx, ty) = grid.cell_of_pixel(x as u32, y as u32)?;
    let word = input.word_at(x as u32, y as u32);
    if color::alpha(word) < ALPHA_MIN {
        return None;
    }
    let hc = cells[grid.index(tx, ty)].hc_color;
    if color::dist_sq(word, hc) < SIMILARITY_SQ {
        Some((tx, ty))
    } else {
        None
    }
}

/// Classify the ink pixels of one cell.
///
/// The neighbor test is one-sided on purpose: a border pixel counts a
/// neighbor as inter-cell ink when the neighbor matches its OWN cell's
/// ink color, regardless of whether that cell would count this pixel
/// back. Thin strokes crossing a boundary get evidence on the side
/// that needs it without requiring agreement from both cells.
fn collect_ink_pixels(
    input: &PixelBuffer,
    grid: &CellGrid,
    cell: &Cell,
    hc_color: u32,
    cells: &[Superpixel],
) -> Vec<InkPixel> {
    let w = cell.width();
    let h = cell.height();
    let odd = w % 2 == 1 && h % 2 == 1;
    let own = grid.cell_of_pixel(cell.min_x, cell.min_y);

    let mut out = Vec::new();
    for y in cell.min_y..=cell.max_y {
        for x in cell.min_x..=cell.max_x {
            let word = input.word_at(x, y);
            if color::alpha(word) < ALPHA_MIN
                || color::dist_sq(word, hc_color) >= SIMILARITY_SQ
            {
                continue;
            }

            let sx = x - cell.min_x;
            let sy = y - cell.min_y;
            let is_edge = sx == 0 || sx == w - 1 || sy == 0 || sy == h - 1;
            let is_center = odd && sx == w / 2 && sy == h / 2;

            let mut n_intra = 0u8;
            let mut n_inter = 0u8;
            for (dx, dy) in [(0i64, -1i64), (1, 0), (0, 1), (-1, 0)] {
                if let Some(owner) =
                    is_ink_at(input, grid, cells, x as i64 + dx, y as i64 + dy)
                {
                    if Some(owner) == own {
                        n_intra += 1;
                    } else {
                        n_inter += 1;
                    }
                }
            }

            out.push(InkPixel { is_edge, is_center, n_intra, n_inter });
        }
    }
    out
}

/// Local fill rules, applied independently per cell.
///
/// A: ink covering a full edge-length resolves to ink outright.
/// B: no ink at all resolves to the plain average.
/// C: otherwise the cell is promoted to ink when some ink pixel has
///    enough connected support for its position (border pixels need a
///    cross-cell link, the center of an odd cell needs two intra
///    links, interior pixels need any two links); with no such pixel
///    the cell stays underfilled for phase 4.
fn apply_fill_rules(sp: &mut Superpixel, cell: &Cell) {
    let e = cell.edge();

    if sp.hc_count >= e {
        sp.state = CellState::FilledHc;
        sp.fill_color = sp.hc_color;
        return;
    }

    if sp.hc_count == 0 {
        sp.state = CellState::FilledAvg;
        sp.fill_color = sp.avg_all;
        return;
    }

    let promoted = sp.ink_pixels.iter().any(|p| {
        let total = p.n_intra + p.n_inter;
        if p.is_edge {
            total >= 2 && p.n_inter >= 1
        } else if p.is_center {
            p.n_intra >= 2
        } else {
            total >= 2
        }
    });

    if promoted {
        sp.state = CellState::FilledHc;
        sp.fill_color = sp.hc_color;
    } else {
        sp.state = CellState::Underfilled;
    }
}

/// Pair adjacent underfilled cells with similar ink; exactly one of
/// each pair keeps the ink, the partner and every loner falls back to
/// its background average.
fn resolve_underfilled(grid: &CellGrid, cells: &mut [Superpixel]) {
    let mut claimed = vec![false; cells.len()];

    for ty in 0..grid.target_h() {
        for tx in 0..grid.target_w() {
            let idx = grid.index(tx, ty);
            if cells[idx].state != CellState::Underfilled || claimed[idx] {
                continue;
            }

            let partner = [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)]
                .into_iter()
                .filter_map(|(dx, dy)| grid.neighbor_index(tx, ty, dx, dy))
                .find(|&n| {
                    cells[n].state == CellState::Underfilled
                        && !claimed[n]
                        && color::dist_sq(cells[idx].hc_color, cells[n].hc_color)
                            < SIMILARITY_SQ
                });

            match partner {
                Some(n) => {
                    claimed[idx] = true;
                    claimed[n] = true;
                    let (winner, loser) =
                        if ink_beats(&cells[idx], &cells[n]) { (idx, n) } else { (n, idx) };
                    cells[winner].state = CellState::FilledHc;
                    cells[winner].fill_color = cells[winner].hc_color;
                    cells[loser].state = CellState::FilledAvgNoHc;
                    cells[loser].fill_color = cells[loser].avg_without_hc;
                }
                None => {
                    claimed[idx] = true;
                    cells[idx].state = CellState::FilledAvgNoHc;
                    cells[idx].fill_color = cells[idx].avg_without_hc;
                }
            }
        }
    }
}

/// Ordering for a paired resolution: more ink pixels, then higher
/// contrast, then darker ink, then scan order (`a` is the earlier
/// cell, so ties fall to it).
fn ink_beats(a: &Superpixel, b: &Superpixel) -> bool {
    if a.hc_count != b.hc_count {
        return a.hc_count > b.hc_count;
    }
    if a.max_contrast != b.max_contrast {
        return a.max_contrast > b.max_contrast;
    }
    let la = color::luma601(a.hc_color);
    let lb = color::luma601(b.hc_color);
    if la != lb {
        return la < lb;
    }
    true
}

/// Source-resolution snapshot of the current resolution state.
fn snapshot(input: &PixelBuffer, grid: &CellGrid, cells: &[Superpixel]) -> PixelBuffer {
    let mut out = input.clone();
    for ty in 0..grid.target_h() {
        for tx in 0..grid.target_w() {
            let sp = &cells[grid.index(tx, ty)];
            let resolved = matches!(
                sp.state,
                CellState::FilledHc | CellState::FilledAvg | CellState::FilledAvgNoHc
            );
            if !resolved {
                continue;
            }
            let cell = grid.cell(tx, ty);
            for y in cell.min_y..=cell.max_y {
                for x in cell.min_x..=cell.max_x {
                    let idx = out.index(x, y);
                    out.set_word(idx, sp.fill_color);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: u32 = 0xffff_ffff;
    const BLACK: u32 = 0xff00_0000;

    fn solid(width: u32, height: u32, word: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for i in 0..(width * height) as usize {
            buf.set_word(i, word);
        }
        buf
    }

    fn opts() -> ScaleOptions {
        ScaleOptions::default()
    }

    #[test]
    fn test_uniform_cell_resolves_to_average() {
        let buf = solid(9, 9, color::pack(120, 130, 140, 255));
        let out = scale(&buf, 3, 3, &opts()).unwrap();
        for i in 0..9 {
            assert_eq!(out.word(i), color::pack(120, 130, 140, 255));
        }
    }

    #[test]
    fn test_transparent_cell_resolves_transparent() {
        let buf = PixelBuffer::new(6, 6);
        let out = scale(&buf, 2, 2, &opts()).unwrap();
        for i in 0..4 {
            assert_eq!(out.word(i), 0);
        }
    }

    #[test]
    fn test_full_edge_ink_fills_unconditionally() {
        // 3 black pixels in a 3x3 cell meet the edge-length rule even
        // though the cell is two-thirds white.
        let mut buf = solid(9, 9, WHITE);
        for y in 3..6 {
            buf.set_word(buf.index(4, y), BLACK);
        }
        let out = scale(&buf, 3, 3, &opts()).unwrap();
        assert_eq!(out.word_at(1, 1), BLACK, "center cell must fill with ink");
        assert_eq!(out.word_at(0, 1), WHITE);
        assert_eq!(out.word_at(2, 1), WHITE);
    }

    #[test]
    fn test_thin_line_survives_where_averaging_would_gray_it() {
        // Full-height 1px black line through 9x9 white, scaled 3x3:
        // each middle-column cell carries 3 ink pixels (= edge length),
        // so the line stays pure black instead of averaging to gray.
        let mut buf = solid(9, 9, WHITE);
        for y in 0..9 {
            buf.set_word(buf.index(4, y), BLACK);
        }
        let out = scale(&buf, 3, 3, &opts()).unwrap();
        for ty in 0..3 {
            assert_eq!(out.word_at(1, ty), BLACK, "row {ty}");
            assert_eq!(out.word_at(0, ty), WHITE);
            assert_eq!(out.word_at(2, ty), WHITE);
        }
    }

    #[test]
    fn test_isolated_speck_is_dropped() {
        // One black pixel dead-center in the middle cell: no neighbor
        // support, no pair partner, so the cell falls back to its
        // background average and the speck disappears.
        let mut buf = solid(9, 9, WHITE);
        buf.set_word(buf.index(4, 4), BLACK);
        let out = scale(&buf, 3, 3, &opts()).unwrap();
        for i in 0..9 {
            assert_eq!(out.word(i), WHITE, "cell {i}");
        }
    }

    #[test]
    fn test_cross_cell_pair_keeps_one_ink_cell() {
        // Two adjacent black border pixels straddling a cell boundary
        // in a 6x3 white image, scaled 2x1. Neither cell can resolve
        // alone; the pair resolves to exactly one ink cell.
        let mut buf = solid(6, 3, WHITE);
        buf.set_word(buf.index(2, 1), BLACK);
        buf.set_word(buf.index(3, 1), BLACK);
        let out = scale(&buf, 2, 1, &opts()).unwrap();
        assert_eq!(out.word(0), BLACK, "scan-order winner keeps the ink");
        assert_eq!(out.word(1), WHITE, "partner falls back to background");
    }

    #[test]
    fn test_neighbor_evidence_is_one_sided() {
        // Cell 0 holds a vertical 2px stroke on its east border; cell 1
        // holds the stroke's single continuation pixel. Cell 0 promotes
        // on the strength of cell 1's pixel, cell 1 itself ends up
        // background.
        let mut buf = solid(6, 3, WHITE);
        buf.set_word(buf.index(2, 0), BLACK);
        buf.set_word(buf.index(2, 1), BLACK);
        buf.set_word(buf.index(3, 1), BLACK);
        let out = scale(&buf, 2, 1, &opts()).unwrap();
        assert_eq!(out.word(0), BLACK);
        assert_eq!(out.word(1), WHITE);
    }

    #[test]
    fn test_translucent_pixels_excluded_from_stats() {
        // A cell of faint ghost pixels around one opaque color must
        // resolve to that color, not a blend.
        let mut buf = PixelBuffer::new(3, 3);
        for i in 0..9 {
            buf.set_word(i, color::pack(10, 10, 10, ALPHA_MIN - 1));
        }
        buf.set_word(4, color::pack(200, 50, 50, 255));
        let out = scale(&buf, 1, 1, &opts()).unwrap();
        assert_eq!(out.word(0), color::pack(200, 50, 50, 255));
    }

    #[test]
    fn test_extreme_pair_candidates() {
        let pixels = vec![
            color::pack(10, 10, 10, 255),
            color::pack(250, 250, 250, 255),
            color::pack(128, 128, 128, 255),
        ];
        let (p1, p2, d) = extreme_pair(&pixels);
        let hi = color::pack(250, 250, 250, 255);
        let lo = color::pack(10, 10, 10, 255);
        assert!((p1 == lo && p2 == hi) || (p1 == hi && p2 == lo));
        assert_eq!(d, 3 * 240 * 240);
    }

    #[test]
    fn test_pick_ink_prefers_darker() {
        let pixels = vec![WHITE, WHITE, BLACK];
        assert_eq!(pick_ink(WHITE, BLACK, &pixels), BLACK);
        assert_eq!(pick_ink(BLACK, WHITE, &pixels), BLACK);
    }

    #[test]
    fn test_pick_ink_near_equal_luma_takes_commoner() {
        // Same luma, different hue: the count tie-break picks the
        // first argument when it is at least as frequent.
        let a = color::pack(100, 100, 100, 255);
        let b = color::pack(101, 100, 99, 255);
        let pixels = vec![a, a, b];
        assert_eq!(pick_ink(a, b, &pixels), a);
        assert_eq!(pick_ink(b, a, &pixels), a);
    }

    #[test]
    fn test_capture_runs_once_per_phase() {
        let buf = solid(6, 6, WHITE);
        let mut seen = Vec::new();
        let mut cb = |phase: ResolvePhase, snap: &PixelBuffer| {
            assert_eq!(snap.width(), 6);
            assert_eq!(snap.height(), 6);
            seen.push(phase);
        };
        scale_with_capture(&buf, 2, 2, &opts(), Some(&mut cb)).unwrap();
        assert_eq!(
            seen,
            vec![
                ResolvePhase::Stats,
                ResolvePhase::Connectivity,
                ResolvePhase::FillRules,
                ResolvePhase::CrossCell,
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let mut buf = PixelBuffer::new(12, 12);
        for i in 0..144usize {
            let v = ((i * 53) % 256) as u8;
            buf.set_word(i, color::pack(v, 255 - v, v / 2, 255));
        }
        let a = scale(&buf, 4, 4, &opts()).unwrap();
        let b = scale(&buf, 4, 4, &opts()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_zero_target() {
        let buf = solid(4, 4, WHITE);
        assert_eq!(
            scale(&buf, 4, 0, &opts()).unwrap_err(),
            ScaleError::InvalidTargetSize(4, 0)
        );
    }
}
