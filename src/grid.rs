//! Source-to-target cell partitioning.
//!
//! Every target pixel (tx, ty) owns a rectangular span of source
//! pixels derived by integer flooring:
//! `min = floor(t * src / target)`, `max = floor((t+1) * src / target) - 1`.
//! For any target no larger than the source, the cells partition the
//! source image exactly and differ in size by at most one pixel per
//! axis. Both growers consume the same grid so their outputs stay
//! spatially comparable.
//!
//! The grid is an arena of cell records addressed by `(tx, ty)`;
//! neighbors are reached through bounds-checked index accessors, never
//! through stored references.

/// Source-space rectangle owned by one target pixel. Bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Cell {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Edge length used by the resolver's fill rules: the larger axis.
    pub fn edge(&self) -> u32 {
        self.width().max(self.height())
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Geometric center in source coordinates.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) as f32 * 0.5,
            (self.min_y + self.max_y) as f32 * 0.5,
        )
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// The full partition of a source image onto a target grid.
///
/// Recomputed per downscale call, never persisted. `cell_of_pixel` is
/// an O(1) reverse lookup backed by per-axis tables so the resolver's
/// cross-cell connectivity checks stay cheap.
#[derive(Debug, Clone)]
pub struct CellGrid {
    src_w: u32,
    src_h: u32,
    target_w: u32,
    target_h: u32,
    cells: Vec<Cell>,
    col_of_x: Vec<u32>,
    row_of_y: Vec<u32>,
}

/// Span of axis index `t` on a source axis of length `src`,
/// clamped to at least one pixel. Returns (min, max) inclusive.
fn axis_span(t: u32, src: u32, target: u32) -> (u32, u32) {
    let min = (t as u64 * src as u64 / target as u64) as u32;
    let end = ((t as u64 + 1) * src as u64 / target as u64) as u32;
    // Degenerate larger-than-source targets still get one pixel.
    let end = end.max(min + 1).min(src.max(min + 1));
    (min, end - 1)
}

impl CellGrid {
    /// Partition a `src_w` x `src_h` image onto a `target_w` x
    /// `target_h` grid. Dimensions must be nonzero; callers validate
    /// target sizes before building a grid.
    pub fn new(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> Self {
        debug_assert!(src_w > 0 && src_h > 0 && target_w > 0 && target_h > 0);

        let mut cells = Vec::with_capacity(target_w as usize * target_h as usize);
        let mut col_of_x = vec![0u32; src_w as usize];
        let mut row_of_y = vec![0u32; src_h as usize];

        let mut x_spans = Vec::with_capacity(target_w as usize);
        for tx in 0..target_w {
            let (min_x, max_x) = axis_span(tx, src_w, target_w);
            for x in min_x..=max_x.min(src_w - 1) {
                col_of_x[x as usize] = tx;
            }
            x_spans.push((min_x, max_x));
        }

        let mut y_spans = Vec::with_capacity(target_h as usize);
        for ty in 0..target_h {
            let (min_y, max_y) = axis_span(ty, src_h, target_h);
            for y in min_y..=max_y.min(src_h - 1) {
                row_of_y[y as usize] = ty;
            }
            y_spans.push((min_y, max_y));
        }

        for &(min_y, max_y) in &y_spans {
            for &(min_x, max_x) in &x_spans {
                cells.push(Cell { min_x, min_y, max_x, max_y });
            }
        }

        Self {
            src_w,
            src_h,
            target_w,
            target_h,
            cells,
            col_of_x,
            row_of_y,
        }
    }

    pub fn target_w(&self) -> u32 {
        self.target_w
    }

    pub fn target_h(&self) -> u32 {
        self.target_h
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear index of target cell (tx, ty).
    #[inline]
    pub fn index(&self, tx: u32, ty: u32) -> usize {
        ty as usize * self.target_w as usize + tx as usize
    }

    #[inline]
    pub fn cell(&self, tx: u32, ty: u32) -> &Cell {
        &self.cells[self.index(tx, ty)]
    }

    #[inline]
    pub fn cell_by_index(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    /// Target cell owning the source pixel (x, y), if in bounds.
    #[inline]
    pub fn cell_of_pixel(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        if x >= self.src_w || y >= self.src_h {
            return None;
        }
        Some((self.col_of_x[x as usize], self.row_of_y[y as usize]))
    }

    /// Bounds-checked grid neighbor of (tx, ty).
    pub fn neighbor_index(&self, tx: u32, ty: u32, dx: i32, dy: i32) -> Option<usize> {
        let nx = tx as i64 + dx as i64;
        let ny = ty as i64 + dy as i64;
        if nx < 0 || nx >= self.target_w as i64 || ny < 0 || ny >= self.target_h as i64 {
            return None;
        }
        Some(self.index(nx as u32, ny as u32))
    }
}
