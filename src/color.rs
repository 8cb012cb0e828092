//! Color math shared by the scalers, filters and palette passes.
//!
//! Colors travel as packed little-endian RGBA words
//! (`R | G<<8 | B<<16 | A<<24`); helpers here unpack, measure and
//! compare them. Two luma weightings are in use: Rec.709 drives the
//! region grower's contrast scoring, Rec.601 drives the resolver's
//! ink-color pick and the palette lightness bands.

/// Pack RGBA channels into a word.
#[inline]
pub fn pack(r: u8, g: u8, b: u8, a: u8) -> u32 {
    r as u32 | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24
}

#[inline]
pub fn red(c: u32) -> u8 {
    (c & 0xff) as u8
}

#[inline]
pub fn green(c: u32) -> u8 {
    ((c >> 8) & 0xff) as u8
}

#[inline]
pub fn blue(c: u32) -> u8 {
    ((c >> 16) & 0xff) as u8
}

#[inline]
pub fn alpha(c: u32) -> u8 {
    ((c >> 24) & 0xff) as u8
}

/// Rec.709 luma on the 0..255 scale.
#[inline]
pub fn luma709(c: u32) -> f32 {
    0.2126 * red(c) as f32 + 0.7152 * green(c) as f32 + 0.0722 * blue(c) as f32
}

/// Rec.601 luma on the 0..255 scale.
#[inline]
pub fn luma601(c: u32) -> f32 {
    0.299 * red(c) as f32 + 0.587 * green(c) as f32 + 0.114 * blue(c) as f32
}

/// Squared Euclidean RGB distance. Alpha is ignored.
#[inline]
pub fn dist_sq(c1: u32, c2: u32) -> u32 {
    let dr = red(c1) as i32 - red(c2) as i32;
    let dg = green(c1) as i32 - green(c2) as i32;
    let db = blue(c1) as i32 - blue(c2) as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Manhattan RGB distance. Alpha is ignored.
#[inline]
pub fn manhattan(c1: u32, c2: u32) -> u32 {
    let dr = (red(c1) as i32 - red(c2) as i32).unsigned_abs();
    let dg = (green(c1) as i32 - green(c2) as i32).unsigned_abs();
    let db = (blue(c1) as i32 - blue(c2) as i32).unsigned_abs();
    dr + dg + db
}

/// HSL hue and lightness, both normalized to [0, 1].
///
/// Hue is 0 for achromatic colors. Saturation is not needed by any
/// consumer, so it is not computed.
pub fn hue_lightness(r: u8, g: u8, b: u8) -> (f32, f32) {
    let vr = r as f32 / 255.0;
    let vg = g as f32 / 255.0;
    let vb = b as f32 / 255.0;

    let max = vr.max(vg).max(vb);
    let min = vr.min(vg).min(vb);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, l);
    }

    let d = max - min;
    let mut h = if max == vr {
        (vg - vb) / d + if vg < vb { 6.0 } else { 0.0 }
    } else if max == vg {
        (vb - vr) / d + 2.0
    } else {
        (vr - vg) / d + 4.0
    };
    h /= 6.0;

    (h, l)
}
