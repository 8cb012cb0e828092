//! RGBA pixel buffer shared by every scaler and filter.
//!
//! Pixels are interleaved 8-bit RGBA, row-major, no padding - the same
//! layout a bitmap surface hands over, so conversion at the codec
//! boundary is a plain byte copy. Each pixel is also addressable as a
//! packed little-endian word: `R | G<<8 | B<<16 | A<<24`.

use crate::error::ScaleError;

/// Alpha values below this are treated as transparent and excluded
/// from color statistics and palettes.
pub const ALPHA_MIN: u8 = 25;

/// A width x height RGBA8 image.
///
/// Algorithms never mutate their input; they produce a new buffer.
/// The one exception is the final palette snap, which rewrites a
/// buffer it already owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    /// Wrap raw interleaved RGBA bytes.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ScaleError> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(ScaleError::BufferSizeMismatch {
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer, returning the raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Linear pixel index of (x, y).
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Packed word at a linear pixel index.
    #[inline]
    pub fn word(&self, idx: usize) -> u32 {
        let o = idx * 4;
        u32::from_le_bytes([self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]])
    }

    /// Store a packed word at a linear pixel index.
    #[inline]
    pub fn set_word(&mut self, idx: usize, word: u32) {
        let o = idx * 4;
        self.data[o..o + 4].copy_from_slice(&word.to_le_bytes());
    }

    /// Packed word at (x, y).
    #[inline]
    pub fn word_at(&self, x: u32, y: u32) -> u32 {
        self.word(self.index(x, y))
    }

    /// Alpha channel at a linear pixel index.
    #[inline]
    pub fn alpha(&self, idx: usize) -> u8 {
        self.data[idx * 4 + 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_validates_length() {
        let err = PixelBuffer::from_raw(vec![0; 10], 2, 2).unwrap_err();
        assert_eq!(
            err,
            ScaleError::BufferSizeMismatch { len: 10, width: 2, height: 2 }
        );
        assert!(PixelBuffer::from_raw(vec![0; 16], 2, 2).is_ok());
    }

    #[test]
    fn test_word_packing_is_little_endian_rgba() {
        let mut buf = PixelBuffer::new(1, 1);
        buf.data_mut().copy_from_slice(&[1, 2, 3, 4]);
        // R | G<<8 | B<<16 | A<<24
        assert_eq!(buf.word(0), 1 | (2 << 8) | (3 << 16) | (4 << 24));

        buf.set_word(0, 0xAABBCCDD);
        assert_eq!(buf.data(), &[0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_index_is_row_major() {
        let buf = PixelBuffer::new(4, 3);
        assert_eq!(buf.index(0, 0), 0);
        assert_eq!(buf.index(3, 0), 3);
        assert_eq!(buf.index(0, 1), 4);
        assert_eq!(buf.index(3, 2), 11);
    }
}
