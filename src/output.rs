//! Image file I/O and output path generation.
//!
//! The only place the crate touches a codec: everything inside the
//! scalers works on raw [`PixelBuffer`]s, and this module converts to
//! and from files at the edges.

use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::error::ScaleError;

/// Error type for image I/O operations.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Decode an image file into an RGBA pixel buffer. Any format the
/// decoder recognizes is accepted; non-RGBA inputs are converted.
pub fn load_buffer(path: &Path) -> Result<PixelBuffer, OutputError> {
    let img = image::open(path)?.to_rgba8();
    let (w, h) = img.dimensions();
    Ok(PixelBuffer::from_raw(img.into_raw(), w, h)?)
}

/// Encode a pixel buffer to a PNG file, creating parent directories
/// as needed.
pub fn save_buffer(buffer: &PixelBuffer, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (w, h) = (buffer.width(), buffer.height());
    let img = RgbaImage::from_raw(w, h, buffer.data().to_vec()).ok_or(OutputError::Scale(
        ScaleError::BufferSizeMismatch {
            len: buffer.data().len(),
            width: w,
            height: h,
        },
    ))?;
    img.save(path)?;
    Ok(())
}

/// Output path for a scaled image.
///
/// | Scenario               | Output                            |
/// |------------------------|-----------------------------------|
/// | No `-o`                | `{input_stem}_{w}x{h}.png` beside the input |
/// | `-o file.png`          | `file.png`                        |
/// | `-o dir/`              | `dir/{input_stem}_{w}x{h}.png`    |
pub fn generate_output_path(
    input: &Path,
    target_w: u32,
    target_h: u32,
    output_arg: Option<&Path>,
) -> PathBuf {
    let default_name = || {
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        format!("{}_{}x{}.png", stem, target_w, target_h)
    };

    match output_arg {
        Some(output) => {
            // Trailing slash or an existing directory means "put it in
            // here under the default name".
            let is_dir = output.as_os_str().to_string_lossy().ends_with('/') || output.is_dir();
            if is_dir {
                output.join(default_name())
            } else {
                output.to_path_buf()
            }
        }
        None => {
            let parent = input.parent().unwrap_or(Path::new(""));
            if parent.as_os_str().is_empty() {
                PathBuf::from(default_name())
            } else {
                parent.join(default_name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_output_path_default() {
        let path = generate_output_path(Path::new("art/input.png"), 32, 24, None);
        assert_eq!(path, PathBuf::from("art/input_32x24.png"));
    }

    #[test]
    fn test_generate_output_path_default_no_parent() {
        let path = generate_output_path(Path::new("input.png"), 8, 8, None);
        assert_eq!(path, PathBuf::from("input_8x8.png"));
    }

    #[test]
    fn test_generate_output_path_explicit_file() {
        let path =
            generate_output_path(Path::new("input.png"), 8, 8, Some(Path::new("out.png")));
        assert_eq!(path, PathBuf::from("out.png"));
    }

    #[test]
    fn test_generate_output_path_directory() {
        let path =
            generate_output_path(Path::new("a/input.png"), 16, 16, Some(Path::new("outdir/")));
        assert_eq!(path, PathBuf::from("outdir/input_16x16.png"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        use crate::color;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.png");

        let mut buf = PixelBuffer::new(2, 2);
        for (i, w) in [
            color::pack(255, 0, 0, 255),
            color::pack(0, 255, 0, 255),
            color::pack(0, 0, 255, 255),
            color::pack(0, 0, 0, 0),
        ]
        .into_iter()
        .enumerate()
        {
            buf.set_word(i, w);
        }

        save_buffer(&buf, &path).unwrap();
        let loaded = load_buffer(&path).unwrap();
        assert_eq!(loaded, buf);
    }
}
