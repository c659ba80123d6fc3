//! PNG re-encoding for sources the codec cannot read

use crate::error::{IoResultExt, PipelineError, Result};
use image::ImageFormat;
use std::fs;
use std::path::Path;

/// Source extensions the codec reads directly (lowercase)
pub const NATIVE_CODEC_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "exr"];

/// Returns true if the codec can take `source` as-is
pub fn accepts_natively(source: &Path) -> bool {
    source
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| NATIVE_CODEC_EXTENSIONS.contains(&ext.as_str()))
}

/// Decodes `source` and writes it as PNG to `destination`
///
/// Parent directories of `destination` are created as needed.
pub fn encode_intermediate(source: &Path, destination: &Path) -> Result<()> {
    let image = image::open(source).map_err(|source_err| PipelineError::Image {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    image.save_with_format(destination, ImageFormat::Png).map_err(|source_err| PipelineError::Image {
        path: destination.to_path_buf(),
        source: source_err,
    })?;

    tracing::debug!(source = %source.display(), intermediate = %destination.display(), "re-encoded texture as PNG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_native_formats() {
        assert!(accepts_natively(Path::new("a/wall.png")));
        assert!(accepts_natively(Path::new("a/wall.JPG")));
        assert!(!accepts_natively(Path::new("a/wall.tga")));
        assert!(!accepts_natively(Path::new("a/wall")));
    }

    #[test]
    fn test_tga_is_reencoded() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("wall.tga");
        let mut pixels = RgbImage::new(4, 2);
        pixels.put_pixel(1, 1, Rgb([200, 10, 30]));
        pixels.save_with_format(&source, ImageFormat::Tga).unwrap();

        let destination = dir.path().join("png/art/wall.png");
        encode_intermediate(&source, &destination).unwrap();

        let decoded = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([200, 10, 30]));
    }

    #[test]
    fn test_garbage_input_is_an_image_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.tga");
        fs::write(&source, b"not an image").unwrap();
        let err = encode_intermediate(&source, &dir.path().join("out.png")).unwrap_err();
        assert!(matches!(err, PipelineError::Image { path, .. } if path == source));
    }
}
