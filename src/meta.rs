use std::path::Path;

use image::{ImageFormat, ImageReader};

use crate::error::{Error, Result};

/// Header-level facts about a candidate PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
}

/// FAST: sniff the format from the magic bytes and read only the header for
/// dimensions. Nothing is decoded.
pub fn read_image_meta(path: &Path) -> Result<ImageMeta> {
    let reader = ImageReader::open(path)?
        .with_guessed_format()
        .map_err(|e| Error::validation(path, e))?;
    let format = reader
        .format()
        .ok_or_else(|| Error::validation(path, "unrecognized image format"))?;
    if format != ImageFormat::Png {
        return Err(Error::validation(
            path,
            format!("unsupported format {format:?}"),
        ));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::validation(path, e))?;
    Ok(ImageMeta { width, height })
}

/// Accept `path` only if it is a PNG of exactly `width` x `height`.
pub fn validate_candidate(path: &Path, width: u32, height: u32) -> Result<ImageMeta> {
    let meta = read_image_meta(path)?;
    if (meta.width, meta.height) != (width, height) {
        return Err(Error::validation(
            path,
            format!(
                "size {}x{} does not match {width}x{height}",
                meta.width, meta.height
            ),
        ));
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn reads_png_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.png");
        RgbImage::from_pixel(7, 3, Rgb([1, 2, 3])).save(&path).unwrap();

        let meta = read_image_meta(&path).unwrap();
        assert_eq!((meta.width, meta.height), (7, 3));
        assert!(validate_candidate(&path, 7, 3).is_ok());
        assert!(matches!(
            validate_candidate(&path, 3, 7),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn sniffs_content_not_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("actually_bmp.png");
        RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))
            .save_with_format(&path, ImageFormat::Bmp)
            .unwrap();
        assert!(matches!(
            read_image_meta(&path),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(read_image_meta(&path).is_err());
    }
}
