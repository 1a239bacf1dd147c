use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::bmp::BmpEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, warn};

use crate::canvas::CanvasSize;
use crate::error::{Error, Result};

/// Write an RGB raster as a 24-bit BMP.
///
/// The bitmap is written next to `path` first and renamed into place, so a
/// failed write leaves any previous file untouched.
///
/// # Errors
/// Returns [`Error::Filesystem`] if the file cannot be written or encoded.
pub fn write_bitmap(path: &Path, pixels: &[u8], size: CanvasSize) -> Result<()> {
    let staging = staging_path(path);
    let result = encode_to(&staging, pixels, size).and_then(|()| {
        fs::rename(&staging, path).map_err(|e| Error::filesystem(path, e))
    });
    if result.is_err()
        && let Err(rm) = fs::remove_file(&staging)
        && rm.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %staging.display(), error = %rm, "could not remove partial bitmap");
    }
    result
}

fn encode_to(path: &Path, pixels: &[u8], size: CanvasSize) -> Result<()> {
    debug!(path = %path.display(), width = size.width, height = size.height, "encoding bitmap");
    let file = File::create(path).map_err(|e| Error::filesystem(path, e))?;
    let mut out = BufWriter::new(file);
    BmpEncoder::new(&mut out)
        .write_image(
            &pixels[..size.byte_len()],
            size.width,
            size.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::filesystem(path, e))?;
    out.flush().map_err(|e| Error::filesystem(path, e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| Error::filesystem(path, e))?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
