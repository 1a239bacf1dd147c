//! Directory scanning utilities for discovering wallpaper candidates.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions considered during a scan (lowercase, without dot). Only PNG
/// survives validation; the others are listed so they get reported.
pub const SUPPORTED_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Return `true` if `path` has an allowed image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTS.iter().any(|e| *e == ext)
        })
}

/// List the image files directly inside `dir`, sorted by file name.
///
/// # Errors
/// Returns [`Error::Filesystem`] if `dir` is missing or not a directory.
pub fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::filesystem(dir, "not a directory"));
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        let path = entry.path();
        if entry.file_type().is_file() && is_supported_image(path) {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}
