//! Application data directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

pub const APP_DATA_DIR: &str = "WallFlow";
pub const CONFIG_FILE: &str = "config.json";
pub const ALIASES_FILE: &str = "display_aliases.json";
pub const LAYOUT_FILE: &str = "displays.json";
pub const OUTPUT_FILE: &str = "wallpaper.bmp";
pub const BUFFER_EXT: &str = "dat";

/// Resolved locations of every file wallflow keeps in its data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `<local data dir>/WallFlow`, falling back to the working directory when
    /// the platform reports no data directory.
    pub fn platform_default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DATA_DIR))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn aliases_file(&self) -> PathBuf {
        self.data_dir.join(ALIASES_FILE)
    }

    pub fn layout_file(&self) -> PathBuf {
        self.data_dir.join(LAYOUT_FILE)
    }

    pub fn output_file(&self) -> PathBuf {
        self.data_dir.join(OUTPUT_FILE)
    }

    pub fn buffer_file(&self, key: u16) -> PathBuf {
        self.data_dir.join(format!("{key}.{BUFFER_EXT}"))
    }

    /// Create the data directory if needed.
    ///
    /// # Errors
    /// Returns [`Error::Filesystem`] if the path exists but is not a directory,
    /// or if it cannot be created.
    pub fn ensure_data_dir(&self) -> Result<()> {
        ensure_dir(&self.data_dir)
    }
}

/// Make sure `path` is a directory, creating it (and its parents) when absent.
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::filesystem(path, "expected a directory"));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| Error::filesystem(path, e))?;
    info!(path = %path.display(), "created directory");
    Ok(())
}

/// Home-relative default used when no config exists yet.
pub fn default_wallpaper_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Wallpapers")
}
