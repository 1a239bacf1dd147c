use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, ensure};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::paths::default_wallpaper_dir;

pub const DEFAULT_CHANGE_INTERVAL_SECS: u64 = 300;

/// Persisted user settings (`config.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Root holding one `<width>x<height>` folder per resolution group.
    pub wallpaper_dir: PathBuf,
    /// Seconds between scheduled cycles.
    pub change_interval: u64,
    /// Shuffle each resolution group after population.
    pub shuffle: bool,
    /// Command used to set the desktop background; the bitmap path is appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_command: Option<Vec<String>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            wallpaper_dir: default_wallpaper_dir(),
            change_interval: DEFAULT_CHANGE_INTERVAL_SECS,
            shuffle: true,
            apply_command: None,
        }
    }
}

impl Configuration {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let cfg = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.change_interval > 0,
            "changeInterval must be greater than zero seconds"
        );
        ensure!(
            !self.wallpaper_dir.as_os_str().is_empty(),
            "wallpaperDir must not be empty"
        );
        if let Some(cmd) = &self.apply_command {
            ensure!(
                !cmd.is_empty() && !cmd[0].trim().is_empty(),
                "applyCommand must name a program"
            );
        }
        Ok(self)
    }

    pub fn change_interval(&self) -> Duration {
        Duration::from_secs(self.change_interval)
    }

    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing configuration")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write config at {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug)]
struct Loaded {
    config: Configuration,
    modified: Option<SystemTime>,
}

/// Configuration as seen by the running process.
///
/// Readers take a [`snapshot`](ConfigStore::snapshot) at the start of each
/// operation and never hold on to it across operations.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    inner: RwLock<Loaded>,
}

impl ConfigStore {
    /// Load `path`, writing a default configuration first if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!(path = %path.display(), "no config found; writing defaults");
            Configuration::default().write_json_file(&path)?;
        }
        let config = Configuration::from_json_file(&path)?
            .validated()
            .context("invalid configuration values")?;
        let modified = modified_at(&path);
        info!(path = %path.display(), ?config, "loaded configuration");
        Ok(Self {
            path: Some(path),
            inner: RwLock::new(Loaded { config, modified }),
        })
    }

    /// A store with no backing file; updates stay in memory.
    pub fn in_memory(config: Configuration) -> Self {
        Self {
            path: None,
            inner: RwLock::new(Loaded {
                config,
                modified: None,
            }),
        }
    }

    pub fn snapshot(&self) -> Configuration {
        self.inner.read().config.clone()
    }

    /// Re-read the file if its modification time moved. Returns whether the
    /// effective configuration changed.
    pub fn reload_if_modified(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let modified = modified_at(path);
        if modified == self.inner.read().modified {
            return Ok(false);
        }
        let config = Configuration::from_json_file(path)?
            .validated()
            .context("invalid configuration values")?;
        let mut inner = self.inner.write();
        inner.modified = modified;
        if inner.config == config {
            debug!("config file touched without changes");
            return Ok(false);
        }
        info!(?config, "configuration reloaded");
        inner.config = config;
        Ok(true)
    }

    /// Apply `edit`, validate, and persist the result.
    pub fn update<F>(&self, edit: F) -> Result<Configuration>
    where
        F: FnOnce(&mut Configuration),
    {
        let mut inner = self.inner.write();
        let mut next = inner.config.clone();
        edit(&mut next);
        let next = next.validated().context("invalid configuration values")?;
        if let Some(path) = &self.path {
            next.write_json_file(path)?;
            inner.modified = modified_at(path);
        }
        inner.config = next.clone();
        Ok(next)
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
