//! Per-resolution wallpaper repositories.
//!
//! Each resolution group (`"1920x1080"`, ...) owns one folder below the
//! configured wallpaper root. Population validates every candidate in that
//! folder and keeps a cyclable list; [`ImageRepository::get_next_image`]
//! notices when the folder drifted from the list and repopulates first.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::config::ConfigStore;
use crate::displays::{Display, resolution_key};
use crate::error::{Error, Result};
use crate::meta::validate_candidate;
use crate::paths::ensure_dir;
use crate::ring::WallpaperRing;
use crate::scan::list_candidates;

#[derive(Debug, Default)]
struct RepositoryEntry {
    ring: WallpaperRing,
    last_known: HashSet<PathBuf>,
    generation: u64,
}

/// Validated, cyclable wallpaper lists keyed by resolution.
///
/// All entries sit behind one lock, so populations never overlap and the
/// shared cursors advance atomically with drift checks.
#[derive(Debug)]
pub struct ImageRepository {
    config: Arc<ConfigStore>,
    entries: Mutex<HashMap<String, RepositoryEntry>>,
}

impl ImageRepository {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Folder holding the candidates for one resolution under the current root.
    pub fn repo_path(&self, width: u32, height: u32) -> PathBuf {
        self.config
            .snapshot()
            .wallpaper_dir
            .join(resolution_key(width, height))
    }

    /// Rebuild the list for `width` x `height` from disk.
    ///
    /// # Errors
    /// Returns [`Error::Filesystem`] if the resolution folder cannot be created
    /// or exists but is not a directory. Invalid candidates are skipped.
    pub fn populate(&self, width: u32, height: u32) -> Result<usize> {
        let mut entries = self.entries.lock();
        self.populate_locked(&mut entries, width, height)
    }

    /// Populate every distinct resolution found in `displays`. A failing
    /// resolution is logged and does not prevent the others.
    #[instrument(skip_all, fields(displays = displays.len()))]
    pub fn populate_all(&self, displays: &[Display]) {
        let unique: BTreeMap<String, (u32, u32)> = displays
            .iter()
            .map(|d| (d.resolution_key(), (d.width, d.height)))
            .collect();
        for (key, (width, height)) in unique {
            if let Err(err) = self.populate(width, height) {
                warn!(repo = %key, error = %err, "could not populate repository");
            }
        }
    }

    /// Compare a fresh validated scan with the set recorded at the last
    /// population, ignoring order.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for a resolution that was never populated.
    pub fn files_have_changed(&self, width: u32, height: u32) -> Result<bool> {
        let entries = self.entries.lock();
        self.changed_locked(&entries, width, height)
    }

    /// Advance the shared cursor of the resolution group and return its file.
    ///
    /// Repopulates first when the folder drifted. `Ok(None)` means there is
    /// no candidate (empty folder or never-populated group) and the caller
    /// should paint a placeholder.
    pub fn get_next_image(&self, width: u32, height: u32) -> Result<Option<PathBuf>> {
        let key = resolution_key(width, height);
        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) {
            debug!(repo = %key, "no repository for resolution");
            return Ok(None);
        }
        if self.changed_locked(&entries, width, height)? {
            info!(repo = %key, "wallpaper folder changed; repopulating");
            self.populate_locked(&mut entries, width, height)?;
        }
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("repository {key}")))?;
        Ok(entry.ring.advance().cloned())
    }

    /// Number of populations performed for a resolution so far.
    pub fn generation(&self, width: u32, height: u32) -> Option<u64> {
        self.entries
            .lock()
            .get(&resolution_key(width, height))
            .map(|e| e.generation)
    }

    /// Snapshot of the current ordered list for a resolution.
    pub fn files(&self, width: u32, height: u32) -> Option<Vec<PathBuf>> {
        self.entries
            .lock()
            .get(&resolution_key(width, height))
            .map(|e| e.ring.as_slice().to_vec())
    }

    #[instrument(skip(self, entries))]
    fn populate_locked(
        &self,
        entries: &mut HashMap<String, RepositoryEntry>,
        width: u32,
        height: u32,
    ) -> Result<usize> {
        let key = resolution_key(width, height);
        let cfg = self.config.snapshot();
        let dir = cfg.wallpaper_dir.join(&key);
        ensure_dir(&dir)?;

        let mut files = validated_files(&dir, width, height, true)?;
        if cfg.shuffle {
            files.shuffle(&mut rand::rng());
        }
        for path in &files {
            debug!(repo = %key, path = %path.display(), "image loaded");
        }

        let entry = entries.entry(key.clone()).or_default();
        entry.last_known = files.iter().cloned().collect();
        entry.ring = WallpaperRing::from_vec(files);
        entry.generation += 1;
        info!(
            repo = %key,
            count = entry.ring.len(),
            shuffled = cfg.shuffle,
            generation = entry.generation,
            "repository populated"
        );
        Ok(entry.ring.len())
    }

    fn changed_locked(
        &self,
        entries: &HashMap<String, RepositoryEntry>,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        let key = resolution_key(width, height);
        let entry = entries
            .get(&key)
            .ok_or_else(|| Error::NotFound(format!("repository {key}")))?;
        let dir = self.config.snapshot().wallpaper_dir.join(&key);
        if !dir.is_dir() {
            return Ok(true);
        }
        let current: HashSet<PathBuf> = validated_files(&dir, width, height, false)?
            .into_iter()
            .collect();
        Ok(current != entry.last_known)
    }
}

/// Candidates in `dir` that are PNGs of exactly `width` x `height`, in listing
/// order. Rejections are skipped; `report` raises their log level to warn.
fn validated_files(dir: &Path, width: u32, height: u32, report: bool) -> Result<Vec<PathBuf>> {
    let candidates = list_candidates(dir)?;
    let mut accepted = Vec::with_capacity(candidates.len());
    for path in candidates {
        match validate_candidate(&path, width, height) {
            Ok(_) => accepted.push(path),
            Err(err) if report => {
                warn!(path = %path.display(), error = %err, "skipping wallpaper");
            }
            Err(err) => debug!(path = %path.display(), error = %err, "skipping wallpaper"),
        }
    }
    Ok(accepted)
}
