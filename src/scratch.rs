//! File-backed scratch buffers.
//!
//! The composed canvas can easily exceed what we want to keep in private
//! heap memory (three 4K monitors are ~75 MiB of RGB), so each cycle borrows a
//! memory-mapped file from the data directory and gives it back right after
//! the bitmap is written. Buffers are addressed by a random `u16` key; the
//! manager's table is the only thing that creates or removes them.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::MmapMut;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::paths::{AppPaths, BUFFER_EXT};

/// Lowest key handed out; everything up to `u16::MAX` is usable.
pub const MIN_KEY: u16 = 10_000;
const KEY_SPACE: usize = (u16::MAX - MIN_KEY) as usize + 1;

/// Written at offset 0 when a mapping goes live.
pub const SENTINEL: u8 = 0xFF;

/// A live mapping of `{key}.dat`.
#[derive(Debug)]
pub struct ScratchBuffer {
    path: PathBuf,
    map: MmapMut,
    // Keeps the handle open for as long as the mapping lives.
    _file: File,
}

impl ScratchBuffer {
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

pub type SharedBuffer = Arc<Mutex<ScratchBuffer>>;

/// Keyed pool of scratch buffers living in the data directory.
#[derive(Debug)]
pub struct ScratchBufferManager {
    paths: AppPaths,
    live: Mutex<HashMap<u16, SharedBuffer>>,
}

impl ScratchBufferManager {
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Map a fresh buffer of exactly `size` bytes and return its key.
    ///
    /// # Errors
    /// Returns [`Error::Resource`] if no key is free, if `size` is zero, or if
    /// the backing file or mapping cannot be set up. Partial work is undone
    /// before returning.
    pub fn create_buffer(&self, size: usize) -> Result<u16> {
        if size == 0 {
            return Err(Error::Resource("refusing to map a zero-sized buffer".into()));
        }
        let mut live = self.live.lock();
        let key = issue_key(&live)?;
        let path = self.paths.buffer_file(key);
        info!(key, size, "creating scratch buffer");

        let buffer = match map_file(key, &path, size) {
            Ok(buffer) => buffer,
            Err(err) => {
                if let Err(rm) = fs::remove_file(&path)
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %path.display(), error = %rm, "could not remove partial buffer file");
                }
                return Err(err);
            }
        };
        live.insert(key, Arc::new(Mutex::new(buffer)));
        Ok(key)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if `key` is not live.
    pub fn get_buffer(&self, key: u16) -> Result<SharedBuffer> {
        debug!(key, "retrieving scratch buffer");
        self.live
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("scratch buffer {key}")))
    }

    /// Unmap the buffer, close its file and delete it from disk. Unknown keys
    /// are logged and ignored.
    pub fn delete_buffer(&self, key: u16) {
        info!(key, "deleting scratch buffer");
        let Some(shared) = self.live.lock().remove(&key) else {
            warn!(key, "could not find scratch buffer");
            return;
        };
        let path = match Arc::try_unwrap(shared) {
            Ok(mutex) => {
                let buffer = mutex.into_inner();
                let path = buffer.path.clone();
                drop(buffer);
                path
            }
            Err(still_shared) => {
                // The mapping goes away with the last handle; the file can go now.
                warn!(key, "scratch buffer still borrowed while deleting");
                let path = still_shared.lock().path.clone();
                path
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "buffer file already gone");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "could not delete buffer file"),
        }
    }

    /// Delete every tracked buffer.
    pub fn delete_all(&self) {
        info!("deleting all scratch buffers");
        let keys: Vec<u16> = self.live.lock().keys().copied().collect();
        for key in keys {
            self.delete_buffer(key);
        }
    }

    /// Remove `{u16}.dat` files left over by a previous run. Call once at
    /// startup, before the first buffer is created.
    pub fn sweep_stale_buffers(&self) -> Result<usize> {
        info!(dir = %self.paths.data_dir().display(), "removing scratch buffers left from previous execution");
        let mut removed = 0;
        for entry in fs::read_dir(self.paths.data_dir())? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || !is_buffer_file(&path) {
                continue;
            }
            fs::remove_file(&path)?;
            info!(path = %path.display(), "deleted stale buffer");
            removed += 1;
        }
        Ok(removed)
    }

    /// Number of buffers currently mapped.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

impl Drop for ScratchBufferManager {
    fn drop(&mut self) {
        if !self.live.get_mut().is_empty() {
            self.delete_all();
        }
    }
}

fn issue_key(live: &HashMap<u16, SharedBuffer>) -> Result<u16> {
    if live.len() >= KEY_SPACE {
        return Err(Error::Resource("scratch buffer keys exhausted".into()));
    }
    let mut rng = rand::rng();
    loop {
        let key = rng.random_range(MIN_KEY..=u16::MAX);
        if !live.contains_key(&key) {
            return Ok(key);
        }
    }
}

fn map_file(key: u16, path: &Path, size: usize) -> Result<ScratchBuffer> {
    let resource = |what: &str, e: std::io::Error| {
        Error::Resource(format!("{what} {}: {e}", path.display()))
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| resource("could not open buffer file", e))?;
    let current = file
        .metadata()
        .map_err(|e| resource("could not stat buffer file", e))?
        .len();
    if current != size as u64 {
        debug!(key, from = current, to = size, "sizing buffer file");
        file.set_len(size as u64)
            .map_err(|e| resource("could not size buffer file", e))?;
    }

    // SAFETY: the file lives in our private data directory, is opened
    // read/write by this process only, and is never resized while mapped.
    let mut map = unsafe { MmapMut::map_mut(&file) }
        .map_err(|e| resource("could not map buffer file", e))?;
    if map.len() != size {
        return Err(Error::Resource(format!(
            "mapped {} bytes of {}, expected {size}",
            map.len(),
            path.display()
        )));
    }
    map[0] = SENTINEL;

    Ok(ScratchBuffer {
        path: path.to_path_buf(),
        map,
        _file: file,
    })
}

fn is_buffer_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(BUFFER_EXT)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.parse::<u16>().is_ok())
}
