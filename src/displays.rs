//! Display descriptors and the sources that supply them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One physical monitor in desktop coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    /// Stable hardware identifier.
    pub id: String,
    pub alias: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Display {
    pub fn new(id: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        let id = id.into();
        Self {
            alias: resolution_key(width, height),
            id,
            x,
            y,
            width,
            height,
        }
    }

    /// `"{width}x{height}"`; names the resolution group and its folder.
    pub fn resolution_key(&self) -> String {
        resolution_key(self.width, self.height)
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Display(id={},alias={},x={},y={},width={},height={})",
            self.id, self.alias, self.x, self.y, self.width, self.height
        )
    }
}

pub fn resolution_key(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

/// Shift every display so the smallest x and the smallest y become 0.
pub fn normalize_offsets(displays: &mut [Display]) {
    let min_x = displays.iter().map(|d| d.x).min().unwrap_or(0).min(0);
    let min_y = displays.iter().map(|d| d.y).min().unwrap_or(0).min(0);
    if min_x == 0 && min_y == 0 {
        return;
    }
    debug!(min_x, min_y, "correcting display offsets");
    for display in displays.iter_mut() {
        display.x -= min_x;
        display.y -= min_y;
    }
}

/// Supplies the authoritative, ordered display list.
pub trait DisplaySource: Send + Sync {
    /// # Errors
    /// Returns an error when the topology cannot be read.
    fn displays(&self) -> Result<Vec<Display>>;
}

#[derive(Debug, Clone, Deserialize)]
struct LayoutEntry {
    id: String,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    width: u32,
    height: u32,
}

/// Reads the monitor layout from a JSON file on every request, so editing the
/// file is picked up the next time the topology is refreshed.
///
/// ```json
/// [
///   { "id": "DP-1", "x": 0, "y": 0, "width": 1920, "height": 1080 },
///   { "id": "HDMI-1", "x": 1920, "y": 0, "width": 1280, "height": 1024 }
/// ]
/// ```
#[derive(Debug)]
pub struct LayoutFile {
    path: PathBuf,
    aliases: Arc<AliasStore>,
}

impl LayoutFile {
    pub fn new(path: impl Into<PathBuf>, aliases: Arc<AliasStore>) -> Self {
        Self {
            path: path.into(),
            aliases,
        }
    }
}

impl DisplaySource for LayoutFile {
    fn displays(&self) -> Result<Vec<Display>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| Error::filesystem(&self.path, e))?;
        let entries: Vec<LayoutEntry> = serde_json::from_str(&raw)?;
        let mut displays = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.width == 0 || entry.height == 0 {
                return Err(Error::Config(format!(
                    "display {} has an empty size",
                    entry.id
                )));
            }
            let mut display = Display::new(entry.id, entry.x, entry.y, entry.width, entry.height);
            display.alias = self
                .aliases
                .get_or_create(&display.id, &display.resolution_key())?;
            displays.push(display);
        }
        normalize_offsets(&mut displays);
        for monitor in &displays {
            debug!(display = %monitor, "loaded display");
        }
        Ok(displays)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct AliasMap(BTreeMap<String, String>);

/// Human-friendly display names persisted in `display_aliases.json`.
#[derive(Debug)]
pub struct AliasStore {
    path: PathBuf,
    map: Mutex<AliasMap>,
}

impl AliasStore {
    /// Open the alias file, creating an empty one if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| Error::filesystem(&path, e))?;
            serde_json::from_str(&raw)?
        } else {
            let empty = AliasMap::default();
            write_aliases(&path, &empty)?;
            empty
        };
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.map.lock().0.get(id).cloned()
    }

    /// Return the stored alias for `id`, persisting `default` if there is none.
    pub fn get_or_create(&self, id: &str, default: &str) -> Result<String> {
        let mut map = self.map.lock();
        if let Some(alias) = map.0.get(id) {
            return Ok(alias.clone());
        }
        map.0.insert(id.to_owned(), default.to_owned());
        write_aliases(&self.path, &map)?;
        info!(id, alias = default, "registered display alias");
        Ok(default.to_owned())
    }

    pub fn set(&self, id: &str, alias: &str) -> Result<()> {
        let mut map = self.map.lock();
        map.0.insert(id.to_owned(), alias.to_owned());
        write_aliases(&self.path, &map)
    }
}

fn write_aliases(path: &Path, map: &AliasMap) -> Result<()> {
    let json = serde_json::to_string_pretty(map)?;
    fs::write(path, json).map_err(|e| Error::filesystem(path, e))
}
