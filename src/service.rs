//! Process-wide state, owned in one place.
//!
//! Both the scheduler thread and the control thread hold an `Arc<Service>`
//! and call straight into it; the locks inside the repository, the buffer
//! pool and the compositor do the serializing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::apply::WallpaperSetter;
use crate::compositor::{Compositor, CycleReport};
use crate::config::{ConfigStore, Configuration};
use crate::displays::{AliasStore, Display, DisplaySource};
use crate::paths::AppPaths;
use crate::repo::ImageRepository;
use crate::scratch::ScratchBufferManager;

pub struct Service {
    paths: AppPaths,
    config: Arc<ConfigStore>,
    source: Box<dyn DisplaySource>,
    aliases: Option<Arc<AliasStore>>,
    displays: RwLock<Vec<Display>>,
    repo: Arc<ImageRepository>,
    buffers: Arc<ScratchBufferManager>,
    compositor: Compositor,
}

impl Service {
    pub fn new(
        paths: AppPaths,
        config: Arc<ConfigStore>,
        source: Box<dyn DisplaySource>,
        setter: Arc<dyn WallpaperSetter>,
    ) -> Self {
        let repo = Arc::new(ImageRepository::new(config.clone()));
        let buffers = Arc::new(ScratchBufferManager::new(paths.clone()));
        let compositor = Compositor::new(
            repo.clone(),
            buffers.clone(),
            setter,
            paths.output_file(),
        );
        Self {
            paths,
            config,
            source,
            aliases: None,
            displays: RwLock::new(Vec::new()),
            repo,
            buffers,
            compositor,
        }
    }

    /// Allow [`rename_display`](Self::rename_display) to persist aliases.
    #[must_use]
    pub fn with_aliases(mut self, aliases: Arc<AliasStore>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Prepare the data directory, reclaim stale buffers and load displays.
    #[instrument(skip(self))]
    pub fn startup(&self) -> Result<()> {
        self.paths
            .ensure_data_dir()
            .context("preparing data directory")?;
        let swept = self
            .buffers
            .sweep_stale_buffers()
            .context("removing stale scratch buffers")?;
        info!(swept, "initialised resources");
        self.reload_displays()?;
        Ok(())
    }

    pub fn config(&self) -> Configuration {
        self.config.snapshot()
    }

    pub fn displays(&self) -> Vec<Display> {
        self.displays.read().clone()
    }

    pub fn repository(&self) -> &ImageRepository {
        &self.repo
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn cycle_all(&self) -> Result<CycleReport> {
        let displays = self.displays();
        self.compositor
            .cycle_all(&displays)
            .context("cycling all displays")
    }

    /// Cycle the display whose id or alias is `selector`.
    pub fn cycle_display(&self, selector: &str) -> Result<CycleReport> {
        let displays = self.displays();
        let monitor = find_display(&displays, selector)?;
        info!(display = %monitor, "refreshing display");
        let id = monitor.id.clone();
        self.compositor
            .cycle_one(&displays, &id)
            .with_context(|| format!("cycling display {selector}"))
    }

    pub fn redraw(&self) -> Result<CycleReport> {
        let displays = self.displays();
        self.compositor
            .redraw_current(&displays)
            .context("redrawing current wallpapers")
    }

    /// Re-read the topology. When it changed, regroup the repositories and
    /// redraw. Returns whether anything changed.
    pub fn refresh_displays(&self) -> Result<bool> {
        let displays = self.source.displays().context("loading displays")?;
        if *self.displays.read() == displays {
            return Ok(false);
        }
        info!("display change detected");
        self.install_displays(displays);
        self.redraw()?;
        Ok(true)
    }

    pub fn toggle_shuffle(&self) -> Result<bool> {
        let cfg = self.config.update(|cfg| cfg.shuffle = !cfg.shuffle)?;
        info!(shuffle = cfg.shuffle, "toggled shuffle");
        self.repo.populate_all(&self.displays());
        Ok(cfg.shuffle)
    }

    pub fn set_wallpaper_dir(&self, dir: PathBuf) -> Result<CycleReport> {
        let cfg = self.config.update(|cfg| cfg.wallpaper_dir = dir)?;
        info!(dir = %cfg.wallpaper_dir.display(), "changed wallpaper directory");
        self.repo.populate_all(&self.displays());
        self.cycle_all()
    }

    /// Pick up edits to `config.json`. Repositories are rebuilt when it changed.
    pub fn reload_config_if_modified(&self) -> Result<bool> {
        let changed = self.config.reload_if_modified()?;
        if changed {
            self.repo.populate_all(&self.displays());
        }
        Ok(changed)
    }

    pub fn rename_display(&self, selector: &str, alias: &str) -> Result<()> {
        let aliases = self
            .aliases
            .as_ref()
            .ok_or_else(|| anyhow!("display aliases are not persisted in this setup"))?;
        let id = find_display(&self.displays(), selector)?.id.clone();
        aliases.set(&id, alias)?;
        info!(id, alias, "renamed display");
        for display in self.displays.write().iter_mut().filter(|d| d.id == id) {
            display.alias = alias.to_owned();
        }
        Ok(())
    }

    /// Release every scratch buffer.
    pub fn shutdown(&self) {
        self.buffers.delete_all();
    }

    fn reload_displays(&self) -> Result<()> {
        let displays = self.source.displays().context("loading displays")?;
        self.install_displays(displays);
        Ok(())
    }

    fn install_displays(&self, displays: Vec<Display>) {
        for monitor in &displays {
            info!(display = %monitor, "display");
        }
        self.repo.populate_all(&displays);
        *self.displays.write() = displays;
    }
}

fn find_display<'a>(displays: &'a [Display], selector: &str) -> Result<&'a Display> {
    displays
        .iter()
        .find(|d| d.id == selector)
        .or_else(|| displays.iter().find(|d| d.alias == selector))
        .ok_or_else(|| anyhow!("no display with id or alias {selector:?}"))
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("paths", &self.paths)
            .field("displays", &*self.displays.read())
            .finish_non_exhaustive()
    }
}
