//! Handing the composed bitmap to the desktop.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::error::{Error, Result};

/// How the desktop should lay the bitmap out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallpaperStyle {
    /// One image stretched across the union of all displays, unscaled.
    Span,
}

/// Sets the desktop background. Called only with a fully written bitmap.
pub trait WallpaperSetter: Send + Sync {
    /// # Errors
    /// Returns [`Error::Apply`] if the desktop rejected the change.
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()>;
}

/// `feh` without Xinerama awareness tiles from the root window origin, which
/// spans a canvas-sized bitmap across every output.
pub const DEFAULT_SPAN_COMMAND: &[&str] = &["feh", "--no-xinerama", "--bg-tile"];

/// Runs an external program with the bitmap path as its last argument.
#[derive(Debug, Clone)]
pub struct CommandSetter {
    program: String,
    args: Vec<String>,
}

impl CommandSetter {
    /// # Errors
    /// Returns [`Error::Config`] if `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("apply command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn span_default() -> Self {
        let argv: Vec<String> = DEFAULT_SPAN_COMMAND.iter().map(|s| (*s).to_owned()).collect();
        Self {
            program: argv[0].clone(),
            args: argv[1..].to_vec(),
        }
    }
}

impl WallpaperSetter for CommandSetter {
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()> {
        debug!(program = %self.program, ?style, path = %path.display(), "applying wallpaper");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| Error::Apply(format!("could not run {}: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Apply(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        info!(path = %path.display(), "wallpaper applied");
        Ok(())
    }
}

/// Only logs; used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlySetter;

impl WallpaperSetter for LogOnlySetter {
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()> {
        info!(path = %path.display(), ?style, "dry run: wallpaper not applied");
        Ok(())
    }
}

/// Resolves `applyCommand` from the current configuration on every apply,
/// so edits take effect on the next cycle.
#[derive(Debug)]
pub struct ConfiguredSetter {
    config: Arc<ConfigStore>,
}

impl ConfiguredSetter {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

impl WallpaperSetter for ConfiguredSetter {
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()> {
        let setter = match self.config.snapshot().apply_command {
            Some(argv) => CommandSetter::new(&argv)?,
            None => CommandSetter::span_default(),
        };
        setter.apply(path, style)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn command_failure_is_reported() {
        let setter = CommandSetter::new(&["false".to_owned()]).unwrap();
        let err = setter
            .apply(Path::new("/tmp/x.bmp"), WallpaperStyle::Span)
            .unwrap_err();
        assert!(matches!(err, Error::Apply(_)));
    }

    #[test]
    fn command_receives_path_last() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("out");
        let script = format!("echo \"$0\" > {}", marker.display());
        let setter =
            CommandSetter::new(&["sh".to_owned(), "-c".to_owned(), script]).unwrap();
        setter
            .apply(Path::new("/data/wallpaper.bmp"), WallpaperStyle::Span)
            .unwrap();
        let written = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(written.trim(), "/data/wallpaper.bmp");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandSetter::new(&[]).is_err());
    }

    #[test]
    fn configured_setter_follows_config_edits() {
        use crate::config::Configuration;

        let config = Arc::new(ConfigStore::in_memory(Configuration {
            apply_command: Some(vec!["true".to_owned()]),
            ..Configuration::default()
        }));
        let setter = ConfiguredSetter::new(config.clone());
        let path = Path::new("/tmp/wallpaper.bmp");
        setter.apply(path, WallpaperStyle::Span).unwrap();

        config
            .update(|cfg| cfg.apply_command = Some(vec!["false".to_owned()]))
            .unwrap();
        assert!(matches!(
            setter.apply(path, WallpaperStyle::Span),
            Err(Error::Apply(_))
        ));
    }
}
