//! Binary entrypoint for WallFlow.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use wallflow::apply::{ConfiguredSetter, LogOnlySetter, WallpaperSetter};
use wallflow::config::ConfigStore;
use wallflow::displays::{AliasStore, LayoutFile};
use wallflow::paths::AppPaths;
use wallflow::schedule::Scheduler;
use wallflow::service::Service;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "wallflow", version, about = "Per-monitor wallpapers spanned across the desktop")]
struct Cli {
    /// Directory holding config.json, display_aliases.json and scratch files
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// JSON display layout (defaults to <data-dir>/displays.json)
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// Cycle every display once and exit
    #[arg(long)]
    once: bool,

    /// Compose the bitmap but do not touch the desktop
    #[arg(long)]
    dry_run: bool,

    /// Do not read commands from stdin; run the timer only
    #[arg(long)]
    no_control: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("wallflow={level}").parse()?)
        .add_directive("png=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let paths = cli
        .data_dir
        .map_or_else(AppPaths::platform_default, AppPaths::new);
    paths
        .ensure_data_dir()
        .with_context(|| format!("preparing {}", paths.data_dir().display()))?;

    let config = Arc::new(ConfigStore::open(paths.config_file())?);
    let aliases = Arc::new(
        AliasStore::open(paths.aliases_file()).context("opening display aliases")?,
    );
    let layout = cli.layout.unwrap_or_else(|| paths.layout_file());
    let source = LayoutFile::new(layout, aliases.clone());

    let setter: Arc<dyn WallpaperSetter> = if cli.dry_run {
        Arc::new(LogOnlySetter)
    } else {
        Arc::new(ConfiguredSetter::new(config.clone()))
    };

    let service = Arc::new(
        Service::new(paths, config, Box::new(source), setter).with_aliases(aliases),
    );
    service.startup()?;

    if let Err(err) = service.cycle_all() {
        warn!(error = %format!("{err:#}"), "initial cycle failed");
        if cli.once {
            service.shutdown();
            return Err(err);
        }
    }
    if cli.once {
        service.shutdown();
        return Ok(());
    }

    let scheduler = Scheduler::spawn(service.clone()).context("starting timer thread")?;

    if cli.no_control {
        info!("running without control input");
        scheduler.wait();
    } else {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            println!("{}", wallflow::control::HELP);
        }
        let result = wallflow::control::run(&service, stdin.lock(), io::stdout());
        scheduler.stop();
        result?;
    }

    service.shutdown();
    info!("exiting");
    Ok(())
}
