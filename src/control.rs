//! Line-oriented control shell on stdin.
//!
//! Stands in for a tray menu: every command maps to one user-triggered
//! request and runs on the reading thread.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::service::Service;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `next` cycles every display, `next <display>` only one.
    Next(Option<String>),
    Redraw,
    Shuffle,
    Dir(PathBuf),
    Displays,
    Alias { display: String, alias: String },
    Reload,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  next [display]        cycle all displays, or one by id/alias
  redraw                repaint the current wallpapers
  shuffle               toggle shuffling
  dir <path>            change the wallpaper directory
  displays              list displays and their wallpapers
  alias <display> <name> rename a display
  reload                re-read the display layout
  quit                  exit";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let command = match (verb, rest) {
        ("next", "") => ControlCommand::Next(None),
        ("next", display) => ControlCommand::Next(Some(display.to_owned())),
        ("redraw", "") => ControlCommand::Redraw,
        ("shuffle", "") => ControlCommand::Shuffle,
        ("dir", "") => return Err("dir needs a path".into()),
        ("dir", path) => ControlCommand::Dir(PathBuf::from(path)),
        ("displays", "") => ControlCommand::Displays,
        ("alias", args) => {
            let (display, alias) = args
                .split_once(char::is_whitespace)
                .map(|(d, a)| (d, a.trim()))
                .filter(|(_, a)| !a.is_empty())
                .ok_or("alias needs a display and a name")?;
            ControlCommand::Alias {
                display: display.to_owned(),
                alias: alias.to_owned(),
            }
        }
        ("reload", "") => ControlCommand::Reload,
        ("help" | "?", _) => ControlCommand::Help,
        ("quit" | "exit", _) => ControlCommand::Quit,
        _ => return Err(format!("unknown command: {line}")),
    };
    Ok(Some(command))
}

/// Read commands until `quit` or end of input.
pub fn run<R: BufRead, W: Write>(service: &Service, input: R, mut out: W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(out, "{msg}")?;
                continue;
            }
        };
        if command == ControlCommand::Quit {
            info!("quit requested");
            return Ok(());
        }
        if let Err(err) = execute(service, command, &mut out) {
            warn!(error = %format!("{err:#}"), "command failed");
            writeln!(out, "error: {err:#}")?;
        }
    }
    info!("control input closed");
    Ok(())
}

fn execute<W: Write>(service: &Service, command: ControlCommand, out: &mut W) -> Result<()> {
    match command {
        ControlCommand::Next(None) => {
            let report = service.cycle_all()?;
            writeln!(out, "cycled {} display(s)", report.assignments.len())?;
        }
        ControlCommand::Next(Some(display)) => {
            service.cycle_display(&display)?;
            writeln!(out, "cycled {display}")?;
        }
        ControlCommand::Redraw => {
            service.redraw()?;
        }
        ControlCommand::Shuffle => {
            let on = service.toggle_shuffle()?;
            writeln!(out, "shuffle {}", if on { "on" } else { "off" })?;
        }
        ControlCommand::Dir(path) => {
            service.set_wallpaper_dir(path)?;
        }
        ControlCommand::Displays => {
            for display in service.displays() {
                let current = service
                    .compositor()
                    .current_wallpaper(&display.id)
                    .map_or_else(|| "-".to_owned(), |p| p.display().to_string());
                writeln!(out, "{display} {current}")?;
            }
        }
        ControlCommand::Alias { display, alias } => {
            service.rename_display(&display, &alias)?;
        }
        ControlCommand::Reload => {
            let changed = service.refresh_displays()?;
            writeln!(out, "displays {}", if changed { "changed" } else { "unchanged" })?;
        }
        ControlCommand::Help => writeln!(out, "{HELP}")?,
        ControlCommand::Quit => {}
    }
    Ok(())
}
