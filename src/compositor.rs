//! Composes every display's wallpaper into one spanning bitmap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::apply::{WallpaperSetter, WallpaperStyle};
use crate::canvas::{Canvas, CanvasSize, PLACEHOLDER_COLOR, compute_canvas_size};
use crate::decode::PngRowReader;
use crate::displays::Display;
use crate::error::{Error, Result};
use crate::output::write_bitmap;
use crate::repo::ImageRepository;
use crate::scratch::ScratchBufferManager;

/// What ended up in one display's rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paint {
    Image(PathBuf),
    /// No candidate was available.
    Placeholder,
    /// The candidate could not be decoded.
    Fallback { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub display_id: String,
    pub paint: Paint,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub canvas: CanvasSize,
    /// `None` when there was nothing to draw.
    pub output: Option<PathBuf>,
    pub assignments: Vec<Assignment>,
}

impl CycleReport {
    fn empty(canvas: CanvasSize) -> Self {
        Self {
            canvas,
            output: None,
            assignments: Vec::new(),
        }
    }

    pub fn paint_for(&self, display_id: &str) -> Option<&Paint> {
        self.assignments
            .iter()
            .find(|a| a.display_id == display_id)
            .map(|a| &a.paint)
    }
}

/// Fill the display's rectangle with the placeholder color.
pub fn paint_placeholder(canvas: &mut Canvas<'_>, display: &Display) {
    canvas.fill_rect(display, PLACEHOLDER_COLOR);
}

/// Stream `path` into the display's rectangle, one decoded row at a time.
///
/// # Errors
/// Returns [`Error::Decode`] if the file is not a decodable PNG of exactly the
/// display's size. Rows decoded before the failure stay in the canvas.
pub fn paint_image(canvas: &mut Canvas<'_>, path: &Path, display: &Display) -> Result<()> {
    let mut rows = PngRowReader::open(path)?;
    let (width, height) = rows.dimensions();
    if (width, height) != (display.width, display.height) {
        return Err(Error::decode(
            path,
            format!(
                "image is {width}x{height}, display is {}x{}",
                display.width, display.height
            ),
        ));
    }
    while let Some(row) = rows.next_row()? {
        let y = row.placement.y;
        for (x, rgb) in row.pixels() {
            canvas.put(display, x, y, rgb);
        }
    }
    Ok(())
}

/// Paint an image, or the placeholder when there is none or it fails to decode.
pub fn paint_display(canvas: &mut Canvas<'_>, image: Option<&Path>, display: &Display) -> Paint {
    let id = &display.id;
    let Some(path) = image else {
        info!(display = %id, "no image found for display");
        paint_placeholder(canvas, display);
        return Paint::Placeholder;
    };
    debug!(display = %id, path = %path.display(), "applying image to display");
    match paint_image(canvas, path, display) {
        Ok(()) => Paint::Image(path.to_path_buf()),
        Err(err) => {
            warn!(display = %id, error = %err, "falling back to placeholder");
            paint_placeholder(canvas, display);
            Paint::Fallback {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }
}

/// Owns the cycle lock and the per-display memory of what is on screen.
pub struct Compositor {
    repo: Arc<ImageRepository>,
    buffers: Arc<ScratchBufferManager>,
    setter: Arc<dyn WallpaperSetter>,
    output: PathBuf,
    current: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl Compositor {
    pub fn new(
        repo: Arc<ImageRepository>,
        buffers: Arc<ScratchBufferManager>,
        setter: Arc<dyn WallpaperSetter>,
        output: PathBuf,
    ) -> Self {
        Self {
            repo,
            buffers,
            setter,
            output,
            current: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Image last applied to `display_id`, if any.
    pub fn current_wallpaper(&self, display_id: &str) -> Option<PathBuf> {
        self.current.lock().get(display_id).cloned().flatten()
    }

    /// Advance every display to its next image and apply the result.
    ///
    /// # Errors
    /// Fails if the scratch buffer cannot be created, the bitmap cannot be
    /// written, or the desktop rejects it. The previous background and the
    /// remembered assignments stay as they were.
    #[instrument(skip_all, fields(displays = displays.len()))]
    pub fn cycle_all(&self, displays: &[Display]) -> Result<CycleReport> {
        let mut current = self.current.lock();
        let started = Instant::now();
        let choices: Vec<Option<PathBuf>> = displays.iter().map(|d| self.next_for(d)).collect();
        let report = self.compose(displays, &choices)?;
        remember(&mut current, displays, choices);
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "cycled all displays");
        Ok(report)
    }

    /// Advance only `display_id`; every other display keeps its current image.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no display has that id, otherwise as
    /// [`cycle_all`](Self::cycle_all).
    #[instrument(skip(self, displays))]
    pub fn cycle_one(&self, displays: &[Display], display_id: &str) -> Result<CycleReport> {
        let mut current = self.current.lock();
        if !displays.iter().any(|d| d.id == display_id) {
            return Err(Error::NotFound(format!("display {display_id}")));
        }
        let started = Instant::now();
        let choices: Vec<Option<PathBuf>> = displays
            .iter()
            .map(|d| {
                if d.id == display_id {
                    self.next_for(d)
                } else {
                    current.get(&d.id).cloned().flatten()
                }
            })
            .collect();
        let report = self.compose(displays, &choices)?;
        remember(&mut current, displays, choices);
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "cycled display");
        Ok(report)
    }

    /// Repaint every display from its remembered image without advancing.
    ///
    /// # Errors
    /// As [`cycle_all`](Self::cycle_all).
    #[instrument(skip_all, fields(displays = displays.len()))]
    pub fn redraw_current(&self, displays: &[Display]) -> Result<CycleReport> {
        let current = self.current.lock();
        let choices: Vec<Option<PathBuf>> = displays
            .iter()
            .map(|d| current.get(&d.id).cloned().flatten())
            .collect();
        self.compose(displays, &choices)
    }

    fn next_for(&self, monitor: &Display) -> Option<PathBuf> {
        match self.repo.get_next_image(monitor.width, monitor.height) {
            Ok(next) => next,
            Err(err) => {
                warn!(display = %monitor.id, error = %err, "could not pick next image");
                None
            }
        }
    }

    fn compose(&self, displays: &[Display], choices: &[Option<PathBuf>]) -> Result<CycleReport> {
        let size = compute_canvas_size(displays);
        if size.is_empty() {
            debug!("no displays; nothing to compose");
            return Ok(CycleReport::empty(size));
        }
        info!(width = size.width, height = size.height, "creating buffer for canvas");
        let key = self.buffers.create_buffer(size.byte_len())?;
        let rendered = self.render(key, size, displays, choices);
        self.buffers.delete_buffer(key);
        let assignments = rendered?;

        let output = std::path::absolute(&self.output)?;
        self.setter.apply(&output, WallpaperStyle::Span)?;
        Ok(CycleReport {
            canvas: size,
            output: Some(output),
            assignments,
        })
    }

    fn render(
        &self,
        key: u16,
        size: CanvasSize,
        displays: &[Display],
        choices: &[Option<PathBuf>],
    ) -> Result<Vec<Assignment>> {
        let shared = self.buffers.get_buffer(key)?;
        let mut buffer = shared.lock();
        let mut canvas = Canvas::new(size, buffer.as_mut_slice())?;
        canvas.clear();

        let assignments = displays
            .iter()
            .zip(choices)
            .map(|(display, choice)| Assignment {
                display_id: display.id.clone(),
                paint: paint_display(&mut canvas, choice.as_deref(), display),
            })
            .collect();

        write_bitmap(&self.output, canvas.as_bytes(), size)?;
        Ok(assignments)
    }
}

fn remember(
    current: &mut HashMap<String, Option<PathBuf>>,
    displays: &[Display],
    choices: Vec<Option<PathBuf>>,
) {
    for (display, choice) in displays.iter().zip(choices) {
        current.insert(display.id.clone(), choice);
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn paint_display_logs_and_falls_back() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let display = Display::new("DP-1", 1, 0, 2, 1);
            let size = CanvasSize {
                width: 3,
                height: 1,
            };
            let mut bytes = vec![0u8; size.byte_len()];
            let mut canvas = Canvas::new(size, &mut bytes).unwrap();

            assert_eq!(
                paint_display(&mut canvas, None, &display),
                Paint::Placeholder
            );
            let missing = Path::new("/nonexistent/wallpaper.png");
            assert!(matches!(
                paint_display(&mut canvas, Some(missing), &display),
                Paint::Fallback { .. }
            ));
            assert_eq!(&bytes[..3], &[0, 0, 0]);
            assert_eq!(&bytes[3..6], &PLACEHOLDER_COLOR);
        });
    }
}
