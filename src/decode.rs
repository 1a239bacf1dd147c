//! Streaming PNG row reader.
//!
//! Rows are handed out one at a time, already expanded to 8 bits per
//! channel, together with where they land in the image. Interlaced files
//! yield their Adam7 pass rows in file order; each row then covers every
//! `x_step`-th pixel starting at `x_start`. Nothing larger than one row is
//! ever held in memory.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use png::{BitDepth, ColorType, Transformations};

use crate::error::{Error, Result};

/// `(x_start, y_start, x_step, y_step)` of the seven Adam7 passes.
const ADAM7: [(u32, u32, u32, u32); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

/// Where a decoded row goes in the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPlacement {
    pub y: u32,
    pub x_start: u32,
    pub x_step: u32,
}

#[derive(Debug, Clone)]
struct RowCursor {
    width: u32,
    height: u32,
    interlaced: bool,
    pass: usize,
    line: u32,
}

impl RowCursor {
    const fn new(width: u32, height: u32, interlaced: bool) -> Self {
        Self {
            width,
            height,
            interlaced,
            pass: 0,
            line: 0,
        }
    }

    fn next_placement(&mut self) -> Option<RowPlacement> {
        if !self.interlaced {
            if self.line >= self.height {
                return None;
            }
            let y = self.line;
            self.line += 1;
            return Some(RowPlacement {
                y,
                x_start: 0,
                x_step: 1,
            });
        }

        while let Some(&(x0, y0, dx, dy)) = ADAM7.get(self.pass) {
            let cols = pass_extent(self.width, x0, dx);
            let lines = pass_extent(self.height, y0, dy);
            if cols == 0 || self.line >= lines {
                self.pass += 1;
                self.line = 0;
                continue;
            }
            let y = y0 + self.line * dy;
            self.line += 1;
            return Some(RowPlacement {
                y,
                x_start: x0,
                x_step: dx,
            });
        }
        None
    }
}

fn pass_extent(size: u32, start: u32, step: u32) -> u32 {
    if size <= start {
        0
    } else {
        (size - start).div_ceil(step)
    }
}

/// One decoded row, borrowed from the reader until the next call.
#[derive(Debug)]
pub struct DecodedRow<'a> {
    pub placement: RowPlacement,
    channels: usize,
    data: &'a [u8],
}

impl DecodedRow<'_> {
    /// `(x, rgb)` for every pixel of the row. Gray is replicated, alpha dropped.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, [u8; 3])> + '_ {
        let RowPlacement {
            x_start, x_step, ..
        } = self.placement;
        self.data
            .chunks_exact(self.channels)
            .zip(0u32..)
            .map(move |(px, i)| (x_start + i * x_step, to_rgb(px)))
    }
}

#[inline]
fn to_rgb(px: &[u8]) -> [u8; 3] {
    match px.len() {
        1 | 2 => [px[0], px[0], px[0]],
        _ => [px[0], px[1], px[2]],
    }
}

/// Lazily decodes a PNG file row by row. Finite and not restartable.
pub struct PngRowReader {
    path: PathBuf,
    reader: png::Reader<BufReader<File>>,
    cursor: RowCursor,
    channels: usize,
}

impl PngRowReader {
    /// Open `path` and read the header.
    ///
    /// # Errors
    /// Returns [`Error::Decode`] if the file cannot be opened or is not a
    /// decodable PNG.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::decode(path, e))?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let reader = decoder.read_info().map_err(|e| Error::decode(path, e))?;

        let info = reader.info();
        let cursor = RowCursor::new(info.width, info.height, info.interlaced);
        let channels = match reader.output_color_type() {
            (ColorType::Grayscale, BitDepth::Eight) => 1,
            (ColorType::GrayscaleAlpha, BitDepth::Eight) => 2,
            (ColorType::Rgb, BitDepth::Eight) => 3,
            (ColorType::Rgba, BitDepth::Eight) => 4,
            (color, depth) => {
                return Err(Error::decode(
                    path,
                    format!("unexpected output layout {color:?}/{depth:?}"),
                ));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            cursor,
            channels,
        })
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.cursor.width, self.cursor.height)
    }

    /// Decode the next row, or `Ok(None)` once the image is exhausted.
    ///
    /// # Errors
    /// Returns [`Error::Decode`] on corrupt or truncated data.
    pub fn next_row(&mut self) -> Result<Option<DecodedRow<'_>>> {
        let row = self
            .reader
            .next_row()
            .map_err(|e| Error::decode(&self.path, e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let placement = self
            .cursor
            .next_placement()
            .ok_or_else(|| Error::decode(&self.path, "more rows than the header declares"))?;
        Ok(Some(DecodedRow {
            placement,
            channels: self.channels,
            data: row.data(),
        }))
    }
}
