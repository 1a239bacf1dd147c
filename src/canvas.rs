//! The flat RGB canvas spanning every display.

use crate::displays::Display;
use crate::error::{Error, Result};

/// Bytes per canvas pixel (RGB, no alpha).
pub const BYTES_PER_PIXEL: usize = 3;

/// Painted over a display that has no usable wallpaper.
pub const PLACEHOLDER_COLOR: [u8; 3] = [0x46, 0x2e, 0x65];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size in bytes of an RGB raster of these dimensions.
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// Bounding size of all displays. Displays are expected to be offset
/// corrected already; negative origins are not corrected here.
pub fn compute_canvas_size(displays: &[Display]) -> CanvasSize {
    displays
        .iter()
        .fold(CanvasSize::default(), |acc, d| CanvasSize {
            width: acc.width.max(offset(d.x).saturating_add(d.width)),
            height: acc.height.max(offset(d.y).saturating_add(d.height)),
        })
}

fn offset(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

/// Mutable view of an RGB raster. Writes outside the canvas are clipped.
#[derive(Debug)]
pub struct Canvas<'a> {
    size: CanvasSize,
    pixels: &'a mut [u8],
}

impl<'a> Canvas<'a> {
    /// # Errors
    /// Returns [`Error::Resource`] if `pixels` is smaller than the canvas.
    pub fn new(size: CanvasSize, pixels: &'a mut [u8]) -> Result<Self> {
        if pixels.len() < size.byte_len() {
            return Err(Error::Resource(format!(
                "canvas {}x{} needs {} bytes, buffer has {}",
                size.width,
                size.height,
                size.byte_len(),
                pixels.len()
            )));
        }
        Ok(Self { size, pixels })
    }

    pub const fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels[..self.size.byte_len()]
    }

    /// Paint the whole canvas black.
    pub fn clear(&mut self) {
        let len = self.size.byte_len();
        self.pixels[..len].fill(0);
    }

    /// Fill the display's rectangle with a solid color.
    pub fn fill_rect(&mut self, display: &Display, color: [u8; 3]) {
        let (x0, x1) = self.clip_span(display.x, display.width);
        if x0 >= x1 {
            return;
        }
        for row in 0..display.height {
            let Some(y) = self.clip_row(display.y, row) else {
                continue;
            };
            let start = self.offset_of(x0, y);
            let end = self.offset_of(x1, y);
            for px in self.pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&color);
            }
        }
    }

    /// Write one pixel at display-relative coordinates.
    #[inline]
    pub fn put(&mut self, display: &Display, col: u32, row: u32, rgb: [u8; 3]) {
        if col >= display.width || row >= display.height {
            return;
        }
        let (Some(x), Some(y)) = (self.clip_col(display.x, col), self.clip_row(display.y, row))
        else {
            return;
        };
        let at = self.offset_of(x, y);
        self.pixels[at..at + BYTES_PER_PIXEL].copy_from_slice(&rgb);
    }

    fn offset_of(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    fn clip_col(&self, origin: i32, col: u32) -> Option<u32> {
        let x = i64::from(origin) + i64::from(col);
        (0..i64::from(self.size.width)).contains(&x).then(|| x as u32)
    }

    fn clip_row(&self, origin: i32, row: u32) -> Option<u32> {
        let y = i64::from(origin) + i64::from(row);
        (0..i64::from(self.size.height)).contains(&y).then(|| y as u32)
    }

    fn clip_span(&self, origin: i32, width: u32) -> (u32, u32) {
        let limit = i64::from(self.size.width);
        let start = i64::from(origin).clamp(0, limit);
        let end = (i64::from(origin) + i64::from(width)).clamp(0, limit);
        (start as u32, end as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Copy the display's rectangle out of a flat RGB raster of `size`.
    fn region_of(pixels: &[u8], size: CanvasSize, display: &Display) -> Vec<u8> {
        let mut out = Vec::with_capacity(display.width as usize * display.height as usize * 3);
        let x0 = offset(display.x).min(size.width) as usize;
        let x1 = (offset(display.x).saturating_add(display.width)).min(size.width) as usize;
        for row in 0..display.height {
            let y = offset(display.y).saturating_add(row);
            if y >= size.height {
                break;
            }
            let base = y as usize * size.width as usize;
            out.extend_from_slice(&pixels[(base + x0) * 3..(base + x1) * 3]);
        }
        out
    }

    #[test]
    fn canvas_spans_side_by_side_displays() {
        let displays = vec![
            Display::new("a", 0, 0, 1920, 1080),
            Display::new("b", 1920, 0, 1280, 1024),
        ];
        assert_eq!(
            compute_canvas_size(&displays),
            CanvasSize {
                width: 3200,
                height: 1080
            }
        );
    }

    #[test]
    fn empty_display_list_is_empty_canvas() {
        let size = compute_canvas_size(&[]);
        assert!(size.is_empty());
        assert_eq!(size.byte_len(), 0);
    }

    #[test]
    fn fill_rect_touches_only_its_display() {
        let size = CanvasSize {
            width: 4,
            height: 2,
        };
        let mut bytes = vec![0u8; size.byte_len()];
        let mut canvas = Canvas::new(size, &mut bytes).unwrap();
        let right = Display::new("r", 2, 0, 2, 2);
        canvas.fill_rect(&right, PLACEHOLDER_COLOR);

        let left = Display::new("l", 0, 0, 2, 2);
        assert!(region_of(canvas.as_bytes(), size, &left).iter().all(|b| *b == 0));
        assert!(
            region_of(canvas.as_bytes(), size, &right)
                .chunks_exact(3)
                .all(|px| px == PLACEHOLDER_COLOR)
        );
    }

    #[test]
    fn writes_outside_canvas_are_clipped() {
        let size = CanvasSize {
            width: 2,
            height: 2,
        };
        let mut bytes = vec![0u8; size.byte_len()];
        let mut canvas = Canvas::new(size, &mut bytes).unwrap();
        let overhanging = Display::new("o", 1, 1, 4, 4);
        canvas.fill_rect(&overhanging, [1, 2, 3]);
        canvas.put(&overhanging, 3, 3, [9, 9, 9]);
        assert_eq!(&bytes[9..12], &[1, 2, 3]);
        assert_eq!(&bytes[0..3], &[0, 0, 0]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let size = CanvasSize {
            width: 10,
            height: 10,
        };
        let mut bytes = vec![0u8; 10];
        assert!(Canvas::new(size, &mut bytes).is_err());
    }
}
