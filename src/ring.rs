//! Circular cursor over wallpaper paths.

use std::path::PathBuf;

/// A ring of paths with a cursor that starts *before* the first item, so the
/// first [`advance`](WallpaperRing::advance) yields index 0.
#[derive(Debug, Clone, Default)]
pub struct WallpaperRing {
    items: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl WallpaperRing {
    /// Construct a ring from a list of paths. An empty list is allowed.
    #[must_use]
    pub const fn from_vec(items: Vec<PathBuf>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    /// Number of items contained.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the ring is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Advance and return the next item, wrapping at the end. `None` when empty.
    pub fn advance(&mut self) -> Option<&PathBuf> {
        if self.items.is_empty() {
            return None;
        }
        let next = self.cursor.map_or(0, |i| (i + 1) % self.items.len());
        self.cursor = Some(next);
        self.items.get(next)
    }

    /// Borrow the internal list (read-only).
    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(names: &[&str]) -> WallpaperRing {
        WallpaperRing::from_vec(names.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn first_advance_yields_first_item() {
        let mut r = ring(&["a", "b", "c"]);
        assert_eq!(r.advance(), Some(&PathBuf::from("a")));
        assert_eq!(r.advance(), Some(&PathBuf::from("b")));
    }

    #[test]
    fn wraps_around() {
        let mut r = ring(&["a", "b"]);
        let seen: Vec<PathBuf> = (0..5).filter_map(|_| r.advance().cloned()).collect();
        let expected: Vec<PathBuf> = ["a", "b", "a", "b", "a"].iter().map(PathBuf::from).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn empty_ring_has_nothing() {
        let mut r = ring(&[]);
        assert!(r.advance().is_none());
        assert!(r.is_empty());
    }
}
