//! Indexed color palette for sixel decoding.
//!
//! Sixel color registers live in a resizable table with a hard upper
//! bound. The table seeds itself with the VT340 default palette, which
//! must stay byte-exact: applications that never define colors rely on
//! these registers.

use crate::error::GraphicsError;
use crate::types::RgbColor;

/// The VT340 default color table.
///
/// Reference: <https://www.vt100.net/docs/vt3xx-gp/chapter2.html#S2.4>
pub const DEFAULT_COLORS: [RgbColor; 16] = [
    RgbColor::new(0, 0, 0),       //  0: black
    RgbColor::new(51, 51, 204),   //  1: blue
    RgbColor::new(204, 33, 33),   //  2: red
    RgbColor::new(51, 204, 51),   //  3: green
    RgbColor::new(204, 51, 204),  //  4: magenta
    RgbColor::new(51, 204, 204),  //  5: cyan
    RgbColor::new(204, 204, 51),  //  6: yellow
    RgbColor::new(135, 135, 135), //  7: gray 50%
    RgbColor::new(66, 66, 66),    //  8: gray 25%
    RgbColor::new(84, 84, 153),   //  9: less saturated blue
    RgbColor::new(153, 66, 66),   // 10: less saturated red
    RgbColor::new(84, 153, 84),   // 11: less saturated green
    RgbColor::new(153, 84, 153),  // 12: less saturated magenta
    RgbColor::new(84, 153, 153),  // 13: less saturated cyan
    RgbColor::new(153, 153, 84),  // 14: less saturated yellow
    RgbColor::new(204, 204, 204), // 15: gray 75%
];

/// Resizable color register table with a fixed capacity ceiling.
///
/// The active size never exceeds `max_size`. Growing the table (via
/// [`set_size`](Self::set_size) or an out-of-range
/// [`set_color`](Self::set_color)) zero-fills the new registers; defaults
/// are only re-seeded by [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct SixelColorPalette {
    palette: Vec<RgbColor>,
    max_size: usize,
}

impl SixelColorPalette {
    /// Creates a palette with `size` active registers (clamped to
    /// `max_size`), seeded with the VT340 defaults.
    pub fn new(size: usize, max_size: usize) -> Self {
        let mut palette = Self {
            palette: vec![RgbColor::default(); size.min(max_size)],
            max_size,
        };
        palette.reset();
        palette
    }

    /// Re-seeds registers `0..min(size, 16)` with the VT340 defaults.
    /// Registers beyond the default table keep their current values.
    pub fn reset(&mut self) {
        let n = self.palette.len().min(DEFAULT_COLORS.len());
        self.palette[..n].copy_from_slice(&DEFAULT_COLORS[..n]);
    }

    /// Number of active registers.
    pub fn size(&self) -> usize {
        self.palette.len()
    }

    /// Grows or shrinks the active register range, clamped to
    /// `[0, max_size]`. New registers are zero-filled, not re-seeded.
    pub fn set_size(&mut self, new_size: usize) {
        self.palette
            .resize(new_size.min(self.max_size), RgbColor::default());
    }

    /// Hard capacity ceiling.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    /// Stores `color` at `index`, growing the active range to cover it.
    /// Indices at or beyond the capacity ceiling are silently ignored.
    pub fn set_color(&mut self, index: usize, color: RgbColor) {
        if index < self.max_size {
            if index >= self.palette.len() {
                self.set_size(index + 1);
            }
            self.palette[index] = color;
        }
    }

    /// Looks up a register, wrapping `index` modulo the active size.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::EmptyPalette`] when no registers are
    /// active.
    pub fn at(&self, index: usize) -> Result<RgbColor, GraphicsError> {
        if self.palette.is_empty() {
            return Err(GraphicsError::EmptyPalette);
        }
        Ok(self.palette[index % self.palette.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_is_vt340() {
        let palette = SixelColorPalette::new(16, 256);
        for (i, expected) in DEFAULT_COLORS.iter().enumerate() {
            assert_eq!(palette.at(i).unwrap(), *expected, "register {i}");
        }
    }

    #[test]
    fn test_lookup_wraps_modulo_size() {
        let palette = SixelColorPalette::new(16, 256);
        assert_eq!(palette.at(16).unwrap(), DEFAULT_COLORS[0]);
        assert_eq!(palette.at(35).unwrap(), DEFAULT_COLORS[3]);
    }

    #[test]
    fn test_empty_palette_errors() {
        let palette = SixelColorPalette::new(0, 256);
        assert!(matches!(palette.at(0), Err(GraphicsError::EmptyPalette)));
    }

    #[test]
    fn test_set_color_grows_active_range() {
        let mut palette = SixelColorPalette::new(4, 256);
        palette.set_color(100, RgbColor::new(1, 2, 3));
        assert_eq!(palette.size(), 101);
        assert_eq!(palette.at(100).unwrap(), RgbColor::new(1, 2, 3));
        // Slots between old and new size are zero-filled, not defaults.
        assert_eq!(palette.at(50).unwrap(), RgbColor::default());
    }

    #[test]
    fn test_set_color_beyond_capacity_ignored() {
        let mut palette = SixelColorPalette::new(4, 8);
        palette.set_color(8, RgbColor::new(9, 9, 9));
        assert_eq!(palette.size(), 4);
    }

    #[test]
    fn test_set_size_clamps_to_max() {
        let mut palette = SixelColorPalette::new(4, 8);
        palette.set_size(100);
        assert_eq!(palette.size(), 8);
        palette.set_size(0);
        assert_eq!(palette.size(), 0);
    }

    #[test]
    fn test_growth_does_not_reseed_defaults() {
        let mut palette = SixelColorPalette::new(2, 256);
        palette.set_size(16);
        // Register 5 would be cyan after a reset; growth leaves it zeroed.
        assert_eq!(palette.at(5).unwrap(), RgbColor::default());
        palette.reset();
        assert_eq!(palette.at(5).unwrap(), DEFAULT_COLORS[5]);
    }

    #[test]
    fn test_constructor_clamps_size() {
        let palette = SixelColorPalette::new(64, 16);
        assert_eq!(palette.size(), 16);
        assert_eq!(palette.max_size(), 16);
    }
}
