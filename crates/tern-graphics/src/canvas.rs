//! Sixel canvas builder.
//!
//! [`SixelImageBuilder`] implements [`SixelEvents`] and paints the decoded
//! stream into a bounded RGBA buffer. The buffer is allocated at the
//! maximum permitted size up front; a raster-settings event shrinks the
//! active area to what the stream declares. When the stream ends, the
//! buffer is handed to the [`ImagePool`](crate::pool::ImagePool) via
//! [`into_data`](SixelImageBuilder::into_data).
//!
//! Decoder and builder are driven by a single upstream producer and carry
//! no internal synchronization.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::GraphicsError;
use crate::palette::SixelColorPalette;
use crate::protocol::sixel::{Sixel, SixelEvents};
use crate::types::{PixelCoord, PixelSize, RgbColor, RgbaColor};

/// Height of one sixel band in pixels.
const BAND_HEIGHT: u32 = 6;

/// Paints [`SixelEvents`] into a bounded RGBA pixel buffer.
pub struct SixelImageBuilder {
    max_size: PixelSize,
    palette: Rc<RefCell<SixelColorPalette>>,
    size: PixelSize,
    /// Row-major RGBA, resized alongside `size`.
    buffer: Vec<u8>,
    cursor: PixelCoord,
    current_register: u32,
    aspect_numerator: u32,
    aspect_denominator: u32,
}

impl SixelImageBuilder {
    /// Allocates a canvas at `max_size`, cleared to `background`.
    ///
    /// The palette is shared with the upstream sequence handler so that
    /// color registers can persist across consecutive images.
    pub fn new(
        max_size: PixelSize,
        aspect_numerator: u32,
        aspect_denominator: u32,
        background: RgbaColor,
        palette: Rc<RefCell<SixelColorPalette>>,
    ) -> Self {
        let mut builder = Self {
            max_size,
            palette,
            size: max_size,
            buffer: vec![0; max_size.area() * 4],
            cursor: PixelCoord::new(0, 0),
            current_register: 0,
            aspect_numerator,
            aspect_denominator,
        };
        builder.clear(background);
        builder
    }

    /// Resets the cursor to the origin and fills every pixel with `color`.
    pub fn clear(&mut self, color: RgbaColor) {
        self.cursor = PixelCoord::new(0, 0);
        for pixel in self.buffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Reads a pixel, wrapping row and column modulo the current size.
    /// Returns `None` on an empty canvas.
    pub fn at(&self, coord: PixelCoord) -> Option<RgbaColor> {
        if self.size.width == 0 || self.size.height == 0 {
            return None;
        }
        let row = coord.row % self.size.height;
        let column = coord.column % self.size.width;
        let base = (row as usize * self.size.width as usize + column as usize) * 4;
        let pixel = &self.buffer[base..base + 4];
        Some(RgbaColor::new(pixel[0], pixel[1], pixel[2], pixel[3]))
    }

    /// Color selected by the current register.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::EmptyPalette`] when no registers are
    /// active.
    pub fn current_color(&self) -> Result<RgbColor, GraphicsError> {
        self.palette.borrow().at(self.current_register as usize)
    }

    /// Current active size, `<=` [`max_size`](Self::max_size) per
    /// component.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn max_size(&self) -> PixelSize {
        self.max_size
    }

    /// Pixel aspect ratio as `(numerator, denominator)`.
    pub fn aspect_ratio(&self) -> (u32, u32) {
        (self.aspect_numerator, self.aspect_denominator)
    }

    pub fn sixel_cursor(&self) -> PixelCoord {
        self.cursor
    }

    /// The raw RGBA buffer at the current size.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the builder, yielding the finished buffer and its size.
    pub fn into_data(self) -> (PixelSize, Vec<u8>) {
        (self.size, self.buffer)
    }

    fn write(&mut self, coord: PixelCoord, color: RgbColor) {
        if coord.row < self.size.height && coord.column < self.size.width {
            let base = (coord.row as usize * self.size.width as usize + coord.column as usize) * 4;
            self.buffer[base] = color.r;
            self.buffer[base + 1] = color.g;
            self.buffer[base + 2] = color.b;
            self.buffer[base + 3] = 0xFF;
        }
    }
}

impl SixelEvents for SixelImageBuilder {
    fn set_color(&mut self, index: u32, color: RgbColor) {
        self.palette.borrow_mut().set_color(index as usize, color);
    }

    fn use_color(&mut self, index: u32) {
        let palette_size = self.palette.borrow().size();
        if palette_size == 0 {
            log::warn!("sixel color register {index} selected from an empty palette");
        } else {
            self.current_register = index % palette_size as u32;
        }
    }

    fn rewind(&mut self) {
        self.cursor.column = 0;
    }

    fn newline(&mut self) {
        self.cursor.column = 0;
        if self.cursor.row + BAND_HEIGHT < self.size.height {
            self.cursor.row += BAND_HEIGHT;
        }
    }

    fn set_raster(&mut self, pan: u32, pad: u32, size: PixelSize) {
        self.aspect_numerator = pan;
        self.aspect_denominator = pad;
        self.size = PixelSize::new(
            size.width.min(self.max_size.width),
            size.height.min(self.max_size.height),
        );
        // Existing pixel contents are kept; growth zero-fills.
        self.buffer.resize(self.size.area() * 4, 0);
    }

    fn render(&mut self, sixel: Sixel) {
        if self.cursor.column >= self.size.width {
            return;
        }
        match self.current_color() {
            Ok(color) => {
                for i in 0..BAND_HEIGHT {
                    if sixel.bit(i as u8) {
                        let coord =
                            PixelCoord::new(self.cursor.row + i, self.cursor.column);
                        self.write(coord, color);
                    }
                }
            }
            Err(_) => log::warn!("dropping sixel column: color palette is empty"),
        }
        self.cursor.column += 1;
    }
}
