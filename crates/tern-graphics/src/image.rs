//! Decoded images and their grid-aligned placement views.
//!
//! An [`Image`] is the immutable product of a finished canvas. A
//! [`RasterizedImage`] binds one image to a grid placement policy and is
//! what the renderer slices into per-cell fragments. Both are created and
//! owned by the [`ImagePool`](crate::pool::ImagePool).

use std::sync::Arc;

use crate::types::{
    CellCoord, CellSpan, ImageAlignment, ImageId, ImageResize, PixelFormat, PixelSize,
    RasterizedImageId, RgbaColor,
};

/// An immutable decoded image.
///
/// Pixel data is row-major with row 0 at the bottom; never mutated after
/// creation.
#[derive(Debug)]
pub struct Image {
    id: ImageId,
    format: PixelFormat,
    data: Vec<u8>,
    size: PixelSize,
}

impl Image {
    pub(crate) fn new(id: ImageId, format: PixelFormat, data: Vec<u8>, size: PixelSize) -> Self {
        Self {
            id,
            format,
            data,
            size,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

/// A placement view binding one [`Image`] to terminal grid dimensions.
///
/// The view shares ownership of its image, so it stays readable even
/// after the pool entry for the image has been reclaimed.
#[derive(Debug, Clone)]
pub struct RasterizedImage {
    id: RasterizedImageId,
    image: Arc<Image>,
    alignment: ImageAlignment,
    resize: ImageResize,
    default_color: RgbaColor,
    cell_span: CellSpan,
    cell_size: PixelSize,
}

impl RasterizedImage {
    pub(crate) fn new(
        id: RasterizedImageId,
        image: Arc<Image>,
        alignment: ImageAlignment,
        resize: ImageResize,
        default_color: RgbaColor,
        cell_span: CellSpan,
        cell_size: PixelSize,
    ) -> Self {
        Self {
            id,
            image,
            alignment,
            resize,
            default_color,
            cell_span,
            cell_size,
        }
    }

    pub fn id(&self) -> RasterizedImageId {
        self.id
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn alignment(&self) -> ImageAlignment {
        self.alignment
    }

    pub fn resize(&self) -> ImageResize {
        self.resize
    }

    pub fn default_color(&self) -> RgbaColor {
        self.default_color
    }

    /// Grid cells this placement spans.
    pub fn cell_span(&self) -> CellSpan {
        self.cell_span
    }

    /// Pixel dimensions of one grid cell.
    pub fn cell_size(&self) -> PixelSize {
        self.cell_size
    }

    /// Extracts the RGBA block covering the grid cell at `pos`.
    ///
    /// The source image stores row 0 at the bottom, so rows are sampled
    /// bottom-up on the way out. Columns past the image's right edge and
    /// rows past its bottom edge are filled with the view's default
    /// color; a cell entirely outside the image yields an all-fill block.
    /// The result is always `cell_size.width * cell_size.height` RGBA
    /// pixels; RGB sources are widened with an opaque alpha.
    ///
    /// Alignment and resize hints are recognized configuration only; the
    /// source is sampled 1:1.
    pub fn fragment(&self, pos: CellCoord) -> Vec<u8> {
        let cell_width = self.cell_size.width as usize;
        let cell_height = self.cell_size.height as usize;
        let offset_column = pos.column.saturating_mul(self.cell_size.width) as usize;
        let offset_row = pos.row.saturating_mul(self.cell_size.height) as usize;

        let image_width = self.image.width() as usize;
        let image_height = self.image.height() as usize;
        let available_width = image_width.saturating_sub(offset_column).min(cell_width);
        let available_height = image_height.saturating_sub(offset_row).min(cell_height);

        let fill = [
            self.default_color.r,
            self.default_color.g,
            self.default_color.b,
            self.default_color.a,
        ];
        let mut fragment = Vec::with_capacity(cell_width * cell_height * 4);

        let bpp = self.image.format().bytes_per_pixel();
        for y in 0..available_height {
            let source_row = offset_row + (available_height - 1 - y);
            let start = (source_row * image_width + offset_column) * bpp;
            let source = &self.image.data()[start..start + available_width * bpp];
            match self.image.format() {
                PixelFormat::Rgba => fragment.extend_from_slice(source),
                // Expand RGB to RGBA with alpha=255.
                PixelFormat::Rgb => {
                    for px in source.chunks_exact(3) {
                        fragment.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
                    }
                }
            }
            for _ in available_width..cell_width {
                fragment.extend_from_slice(&fill);
            }
        }
        for _ in available_height * cell_width..cell_height * cell_width {
            fragment.extend_from_slice(&fill);
        }

        fragment
    }
}
