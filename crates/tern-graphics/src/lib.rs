//! Sixel graphics support for the tern terminal emulator.
//!
//! This crate decodes the DEC Sixel inline-image protocol into pixel
//! rasters and manages the pooled lifecycle of decoded images so the
//! renderer can slice them into per-grid-cell fragments. It handles:
//!
//! - **Protocol decoding**: a character-level state machine over the
//!   sixel stream, emitting paint events
//! - **Canvas building**: painting those events into a bounded RGBA
//!   buffer with palette semantics
//! - **Image storage**: an address-stable pool with handle-driven
//!   reclamation and name aliases
//! - **Fragment extraction**: per-cell RGBA blocks for texture upload
//!
//! # Architecture
//!
//! ```text
//! DCS payload characters (from the escape-sequence parser)
//!     │
//!     ▼
//! protocol::sixel::SixelParser        ← state machine, emits SixelEvents
//!     │
//!     ▼
//! canvas::SixelImageBuilder           ← paints into the RGBA canvas
//!     │  into_data()
//!     ▼
//! pool::ImagePool::create()           ← pooled, address-stable Image
//! pool::ImagePool::rasterize()        ← grid placement view
//!     │
//!     ▼
//! image::RasterizedImage::fragment()  ← per-cell RGBA block for the renderer
//! ```
//!
//! # Pixel format
//!
//! Canvases and pooled images are row-major RGBA8 with row 0 at the
//! bottom; [`RasterizedImage::fragment`] flips rows on extraction.
//!
//! # Threading
//!
//! Decoding is strictly single-producer. Pool handles may be dropped on
//! any thread; reclamation requests queue on an internal channel and the
//! owning thread applies them in [`ImagePool::drain_discards`].

pub mod canvas;
pub mod error;
pub mod image;
pub mod palette;
pub mod pool;
pub mod protocol;
pub mod types;

// Re-export primary types for convenience.
pub use canvas::SixelImageBuilder;
pub use error::GraphicsError;
pub use image::{Image, RasterizedImage};
pub use palette::SixelColorPalette;
pub use pool::{ImageHandle, ImagePool, RasterizedHandle};
pub use protocol::sixel::{parse_sequence, Sixel, SixelEvents, SixelParser};
pub use types::{
    CellCoord, CellSpan, ImageAlignment, ImageId, ImageResize, PixelCoord, PixelFormat, PixelSize,
    RasterizedImageId, RgbColor, RgbaColor,
};
