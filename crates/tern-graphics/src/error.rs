//! Error types for the sixel graphics subsystem.

use crate::types::PixelFormat;

/// Errors that can occur while building or pooling images.
///
/// Malformed sixel *input* never produces an error: the decoder falls back
/// to its ground state and reinterprets, as the protocol demands. These
/// variants cover API misuse and data handed to the pool.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    /// A color was requested from a palette with no active entries.
    #[error("color palette is empty")]
    EmptyPalette,

    /// The pixel buffer length does not match the declared dimensions.
    #[error(
        "pixel data size mismatch: got {actual} bytes, expected {expected} for {width}x{height} {format:?}"
    )]
    DataSizeMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}
