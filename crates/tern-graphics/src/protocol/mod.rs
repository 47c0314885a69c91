//! Inline-image protocol parsers.
//!
//! Currently only DEC Sixel is implemented. The outer escape-sequence
//! parser is responsible for recognizing the DCS introducer and string
//! terminator; these modules consume the payload in between.

pub mod sixel;
