//! DEC Sixel stream parser.
//!
//! Consumes the body of a sixel DCS sequence (everything between the
//! introducer and the string terminator, both of which the outer
//! escape-sequence parser strips before feeding characters here) and
//! emits paint events on a [`SixelEvents`] sink.
//!
//! # Grammar
//!
//! ```text
//! '?'..'~'   one sixel: a 6-bit vertical pixel column (codepoint - 63)
//! '!' Ps     repeat introducer: next sixel is rendered Ps times
//! '#' Ps     color introducer: select register, or with 5 params define one
//! '"' Ps     raster settings: pan ; pad ; width ; height
//! '$'        carriage return: back to column 0, same band
//! '-'        newline: column 0, next 6-pixel band
//! ```
//!
//! Parameter collection is forcibly truncated by any introducer character,
//! so malformed input degrades to reinterpretation instead of an error.
//!
//! Reference: <https://www.vt100.net/docs/vt3xx-gp/chapter14.html>

use crate::types::{PixelSize, RgbColor};

/// Upper bound for `!` repeat counts. Real images never exceed the canvas
/// width; without the cap a hostile `!4294967295~` stalls the decoder.
const MAX_REPEAT: u32 = 0xFFFF;

/// A single sixel: a 6-bit vertical column of pixels where bit *i*
/// selects row offset *i* within the current band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sixel(u8);

impl Sixel {
    /// Sixel data characters are the codepoints 63 (`?`) through 126 (`~`).
    pub fn from_char(value: char) -> Option<Self> {
        match u32::from(value) {
            cp @ 63..=126 => Some(Self((cp - 63) as u8)),
            _ => None,
        }
    }

    /// The raw 6-bit value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether bit `i` (row offset `i`) is set.
    pub fn bit(self, i: u8) -> bool {
        (self.0 >> i) & 1 != 0
    }
}

/// Event sink driven by [`SixelParser`].
///
/// The canvas builder implements this to paint pixels; anything else
/// implementing the six methods can be substituted, e.g. a recording sink
/// in tests.
pub trait SixelEvents {
    /// Defines a new color at the given register index.
    fn set_color(&mut self, index: u32, color: RgbColor);

    /// Selects the color register used for subsequent paints.
    fn use_color(&mut self, index: u32);

    /// Moves the sixel cursor back to the left border of the current band.
    fn rewind(&mut self);

    /// Moves the sixel cursor to the left border of the next band.
    fn newline(&mut self);

    /// Declares the pixel aspect ratio (`pan / pad`) and image dimensions
    /// for the upcoming pixel data.
    fn set_raster(&mut self, pan: u32, pad: u32, size: PixelSize);

    /// Renders one sixel at the current cursor position.
    fn render(&mut self, sixel: Sixel);
}

impl<E: SixelEvents + ?Sized> SixelEvents for &mut E {
    fn set_color(&mut self, index: u32, color: RgbColor) {
        (**self).set_color(index, color);
    }

    fn use_color(&mut self, index: u32) {
        (**self).use_color(index);
    }

    fn rewind(&mut self) {
        (**self).rewind();
    }

    fn newline(&mut self) {
        (**self).newline();
    }

    fn set_raster(&mut self, pan: u32, pad: u32, size: PixelSize) {
        (**self).set_raster(pan, pad, size);
    }

    fn render(&mut self, sixel: Sixel) {
        (**self).render(sixel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Sixel data and introducers.
    Ground,
    /// `!`, collecting the repeat count.
    RepeatIntroducer,
    /// `#`, waiting for the first register digit.
    ColorIntroducer,
    /// Collecting color parameters.
    ColorParam,
    /// `"`, collecting pan ; pad ; width ; height.
    RasterSettings,
}

/// Streaming sixel parser.
///
/// Feed Unicode scalar values one at a time with [`parse`](Self::parse)
/// (or in batches with [`parse_fragment`](Self::parse_fragment)) and end
/// the stream with exactly one [`finish`](Self::finish) call, which
/// flushes any pending construct and returns the event sink.
pub struct SixelParser<E: SixelEvents> {
    state: State,
    params: Vec<u32>,
    events: E,
    on_finish: Option<Box<dyn FnOnce()>>,
}

impl<E: SixelEvents> SixelParser<E> {
    pub fn new(events: E) -> Self {
        Self {
            state: State::Ground,
            params: Vec::new(),
            events,
            on_finish: None,
        }
    }

    /// Like [`new`](Self::new), with a completion callback invoked by
    /// [`finish`](Self::finish) after the final flush.
    pub fn with_finalizer(events: E, on_finish: impl FnOnce() + 'static) -> Self {
        Self {
            on_finish: Some(Box::new(on_finish)),
            ..Self::new(events)
        }
    }

    /// Feeds one character of the sixel stream.
    pub fn parse(&mut self, value: char) {
        match self.state {
            State::Ground => self.fallback(value),

            State::RepeatIntroducer => {
                if let Some(digit) = to_digit(value) {
                    self.shift_param(digit);
                } else if let Some(sixel) = Sixel::from_char(value) {
                    let count = self.params.first().copied().unwrap_or(0);
                    for _ in 0..count.min(MAX_REPEAT) {
                        self.events.render(sixel);
                    }
                    self.transition_to(State::Ground);
                } else {
                    self.fallback(value);
                }
            }

            State::ColorIntroducer => {
                if let Some(digit) = to_digit(value) {
                    self.shift_param(digit);
                    self.transition_to(State::ColorParam);
                } else {
                    self.fallback(value);
                }
            }

            State::ColorParam | State::RasterSettings => {
                if let Some(digit) = to_digit(value) {
                    self.shift_param(digit);
                } else if value == ';' {
                    self.params.push(0);
                } else {
                    self.fallback(value);
                }
            }
        }
    }

    /// Feeds every character of `fragment`.
    pub fn parse_fragment(&mut self, fragment: &str) {
        for value in fragment.chars() {
            self.parse(value);
        }
    }

    /// Ends the stream: forces a final transition to ground (firing any
    /// pending leave-state action exactly once), invokes the completion
    /// callback, and hands the event sink back to the caller.
    pub fn finish(mut self) -> E {
        self.transition_to(State::Ground);
        if let Some(on_finish) = self.on_finish.take() {
            on_finish();
        }
        self.events
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Re-dispatches a character through the ground-entry rules, forcibly
    /// truncating whatever construct was being collected.
    fn fallback(&mut self, value: char) {
        match value {
            '#' => self.transition_to(State::ColorIntroducer),
            '!' => self.transition_to(State::RepeatIntroducer),
            '"' => self.transition_to(State::RasterSettings),
            '$' => {
                self.transition_to(State::Ground);
                self.events.rewind();
            }
            '-' => {
                self.transition_to(State::Ground);
                self.events.newline();
            }
            _ => {
                if self.state != State::Ground {
                    self.transition_to(State::Ground);
                }
                if let Some(sixel) = Sixel::from_char(value) {
                    self.events.render(sixel);
                }
                // Anything else is ignored.
            }
        }
    }

    fn shift_param(&mut self, digit: u32) {
        if let Some(param) = self.params.last_mut() {
            *param = param.saturating_mul(10).saturating_add(digit);
        }
    }

    fn transition_to(&mut self, new_state: State) {
        self.leave_state();
        self.state = new_state;
        self.enter_state();
    }

    fn enter_state(&mut self) {
        match self.state {
            State::ColorIntroducer | State::RepeatIntroducer | State::RasterSettings => {
                self.params.clear();
                self.params.push(0);
            }
            State::Ground | State::ColorParam => {}
        }
    }

    fn leave_state(&mut self) {
        match self.state {
            State::Ground | State::ColorIntroducer | State::RepeatIntroducer => {}

            State::RasterSettings => {
                if let [pan, pad, width, height] = self.params[..] {
                    self.events
                        .set_raster(pan, pad, PixelSize::new(width, height));
                }
            }

            State::ColorParam => match self.params[..] {
                [index] => self.events.use_color(index),
                [index, colorspace, c1, c2, c3] => match colorspace {
                    2 => {
                        let color = RgbColor::new(
                            scale_color_component(c1),
                            scale_color_component(c2),
                            scale_color_component(c3),
                        );
                        self.events.set_color(index, color);
                    }
                    1 => {
                        log::warn!(
                            "sixel HSL color definition for register {index} dropped \
                             (conversion not implemented)"
                        );
                    }
                    _ => {
                        log::debug!(
                            "sixel color definition with unknown colorspace {colorspace} ignored"
                        );
                    }
                },
                _ => {}
            },
        }
    }
}

/// Parses a complete sixel sequence in one call, flushing at the end.
pub fn parse_sequence<E: SixelEvents>(sequence: &str, events: &mut E) {
    let mut parser = SixelParser::new(events);
    parser.parse_fragment(sequence);
    parser.finish();
}

fn to_digit(value: char) -> Option<u32> {
    value.to_digit(10)
}

/// Scales a color component from the protocol's 0–100 range to 0–255.
fn scale_color_component(value: u32) -> u8 {
    ((value.saturating_mul(255).saturating_add(50) / 100) % 256) as u8
}
