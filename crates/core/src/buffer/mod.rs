use crate::{color::Color, NeopixelError, Result};

/// In-memory pixel store for one channel.
///
/// Pixels are packed 32-bit WRGB words (see [`Color::packed`]). Writes have
/// no hardware side effect; the signal encoder reads a snapshot of the
/// buffer when a render starts. The length is fixed at construction:
/// resizing a strip requires tearing the controller down and rebuilding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Creates a buffer of `len` black pixels.
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Returns the color at `pos`, failing when the position is outside the
    /// strip. Negative positions are unrepresentable by construction.
    pub fn color_at(&self, pos: usize) -> Result<Color> {
        self.check(pos)?;
        Ok(Color::from_packed(self.pixels[pos]))
    }

    /// Sets the color at `pos`, failing when the position is outside the
    /// strip.
    pub fn set_color(&mut self, pos: usize, color: Color) -> Result<()> {
        self.check(pos)?;
        self.pixels[pos] = color.packed();
        Ok(())
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color.packed());
    }

    /// The raw packed words, in strip order. Read by the encoder.
    pub(crate) fn as_words(&self) -> &[u32] {
        &self.pixels
    }

    fn check(&self, pos: usize) -> Result<()> {
        if pos < self.pixels.len() {
            Ok(())
        } else {
            Err(NeopixelError::PixelIndex {
                index: pos,
                len: self.pixels.len(),
            })
        }
    }
}
