use crate::{color::Color, config::ChannelConfig};

/// Each data bit is stretched into this many PWM symbol bits, clocked at
/// three times the strip frequency. At 800 kHz that gives the ~1.25 us bit
/// cycle the WS281x protocol requires.
pub const SYMBOLS_PER_BIT: u32 = 3;

/// Symbol for a one bit: ~0.83 us high, ~0.42 us low at 800 kHz.
const SYMBOL_ONE: u32 = 0b110;

/// Symbol for a zero bit: ~0.42 us high, ~0.83 us low at 800 kHz.
const SYMBOL_ZERO: u32 = 0b100;

/// Low time appended after the data so the strip latches the frame. 300 us
/// covers the slower SK6812 variants as well as the classic WS2812.
pub const RESET_TIME_US: u32 = 300;

/// PWM symbol stream for one channel, ready to be fed to a DMA engine.
///
/// Words hold symbol bits MSB-first. The polarity flag is carried alongside
/// the data: inversion happens at the hardware level when the signal is
/// emitted, never in the pixel data itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelWaveform {
    words: Vec<u32>,
    bit_len: usize,
    invert: bool,
    gpio_pin: u8,
}

impl ChannelWaveform {
    /// A disabled channel encodes to an empty waveform.
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// The packed symbol words, MSB-first. Trailing bits of the last word
    /// beyond [`Self::bit_len`] are zero padding.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of meaningful symbol bits, including the reset tail.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Whether the emitting hardware must flip signal polarity.
    pub fn invert(&self) -> bool {
        self.invert
    }

    /// GPIO pin this waveform is destined for.
    pub fn gpio_pin(&self) -> u8 {
        self.gpio_pin
    }

    /// Wall-clock time the waveform occupies on the wire at the given strip
    /// frequency.
    pub fn duration_micros(&self, frequency_hz: u32) -> u64 {
        let symbol_rate = u64::from(frequency_hz) * u64::from(SYMBOLS_PER_BIT);
        if symbol_rate == 0 {
            return 0;
        }
        (self.bit_len as u64 * 1_000_000).div_ceil(symbol_rate)
    }
}

/// Encodes one channel's pixel snapshot into its PWM symbol stream.
///
/// Applies brightness scaling (integer truncation) and the strip's byte
/// ordering, expands every data bit MSB-first into a three-bit symbol and
/// appends the reset latch tail. A channel with no pixels yields an empty
/// waveform.
pub(crate) fn encode_channel(
    config: &ChannelConfig,
    pixels: &[u32],
    frequency_hz: u32,
) -> ChannelWaveform {
    if pixels.is_empty() {
        return ChannelWaveform {
            invert: config.invert,
            gpio_pin: config.gpio_pin,
            ..ChannelWaveform::default()
        };
    }

    let bytes_per_pixel = config.strip_type.bytes_per_pixel();
    let data_bits = pixels.len() * bytes_per_pixel * 8 * SYMBOLS_PER_BIT as usize;
    let mut writer = SymbolWriter::with_bit_capacity(data_bits + reset_bits(frequency_hz));

    for &packed in pixels {
        let color = Color::from_packed(packed).scaled(config.brightness);
        let wire = config.strip_type.wire_bytes(color);
        for &byte in &wire[..bytes_per_pixel] {
            for bit in (0..8).rev() {
                let symbol = if byte >> bit & 1 == 1 {
                    SYMBOL_ONE
                } else {
                    SYMBOL_ZERO
                };
                writer.push_symbol(symbol);
            }
        }
    }

    writer.push_low_bits(reset_bits(frequency_hz));

    ChannelWaveform {
        words: writer.words,
        bit_len: writer.bit_len,
        invert: config.invert,
        gpio_pin: config.gpio_pin,
    }
}

/// Number of low symbol bits that make up the reset latch at the given
/// strip frequency.
fn reset_bits(frequency_hz: u32) -> usize {
    let symbol_rate = u64::from(frequency_hz) * u64::from(SYMBOLS_PER_BIT);
    (symbol_rate * u64::from(RESET_TIME_US)).div_ceil(1_000_000) as usize
}

/// Packs symbol bits MSB-first into 32-bit DMA words.
struct SymbolWriter {
    words: Vec<u32>,
    bit_len: usize,
}

impl SymbolWriter {
    fn with_bit_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(32)),
            bit_len: 0,
        }
    }

    fn push_symbol(&mut self, symbol: u32) {
        for shift in (0..SYMBOLS_PER_BIT).rev() {
            self.push_bit(symbol >> shift & 1 == 1);
        }
    }

    fn push_low_bits(&mut self, count: usize) {
        for _ in 0..count {
            self.push_bit(false);
        }
    }

    fn push_bit(&mut self, high: bool) {
        let word_index = self.bit_len / 32;
        if word_index == self.words.len() {
            self.words.push(0);
        }
        if high {
            self.words[word_index] |= 1 << (31 - self.bit_len % 32);
        }
        self.bit_len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::StripType;

    fn channel(strip_type: StripType, brightness: u8) -> ChannelConfig {
        ChannelConfig {
            pixel_count: 1,
            gpio_pin: 18,
            invert: false,
            brightness,
            strip_type,
        }
    }

    /// Reads symbol bit `index` of the waveform.
    fn bit_at(waveform: &ChannelWaveform, index: usize) -> bool {
        waveform.words()[index / 32] >> (31 - index % 32) & 1 == 1
    }

    /// Recovers the wire bytes from the symbol stream by sampling the
    /// middle bit of each three-bit symbol.
    fn decode_bytes(waveform: &ChannelWaveform, count: usize) -> Vec<u8> {
        (0..count)
            .map(|byte_index| {
                (0..8).fold(0u8, |acc, bit| {
                    let symbol_start = (byte_index * 8 + bit) * 3;
                    assert!(bit_at(waveform, symbol_start), "symbols start high");
                    assert!(!bit_at(waveform, symbol_start + 2), "symbols end low");
                    acc << 1 | u8::from(bit_at(waveform, symbol_start + 1))
                })
            })
            .collect()
    }

    #[test]
    fn empty_channel_encodes_to_nothing() {
        let waveform = encode_channel(&channel(StripType::Grb, 255), &[], 800_000);
        assert!(waveform.is_empty());
        assert!(waveform.words().is_empty());
    }

    #[test]
    fn encodes_known_byte_pattern() {
        // 0xFF red on a GRB strip: wire bytes are G=0x00, R=0xFF, B=0x00.
        let waveform = encode_channel(
            &channel(StripType::Grb, 255),
            &[Color::RED.packed()],
            800_000,
        );
        assert_eq!(decode_bytes(&waveform, 3), vec![0x00, 0xFF, 0x00]);
    }

    #[test]
    fn brightness_scales_wire_bytes() {
        let waveform = encode_channel(
            &channel(StripType::Grb, 128),
            &[Color::wrgb(255, 255, 0, 0).packed()],
            800_000,
        );
        // 255 * 128 / 255 = 128 exactly.
        assert_eq!(decode_bytes(&waveform, 3), vec![0, 128, 0]);
    }

    #[test]
    fn rgbw_strips_emit_four_bytes() {
        let waveform = encode_channel(
            &channel(StripType::Grbw, 255),
            &[Color::wrgb(9, 1, 2, 3).packed()],
            800_000,
        );
        assert_eq!(decode_bytes(&waveform, 4), vec![2, 1, 3, 9]);
        assert_eq!(
            waveform.bit_len(),
            4 * 8 * 3 + super::reset_bits(800_000)
        );
    }

    #[test]
    fn reset_tail_matches_frequency() {
        // 800 kHz * 3 symbols * 300 us = 720 symbol bits of low signal.
        assert_eq!(reset_bits(800_000), 720);
        assert_eq!(reset_bits(400_000), 360);

        let waveform = encode_channel(
            &channel(StripType::Grb, 255),
            &[Color::WHITE.packed()],
            800_000,
        );
        let data_bits = 3 * 8 * 3;
        for index in data_bits..waveform.bit_len() {
            assert!(!bit_at(&waveform, index), "reset tail must stay low");
        }
    }

    #[test]
    fn invert_flag_rides_along() {
        let mut config = channel(StripType::Grb, 255);
        config.invert = true;
        config.gpio_pin = 12;
        let waveform = encode_channel(&config, &[0], 800_000);
        assert!(waveform.invert());
        assert_eq!(waveform.gpio_pin(), 12);
        // The data itself is untouched: a black pixel is all zero symbols.
        assert_eq!(decode_bytes(&waveform, 3), vec![0, 0, 0]);
    }

    #[test]
    fn duration_covers_data_and_reset() {
        let waveform = encode_channel(
            &channel(StripType::Grb, 255),
            &[0; 10],
            800_000,
        );
        // 10 pixels * 24 bits = 240 bits at 1.25 us each, plus 300 us reset.
        assert_eq!(waveform.duration_micros(800_000), 600);
    }
}
