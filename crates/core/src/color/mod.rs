use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

use crate::{NeopixelError, Result};

/// A single LED color with an optional white channel.
///
/// The white channel only reaches the wire on RGBW strip types; plain RGB
/// strips ignore it. Pure value type with no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub white: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    /// Creates a color with the white channel cleared.
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            white: 0,
            red,
            green,
            blue,
        }
    }

    /// Creates a color including the white channel of RGBW strips.
    pub const fn wrgb(white: u8, red: u8, green: u8, blue: u8) -> Self {
        Self {
            white,
            red,
            green,
            blue,
        }
    }

    /// Returns the packed 32-bit representation,
    /// `(white << 24) | (red << 16) | (green << 8) | blue`.
    ///
    /// This is the layout pixel buffers store and the encoder reads.
    pub const fn packed(self) -> u32 {
        (self.white as u32) << 24
            | (self.red as u32) << 16
            | (self.green as u32) << 8
            | self.blue as u32
    }

    /// Rebuilds a color from its packed 32-bit representation.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            white: (value >> 24) as u8,
            red: (value >> 16) as u8,
            green: (value >> 8) as u8,
            blue: value as u8,
        }
    }

    /// Scales every channel by `brightness / 255` with integer truncation,
    /// so brightness 255 is the identity.
    pub(crate) const fn scaled(self, brightness: u8) -> Self {
        const fn scale(value: u8, brightness: u8) -> u8 {
            ((value as u16 * brightness as u16) / 255) as u8
        }

        Self {
            white: scale(self.white, brightness),
            red: scale(self.red, brightness),
            green: scale(self.green, brightness),
            blue: scale(self.blue, brightness),
        }
    }
}

impl From<RGB8> for Color {
    fn from(value: RGB8) -> Self {
        Self::rgb(value.r, value.g, value.b)
    }
}

impl From<Color> for RGB8 {
    fn from(value: Color) -> Self {
        Self::new(value.red, value.green, value.blue)
    }
}

impl FromStr for Color {
    type Err = NeopixelError;

    /// Parses `RRGGBB` or `WWRRGGBB` hex strings, with an optional leading
    /// `#`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| NeopixelError::config(format!("`{s}` is not a hex color")))?;

        match digits.len() {
            6 | 8 => Ok(Self::from_packed(value)),
            other => Err(NeopixelError::config(format!(
                "hex color `{s}` must have 6 or 8 digits, found {other}"
            ))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.white == 0 {
            write!(f, "#{:06X}", self.packed())
        } else {
            write!(f, "#{:08X}", self.packed())
        }
    }
}

/// Byte-ordering convention a strip model expects on the wire.
///
/// WS2812 strips are `Grb`; the SK6812 RGBW family adds a dedicated white
/// LED that is emitted as a fourth byte after the color bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripType {
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
    Rgbw,
    Rbgw,
    Grbw,
    Gbrw,
    Brgw,
    Bgrw,
}

impl Default for StripType {
    fn default() -> Self {
        Self::Grb
    }
}

impl StripType {
    /// Returns true for the SK6812 RGBW family.
    pub const fn has_white(self) -> bool {
        matches!(
            self,
            Self::Rgbw | Self::Rbgw | Self::Grbw | Self::Gbrw | Self::Brgw | Self::Bgrw
        )
    }

    /// Number of bytes one pixel occupies on the wire.
    pub const fn bytes_per_pixel(self) -> usize {
        if self.has_white() {
            4
        } else {
            3
        }
    }

    /// Lays out `color` in this strip's wire order. Only the first
    /// [`Self::bytes_per_pixel`] entries are meaningful.
    pub(crate) const fn wire_bytes(self, color: Color) -> [u8; 4] {
        let Color {
            white,
            red,
            green,
            blue,
        } = color;
        match self {
            Self::Rgb => [red, green, blue, 0],
            Self::Rbg => [red, blue, green, 0],
            Self::Grb => [green, red, blue, 0],
            Self::Gbr => [green, blue, red, 0],
            Self::Brg => [blue, red, green, 0],
            Self::Bgr => [blue, green, red, 0],
            Self::Rgbw => [red, green, blue, white],
            Self::Rbgw => [red, blue, green, white],
            Self::Grbw => [green, red, blue, white],
            Self::Gbrw => [green, blue, red, white],
            Self::Brgw => [blue, red, green, white],
            Self::Bgrw => [blue, green, red, white],
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Rbg => "rbg",
            Self::Grb => "grb",
            Self::Gbr => "gbr",
            Self::Brg => "brg",
            Self::Bgr => "bgr",
            Self::Rgbw => "rgbw",
            Self::Rbgw => "rbgw",
            Self::Grbw => "grbw",
            Self::Gbrw => "gbrw",
            Self::Brgw => "brgw",
            Self::Bgrw => "bgrw",
        }
    }
}

impl fmt::Display for StripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StripType {
    type Err = NeopixelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "rbg" => Ok(Self::Rbg),
            "grb" => Ok(Self::Grb),
            "gbr" => Ok(Self::Gbr),
            "brg" => Ok(Self::Brg),
            "bgr" => Ok(Self::Bgr),
            "rgbw" => Ok(Self::Rgbw),
            "rbgw" => Ok(Self::Rbgw),
            "grbw" => Ok(Self::Grbw),
            "gbrw" => Ok(Self::Gbrw),
            "brgw" => Ok(Self::Brgw),
            "bgrw" => Ok(Self::Bgrw),
            other => Err(NeopixelError::config(format!(
                "unknown strip type `{other}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_colors() {
        let color = Color::wrgb(0x11, 0x22, 0x33, 0x44);
        assert_eq!(color.packed(), 0x11223344);
        assert_eq!(Color::from_packed(0x11223344), color);
    }

    #[test]
    fn scaling_truncates() {
        let color = Color::wrgb(255, 255, 100, 1);
        let scaled = color.scaled(128);
        assert_eq!(scaled.white, 128);
        assert_eq!(scaled.red, 128);
        assert_eq!(scaled.green, 50); // 100 * 128 / 255 = 50.19 truncated
        assert_eq!(scaled.blue, 0);
    }

    #[test]
    fn full_brightness_is_identity() {
        let color = Color::wrgb(1, 2, 3, 255);
        assert_eq!(color.scaled(255), color);
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!("ff0000".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("#00FF00".parse::<Color>().unwrap(), Color::GREEN);
        assert_eq!(
            "80102030".parse::<Color>().unwrap(),
            Color::wrgb(0x80, 0x10, 0x20, 0x30)
        );
        assert!("ff00".parse::<Color>().is_err());
        assert!("nothex".parse::<Color>().is_err());
    }

    #[test]
    fn strip_types_reorder_bytes() {
        let color = Color::wrgb(4, 1, 2, 3);
        assert_eq!(StripType::Rgb.wire_bytes(color), [1, 2, 3, 0]);
        assert_eq!(StripType::Grb.wire_bytes(color), [2, 1, 3, 0]);
        assert_eq!(StripType::Bgr.wire_bytes(color), [3, 2, 1, 0]);
        assert_eq!(StripType::Grbw.wire_bytes(color), [2, 1, 3, 4]);
        assert_eq!(StripType::Rgbw.bytes_per_pixel(), 4);
        assert_eq!(StripType::Rbg.bytes_per_pixel(), 3);
    }

    #[test]
    fn parses_strip_type_names() {
        assert_eq!("grb".parse::<StripType>().unwrap(), StripType::Grb);
        assert_eq!("GRBW".parse::<StripType>().unwrap(), StripType::Grbw);
        assert!("xyz".parse::<StripType>().is_err());
    }

    #[test]
    fn converts_smart_leds_colors() {
        let rgb = RGB8::new(10, 20, 30);
        let color = Color::from(rgb);
        assert_eq!(color, Color::rgb(10, 20, 30));
        assert_eq!(RGB8::from(color), rgb);
    }
}
