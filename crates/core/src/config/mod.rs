use serde::{Deserialize, Serialize};

use crate::{color::StripType, NeopixelError, Result};

/// Number of hardware PWM channels a controller can drive.
pub const MAX_CHANNELS: usize = 2;

/// Default signal frequency of the WS281x protocol.
pub const DEFAULT_FREQUENCY_HZ: u32 = 800_000;

/// Default DMA channel, chosen to stay clear of the channels the firmware
/// reserves for itself.
pub const DEFAULT_DMA_CHANNEL: u8 = 10;

const MAX_DMA_CHANNEL: u8 = 14;

// BCM283x pin map: each PWM channel can only be routed to a fixed set of
// GPIO pins.
const PWM0_PINS: [u8; 4] = [12, 18, 40, 52];
const PWM1_PINS: [u8; 5] = [13, 19, 41, 45, 53];

/// Per-channel parameters of the Channel Configuration Store.
///
/// Everything except brightness is fixed once the controller is built;
/// brightness may change between frames through
/// [`ChannelHandle::set_brightness`](crate::controller::ChannelHandle::set_brightness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Number of LEDs on the strip. Zero leaves the channel disabled.
    pub pixel_count: usize,
    /// GPIO pin carrying the data signal.
    pub gpio_pin: u8,
    /// Inverts signal polarity at the hardware level, for strips behind an
    /// inverting level shifter.
    pub invert: bool,
    /// Overall brightness applied during encoding, 0 to 255.
    pub brightness: u8,
    /// Byte ordering the strip model expects.
    pub strip_type: StripType,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            pixel_count: 0,
            gpio_pin: 18,
            invert: false,
            brightness: 255,
            strip_type: StripType::default(),
        }
    }
}

impl ChannelConfig {
    /// Creates a channel configuration with default brightness, polarity
    /// and strip type.
    pub fn new(pixel_count: usize, gpio_pin: u8) -> Self {
        Self {
            pixel_count,
            gpio_pin,
            ..Self::default()
        }
    }

    /// A channel with no pixels is skipped entirely during rendering.
    pub fn is_disabled(&self) -> bool {
        self.pixel_count == 0
    }

    pub(crate) fn validate(&self, channel_index: usize) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }

        let valid_pins: &[u8] = match channel_index {
            0 => &PWM0_PINS,
            1 => &PWM1_PINS,
            other => {
                return Err(NeopixelError::ChannelIndex {
                    index: other,
                    max: MAX_CHANNELS,
                })
            }
        };

        if !valid_pins.contains(&self.gpio_pin) {
            return Err(NeopixelError::config(format!(
                "GPIO pin {} cannot be routed to PWM channel {channel_index} \
                 (valid pins: {valid_pins:?})",
                self.gpio_pin
            )));
        }

        Ok(())
    }
}

/// Controller-wide parameters, created at construction and fixed for the
/// controller's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Signal frequency in hertz. The protocol runs at 800 kHz, with a
    /// 400 kHz fallback for first-generation WS2811 strips.
    pub frequency_hz: u32,
    /// DMA channel feeding the PWM peripheral, 0 to 14.
    pub dma_channel: u8,
    /// Up to [`MAX_CHANNELS`] channel configurations. Missing entries are
    /// treated as disabled channels.
    pub channels: Vec<ChannelConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            dma_channel: DEFAULT_DMA_CHANNEL,
            channels: Vec::new(),
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a channel configuration, builder style.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channels.push(channel);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.frequency_hz == 0 {
            return Err(NeopixelError::config("signal frequency must be positive"));
        }

        if self.dma_channel > MAX_DMA_CHANNEL {
            return Err(NeopixelError::config(format!(
                "DMA channel {} out of range (0-{MAX_DMA_CHANNEL})",
                self.dma_channel
            )));
        }

        if self.channels.len() > MAX_CHANNELS {
            return Err(NeopixelError::config(format!(
                "{} channels configured but the hardware has only {MAX_CHANNELS}",
                self.channels.len()
            )));
        }

        for (index, channel) in self.channels.iter().enumerate() {
            channel.validate(index)?;
        }

        Ok(())
    }
}
