//! Driver core for WS281x family LED strips (NeoPixels).
//!
//! The crate turns per-pixel color buffers into the PWM symbol streams the
//! strips expect and manages the lifecycle of the DMA-fed transport that
//! emits them. Each module owns a distinct subsystem: channel configuration,
//! pixel storage, signal encoding and the hardware boundary. The
//! [`controller::Controller`] ties them together behind a thread-safe API.

pub mod buffer;
pub mod color;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod hardware;

pub use buffer::PixelBuffer;
pub use color::{Color, StripType};
pub use config::{
    ChannelConfig, ControllerConfig, DEFAULT_DMA_CHANNEL, DEFAULT_FREQUENCY_HZ, MAX_CHANNELS,
};
pub use controller::{ChannelHandle, Controller, Lifecycle};
pub use encoder::{ChannelWaveform, RESET_TIME_US, SYMBOLS_PER_BIT};
pub use error::{NeopixelError, Result};
pub use hardware::{ChannelParams, EngineParams, PwmEngine, SimulatedEngine};
