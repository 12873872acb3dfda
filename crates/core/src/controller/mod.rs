use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, info};

use crate::{
    buffer::PixelBuffer,
    color::{Color, StripType},
    config::{ChannelConfig, ControllerConfig, MAX_CHANNELS},
    encoder::{self, ChannelWaveform},
    hardware::{claim_dma_channel, ChannelParams, DmaClaim, EngineParams, PwmEngine, SimulatedEngine},
    NeopixelError, Result,
};

/// Lifecycle states of a controller.
///
/// `init` moves Uninitialized to Initialized, `render` bounces between
/// Initialized and Rendering, and `release` moves any state to Released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Rendering,
    Released,
}

impl Lifecycle {
    const fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Rendering => "rendering",
            Self::Released => "released",
        }
    }
}

struct ChannelState {
    config: ChannelConfig,
    buffer: PixelBuffer,
}

struct Link {
    engine: Box<dyn PwmEngine>,
    claim: Option<DmaClaim>,
}

/// Hardware lifecycle manager for up to [`MAX_CHANNELS`] LED strips.
///
/// Owns the pixel buffers, the signal encoder and the exclusive claim on
/// the PWM/DMA transport. Render calls are serialized internally, so the
/// controller can be shared across threads behind an `Arc`; pixel buffer
/// writes go through [`ChannelHandle`]s, which take their channel's lock
/// only for the duration of a single access.
pub struct Controller {
    frequency_hz: u32,
    dma_channel: u8,
    channels: Vec<Arc<Mutex<ChannelState>>>,
    state: Mutex<Lifecycle>,
    link: Mutex<Link>,
}

impl Controller {
    /// Builds a controller from a validated configuration and a transport
    /// engine. No hardware is touched until [`Self::init`].
    ///
    /// Channels missing from the configuration are created disabled, with
    /// zero pixels, matching the fixed two-channel hardware layout.
    pub fn new(config: ControllerConfig, engine: Box<dyn PwmEngine>) -> Result<Self> {
        config.validate()?;

        let channels = (0..MAX_CHANNELS)
            .map(|index| {
                let channel_config = config.channels.get(index).cloned().unwrap_or_default();
                let buffer = PixelBuffer::new(channel_config.pixel_count);
                Arc::new(Mutex::new(ChannelState {
                    config: channel_config,
                    buffer,
                }))
            })
            .collect();

        Ok(Self {
            frequency_hz: config.frequency_hz,
            dma_channel: config.dma_channel,
            channels,
            state: Mutex::new(Lifecycle::Uninitialized),
            link: Mutex::new(Link {
                engine,
                claim: None,
            }),
        })
    }

    /// Convenience constructor wiring the controller to a fresh
    /// [`SimulatedEngine`]. The returned engine handle views the same
    /// engine, so the caller can inspect transferred frames.
    pub fn with_simulated_engine(config: ControllerConfig) -> Result<(Self, SimulatedEngine)> {
        let engine = SimulatedEngine::new();
        let controller = Self::new(config, Box::new(engine.clone()))?;
        Ok((controller, engine))
    }

    /// Claims the DMA channel and brings up the transport.
    ///
    /// Fails with [`NeopixelError::PeripheralBusy`] when another controller
    /// in this process already owns the DMA channel, and with
    /// [`NeopixelError::HardwareInit`] when the transport itself cannot be
    /// acquired. Valid only in the Uninitialized state.
    pub fn init(&self) -> Result<()> {
        let mut link = self.lock_link()?;

        {
            let state = self.lock_state()?;
            if *state != Lifecycle::Uninitialized {
                return Err(NeopixelError::InvalidState {
                    operation: "init",
                    state: state.name(),
                });
            }
        }

        let params = self.engine_params()?;
        let claim = claim_dma_channel(self.dma_channel)?;
        link.engine.init(&params)?;
        link.claim = Some(claim);
        *self.lock_state()? = Lifecycle::Initialized;

        info!(
            dma_channel = self.dma_channel,
            frequency_hz = self.frequency_hz,
            "controller initialised"
        );
        Ok(())
    }

    /// Encodes a snapshot of every channel buffer and streams it out.
    ///
    /// Blocks until the transfer completes. Concurrent callers are
    /// serialized: a render issued while another is in flight waits for it
    /// instead of interleaving. Buffer mutations made while a transfer is
    /// in flight are simply picked up by the next render; each render sees
    /// the snapshot taken when it started.
    pub fn render(&self) -> Result<()> {
        let mut link = self.lock_link()?;

        {
            let mut state = self.lock_state()?;
            match *state {
                Lifecycle::Initialized | Lifecycle::Rendering => {}
                Lifecycle::Uninitialized => {
                    return Err(NeopixelError::InvalidState {
                        operation: "render",
                        state: state.name(),
                    })
                }
                Lifecycle::Released => {
                    return Err(NeopixelError::render(
                        "the peripheral was released while the render was pending",
                    ))
                }
            }
            *state = Lifecycle::Rendering;
        }

        let result = self.render_frame(&mut link);

        if let Ok(mut state) = self.state.lock() {
            if *state == Lifecycle::Rendering {
                *state = Lifecycle::Initialized;
            }
        }

        result
    }

    fn render_frame(&self, link: &mut Link) -> Result<()> {
        let mut waveforms = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let state = channel
                .lock()
                .map_err(|_| NeopixelError::Poisoned("channel"))?;
            waveforms.push(encoder::encode_channel(
                &state.config,
                state.buffer.as_words(),
                self.frequency_hz,
            ));
        }

        if waveforms.iter().all(ChannelWaveform::is_empty) {
            debug!("all channels disabled, nothing to render");
            return Ok(());
        }

        link.engine.transfer(&waveforms)?;
        debug!(
            symbol_bits = waveforms.iter().map(ChannelWaveform::bit_len).sum::<usize>(),
            "frame transferred"
        );
        Ok(())
    }

    /// Releases the transport and the DMA claim. Idempotent: calling it on
    /// an already-released controller is a no-op. Also runs on drop, so an
    /// exclusive peripheral claim never outlives the controller, error
    /// paths included.
    pub fn release(&self) {
        let Ok(mut link) = self.link.lock() else {
            return;
        };
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if *state == Lifecycle::Released {
            return;
        }
        *state = Lifecycle::Released;
        drop(state);

        link.engine.release();
        link.claim = None;
        info!(dma_channel = self.dma_channel, "controller released");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Result<Lifecycle> {
        Ok(*self.lock_state()?)
    }

    /// Returns a handle to the channel at `index`.
    pub fn channel(&self, index: usize) -> Result<ChannelHandle> {
        let shared = self
            .channels
            .get(index)
            .ok_or(NeopixelError::ChannelIndex {
                index,
                max: MAX_CHANNELS,
            })?;
        Ok(ChannelHandle {
            shared: Arc::clone(shared),
        })
    }

    fn engine_params(&self) -> Result<EngineParams> {
        let mut channels = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let state = channel
                .lock()
                .map_err(|_| NeopixelError::Poisoned("channel"))?;
            channels.push(ChannelParams {
                gpio_pin: state.config.gpio_pin,
                invert: state.config.invert,
                pixel_count: state.config.pixel_count,
            });
        }
        Ok(EngineParams {
            frequency_hz: self.frequency_hz,
            dma_channel: self.dma_channel,
            channels,
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, Lifecycle>> {
        self.state
            .lock()
            .map_err(|_| NeopixelError::Poisoned("controller state"))
    }

    fn lock_link(&self) -> Result<MutexGuard<'_, Link>> {
        self.link
            .lock()
            .map_err(|_| NeopixelError::Poisoned("render path"))
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("frequency_hz", &self.frequency_hz)
            .field("dma_channel", &self.dma_channel)
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// Thread-safe view over one hardware channel's configuration and pixels.
///
/// Handles stay valid for as long as the caller keeps them; each access
/// takes the channel lock briefly, so writes from several threads do not
/// tear individual pixels. Coordinating whole-frame updates against a
/// concurrent render is still the caller's responsibility.
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<Mutex<ChannelState>>,
}

impl ChannelHandle {
    /// Number of pixels on this channel's strip.
    pub fn pixel_count(&self) -> Result<usize> {
        Ok(self.lock()?.config.pixel_count)
    }

    /// Whether the channel was configured with zero pixels.
    pub fn is_disabled(&self) -> Result<bool> {
        Ok(self.lock()?.config.is_disabled())
    }

    /// Strip byte ordering this channel was configured with.
    pub fn strip_type(&self) -> Result<StripType> {
        Ok(self.lock()?.config.strip_type)
    }

    /// Current brightness, 0 to 255.
    pub fn brightness(&self) -> Result<u8> {
        Ok(self.lock()?.config.brightness)
    }

    /// Updates the brightness applied on the next render. Values above 255
    /// fail with [`NeopixelError::BrightnessOutOfRange`].
    pub fn set_brightness(&self, brightness: u16) -> Result<()> {
        let value = u8::try_from(brightness)
            .map_err(|_| NeopixelError::BrightnessOutOfRange(brightness))?;
        self.lock()?.config.brightness = value;
        Ok(())
    }

    /// Reads the color at `pos`.
    pub fn color_at(&self, pos: usize) -> Result<Color> {
        self.lock()?.buffer.color_at(pos)
    }

    /// Writes the color at `pos`. Takes effect on the next render.
    pub fn set_color(&self, pos: usize, color: Color) -> Result<()> {
        self.lock()?.buffer.set_color(pos, color)
    }

    /// Sets every pixel on the strip to `color`.
    pub fn fill(&self, color: Color) -> Result<()> {
        self.lock()?.buffer.fill(color);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelState>> {
        self.shared
            .lock()
            .map_err(|_| NeopixelError::Poisoned("channel"))
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn strip_config(pixel_count: usize, dma_channel: u8) -> ControllerConfig {
        ControllerConfig {
            dma_channel,
            ..ControllerConfig::new().with_channel(ChannelConfig::new(pixel_count, 18))
        }
    }

    #[test]
    fn lifecycle_follows_the_state_machine() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 0)).unwrap();
        assert_eq!(controller.state().unwrap(), Lifecycle::Uninitialized);

        controller.init().unwrap();
        assert_eq!(controller.state().unwrap(), Lifecycle::Initialized);

        controller.render().unwrap();
        assert_eq!(controller.state().unwrap(), Lifecycle::Initialized);

        controller.release();
        assert_eq!(controller.state().unwrap(), Lifecycle::Released);
    }

    #[test]
    fn render_before_init_fails() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 1)).unwrap();
        assert!(matches!(
            controller.render(),
            Err(NeopixelError::InvalidState { operation: "render", .. })
        ));
    }

    #[test]
    fn double_init_is_rejected() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 2)).unwrap();
        controller.init().unwrap();
        assert!(matches!(
            controller.init(),
            Err(NeopixelError::InvalidState { operation: "init", .. })
        ));
        controller.release();
    }

    #[test]
    fn second_controller_on_same_dma_channel_is_busy() {
        let (first, _engine_a) = Controller::with_simulated_engine(strip_config(4, 3)).unwrap();
        let (second, _engine_b) = Controller::with_simulated_engine(strip_config(4, 3)).unwrap();

        first.init().unwrap();
        assert!(matches!(
            second.init(),
            Err(NeopixelError::PeripheralBusy { dma_channel: 3 })
        ));

        // Releasing the first controller frees the channel again.
        first.release();
        second.init().unwrap();
        second.release();
    }

    #[test]
    fn release_is_idempotent_and_runs_on_drop() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 4)).unwrap();
        controller.init().unwrap();
        controller.release();
        controller.release();
        drop(controller);

        // The claim must be free for a fresh controller.
        let (next, _engine) = Controller::with_simulated_engine(strip_config(4, 4)).unwrap();
        next.init().unwrap();
    }

    #[test]
    fn render_after_release_is_a_render_error() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 5)).unwrap();
        controller.init().unwrap();
        controller.release();
        assert!(matches!(
            controller.render(),
            Err(NeopixelError::Render(_))
        ));
    }

    #[test]
    fn init_after_release_is_rejected() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 6)).unwrap();
        controller.release();
        assert!(matches!(
            controller.init(),
            Err(NeopixelError::InvalidState { operation: "init", .. })
        ));
    }

    #[test]
    fn disabled_channels_render_as_a_no_op() {
        let (controller, engine) =
            Controller::with_simulated_engine(ControllerConfig {
                dma_channel: 7,
                ..ControllerConfig::default()
            })
            .unwrap();
        controller.init().unwrap();
        controller.render().unwrap();
        assert_eq!(engine.transfer_count(), 0);
    }

    #[test]
    fn brightness_round_trips_and_rejects_256() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 8)).unwrap();
        let channel = controller.channel(0).unwrap();

        for value in [0u16, 1, 128, 255] {
            channel.set_brightness(value).unwrap();
            assert_eq!(u16::from(channel.brightness().unwrap()), value);
        }

        assert!(matches!(
            channel.set_brightness(256),
            Err(NeopixelError::BrightnessOutOfRange(256))
        ));
    }

    #[test]
    fn channel_index_is_bounds_checked() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 9)).unwrap();
        assert!(controller.channel(1).is_ok());
        assert!(matches!(
            controller.channel(2),
            Err(NeopixelError::ChannelIndex { index: 2, max: 2 })
        ));
    }

    #[test]
    fn unconfigured_second_channel_is_disabled() {
        let (controller, _engine) =
            Controller::with_simulated_engine(strip_config(4, 10)).unwrap();
        let second = controller.channel(1).unwrap();
        assert!(second.is_disabled().unwrap());
        assert_eq!(second.pixel_count().unwrap(), 0);
    }

    #[test]
    fn render_snapshots_brightness_and_pixels() {
        let (controller, engine) =
            Controller::with_simulated_engine(strip_config(10, 11)).unwrap();
        let channel = controller.channel(0).unwrap();

        channel.set_color(0, Color::wrgb(255, 255, 0, 0)).unwrap();
        channel.set_brightness(128).unwrap();
        controller.init().unwrap();
        controller.render().unwrap();

        let frame = engine.last_frame();
        let waveform = &frame[0];
        assert!(!waveform.is_empty());

        // First pixel on a GRB strip: G=0, R=128 (255 * 128 / 255), B=0.
        let decoded = decode_first_bytes(waveform, 3);
        assert_eq!(decoded, vec![0, 128, 0]);
    }

    #[test]
    fn transfer_fault_surfaces_as_render_error() {
        let (controller, engine) =
            Controller::with_simulated_engine(strip_config(4, 12)).unwrap();
        controller.init().unwrap();
        engine.fail_next_transfer();
        assert!(matches!(
            controller.render(),
            Err(NeopixelError::Render(_))
        ));
        // A retry from the caller goes through.
        controller.render().unwrap();
    }

    #[test]
    fn concurrent_renders_serialize() {
        let (controller, engine) =
            Controller::with_simulated_engine(strip_config(8, 13)).unwrap();
        controller.channel(0).unwrap().fill(Color::GREEN).unwrap();
        controller.init().unwrap();

        let controller = Arc::new(controller);
        thread::scope(|scope| {
            for _ in 0..2 {
                let controller = Arc::clone(&controller);
                scope.spawn(move || controller.render().unwrap());
            }
        });

        assert_eq!(engine.transfer_count(), 2);
    }

    /// Decodes wire bytes from the waveform's middle symbol bits.
    fn decode_first_bytes(waveform: &ChannelWaveform, count: usize) -> Vec<u8> {
        let bit_at = |index: usize| waveform.words()[index / 32] >> (31 - index % 32) & 1 == 1;
        (0..count)
            .map(|byte_index| {
                (0..8).fold(0u8, |acc, bit| {
                    let symbol_start = (byte_index * 8 + bit) * 3;
                    acc << 1 | u8::from(bit_at(symbol_start + 1))
                })
            })
            .collect()
    }
}
