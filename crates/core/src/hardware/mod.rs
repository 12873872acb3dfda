use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    thread,
    time::Duration,
};

use tracing::debug;

use crate::{encoder::ChannelWaveform, NeopixelError, Result};

/// Parameters handed to a PWM engine when the controller initialises.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub frequency_hz: u32,
    pub dma_channel: u8,
    pub channels: Vec<ChannelParams>,
}

/// Per-channel slice of [`EngineParams`].
#[derive(Debug, Clone)]
pub struct ChannelParams {
    pub gpio_pin: u8,
    pub invert: bool,
    pub pixel_count: usize,
}

/// The in-process boundary to the PWM/DMA transport.
///
/// The controller owns exactly one engine and calls it under an exclusive
/// lock, so implementations never see overlapping transfers. Board crates
/// implement this trait for their DMA backend; tests and the demo binary
/// use [`SimulatedEngine`].
pub trait PwmEngine: Send {
    /// Claims transport-side resources and sizes the DMA buffers for the
    /// configured channels. Failures surface as
    /// [`NeopixelError::HardwareInit`].
    fn init(&mut self, params: &EngineParams) -> Result<()>;

    /// Blocks until the previous transfer has fully completed, then streams
    /// the given waveforms. Returns only after the transfer finishes, so a
    /// frame is emitted atomically or not at all. Faults surface as
    /// [`NeopixelError::Render`].
    fn transfer(&mut self, waveforms: &[ChannelWaveform]) -> Result<()>;

    /// Frees transport resources. Must be idempotent.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// DMA channel claim registry
// ---------------------------------------------------------------------------

fn claims() -> &'static Mutex<HashSet<u8>> {
    static CLAIMS: OnceLock<Mutex<HashSet<u8>>> = OnceLock::new();
    CLAIMS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// RAII claim on a DMA channel. The physical PWM/DMA pair is a singleton
/// resource, so the registry is process-wide: dropping the guard frees the
/// channel for the next controller.
#[derive(Debug)]
pub(crate) struct DmaClaim {
    dma_channel: u8,
}

pub(crate) fn claim_dma_channel(dma_channel: u8) -> Result<DmaClaim> {
    let mut claimed = claims()
        .lock()
        .map_err(|_| NeopixelError::Poisoned("DMA claim registry"))?;

    if !claimed.insert(dma_channel) {
        return Err(NeopixelError::PeripheralBusy { dma_channel });
    }

    debug!(dma_channel, "claimed DMA channel");
    Ok(DmaClaim { dma_channel })
}

impl Drop for DmaClaim {
    fn drop(&mut self) {
        if let Ok(mut claimed) = claims().lock() {
            claimed.remove(&self.dma_channel);
            debug!(dma_channel = self.dma_channel, "released DMA channel");
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated engine
// ---------------------------------------------------------------------------

/// Software stand-in for the DMA-fed PWM transport.
///
/// Records every transferred frame so tests and the demo binary can inspect
/// the exact symbol stream a strip would have received. Cloning yields a
/// handle to the same engine, which lets the caller keep a view on an
/// engine that has been moved into a controller. Optionally sleeps for the
/// wire duration of each frame to mimic the blocking behaviour of real DMA.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    shared: Arc<Mutex<SimState>>,
}

#[derive(Debug, Default)]
struct SimState {
    params: Option<EngineParams>,
    last_frame: Vec<ChannelWaveform>,
    transfers: u64,
    fail_next_transfer: bool,
    emulate_timing: bool,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, `transfer` sleeps for the frame's wire duration.
    pub fn emulate_timing(&self, enabled: bool) {
        if let Ok(mut state) = self.shared.lock() {
            state.emulate_timing = enabled;
        }
    }

    /// Makes the next `transfer` call fail, emulating a DMA fault.
    pub fn fail_next_transfer(&self) {
        if let Ok(mut state) = self.shared.lock() {
            state.fail_next_transfer = true;
        }
    }

    /// Number of frames transferred since construction.
    pub fn transfer_count(&self) -> u64 {
        self.shared.lock().map(|state| state.transfers).unwrap_or(0)
    }

    /// The waveforms of the most recent frame, one entry per channel.
    pub fn last_frame(&self) -> Vec<ChannelWaveform> {
        self.shared
            .lock()
            .map(|state| state.last_frame.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        self.shared
            .lock()
            .map_err(|_| NeopixelError::Poisoned("simulated engine"))
    }
}

impl PwmEngine for SimulatedEngine {
    fn init(&mut self, params: &EngineParams) -> Result<()> {
        let mut state = self.lock()?;
        if state.params.is_some() {
            return Err(NeopixelError::HardwareInit(
                "engine is already initialised".to_string(),
            ));
        }
        state.params = Some(params.clone());
        debug!(
            dma_channel = params.dma_channel,
            channels = params.channels.len(),
            "simulated engine initialised"
        );
        Ok(())
    }

    fn transfer(&mut self, waveforms: &[ChannelWaveform]) -> Result<()> {
        let sleep_micros = {
            let mut state = self.lock()?;

            let Some(params) = &state.params else {
                return Err(NeopixelError::render("transfer before engine init"));
            };
            let frequency_hz = params.frequency_hz;

            if state.fail_next_transfer {
                state.fail_next_transfer = false;
                return Err(NeopixelError::render("injected DMA transfer fault"));
            }

            let duration = waveforms
                .iter()
                .map(|waveform| waveform.duration_micros(frequency_hz))
                .max()
                .unwrap_or(0);

            state.last_frame = waveforms.to_vec();
            state.transfers += 1;
            state.emulate_timing.then_some(duration)
        };

        if let Some(micros) = sleep_micros {
            thread::sleep(Duration::from_micros(micros));
        }

        Ok(())
    }

    fn release(&mut self) {
        if let Ok(mut state) = self.shared.lock() {
            state.params = None;
        }
    }
}
