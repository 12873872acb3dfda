/// Result alias that carries the custom [`NeopixelError`] type.
pub type Result<T> = std::result::Result<T, NeopixelError>;

/// Common error type for the driver core.
///
/// The variants split along recovery lines: configuration and index errors
/// are caller-correctable, hardware init failures are fatal to the
/// controller instance, and render faults may be retried by the caller.
#[derive(Debug, thiserror::Error)]
pub enum NeopixelError {
    /// Invalid channel or controller parameters, surfaced at configuration
    /// time before any hardware is touched.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The DMA channel is already claimed by another controller in this
    /// process.
    #[error("DMA channel {dma_channel} is already claimed by another controller")]
    PeripheralBusy { dma_channel: u8 },
    /// The hardware backend could not acquire the PWM/DMA peripherals,
    /// typically because of a conflicting process or missing privileges.
    #[error("hardware initialisation failed: {0}")]
    HardwareInit(String),
    /// A DMA transfer fault while streaming the signal. The caller may
    /// retry the render; no retry happens internally.
    #[error("render failed: {0}")]
    Render(String),
    /// Pixel access outside the configured strip length.
    #[error("pixel index {index} out of range for a strip of {len} pixels")]
    PixelIndex { index: usize, len: usize },
    /// Brightness values must fit in 0..=255.
    #[error("brightness {0} out of range (0-255)")]
    BrightnessOutOfRange(u16),
    /// Channel index beyond the fixed number of hardware channels.
    #[error("channel index {index} out of range ({max} hardware channels)")]
    ChannelIndex { index: usize, max: usize },
    /// The operation is not valid in the controller's current lifecycle
    /// state.
    #[error("cannot {operation} while the controller is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// An internal lock was poisoned by a panicking thread.
    #[error("{0} lock has been poisoned")]
    Poisoned(&'static str),
    /// Filesystem errors from the tooling around the driver.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NeopixelError {
    /// Creates a configuration error from a message.
    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a render error from a message.
    pub(crate) fn render<T: Into<String>>(msg: T) -> Self {
        Self::Render(msg.into())
    }
}
