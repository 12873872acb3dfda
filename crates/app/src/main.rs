use std::{path::PathBuf, thread, time::Duration};

use clap::{Parser, Subcommand};
use neopixel_core::{
    ChannelConfig, Color, Controller, ControllerConfig, NeopixelError, StripType,
    DEFAULT_DMA_CHANNEL, DEFAULT_FREQUENCY_HZ,
};
use tracing_subscriber::EnvFilter;

fn main() -> neopixel_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            pixels,
            frames,
            brightness,
            strip_type,
        } => run_demo(pixels, frames, brightness, strip_type),
        Commands::Encode {
            color,
            pixels,
            strip_type,
            brightness,
            output,
        } => run_encode(color, pixels, strip_type, brightness, output.as_deref()),
    }
}

/// Runs a color-wheel chase against the simulated transport and reports how
/// long the frames would have occupied the wire.
fn run_demo(
    pixels: usize,
    frames: u32,
    brightness: u16,
    strip_type: StripType,
) -> neopixel_core::Result<()> {
    tracing::info!(pixels, frames, "starting demo chase");

    let config = ControllerConfig::new().with_channel(ChannelConfig {
        strip_type,
        ..ChannelConfig::new(pixels, 18)
    });
    let (controller, engine) = Controller::with_simulated_engine(config)?;
    let channel = controller.channel(0)?;
    channel.set_brightness(brightness)?;

    controller.init()?;
    engine.emulate_timing(true);

    for frame in 0..frames {
        for pos in 0..pixels {
            let hue = (frame as usize * 8 + pos * 256 / pixels.max(1)) as u8;
            channel.set_color(pos, wheel(hue))?;
        }
        controller.render()?;
        thread::sleep(Duration::from_millis(20));
    }

    let wire_micros = engine
        .last_frame()
        .iter()
        .map(|waveform| waveform.duration_micros(DEFAULT_FREQUENCY_HZ))
        .max()
        .unwrap_or(0);
    tracing::info!(
        transfers = engine.transfer_count(),
        wire_micros,
        "demo finished"
    );
    controller.release();
    Ok(())
}

/// Encodes a single solid-color frame and emits a JSON summary of the
/// resulting symbol stream, to stdout or to a file.
fn run_encode(
    color: Color,
    pixels: usize,
    strip_type: StripType,
    brightness: u16,
    output: Option<&std::path::Path>,
) -> neopixel_core::Result<()> {
    tracing::info!(%color, pixels, %strip_type, "encoding frame");

    let config = ControllerConfig {
        dma_channel: DEFAULT_DMA_CHANNEL,
        ..ControllerConfig::new().with_channel(ChannelConfig {
            strip_type,
            ..ChannelConfig::new(pixels, 18)
        })
    };
    let (controller, engine) = Controller::with_simulated_engine(config)?;
    controller.channel(0)?.set_brightness(brightness)?;
    controller.channel(0)?.fill(color)?;
    controller.init()?;
    controller.render()?;

    let frame = engine.last_frame();
    let waveform = frame
        .first()
        .ok_or_else(|| NeopixelError::Render("channel encoded to an empty frame".to_string()))?;
    let summary = serde_json::json!({
        "color": color.to_string(),
        "strip_type": strip_type.to_string(),
        "pixels": pixels,
        "symbol_bits": waveform.bit_len(),
        "dma_words": waveform.words().len(),
        "wire_micros": waveform.duration_micros(DEFAULT_FREQUENCY_HZ),
    });

    match output {
        Some(path) => std::fs::write(path, summary.to_string())?,
        None => println!("{summary}"),
    }
    Ok(())
}

/// Maps a hue position onto the classic red-green-blue color wheel.
fn wheel(pos: u8) -> Color {
    match pos {
        0..=84 => Color::rgb(255 - pos * 3, pos * 3, 0),
        85..=169 => {
            let pos = pos - 85;
            Color::rgb(0, 255 - pos * 3, pos * 3)
        }
        _ => {
            let pos = pos - 170;
            Color::rgb(pos * 3, 0, 255 - pos * 3)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "WS281x LED strip driver playground", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Animate a color-wheel chase on a simulated strip.
    Demo {
        /// Number of pixels on the strip.
        #[arg(short, long, default_value_t = 30)]
        pixels: usize,
        /// Number of animation frames to render.
        #[arg(short, long, default_value_t = 120)]
        frames: u32,
        /// Overall brightness, 0 to 255.
        #[arg(short, long, default_value_t = 255)]
        brightness: u16,
        /// Byte ordering of the strip, e.g. grb or grbw.
        #[arg(short, long, default_value_t = StripType::Grb)]
        strip_type: StripType,
    },
    /// Encode a solid color and print the symbol stream statistics.
    Encode {
        /// Color as RRGGBB or WWRRGGBB hex, with optional leading '#'.
        color: Color,
        /// Number of pixels on the strip.
        #[arg(short, long, default_value_t = 8)]
        pixels: usize,
        /// Byte ordering of the strip, e.g. grb or grbw.
        #[arg(short, long, default_value_t = StripType::Grb)]
        strip_type: StripType,
        /// Overall brightness, 0 to 255.
        #[arg(short, long, default_value_t = 255)]
        brightness: u16,
        /// Write the JSON summary to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
