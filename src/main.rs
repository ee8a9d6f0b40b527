// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Args, Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docuvoice::audio::{self, pcm, wav, SampleBuffer};
use docuvoice::config;
use docuvoice::player::Player;
use docuvoice::util::{filename_display, position_minutes_seconds};

/// Characters used to draw the spectrum, from silent to full scale.
const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Number of columns in the spectrum display.
const SPECTRUM_COLUMNS: usize = 32;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays and exports synthesized narration audio."
)]
struct Cli {
    /// The path to the player config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// The path to headerless 16-bit little-endian PCM.
    path: PathBuf,
    /// The file holds base64 text instead of raw bytes.
    #[arg(long)]
    base64: bool,
    /// The sample rate of the PCM.
    #[arg(long, default_value_t = pcm::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
    /// The number of interleaved channels in the PCM.
    #[arg(long, default_value_t = pcm::DEFAULT_CHANNELS)]
    channels: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Decodes PCM and prints its format and length.
    Inspect {
        #[command(flatten)]
        input: Input,
    },
    /// Decodes PCM and writes it as a WAV file into the given directory.
    Export {
        #[command(flatten)]
        input: Input,
        /// The directory to write the WAV file to.
        dir: PathBuf,
        /// Only export this many seconds from the start, clamped to the buffer length.
        #[arg(short, long)]
        seconds: Option<f64>,
    },
    /// Plays PCM through the audio interface, drawing its spectrum.
    Play {
        #[command(flatten)]
        input: Input,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
    },
}

fn read_buffer(input: &Input) -> Result<SampleBuffer, Box<dyn Error>> {
    let buffer = if input.base64 {
        let payload = fs::read_to_string(&input.path)?;
        pcm::decode_base64(&payload, input.sample_rate, input.channels)?
    } else {
        let bytes = fs::read(&input.path)?;
        pcm::decode(&bytes, input.sample_rate, input.channels)?
    };
    info!(
        file = filename_display(&input.path),
        frames = buffer.frame_count(),
        "Decoded PCM."
    );
    Ok(buffer)
}

/// Draws one spectrum frame on a single terminal line.
fn draw_spectrum(magnitudes: &[u8], position: f64, duration: &str) {
    let column_width = magnitudes.len().div_ceil(SPECTRUM_COLUMNS).max(1);
    let bars: String = magnitudes
        .chunks(column_width)
        .map(|column| {
            let peak = column.iter().copied().max().unwrap_or(0);
            BARS[usize::from(peak) * (BARS.len() - 1) / 255]
        })
        .collect();
    eprint!(
        "\r{} / {} |{}|",
        position_minutes_seconds(position),
        duration,
        bars
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut player_config = config::load_player(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Inspect { input } => {
            let buffer = read_buffer(&input)?;
            println!("{}: {}", filename_display(&input.path), buffer);
        }
        Commands::Export {
            input,
            dir,
            seconds,
        } => {
            let buffer = read_buffer(&input)?;
            let frames = match seconds {
                Some(seconds) => buffer.frame_at(seconds),
                None => buffer.frame_count(),
            };
            let path = wav::export_frames(&buffer, frames, &dir, player_config.product())?;
            println!("Wrote {}", path.display());
        }
        Commands::Play { input, device } => {
            if let Some(device) = device {
                player_config.set_device(&device);
            }
            if player_config.audio().device().starts_with("mock") {
                return Err("playing needs a real output device".into());
            }

            let buffer = Arc::new(read_buffer(&input)?);
            let device = audio::get_device(player_config.audio())?;
            let mut player = Player::new(device, player_config.player_settings()?)?;
            player.load_buffer(buffer);

            let duration = position_minutes_seconds(player.duration());
            player.subscribe(Box::new(move |magnitudes, position| {
                draw_spectrum(magnitudes, position, &duration)
            }));

            let mut interval = tokio::time::interval(player_config.frame_interval()?);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            player.play();
            while player.is_playing() {
                interval.tick().await;
                player.on_frame();
            }
            eprintln!();

            player.close();
        }
    }

    Ok(())
}
