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
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use sfmixer::{audio, config::init_synth, Synth};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-SoundFont synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the presets in a SoundFont.
    Presets {
        /// The path to the sf2 file.
        path: String,
    },
    /// Loads a synth config and plays a note on every configured channel.
    Play {
        /// The path to the synth config file.
        config_path: String,
        /// How long to hold the notes for.
        #[arg(short, long, default_value = "2s")]
        duration: String,
        /// The key to play.
        #[arg(short, long, default_value_t = 60)]
        key: u8,
        /// The velocity to play the key with.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

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
        Commands::Presets { path } => {
            let mut synth = Synth::new(0.0, sfmixer::synth::DEFAULT_SAMPLE_RATE);
            let sfid = synth.load(PathBuf::from(&path))?;
            let presets = synth.presets(sfid)?;

            if presets.is_empty() {
                println!("No presets found in {}.", path);
                return Ok(());
            }

            println!("Presets (count: {}):", presets.len());
            for preset in presets {
                println!("- {:03}:{:03} {}", preset.bank, preset.number, preset.name);
            }
        }
        Commands::Play {
            config_path,
            duration,
            key,
            velocity,
        } => {
            let duration: Duration = DurationString::from_string(duration)?.into();
            let (mut synth, config) = init_synth(&PathBuf::from(&config_path))?;
            let channels = synth.channels();
            if channels.is_empty() {
                return Err(format!("no programs configured in {}", config_path).into());
            }

            let device = audio::get_device(config.audio_device())?;
            info!(device = %device, channels = channels.len(), "Playing");
            synth.start_on(device)?;
            for (channel, _) in channels.iter() {
                synth.note_on(*channel, key, velocity);
            }
            thread::sleep(duration);

            synth.notes_off(None);
            // Let the release tails ring out.
            thread::sleep(Duration::from_millis(500));
            synth.stop();
        }
    }

    Ok(())
}
