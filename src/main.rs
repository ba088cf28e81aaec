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
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trigpad::clips::ClipLibrary;
use trigpad::config::{self, Board};
use trigpad::controller::{self, Controller, Driver};
use trigpad::pads::PadBoard;
use trigpad::util::{duration_display, filename_display};
use trigpad::{audio, display, midi};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A grid of sound trigger pads."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads and lists the clip for every pad.
    Clips {
        /// The path to the board config.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Start will start the pad board.
    Start {
        /// The path to the board config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clips { config_path } => {
            let board_config = Board::deserialize(&PathBuf::from(&config_path))?;
            let library = ClipLibrary::load(
                &board_config.asset_source(),
                board_config.pads(),
                board_config.audio().sample_rate(),
            )?;

            println!(
                "Clips (count: {}, memory: {} KiB):",
                library.len(),
                library.memory_usage() / 1024
            );
            for clip in library.iter() {
                println!(
                    "- {:>2}: {} ({}, channels={}, sample_rate={})",
                    clip.id(),
                    clip.source().map(filename_display).unwrap_or("in memory"),
                    duration_display(clip.duration()),
                    clip.data().channel_count(),
                    clip.data().sample_rate(),
                );
            }
        }
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
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { config_path } => {
            let board_config = Board::deserialize(&PathBuf::from(&config_path))?;
            let device = audio::get_device(board_config.audio())?;
            let sample_rate = board_config.audio().sample_rate().or(device.sample_rate());
            let library = Arc::new(ClipLibrary::load(
                &board_config.asset_source(),
                board_config.pads(),
                sample_rate,
            )?);

            let board = Arc::new(PadBoard::new(
                library,
                device,
                board_config.retrigger(),
                board_config.event_capacity(),
            ));
            let display = display::spawn(board.clone(), board_config.columns());

            let drivers = if board_config.controllers().is_empty() {
                vec![controller::driver(&config::Controller::Keyboard, board.len())?]
            } else {
                board_config
                    .controllers()
                    .iter()
                    .map(|controller_config| controller::driver(controller_config, board.len()))
                    .collect::<Result<Vec<Arc<dyn Driver>>, Box<dyn Error>>>()?
            };

            Controller::new(board, drivers).join().await?;
            display.abort();
            info!("Pad board stopped.");
        }
    }

    Ok(())
}
