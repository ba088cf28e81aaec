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
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::config;
use crate::pads::PadBoard;

pub mod keyboard;
pub mod midi;

/// How many controller events may queue up before drivers wait.
const EVENT_QUEUE_SIZE: usize = 32;

/// Controller events that will trigger behavior on the pad board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Triggers the given pad.
    Trigger(usize),

    /// Stops the given pad. If it isn't playing, does nothing.
    Stop(usize),

    /// Stops every pad.
    StopAll,

    /// Stops every pad and closes the controller.
    Shutdown,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Creates the driver described by the configuration.
pub fn driver(
    config: &config::Controller,
    pads: usize,
) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    let driver: Arc<dyn Driver> = match config {
        config::Controller::Keyboard => Arc::new(keyboard::Driver::new(pads)),
        config::Controller::Midi(midi_config) => Arc::new(midi::Driver::new(
            midi_config,
            crate::midi::get_device(midi_config.device())?,
            pads,
        )),
    };
    Ok(driver)
}

/// Feeds events from drivers to a pad board.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given drivers. The controller runs until a driver
    /// asks it to shut down or every driver has stopped.
    pub fn new(board: Arc<PadBoard>, drivers: Vec<Arc<dyn Driver>>) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::dispatch_events(board, drivers).instrument(span)),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Watches every driver and hands their events to the board.
    async fn dispatch_events(board: Arc<PadBoard>, drivers: Vec<Arc<dyn Driver>>) {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let monitors = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect::<Vec<JoinHandle<Result<(), io::Error>>>>();
        drop(events_tx);

        info!(
            pads = board.len(),
            drivers = monitors.len(),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            debug!(event = ?event, "Received event.");

            let result = match event {
                Event::Trigger(pad) => board.trigger(pad),
                Event::Stop(pad) => board.stop(pad),
                Event::StopAll => {
                    board.stop_all();
                    Ok(())
                }
                Event::Shutdown => break,
            };
            if let Err(e) = result {
                warn!(err = e.to_string(), "Unable to handle event.");
            }
        }

        info!("Controller closing.");
        board.stop_all();
        drop(events_rx);

        for monitor in monitors {
            if !monitor.is_finished() {
                monitor.abort();
                continue;
            }
            match monitor.await {
                Ok(Err(e)) => error!(err = e.to_string(), "Event monitor failed."),
                Err(e) => error!(err = e.to_string(), "Error waiting for event monitor to stop."),
                Ok(Ok(())) => {}
            }
        }
    }
}
