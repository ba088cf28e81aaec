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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const STOP: &str = "stop";
const QUIT: &str = "quit";

/// A controller that drives the pads from lines typed on the keyboard.
pub struct Driver {
    pads: usize,
}

impl Driver {
    pub fn new(pads: usize) -> Driver {
        Driver { pads }
    }

    /// Parses one line of input. A bare number triggers that pad.
    fn parse(input: &str) -> Option<Event> {
        let mut words = input.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some(QUIT), None, None) => Some(Event::Shutdown),
            (Some(STOP), None, None) => Some(Event::StopAll),
            (Some(STOP), Some(pad), None) => pad.parse().ok().map(Event::Stop),
            (Some(pad), None, None) => pad.parse().ok().map(Event::Trigger),
            _ => None,
        }
    }

    /// Reads and handles one command. Returns false once there is nothing more to read.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        pads: usize,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command (0-{}, {} [pad], {}): ",
            pads.saturating_sub(1),
            STOP,
            QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return Ok(true);
        }

        match Self::parse(&input) {
            Some(event) => {
                events_tx.blocking_send(event).map_err(io::Error::other)?;
                Ok(event != Event::Shutdown)
            }
            None => {
                warn!(input = input, "Unrecognized input");
                Ok(true)
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let pads = self.pads;
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, pads, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
