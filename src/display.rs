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

//! Renders the board as a grid of text cells.

use std::io::{self, Write};
use std::sync::Arc;

use tokio::{
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::{error, span, warn, Instrument, Level};

use crate::pads::{PadBoard, PadState};

const PLAYING_CELL: &str = "[##]";
const IDLE_CELL: &str = "[  ]";

/// Renders pad states as rows of `columns` cells.
pub fn render(states: &[PadState], columns: usize) -> String {
    states
        .chunks(columns.max(1))
        .map(|row| {
            row.iter()
                .map(|state| match state {
                    PadState::Playing => PLAYING_CELL,
                    PadState::Idle => IDLE_CELL,
                })
                .collect::<Vec<&str>>()
                .join(" ")
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Prints the board to stdout after every notification.
pub fn spawn(board: Arc<PadBoard>, columns: usize) -> JoinHandle<()> {
    spawn_with_writer(board, columns, io::stdout())
}

/// Writes the board to the writer after every notification until the task is aborted.
pub fn spawn_with_writer<W>(board: Arc<PadBoard>, columns: usize, mut writer: W) -> JoinHandle<()>
where
    W: Write + Send + 'static,
{
    let mut events = board.subscribe();
    let mut states = board.states();

    let span = span!(Level::INFO, "display");
    tokio::spawn(
        async move {
            loop {
                let heading = match events.recv().await {
                    Ok(event) => {
                        if let Some(state) = states.get_mut(event.pad()) {
                            *state = event.state();
                        }
                        event.to_string()
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Display fell behind, resynchronizing.");
                        states = board.states();
                        format!("missed {} updates", skipped)
                    }
                    Err(RecvError::Closed) => return,
                };

                if let Err(e) = writeln!(writer, "{}\n{}\n", heading, render(&states, columns))
                    .and_then(|_| writer.flush())
                {
                    error!(err = e.to_string(), "Unable to draw board.");
                    return;
                }
            }
        }
        .instrument(span),
    )
}
