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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{debug, info, span, Instrument, Level};

use crate::{config, midi::Device};

use super::Event;

/// Maps incoming notes to controller events.
#[derive(Clone, Debug)]
struct NoteMapping {
    base_note: u8,
    pads: usize,
    /// Zero based MIDI channel to listen on.
    channel: Option<u8>,
    stop_all_note: Option<u8>,
}

impl NoteMapping {
    /// Returns the event for a raw MIDI message, if it means anything to the board.
    fn event_for(&self, raw_event: &[u8]) -> Option<Event> {
        let LiveEvent::Midi { channel, message } = LiveEvent::parse(raw_event).ok()? else {
            return None;
        };
        if self
            .channel
            .is_some_and(|expected| expected != channel.as_int())
        {
            return None;
        }

        // A note on with no velocity is a note off.
        let MidiMessage::NoteOn { key, vel } = message else {
            return None;
        };
        if vel.as_int() == 0 {
            return None;
        }

        let key = key.as_int();
        if self.stop_all_note == Some(key) {
            return Some(Event::StopAll);
        }
        let pad = key.checked_sub(self.base_note)? as usize;
        if pad >= self.pads {
            return None;
        }
        Some(Event::Trigger(pad))
    }
}

/// A controller that drives the pads from a MIDI input device.
pub struct Driver {
    /// The MIDI device.
    midi_device: Arc<dyn Device>,
    mapping: NoteMapping,
}

impl Driver {
    pub fn new(
        config: &config::MidiController,
        midi_device: Arc<dyn Device>,
        pads: usize,
    ) -> Driver {
        Driver {
            midi_device,
            mapping: NoteMapping {
                base_note: config.base_note(),
                pads,
                channel: config.channel().map(|channel| channel.saturating_sub(1)),
                stop_all_note: config.stop_all_note(),
            },
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(10);
        let device = self.midi_device.clone();
        let mapping = self.mapping.clone();

        let span = span!(Level::INFO, "MIDI driver");
        tokio::spawn(
            async move {
                if let Err(e) = device.watch_events(midi_events_tx) {
                    return Err(io::Error::other(e.to_string()));
                }
                info!(device = device.name(), "MIDI driver started.");

                loop {
                    let raw_event = tokio::select! {
                        raw_event = midi_events_rx.recv() => raw_event,
                        _ = events_tx.closed() => None,
                    };
                    let Some(raw_event) = raw_event else {
                        info!("MIDI watcher closed.");
                        device.stop_watch_events();
                        return Ok(());
                    };

                    let Some(event) = mapping.event_for(&raw_event) else {
                        debug!(event = ?raw_event, "Ignoring MIDI event.");
                        continue;
                    };
                    if events_tx.send(event).await.is_err() {
                        device.stop_watch_events();
                        return Ok(());
                    }
                }
            }
            .instrument(span),
        )
    }
}
