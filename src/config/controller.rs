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
use serde::Deserialize;

const DEFAULT_BASE_NOTE: u8 = 36;

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    Keyboard,
    Midi(MidiController),
}

/// The configuration that maps MIDI notes to pads.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MidiController {
    /// The MIDI input device to listen to.
    device: String,

    /// The note that triggers pad 0. Pad `i` is triggered by `base_note + i`.
    #[serde(default = "default_base_note")]
    base_note: u8,

    /// Only listen on this MIDI channel (1-16). Listens on all channels if unset.
    channel: Option<u8>,

    /// The note that stops every pad.
    stop_all_note: Option<u8>,
}

fn default_base_note() -> u8 {
    DEFAULT_BASE_NOTE
}

impl MidiController {
    pub fn new(device: &str, base_note: u8) -> MidiController {
        MidiController {
            device: device.to_string(),
            base_note,
            channel: None,
            stop_all_note: None,
        }
    }

    /// The MIDI input device to listen to.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// The note of pad 0.
    pub fn base_note(&self) -> u8 {
        self.base_note
    }

    /// The MIDI channel to listen on, 1-16.
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// The note that stops every pad.
    pub fn stop_all_note(&self) -> Option<u8> {
        self.stop_all_note
    }
}
