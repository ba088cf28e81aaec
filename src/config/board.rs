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
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::clips::AssetSource;
use crate::pads::RetriggerBehavior;

use super::{Audio, ConfigError, Controller};

const DEFAULT_PADS: usize = 16;
const DEFAULT_COLUMNS: usize = 4;
const DEFAULT_EVENT_CAPACITY: usize = 64;
const DEFAULT_CLIPS_PATH: &str = "sounds";
const DEFAULT_CLIPS_EXTENSION: &str = "wav";

/// Where the clips live and how their files are named.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Clips {
    /// The clip directory. Relative paths are relative to the config file.
    #[serde(default = "default_clips_path")]
    path: PathBuf,

    /// The file extension of every clip.
    #[serde(default = "default_clips_extension")]
    extension: String,
}

impl Default for Clips {
    fn default() -> Self {
        Clips {
            path: default_clips_path(),
            extension: default_clips_extension(),
        }
    }
}

fn default_clips_path() -> PathBuf {
    PathBuf::from(DEFAULT_CLIPS_PATH)
}

fn default_clips_extension() -> String {
    DEFAULT_CLIPS_EXTENSION.to_string()
}

fn default_pads() -> usize {
    DEFAULT_PADS
}

fn default_columns() -> usize {
    DEFAULT_COLUMNS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// The configuration of a pad board.
#[derive(Deserialize, Clone, Debug)]
pub struct Board {
    /// The number of pads.
    #[serde(default = "default_pads")]
    pads: usize,

    /// How many pads the display shows per row.
    #[serde(default = "default_columns")]
    columns: usize,

    #[serde(default)]
    clips: Clips,

    /// What to do when a playing pad is triggered again.
    #[serde(default)]
    retrigger: RetriggerBehavior,

    /// How many notifications a slow listener may fall behind by.
    #[serde(default = "default_event_capacity")]
    event_capacity: usize,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    controllers: Vec<Controller>,

    /// The directory the configuration was loaded from.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Board {
    /// Loads the board configuration from the given file. The format is taken from the
    /// file extension.
    pub fn deserialize(path: &Path) -> Result<Board, ConfigError> {
        let board: Board = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        board.with_base_path(path.parent().unwrap_or(Path::new("")))
    }

    /// Parses a board configuration from a YAML string. Relative clip paths are
    /// resolved against the given base path.
    pub fn from_yaml(yaml: &str, base_path: &Path) -> Result<Board, ConfigError> {
        let board: Board = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        board.with_base_path(base_path)
    }

    fn with_base_path(mut self, base_path: &Path) -> Result<Board, ConfigError> {
        self.base_path = base_path.to_path_buf();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pads == 0 {
            return Err(ConfigError::Invalid("pads must be at least 1".to_string()));
        }
        if self.columns == 0 {
            return Err(ConfigError::Invalid(
                "columns must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.clips.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "clips.extension must not be empty".to_string(),
            ));
        }

        for controller in &self.controllers {
            let Controller::Midi(midi) = controller else {
                continue;
            };
            if let Some(channel) = midi.channel() {
                if !(1..=16).contains(&channel) {
                    return Err(ConfigError::Invalid(format!(
                        "MIDI channel {} is out of range (1-16)",
                        channel
                    )));
                }
            }
            let last_note = midi.base_note() as usize + self.pads - 1;
            if last_note > 127 {
                return Err(ConfigError::Invalid(format!(
                    "base note {} leaves no room for {} pads",
                    midi.base_note(),
                    self.pads
                )));
            }
            if midi.stop_all_note().is_some_and(|note| note > 127) {
                return Err(ConfigError::Invalid(
                    "stop_all_note must be a MIDI note (0-127)".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The number of pads.
    pub fn pads(&self) -> usize {
        self.pads
    }

    /// The display width.
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// The resolved clip directory.
    pub fn clips_directory(&self) -> PathBuf {
        if self.clips.path.is_absolute() {
            self.clips.path.clone()
        } else {
            self.base_path.join(&self.clips.path)
        }
    }

    /// The asset source the clip library loads from.
    pub fn asset_source(&self) -> AssetSource {
        AssetSource::new(self.clips_directory(), &self.clips.extension)
    }
}
