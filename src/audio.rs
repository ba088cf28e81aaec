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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::clips::Clip;
use crate::config;

pub mod cpal;
pub mod mixer;
pub mod mock;

/// Global counter for playback handle IDs.
static PLAYBACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur when starting playback.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("clip for pad {pad} has an unsupported channel count of {channels}")]
    UnsupportedClip { pad: usize, channels: u16 },

    #[error("unable to queue playback: {0}")]
    Queue(String),
}

/// Identifies one in-flight playback of a clip.
#[derive(Clone, Debug)]
pub struct PlaybackHandle {
    id: u64,
    pad: usize,
    stopped: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Creates a handle for a new playback of the given pad's clip.
    pub fn new(pad: usize) -> PlaybackHandle {
        PlaybackHandle {
            id: PLAYBACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            pad,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Marks the playback as stopped. Stopping more than once has no further effect.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// An audio output that clips are played through.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts playing the clip from the beginning. Must not block on the hardware.
    fn start_playback(&self, clip: &Clip) -> Result<PlaybackHandle, PlaybackError>;

    /// Stops the given playback. Stopping a finished or already stopped playback is a no-op.
    fn stop_playback(&self, handle: &PlaybackHandle);

    /// The output sample rate, if the device has a fixed one.
    fn sample_rate(&self) -> Option<u32>;
}

/// Describes an output device found on the system.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub channels: u16,
    pub sample_rate: u32,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, {}Hz) ({})",
            self.name, self.channels, self.sample_rate, self.host
        )
    }
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
