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
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::audio::{PlaybackError, PlaybackHandle};
use crate::clips::Clip;

/// A playback tracked by the mock device.
struct MockPlayback {
    handle: PlaybackHandle,
    started: Instant,
    duration: Duration,
}

impl MockPlayback {
    fn is_playing(&self) -> bool {
        !self.handle.is_stopped() && self.started.elapsed() < self.duration
    }
}

/// A mock device. Doesn't actually play anything, but keeps track of what it was asked
/// to play and for how long.
pub struct Device {
    name: String,
    failing: AtomicBool,
    playbacks: Mutex<Vec<MockPlayback>>,
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            playbacks: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
        }
    }

    /// When set, every start of playback fails as if the device had gone away.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// The number of playbacks that were successfully started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    /// The number of explicit stops the device has received.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Returns true if a clip for the given pad is still sounding.
    pub fn is_playing(&self, pad: usize) -> bool {
        self.playbacks
            .lock()
            .iter()
            .any(|playback| playback.handle.pad() == pad && playback.is_playing())
    }

    /// The number of clips still sounding.
    pub fn playing_count(&self) -> usize {
        self.playbacks
            .lock()
            .iter()
            .filter(|playback| playback.is_playing())
            .count()
    }
}

impl crate::audio::Device for Device {
    fn start_playback(&self, clip: &Clip) -> Result<PlaybackHandle, PlaybackError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(PlaybackError::DeviceUnavailable(format!(
                "{} is failing",
                self.name
            )));
        }

        let handle = PlaybackHandle::new(clip.id());
        info!(device = self.name, pad = clip.id(), "Playing clip.");

        let mut playbacks = self.playbacks.lock();
        playbacks.retain(|playback| playback.is_playing());
        playbacks.push(MockPlayback {
            handle: handle.clone(),
            started: Instant::now(),
            duration: clip.duration(),
        });
        self.started.fetch_add(1, Ordering::Relaxed);

        Ok(handle)
    }

    fn stop_playback(&self, handle: &PlaybackHandle) {
        handle.stop();
        self.stopped.fetch_add(1, Ordering::Relaxed);
    }

    fn sample_rate(&self) -> Option<u32> {
        None
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
