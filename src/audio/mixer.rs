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
// Block mixer used by the cpal output callback.
use crossbeam_channel::Receiver;

use crate::audio::PlaybackHandle;
use crate::clips::ClipData;

/// A clip that is currently being mixed into the output.
pub struct ActiveSource {
    /// The handle used to stop this source.
    pub handle: PlaybackHandle,
    /// The clip data being played.
    pub data: ClipData,
    /// The next frame to be read.
    pub frame: usize,
}

impl ActiveSource {
    pub fn new(handle: PlaybackHandle, data: ClipData) -> ActiveSource {
        ActiveSource {
            handle,
            data,
            frame: 0,
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_stopped() || self.frame >= self.data.frames()
    }

    /// Adds as many frames as are left into the interleaved output. Mono clips are sent to
    /// every output channel, otherwise source channels map one to one and extra output
    /// channels are left untouched.
    fn mix_into(&mut self, output: &mut [f32], num_channels: usize) {
        let source_channels = self.data.channel_count() as usize;
        let samples = self.data.samples();

        for out_frame in output.chunks_mut(num_channels) {
            if self.frame >= self.data.frames() {
                break;
            }
            let base = self.frame * source_channels;
            for (channel, out) in out_frame.iter_mut().enumerate() {
                let sample = if source_channels == 1 {
                    samples[base]
                } else if channel < source_channels {
                    samples[base + channel]
                } else {
                    0.0
                };
                *out += sample;
            }
            self.frame += 1;
        }
    }
}

/// Mixes active sources into fixed size output blocks.
pub struct AudioMixer {
    /// Sources currently playing.
    sources: Vec<ActiveSource>,
    /// New sources queued by the device.
    incoming: Receiver<ActiveSource>,
    /// Number of output channels.
    num_channels: usize,
}

impl AudioMixer {
    pub fn new(num_channels: u16, incoming: Receiver<ActiveSource>) -> AudioMixer {
        AudioMixer {
            sources: Vec::new(),
            incoming,
            num_channels: num_channels.max(1) as usize,
        }
    }

    /// Fills the interleaved output buffer with the mix of all active sources. Sources
    /// that have finished or been stopped are dropped.
    pub fn mix(&mut self, output: &mut [f32]) {
        while let Ok(source) = self.incoming.try_recv() {
            self.sources.push(source);
        }

        output.fill(0.0);
        let num_channels = self.num_channels;
        self.sources.retain_mut(|source| {
            if source.is_finished() {
                return false;
            }
            source.mix_into(output, num_channels);
            !source.is_finished()
        });
    }

    /// The number of sources still playing.
    pub fn active(&self) -> usize {
        self.sources.len()
    }
}
