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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::mixer::{ActiveSource, AudioMixer};
use crate::audio::{Device as AudioDevice, DeviceInfo, PlaybackError, PlaybackHandle};
use crate::clips::Clip;
use crate::config;

/// An output device backed by a continuously running cpal stream. Clips are handed to
/// the stream's mixer over a channel, so starting playback never waits on the hardware.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host the device belongs to.
    host: String,
    /// The number of output channels the stream was opened with.
    channels: u16,
    /// The output sample rate.
    sample_rate: u32,
    /// Queue of new sources for the mixer.
    source_tx: crossbeam_channel::Sender<ActiveSource>,
    /// Cleared when the stream reports an error.
    healthy: Arc<AtomicBool>,
    /// Dropping this tells the output thread to close the stream.
    shutdown_tx: Option<crossbeam_channel::Sender<()>>,
    /// The thread that owns the stream.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.channels, self.host
        )
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> Option<String> {
    device.name().ok()
}

impl Device {
    /// Lists output devices on every available host.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<DeviceInfo> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let (Some(name), Ok(output_config)) =
                    (device_name(&device), device.default_output_config())
                else {
                    continue;
                };

                devices.push(DeviceInfo {
                    name,
                    host: host_id.name().to_string(),
                    channels: output_config.channels(),
                    sample_rate: output_config.sample_rate(),
                });
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Finds the named device, or the default output device for "default".
    fn find(name: &str) -> Result<(cpal::Device, cpal::HostId), Box<dyn Error>> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device found")?;
            return Ok((device, host.id()));
        }

        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;
        for host_id in cpal::available_hosts() {
            let Ok(host_devices) = cpal::host_from_id(host_id)?.output_devices() else {
                continue;
            };
            for device in host_devices {
                if device_name(&device).is_some_and(|device_name| device_name.trim() == name) {
                    return Ok((device, host_id));
                }
            }
        }

        Err(format!("no device found with name {}", name).into())
    }

    /// Opens the configured device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let (device, host_id) = Device::find(config.device())?;
        let name = device_name(&device).unwrap_or_else(|| config.device().to_string());

        let default_config = device.default_output_config()?;
        let channels = default_config.channels();
        let sample_rate = config
            .sample_rate()
            .unwrap_or_else(|| default_config.sample_rate());
        let sample_format = default_config.sample_format();

        let (source_tx, source_rx) = crossbeam_channel::unbounded::<ActiveSource>();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let healthy = Arc::new(AtomicBool::new(true));

        // cpal streams can't be moved between threads, so a dedicated thread owns it.
        let output_thread = {
            let healthy = healthy.clone();
            let name = name.clone();
            thread::Builder::new()
                .name("trigpad-output".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "output thread");
                    let _enter = span.enter();

                    let stream_config = cpal::StreamConfig {
                        channels,
                        sample_rate,
                        buffer_size: cpal::BufferSize::Default,
                    };
                    let mixer = AudioMixer::new(channels, source_rx);

                    let stream = match sample_format {
                        cpal::SampleFormat::F32 => {
                            build_stream::<f32>(&device, &stream_config, mixer, healthy)
                        }
                        cpal::SampleFormat::I16 => {
                            build_stream::<i16>(&device, &stream_config, mixer, healthy)
                        }
                        cpal::SampleFormat::I32 => {
                            build_stream::<i32>(&device, &stream_config, mixer, healthy)
                        }
                        cpal::SampleFormat::U16 => {
                            build_stream::<u16>(&device, &stream_config, mixer, healthy)
                        }
                        other => Err(format!("unsupported sample format {}", other)),
                    }
                    .and_then(|stream| {
                        stream.play().map_err(|e| e.to_string())?;
                        Ok(stream)
                    });

                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = started_tx.send(Err(e));
                            return;
                        }
                    };

                    info!(
                        device = name,
                        channels, sample_rate, "Output stream started"
                    );
                    let _ = started_tx.send(Ok(()));

                    // Returns once the device is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    info!(device = name, "Output stream closed");
                })?
        };

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(format!("unable to start output stream on {}: {}", name, e).into());
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(format!("output thread for {} exited unexpectedly", name).into());
            }
        }

        Ok(Device {
            name,
            host: host_id.name().to_string(),
            channels,
            sample_rate,
            source_tx,
            healthy,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

/// Builds an output stream that pulls blocks from the mixer and converts them to the
/// device's sample type.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
    healthy: Arc<AtomicBool>,
) -> Result<cpal::Stream, String>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.mix(&mut scratch);
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src);
                }
            },
            move |err| {
                error!(err = err.to_string(), "Output stream error");
                healthy.store(false, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| e.to_string())
}

impl AudioDevice for Device {
    fn start_playback(&self, clip: &Clip) -> Result<PlaybackHandle, PlaybackError> {
        if !self.healthy.load(Ordering::Relaxed) {
            return Err(PlaybackError::DeviceUnavailable(format!(
                "output stream on {} has failed",
                self.name
            )));
        }

        let data = clip.data();
        if data.channel_count() == 0 {
            return Err(PlaybackError::UnsupportedClip {
                pad: clip.id(),
                channels: data.channel_count(),
            });
        }

        let handle = PlaybackHandle::new(clip.id());
        self.source_tx
            .send(ActiveSource::new(handle.clone(), data.clone()))
            .map_err(|e| PlaybackError::Queue(e.to_string()))?;
        Ok(handle)
    }

    fn stop_playback(&self, handle: &PlaybackHandle) {
        handle.stop();
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(self.sample_rate)
    }
}
