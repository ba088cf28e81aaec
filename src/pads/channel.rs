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

//! The playback lifecycle of a single pad.
//!
//! A channel is either idle or playing. While playing it owns exactly one playback
//! handle and one reset timer. Every transition happens under the channel's lock, so
//! transitions for a pad are serialized while different pads never contend.
//!
//! Each reset timer carries the generation it was scheduled for. Superseded timers
//! are aborted, and a timer that still manages to fire for an old generation is
//! ignored, so it can never reset a later playback.

use std::{mem, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::{runtime::Handle, sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use crate::audio::{self, PlaybackHandle};
use crate::clips::Clip;

use super::events::{PadEvent, PadState};

/// What a pad does when it is triggered while it is already playing.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerBehavior {
    /// Stop the current playback and start the clip again from the beginning.
    #[default]
    Restart,

    /// Keep the current playback and do nothing.
    Ignore,
}

/// A scheduled return to idle.
struct ResetTimer {
    generation: u64,
    task: JoinHandle<()>,
}

enum Playback {
    Idle,
    Playing {
        handle: PlaybackHandle,
        reset: ResetTimer,
    },
}

struct Inner {
    playback: Playback,
    /// Incremented for every successful start of playback.
    generation: u64,
}

/// The part of a channel that reset timers hold on to.
struct Shared {
    pad: usize,
    events: broadcast::Sender<PadEvent>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn emit(&self, event: PadEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Returns the pad to idle if it is still playing the given generation.
    fn expire(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match &inner.playback {
            Playback::Playing { reset, .. } if reset.generation == generation => {}
            _ => {
                debug!(pad = self.pad, generation, "Ignoring stale reset timer");
                return false;
            }
        }

        // The clip has run its course, so there is nothing to stop.
        inner.playback = Playback::Idle;
        debug!(pad = self.pad, generation, "Pad deactivated");
        self.emit(PadEvent::Deactivated { pad: self.pad });
        true
    }
}

/// Owns one pad's playback state.
pub struct PadChannel {
    shared: Arc<Shared>,
    device: Arc<dyn audio::Device>,
    retrigger: RetriggerBehavior,
    runtime: Handle,
}

impl PadChannel {
    /// Creates an idle channel. Reset timers are spawned on the given runtime and
    /// notifications are published to the given sender.
    pub fn new(
        pad: usize,
        device: Arc<dyn audio::Device>,
        retrigger: RetriggerBehavior,
        events: broadcast::Sender<PadEvent>,
        runtime: Handle,
    ) -> PadChannel {
        PadChannel {
            shared: Arc::new(Shared {
                pad,
                events,
                inner: Mutex::new(Inner {
                    playback: Playback::Idle,
                    generation: 0,
                }),
            }),
            device,
            retrigger,
            runtime,
        }
    }

    /// The pad this channel belongs to.
    pub fn pad(&self) -> usize {
        self.shared.pad
    }

    /// The current state of the pad.
    pub fn state(&self) -> PadState {
        match self.shared.inner.lock().playback {
            Playback::Idle => PadState::Idle,
            Playback::Playing { .. } => PadState::Playing,
        }
    }

    /// Starts the clip from the beginning. A pad that is already playing is restarted
    /// or left alone depending on the retrigger behavior. Playback failures are
    /// reported as a notification and leave the pad idle.
    pub fn trigger(&self, clip: &Clip) {
        let pad = self.shared.pad;
        let mut inner = self.shared.inner.lock();

        if matches!(inner.playback, Playback::Playing { .. })
            && self.retrigger == RetriggerBehavior::Ignore
        {
            debug!(pad, "Ignoring trigger of playing pad");
            return;
        }

        if let Playback::Playing { handle, reset } =
            mem::replace(&mut inner.playback, Playback::Idle)
        {
            reset.task.abort();
            self.device.stop_playback(&handle);
            debug!(pad, generation = reset.generation, "Restarting pad");
        }

        let handle = match self.device.start_playback(clip) {
            Ok(handle) => handle,
            Err(cause) => {
                warn!(pad, err = cause.to_string(), "Trigger failed");
                self.shared.emit(PadEvent::TriggerFailed { pad, cause });
                return;
            }
        };

        inner.generation += 1;
        let generation = inner.generation;
        let task = self.schedule_reset(generation, clip.duration());
        inner.playback = Playback::Playing {
            handle,
            reset: ResetTimer { generation, task },
        };

        debug!(
            pad,
            generation,
            duration_ms = clip.duration().as_millis() as u64,
            "Pad activated"
        );
        self.shared.emit(PadEvent::Activated {
            pad,
            clip: clip.clone(),
        });
    }

    /// Stops the pad if it is playing. Stopping an idle pad does nothing.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        if let Playback::Playing { handle, reset } =
            mem::replace(&mut inner.playback, Playback::Idle)
        {
            reset.task.abort();
            self.device.stop_playback(&handle);
            debug!(pad = self.shared.pad, "Pad stopped");
            self.shared.emit(PadEvent::Deactivated {
                pad: self.shared.pad,
            });
        }
    }

    fn schedule_reset(&self, generation: u64, duration: Duration) -> JoinHandle<()> {
        let shared = self.shared.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            shared.expire(generation);
        })
    }
}

impl Drop for PadChannel {
    fn drop(&mut self) {
        if let Playback::Playing { reset, .. } = &self.shared.inner.lock().playback {
            reset.task.abort();
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use tokio::{
        runtime::Handle,
        sync::broadcast::{self, error::TryRecvError, Receiver},
        time::sleep,
    };

    use crate::audio::mock;
    use crate::clips::{ClipData, ClipLibrary};
    use crate::pads::{PadEvent, PadState};

    use super::{PadChannel, RetriggerBehavior};

    /// One second clip on pad 0, a zero length clip on pad 1.
    fn library() -> Result<ClipLibrary, Box<dyn Error>> {
        Ok(ClipLibrary::from_data(vec![
            ClipData::new(vec![0.0; 1000], 1, 1000),
            ClipData::new(Vec::new(), 1, 1000),
        ])?)
    }

    fn channel(
        retrigger: RetriggerBehavior,
    ) -> (PadChannel, Arc<mock::Device>, Receiver<PadEvent>) {
        let device = Arc::new(mock::Device::get("mock"));
        let (events_tx, events_rx) = broadcast::channel(16);
        let channel = PadChannel::new(0, device.clone(), retrigger, events_tx, Handle::current());
        (channel, device, events_rx)
    }

    fn assert_no_events(events: &mut Receiver<PadEvent>) {
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_then_auto_reset() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Restart);
        assert_eq!(PadState::Idle, channel.state());

        channel.trigger(library.get(0)?);
        assert_eq!(PadState::Playing, channel.state());
        assert!(device.is_playing(0));
        assert!(matches!(
            events.try_recv(),
            Ok(PadEvent::Activated { pad: 0, .. })
        ));
        assert_no_events(&mut events);

        sleep(Duration::from_millis(999)).await;
        assert_eq!(PadState::Playing, channel.state());
        assert_no_events(&mut events);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(PadState::Idle, channel.state());
        assert!(matches!(
            events.try_recv(),
            Ok(PadEvent::Deactivated { pad: 0 })
        ));
        assert_no_events(&mut events);

        // Natural expiry doesn't need an explicit stop.
        assert_eq!(0, device.stopped());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_restarts() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Restart);

        channel.trigger(library.get(0)?);
        sleep(Duration::from_millis(600)).await;
        channel.trigger(library.get(0)?);
        assert_eq!(2, device.started());
        assert_eq!(1, device.stopped());
        assert_eq!(1, device.playing_count());

        // The first playback would have ended here.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(PadState::Playing, channel.state());

        sleep(Duration::from_millis(401)).await;
        assert_eq!(PadState::Idle, channel.state());

        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert!(matches!(events.try_recv(), Ok(PadEvent::Deactivated { .. })));
        assert_no_events(&mut events);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_ignored() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, _device, _events) = channel(RetriggerBehavior::Restart);

        channel.trigger(library.get(0)?);
        channel.trigger(library.get(0)?);
        channel.trigger(library.get(0)?);

        assert!(!channel.shared.expire(1));
        assert!(!channel.shared.expire(2));
        assert_eq!(PadState::Playing, channel.state());

        assert!(channel.shared.expire(3));
        assert_eq!(PadState::Idle, channel.state());
        assert!(!channel.shared.expire(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_ignore() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Ignore);

        channel.trigger(library.get(0)?);
        sleep(Duration::from_millis(500)).await;
        channel.trigger(library.get(0)?);
        assert_eq!(1, device.started());
        assert_eq!(0, device.stopped());

        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert_no_events(&mut events);

        // The first timer still applies.
        sleep(Duration::from_millis(501)).await;
        assert_eq!(PadState::Idle, channel.state());
        assert!(matches!(events.try_recv(), Ok(PadEvent::Deactivated { .. })));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Restart);

        channel.stop();
        assert_eq!(PadState::Idle, channel.state());
        assert_no_events(&mut events);
        assert_eq!(0, device.stopped());

        channel.trigger(library.get(0)?);
        channel.stop();
        assert_eq!(PadState::Idle, channel.state());
        assert!(!device.is_playing(0));
        assert_eq!(1, device.stopped());
        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert!(matches!(events.try_recv(), Ok(PadEvent::Deactivated { .. })));

        channel.stop();
        sleep(Duration::from_secs(2)).await;
        assert_no_events(&mut events);
        assert_eq!(1, device.stopped());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_failure() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Restart);

        device.set_failing(true);
        channel.trigger(library.get(0)?);
        assert_eq!(PadState::Idle, channel.state());
        assert!(matches!(
            events.try_recv(),
            Ok(PadEvent::TriggerFailed { pad: 0, .. })
        ));
        assert_no_events(&mut events);

        // The channel is still usable.
        device.set_failing(false);
        channel.trigger(library.get(0)?);
        assert_eq!(PadState::Playing, channel.state());
        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_retrigger_leaves_pad_idle() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, device, mut events) = channel(RetriggerBehavior::Restart);

        channel.trigger(library.get(0)?);
        device.set_failing(true);
        channel.trigger(library.get(0)?);
        assert_eq!(PadState::Idle, channel.state());
        assert!(!device.is_playing(0));

        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert!(matches!(
            events.try_recv(),
            Ok(PadEvent::TriggerFailed { .. })
        ));

        // The aborted timer never fires.
        sleep(Duration::from_secs(2)).await;
        assert_no_events(&mut events);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_length_clip() -> Result<(), Box<dyn Error>> {
        let library = library()?;
        let (channel, _device, mut events) = channel(RetriggerBehavior::Restart);

        channel.trigger(library.get(1)?);
        assert_eq!(PadState::Playing, channel.state());

        sleep(Duration::from_millis(1)).await;
        assert_eq!(PadState::Idle, channel.state());
        assert!(matches!(events.try_recv(), Ok(PadEvent::Activated { .. })));
        assert!(matches!(events.try_recv(), Ok(PadEvent::Deactivated { .. })));
        Ok(())
    }
}
