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
use std::sync::Arc;

use tokio::{runtime::Handle, sync::broadcast};
use tracing::info;

use crate::audio;
use crate::clips::{ClipError, ClipLibrary};

use super::channel::{PadChannel, RetriggerBehavior};
use super::events::{PadEvent, PadState};

/// The fixed set of pads. Pad `i` plays clip `i` of the library.
pub struct PadBoard {
    library: Arc<ClipLibrary>,
    channels: Vec<PadChannel>,
    events: broadcast::Sender<PadEvent>,
}

impl PadBoard {
    /// Creates a board with one idle channel per clip in the library. Every subscriber
    /// can fall up to `event_capacity` notifications behind before it starts missing them.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(
        library: Arc<ClipLibrary>,
        device: Arc<dyn audio::Device>,
        retrigger: RetriggerBehavior,
        event_capacity: usize,
    ) -> PadBoard {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let runtime = Handle::current();

        let channels = (0..library.len())
            .map(|pad| {
                PadChannel::new(
                    pad,
                    device.clone(),
                    retrigger,
                    events.clone(),
                    runtime.clone(),
                )
            })
            .collect::<Vec<PadChannel>>();

        info!(
            pads = channels.len(),
            device = device.to_string(),
            retrigger = ?retrigger,
            "Pad board ready"
        );

        PadBoard {
            library,
            channels,
            events,
        }
    }

    fn channel(&self, pad: usize) -> Result<&PadChannel, ClipError> {
        self.channels.get(pad).ok_or(ClipError::InvalidPadId {
            pad,
            pads: self.channels.len(),
        })
    }

    /// Triggers the given pad with its clip.
    pub fn trigger(&self, pad: usize) -> Result<(), ClipError> {
        let channel = self.channel(pad)?;
        let clip = self.library.get(pad)?;
        channel.trigger(clip);
        Ok(())
    }

    /// Stops the given pad if it is playing.
    pub fn stop(&self, pad: usize) -> Result<(), ClipError> {
        self.channel(pad)?.stop();
        Ok(())
    }

    /// Stops every pad.
    pub fn stop_all(&self) {
        for channel in &self.channels {
            channel.stop();
        }
    }

    /// The state of the given pad.
    pub fn state(&self, pad: usize) -> Result<PadState, ClipError> {
        Ok(self.channel(pad)?.state())
    }

    /// The states of every pad, in pad order.
    pub fn states(&self) -> Vec<PadState> {
        self.channels.iter().map(|channel| channel.state()).collect()
    }

    /// The number of pads.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The clips the board plays.
    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    /// Subscribes to pad notifications. Notifications for a pad arrive in the order
    /// they happened.
    pub fn subscribe(&self) -> broadcast::Receiver<PadEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use tokio::{
        sync::broadcast::{error::TryRecvError, Receiver},
        time::sleep,
    };

    use crate::audio::mock;
    use crate::clips::{AssetSource, ClipData, ClipError, ClipLibrary};
    use crate::pads::{PadEvent, PadState, RetriggerBehavior};
    use crate::testutil::write_clip_directory;

    use super::PadBoard;

    /// Sixteen pads where pad `i` plays for `i + 1` tenths of a second.
    fn board() -> Result<(PadBoard, Arc<mock::Device>), Box<dyn Error>> {
        let library = ClipLibrary::from_data(
            (0..16)
                .map(|pad| ClipData::new(vec![0.0; (pad + 1) * 100], 1, 1000))
                .collect(),
        )?;
        let device = Arc::new(mock::Device::get("mock"));
        let board = PadBoard::new(
            Arc::new(library),
            device.clone(),
            RetriggerBehavior::Restart,
            64,
        );
        Ok((board, device))
    }

    fn drain(events: &mut Receiver<PadEvent>) -> Vec<PadEvent> {
        let mut drained = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty) => return drained,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_pad_triggers() -> Result<(), Box<dyn Error>> {
        let (board, _device) = board()?;
        let mut events = board.subscribe();
        assert_eq!(16, board.len());

        for pad in 0..board.len() {
            board.trigger(pad)?;
            assert_eq!(PadState::Playing, board.state(pad)?);
        }

        let activated = drain(&mut events);
        assert_eq!(16, activated.len());
        for (pad, event) in activated.iter().enumerate() {
            match event {
                PadEvent::Activated { pad: event_pad, clip } => {
                    assert_eq!(pad, *event_pad);
                    assert_eq!(pad, clip.id());
                }
                other => panic!("expected activation, got {other:?}"),
            }
        }

        sleep(Duration::from_millis(1601)).await;
        assert!(board.states().iter().all(|state| *state == PadState::Idle));
        let deactivated = drain(&mut events);
        assert_eq!(16, deactivated.len());
        // Shorter clips finish first.
        for (pad, event) in deactivated.iter().enumerate() {
            assert!(matches!(event, PadEvent::Deactivated { .. }));
            assert_eq!(pad, event.pad());
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_pad() -> Result<(), Box<dyn Error>> {
        let (board, device) = board()?;
        let mut events = board.subscribe();

        assert!(matches!(
            board.trigger(16),
            Err(ClipError::InvalidPadId { pad: 16, pads: 16 })
        ));
        assert!(matches!(
            board.stop(100),
            Err(ClipError::InvalidPadId { pad: 100, .. })
        ));
        assert!(board.state(16).is_err());

        assert!(board.states().iter().all(|state| *state == PadState::Idle));
        assert!(drain(&mut events).is_empty());
        assert_eq!(0, device.started());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pads_are_independent() -> Result<(), Box<dyn Error>> {
        let (board, _device) = board()?;
        let mut events = board.subscribe();

        board.trigger(0)?;
        board.trigger(5)?;

        // Pad 0 finishes after 100ms, pad 5 after 600ms.
        sleep(Duration::from_millis(101)).await;
        assert_eq!(PadState::Idle, board.state(0)?);
        assert_eq!(PadState::Playing, board.state(5)?);

        board.trigger(0)?;
        board.stop(5)?;
        assert_eq!(PadState::Playing, board.state(0)?);
        assert_eq!(PadState::Idle, board.state(5)?);

        let pads: Vec<(usize, PadState)> = drain(&mut events)
            .iter()
            .map(|event| (event.pad(), event.state()))
            .collect();
        assert_eq!(
            vec![
                (0, PadState::Playing),
                (5, PadState::Playing),
                (0, PadState::Idle),
                (0, PadState::Playing),
                (5, PadState::Idle),
            ],
            pads
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() -> Result<(), Box<dyn Error>> {
        let (board, device) = board()?;

        board.trigger(2)?;
        board.trigger(7)?;
        board.trigger(15)?;
        assert_eq!(3, device.playing_count());

        let mut events = board.subscribe();
        board.stop_all();
        assert!(board.states().iter().all(|state| *state == PadState::Idle));
        assert_eq!(0, device.playing_count());
        assert_eq!(3, device.stopped());

        let stopped: Vec<usize> = drain(&mut events).iter().map(|e| e.pad()).collect();
        assert_eq!(vec![2, 7, 15], stopped);

        // Nothing is left to expire.
        sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut events).is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated() -> Result<(), Box<dyn Error>> {
        let (board, device) = board()?;
        let mut events = board.subscribe();

        board.trigger(1)?;
        device.set_failing(true);
        board.trigger(3)?;
        device.set_failing(false);

        assert_eq!(PadState::Playing, board.state(1)?);
        assert_eq!(PadState::Idle, board.state(3)?);

        let drained = drain(&mut events);
        assert_eq!(2, drained.len());
        assert!(matches!(drained[0], PadEvent::Activated { pad: 1, .. }));
        assert!(matches!(drained[1], PadEvent::TriggerFailed { pad: 3, .. }));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers() -> Result<(), Box<dyn Error>> {
        let library = ClipLibrary::from_data(
            (0..16)
                .map(|_| ClipData::new(vec![0.0; 60_000], 1, 1000))
                .collect(),
        )?;
        let device = Arc::new(mock::Device::get("mock"));
        let board = Arc::new(PadBoard::new(
            Arc::new(library),
            device.clone(),
            RetriggerBehavior::Restart,
            256,
        ));

        let tasks = (0..16)
            .map(|pad| {
                let board = board.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        board.trigger(pad)?;
                        tokio::task::yield_now().await;
                    }
                    Ok::<(), ClipError>(())
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await??;
        }

        assert!(board.states().iter().all(|state| *state == PadState::Playing));
        assert_eq!(80, device.started());
        assert_eq!(64, device.stopped());
        assert_eq!(16, device.playing_count());

        board.stop_all();
        assert_eq!(0, device.playing_count());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_from_clip_files() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clip_directory(dir.path(), 16, 8000, 2000)?;
        let library = ClipLibrary::load(&AssetSource::new(dir.path().into(), "wav"), 16, None)?;

        let board = PadBoard::new(
            Arc::new(library),
            Arc::new(mock::Device::get("mock")),
            RetriggerBehavior::Restart,
            64,
        );
        let mut events = board.subscribe();

        board.trigger(9)?;
        match events.try_recv() {
            Ok(PadEvent::Activated { pad, clip }) => {
                assert_eq!(9, pad);
                assert_eq!(Duration::from_millis(250), clip.duration());
            }
            other => panic!("expected activation, got {other:?}"),
        }

        sleep(Duration::from_millis(251)).await;
        assert_eq!(PadState::Idle, board.state(9)?);
        assert!(matches!(
            events.try_recv(),
            Ok(PadEvent::Deactivated { pad: 9 })
        ));
        Ok(())
    }
}
