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
use std::fmt;

use crate::audio::PlaybackError;
use crate::clips::Clip;
use crate::util::duration_display;

/// The state of a single pad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PadState {
    #[default]
    Idle,
    Playing,
}

/// Notifications published by the board whenever a pad changes state.
#[derive(Clone, Debug)]
pub enum PadEvent {
    /// The pad started playing the given clip.
    Activated { pad: usize, clip: Clip },

    /// The pad returned to idle, either because its clip finished or it was stopped.
    Deactivated { pad: usize },

    /// The pad could not start playing. It is idle.
    TriggerFailed { pad: usize, cause: PlaybackError },
}

impl PadEvent {
    /// The pad the event is about.
    pub fn pad(&self) -> usize {
        match self {
            PadEvent::Activated { pad, .. }
            | PadEvent::Deactivated { pad }
            | PadEvent::TriggerFailed { pad, .. } => *pad,
        }
    }

    /// The state the pad is in after the event.
    pub fn state(&self) -> PadState {
        match self {
            PadEvent::Activated { .. } => PadState::Playing,
            PadEvent::Deactivated { .. } | PadEvent::TriggerFailed { .. } => PadState::Idle,
        }
    }
}

impl fmt::Display for PadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadEvent::Activated { pad, clip } => write!(
                f,
                "pad {} activated ({})",
                pad,
                duration_display(clip.duration())
            ),
            PadEvent::Deactivated { pad } => write!(f, "pad {} deactivated", pad),
            PadEvent::TriggerFailed { pad, cause } => {
                write!(f, "pad {} failed to trigger: {}", pad, cause)
            }
        }
    }
}
