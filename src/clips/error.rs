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
use std::path::PathBuf;

/// Errors raised while loading or looking up clips.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("pad {pad} is out of range, the board has {pads} pads")]
    InvalidPadId { pad: usize, pads: usize },

    #[error("no clip found for pad {pad} at {}", path.display())]
    AssetMissing { pad: usize, path: PathBuf },

    #[error("unable to read clip for pad {pad} at {}: {source}", path.display())]
    AssetUnreadable {
        pad: usize,
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("a clip library needs at least one pad")]
    EmptyLibrary,
}

/// Errors raised while decoding a clip file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("no audio track found")]
    NoTrack,

    #[error("sample rate not specified")]
    MissingSampleRate,

    #[error("channel count could not be determined")]
    MissingChannels,
}
