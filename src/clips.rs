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

//! Clip loading for the pad board.
//!
//! Every pad is bound to exactly one clip. Clips are decoded entirely into memory
//! at startup and are never mutated afterwards, so the library can be shared
//! freely between channels.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::util::{duration_display, filename_display};

pub mod decoder;
pub mod error;

pub use error::{ClipError, DecodeError};

/// Decoded audio data for a clip. The samples are shared so that playback never copies them.
#[derive(Clone)]
pub struct ClipData {
    /// The sample data as f32 samples (interleaved if multi-channel).
    samples: Arc<Vec<f32>>,
    /// Number of channels in the sample data.
    channel_count: u16,
    /// Sample rate of the sample data.
    sample_rate: u32,
}

impl ClipData {
    /// Creates new clip data from interleaved samples.
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> ClipData {
        ClipData {
            samples: Arc::new(samples),
            channel_count,
            sample_rate,
        }
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &Arc<Vec<f32>> {
        &self.samples
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }

    /// Returns the play time of the data at its own sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Returns a copy of this data converted to the target sample rate using linear
    /// interpolation, which is sufficient for one-shots. Data already at the target
    /// rate is shared rather than copied.
    pub fn resampled(&self, target_rate: u32) -> ClipData {
        if target_rate == self.sample_rate
            || target_rate == 0
            || self.sample_rate == 0
            || self.channel_count == 0
        {
            return self.clone();
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let channels = self.channel_count as usize;
        let target_frames = (self.frames() as f64 * ratio).ceil() as usize;

        let mut output = Vec::with_capacity(target_frames * channels);
        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let s0 = self
                    .samples
                    .get(source_frame * channels + channel)
                    .copied()
                    .unwrap_or(0.0);
                let s1 = self
                    .samples
                    .get((source_frame + 1) * channels + channel)
                    .copied()
                    .unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        ClipData::new(output, self.channel_count, target_rate)
    }
}

impl fmt::Debug for ClipData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipData")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// A clip bound to a pad.
#[derive(Clone, Debug)]
pub struct Clip {
    id: usize,
    duration: Duration,
    data: ClipData,
    source: Option<PathBuf>,
}

impl Clip {
    /// The pad this clip belongs to.
    pub fn id(&self) -> usize {
        self.id
    }

    /// How long the clip plays for.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The playable audio data.
    pub fn data(&self) -> &ClipData {
        &self.data
    }

    /// The file the clip was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Describes where the clips for a board live. Pad `i` resolves to `<directory>/<i>.<extension>`.
#[derive(Clone, Debug)]
pub struct AssetSource {
    directory: PathBuf,
    extension: String,
}

impl AssetSource {
    pub fn new(directory: PathBuf, extension: &str) -> AssetSource {
        AssetSource {
            directory,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// The directory holding the clips.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The file path for the given pad.
    pub fn path_for(&self, pad: usize) -> PathBuf {
        self.directory.join(format!("{}.{}", pad, self.extension))
    }
}

/// The read-only set of clips for a board, indexed by pad.
#[derive(Debug)]
pub struct ClipLibrary {
    clips: Vec<Clip>,
}

impl ClipLibrary {
    /// Loads one clip per pad from the asset source. Either every clip loads or none
    /// are returned. If a target sample rate is given, clips are converted to it.
    pub fn load(
        source: &AssetSource,
        pads: usize,
        target_sample_rate: Option<u32>,
    ) -> Result<ClipLibrary, ClipError> {
        if pads == 0 {
            return Err(ClipError::EmptyLibrary);
        }

        let clips = (0..pads)
            .map(|pad| Self::load_clip(source, pad, target_sample_rate))
            .collect::<Result<Vec<Clip>, ClipError>>()?;

        let library = ClipLibrary { clips };
        info!(
            directory = ?source.directory(),
            clips = library.len(),
            memory_kb = library.memory_usage() / 1024,
            "Loaded clip library"
        );
        Ok(library)
    }

    fn load_clip(
        source: &AssetSource,
        pad: usize,
        target_sample_rate: Option<u32>,
    ) -> Result<Clip, ClipError> {
        let path = source.path_for(pad);
        if !path.is_file() {
            return Err(ClipError::AssetMissing { pad, path });
        }

        let data = decoder::decode_file(&path).map_err(|source| ClipError::AssetUnreadable {
            pad,
            path: path.clone(),
            source,
        })?;

        // The play time is a property of the asset, so take it before any conversion.
        let duration = data.duration();
        let data = match target_sample_rate {
            Some(rate) => data.resampled(rate),
            None => data,
        };

        debug!(
            pad,
            file = filename_display(&path),
            duration = duration_display(duration),
            channels = data.channel_count(),
            "Loaded clip"
        );

        Ok(Clip {
            id: pad,
            duration,
            data,
            source: Some(path),
        })
    }

    /// Builds a library from in-memory clip data. Pad ids are the vector indices.
    pub fn from_data(data: Vec<ClipData>) -> Result<ClipLibrary, ClipError> {
        if data.is_empty() {
            return Err(ClipError::EmptyLibrary);
        }

        Ok(ClipLibrary {
            clips: data
                .into_iter()
                .enumerate()
                .map(|(id, data)| Clip {
                    id,
                    duration: data.duration(),
                    data,
                    source: None,
                })
                .collect(),
        })
    }

    /// Gets the clip for the given pad.
    pub fn get(&self, pad: usize) -> Result<&Clip, ClipError> {
        self.clips.get(pad).ok_or(ClipError::InvalidPadId {
            pad,
            pads: self.clips.len(),
        })
    }

    /// The number of clips, which is also the number of pads.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    /// Returns the total memory used by the clip data in bytes.
    pub fn memory_usage(&self) -> usize {
        self.clips.iter().map(|clip| clip.data.memory_size()).sum()
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use crate::testutil::{write_clip_directory, write_wav};

    use super::*;

    #[test]
    fn test_load_all_pads() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clip_directory(dir.path(), 4, 8000, 800)?;

        let library = ClipLibrary::load(&AssetSource::new(dir.path().into(), "wav"), 4, None)?;
        assert_eq!(4, library.len());
        for (pad, clip) in library.iter().enumerate() {
            assert_eq!(pad, clip.id());
            assert_eq!(Duration::from_millis(100), clip.duration());
            assert_eq!(Some(dir.path().join(format!("{pad}.wav")).as_path()), clip.source());
        }
        assert_eq!(4 * 800 * 4, library.memory_usage());
        Ok(())
    }

    #[test]
    fn test_load_missing_asset() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clip_directory(dir.path(), 3, 8000, 800)?;

        let result = ClipLibrary::load(&AssetSource::new(dir.path().into(), "wav"), 4, None);
        match result {
            Err(ClipError::AssetMissing { pad, path }) => {
                assert_eq!(3, pad);
                assert_eq!(dir.path().join("3.wav"), path);
            }
            other => panic!("expected a missing asset, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_load_unreadable_asset() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clip_directory(dir.path(), 2, 8000, 800)?;
        fs::write(dir.path().join("1.wav"), b"RIFF but not really")?;

        let result = ClipLibrary::load(&AssetSource::new(dir.path().into(), "wav"), 2, None);
        assert!(matches!(
            result,
            Err(ClipError::AssetUnreadable { pad: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_load_directory_in_place_of_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("0.wav"))?;

        let result = ClipLibrary::load(&AssetSource::new(dir.path().into(), "wav"), 1, None);
        assert!(matches!(result, Err(ClipError::AssetMissing { pad: 0, .. })));
        Ok(())
    }

    #[test]
    fn test_load_resamples_but_keeps_duration() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(&dir.path().join("0.wav"), 1, 8000, 8000)?;

        let library =
            ClipLibrary::load(&AssetSource::new(dir.path().into(), ".wav"), 1, Some(16000))?;
        let clip = library.get(0)?;
        assert_eq!(Duration::from_secs(1), clip.duration());
        assert_eq!(16000, clip.data().sample_rate());
        assert_eq!(16000, clip.data().frames());
        Ok(())
    }

    #[test]
    fn test_load_zero_pads() {
        let source = AssetSource::new(PathBuf::from("unused"), "wav");
        assert!(matches!(
            ClipLibrary::load(&source, 0, None),
            Err(ClipError::EmptyLibrary)
        ));
    }

    #[test]
    fn test_get_out_of_range() -> Result<(), Box<dyn Error>> {
        let library = ClipLibrary::from_data(vec![
            ClipData::new(vec![0.0; 100], 1, 1000),
            ClipData::new(vec![0.0; 400], 2, 1000),
        ])?;

        assert_eq!(Duration::from_millis(100), library.get(0)?.duration());
        assert_eq!(Duration::from_millis(200), library.get(1)?.duration());
        assert!(matches!(
            library.get(2),
            Err(ClipError::InvalidPadId { pad: 2, pads: 2 })
        ));
        Ok(())
    }

    #[test]
    fn test_from_empty_data() {
        assert!(matches!(
            ClipLibrary::from_data(Vec::new()),
            Err(ClipError::EmptyLibrary)
        ));
    }

    #[test]
    fn test_zero_length_clip() {
        let data = ClipData::new(Vec::new(), 2, 44100);
        assert_eq!(0, data.frames());
        assert_eq!(Duration::ZERO, data.duration());

        let data = ClipData::new(vec![0.5; 10], 1, 0);
        assert_eq!(Duration::ZERO, data.duration());
    }

    #[test]
    fn test_resampled() {
        let data = ClipData::new(vec![0.0, 1.0, 0.0, 1.0], 1, 1000);

        let up = data.resampled(2000);
        assert_eq!(2000, up.sample_rate());
        assert_eq!(8, up.frames());
        assert!((up.samples()[1] - 0.5).abs() < 1e-6);
        assert_eq!(data.duration(), up.duration());

        let same = data.resampled(1000);
        assert!(Arc::ptr_eq(data.samples(), same.samples()));
    }

    #[test]
    fn test_resampled_stereo_keeps_channels_apart() {
        // Left is silent, right is full scale.
        let data = ClipData::new(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0], 2, 100);

        let up = data.resampled(300);
        assert_eq!(2, up.channel_count());
        assert_eq!(9, up.frames());
        for frame in up.samples().chunks(2) {
            assert_eq!(0.0, frame[0]);
            assert_eq!(1.0, frame[1]);
        }
    }

    #[test]
    fn test_asset_source_paths() {
        let source = AssetSource::new(PathBuf::from("/sounds"), ".ogg");
        assert_eq!(PathBuf::from("/sounds/7.ogg"), source.path_for(7));
        assert_eq!(Path::new("/sounds"), source.directory());
    }
}
