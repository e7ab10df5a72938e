//! Shared test harness for integration tests.
//!
//! Builds synthetic MP4 files with [`nalcast_media::fixture`] and writes them
//! to a temporary directory so they can be loaded through the byte sources
//! and the CLI.

#![allow(dead_code)]

use std::path::PathBuf;

use nalcast_media::fixture::{build_file, length_prefixed, FixtureTrack};
use tempfile::TempDir;

pub use nalcast_media::fixture;

/// Number of video samples in [`sample_clip`].
pub const CLIP_SAMPLES: u8 = 12;

/// Video sample `i`: an access unit delimiter plus one slice, IDR every 4th.
pub fn video_sample(i: u8) -> Vec<u8> {
    let slice_header = if i % 4 == 0 { 0x65 } else { 0x41 };
    length_prefixed(&[&[0x09, 0xF0], &[slice_header, 0x88, i]])
}

/// A 12-frame AVC track (id 1) interleaved with a 6-frame AAC track (id 2).
///
/// Video runs two samples per chunk for the first three chunks and one per
/// chunk afterwards; sync samples sit at 0, 4 and 8.
pub fn sample_clip() -> Vec<u8> {
    let video = FixtureTrack::video(1, (0..CLIP_SAMPLES).map(video_sample).collect())
        .with_stsc(vec![(1, 2, 1), (4, 1, 1)])
        .with_sync_samples(Some(vec![1, 5, 9]));
    let audio = FixtureTrack::audio(2, (0..6u8).map(|i| vec![0x21, i, i, i]).collect());
    build_file(&[video, audio])
}

/// Temporary directory holding test media.
pub struct MediaDir {
    pub dir: TempDir,
}

impl MediaDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Write `bytes` under `name` and return the full path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("failed to write fixture");
        path
    }

    /// Write [`sample_clip`] as `clip.mp4`.
    pub fn clip(&self) -> PathBuf {
        self.write("clip.mp4", &sample_clip())
    }

    /// Write a config file and return its path.
    pub fn config(&self, toml: &str) -> PathBuf {
        self.write("nalcast.toml", toml.as_bytes())
    }
}
