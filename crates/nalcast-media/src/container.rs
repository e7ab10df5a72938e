//! Parsed MP4 file: the root box tree plus the track map.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use bytes::Bytes;

use crate::boxes::parser::BoxParser;
use crate::boxes::{Children, FourCc, Ftyp, Mdat, Mp4Box, Mvhd};
use crate::cursor::ByteCursor;
use crate::track::Track;
use crate::Result;

/// Flags controlling how strictly a file is checked while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Cross-check `mdhd` durations against the `stts` table.
    pub paranoid: bool,
    /// Treat reserved or constant field mismatches as fatal.
    pub strict_reserved: bool,
}

/// A fully parsed, immutable MP4 file.
///
/// Boxes and tracks hold views into `data`, so the buffer stays alive as
/// long as the container or any track cloned out of it.
#[derive(Debug, Clone)]
pub struct Container {
    data: Bytes,
    root: Children,
    tracks: BTreeMap<u32, Track>,
}

/// Parse a complete buffer with default options.
pub fn parse(data: impl Into<Bytes>) -> Result<Container> {
    Container::parse(data, ParseOptions::default())
}

impl Container {
    /// Parse a complete, non-fragmented MP4 buffer.
    pub fn parse(data: impl Into<Bytes>, options: ParseOptions) -> Result<Self> {
        let data = data.into();
        let started = Instant::now();

        let mut tracks = BTreeMap::new();
        let mut root = Children::default();
        let mut cursor = ByteCursor::new(data.clone());
        BoxParser::new(data.clone(), options, &mut tracks).read_boxes(&mut cursor, &mut root)?;

        tracing::debug!(
            bytes = data.len(),
            tracks = tracks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "parsed stream"
        );

        Ok(Self { data, root, tracks })
    }

    /// Read and parse a file from disk.
    pub fn open<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(data, options)
    }

    /// Top-level boxes.
    pub fn root(&self) -> &Children {
        &self.root
    }

    pub fn tracks(&self) -> &BTreeMap<u32, Track> {
        &self.tracks
    }

    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// The buffer every view in the tree points into.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn ftyp(&self) -> Option<&Ftyp> {
        self.root.get(FourCc::FTYP)?.ftyp()
    }

    pub fn moov(&self) -> Option<&Mp4Box> {
        self.root.get(FourCc::MOOV).map(|b| &**b)
    }

    pub fn mvhd(&self) -> Option<&Mvhd> {
        self.moov()?.child(FourCc::MVHD)?.mvhd()
    }

    pub fn mdat(&self) -> Option<&Mdat> {
        self.root.get(FourCc::MDAT)?.mdat()
    }

    /// Movie duration in seconds from `mvhd`.
    pub fn duration_secs(&self) -> Option<f64> {
        let mvhd = self.mvhd()?;
        if mvhd.timescale == 0 {
            return None;
        }
        Some(mvhd.duration as f64 / mvhd.timescale as f64)
    }

    /// First track whose handler is `vide`.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks
            .values()
            .find(|t| t.handler_type().is_ok_and(|h| h == FourCc::VIDE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{build_file, write_box, write_ftyp, FixtureTrack};

    #[test]
    fn test_tracks_keyed_by_tkhd_id() {
        let file = build_file(&[
            FixtureTrack::audio(9, vec![vec![1; 4], vec![2; 4]]),
            FixtureTrack::video(3, vec![vec![0, 0, 0, 1, 0x65]]),
        ]);
        let container = parse(file).unwrap();

        assert_eq!(container.tracks().keys().copied().collect::<Vec<_>>(), vec![3, 9]);
        assert_eq!(container.video_track().unwrap().track_id().unwrap(), 3);
        assert!(container.track(1).is_none());
    }

    #[test]
    fn test_mdat_is_a_view_of_the_buffer() {
        let file = build_file(&[FixtureTrack::video(1, vec![vec![0, 0, 0, 1, 0x65]])]);
        let container = parse(file).unwrap();
        let mdat = container.mdat().unwrap();
        assert_eq!(&mdat.data[..], &[0, 0, 0, 1, 0x65]);

        let base = container.data().as_ptr() as usize;
        let view = mdat.data.as_ptr() as usize;
        assert_eq!(view - base, write_ftyp().len() + 8);
    }

    #[test]
    fn test_file_without_movie_box() {
        let file = [write_ftyp(), write_box(b"free", &[0; 16])].concat();
        let container = parse(file).unwrap();
        assert!(container.moov().is_none());
        assert!(container.mvhd().is_none());
        assert!(container.duration_secs().is_none());
        assert!(container.tracks().is_empty());
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(
            &path,
            build_file(&[FixtureTrack::video(1, vec![vec![0, 0, 0, 1, 0x65]])]),
        )
        .unwrap();

        let container = Container::open(&path, ParseOptions::default()).unwrap();
        assert_eq!(container.tracks().len(), 1);
    }
}
