//! Nalcast - MP4 demuxing and NAL unit playback driver
//!
//! This library crate exposes the application layer around `nalcast-media`
//! for integration testing and the `nalcast` binary.

pub mod config;
pub mod player;
pub mod report;
pub mod source;
pub mod trace;
