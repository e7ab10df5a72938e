//! Nalcast-Media: ISO-BMFF (MP4) demuxing down to NAL units
//!
//! This crate parses a complete, non-fragmented MP4 buffer into a typed box
//! tree and answers sample-table queries against it without decoding any
//! payload.
//!
//! # Modules
//!
//! - `cursor` - Bounds-checked big-endian reader over a shared buffer
//! - `boxes` - Box records and the recursive box parser
//! - `track` - Sample, chunk, offset and time resolution for one `trak`
//! - `container` - The parsed file and its track map
//!
//! # Example
//!
//! ```no_run
//! let bytes = std::fs::read("clip.mp4")?;
//! let container = nalcast_media::parse(bytes)?;
//! for (id, track) in container.tracks() {
//!     let nal_units = track.sample_nal_units(0)?;
//!     println!("track {id}: {} NAL units in sample 0", nal_units.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod boxes;
pub mod container;
pub mod cursor;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fixture;
pub mod track;

pub use boxes::{BoxKind, Children, FourCc, Mp4Box, Slot};
pub use container::{parse, Container, ParseOptions};
pub use cursor::ByteCursor;
pub use error::{Error, Result};
pub use track::{split_nal_units, ChunkPosition, Track};
