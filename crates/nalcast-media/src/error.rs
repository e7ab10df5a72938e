//! Error types for nalcast-media.

use std::io;
use thiserror::Error;

use crate::boxes::FourCc;

/// Result type for nalcast-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for nalcast-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read needed more bytes than the cursor range holds.
    #[error("Out of bounds at offset {offset}: need {need} bytes, have {have}")]
    OutOfBounds { offset: usize, need: usize, have: usize },

    /// A seek target lies outside the cursor range.
    #[error("Index out of bounds (bounds: [{start}, {end}], index: {index})")]
    SeekOutOfBounds { index: usize, start: usize, end: usize },

    /// A constant or reserved field has an unexpected value.
    #[error("Format violation: {0}")]
    Format(String),

    /// Unsupported version or layout.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Declared box size does not cover the bytes consumed while parsing it.
    #[error("Malformed box: declared size {size}, consumed {consumed}")]
    MalformedBox { size: u32, consumed: usize },

    /// Recomputed track duration disagrees with the media header.
    #[error("Integrity mismatch: mdhd duration {declared}, stts total {computed}")]
    Integrity { declared: u64, computed: u64 },

    /// Missing required box in the parsed tree.
    #[error("Missing required box: {0}")]
    MissingBox(&'static str),

    /// Sample index past the end of the sample table.
    #[error("Sample {sample} out of range (sample count: {count})")]
    SampleOutOfRange { sample: u32, count: u32 },

    /// Chunk index past the end of the chunk offset table.
    #[error("Chunk {chunk} out of range (chunk count: {count})")]
    ChunkOutOfRange { chunk: u32, count: u32 },

    /// Time value past the end of the time-to-sample table.
    #[error("Time {time} out of range (track duration: {duration})")]
    TimeOutOfRange { time: u64, duration: u64 },

    /// A NAL length prefix runs past the end of its sample.
    #[error("Malformed sample {sample}: {reason}")]
    MalformedSample { sample: u32, reason: String },

    /// Fewer than eight bytes left for a box header.
    #[error("Truncated box header at offset {offset}: {available} of 8 bytes")]
    TruncatedHeader { offset: usize, available: usize },

    /// Failure while parsing a specific box.
    #[error("Failed to parse '{box_type}' box at offset {offset}: {source}")]
    InBox {
        box_type: FourCc,
        offset: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a format violation error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Attach the box that was being parsed when `self` occurred.
    ///
    /// Errors already attributed to a nested box keep their innermost location.
    pub fn in_box(self, box_type: FourCc, offset: usize) -> Self {
        match self {
            Self::InBox { .. } => self,
            other => Self::InBox {
                box_type,
                offset,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping box location wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::InBox { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OutOfBounds {
            offset: 12,
            need: 4,
            have: 3,
        };
        assert_eq!(err.to_string(), "Out of bounds at offset 12: need 4 bytes, have 3");

        let err = Error::unsupported("mvhd version 1");
        assert_eq!(err.to_string(), "Unsupported: mvhd version 1");
    }

    #[test]
    fn test_in_box_keeps_innermost_location() {
        let err = Error::format("bad")
            .in_box(FourCc(*b"avcC"), 100)
            .in_box(FourCc(*b"avc1"), 80);

        match &err {
            Error::InBox { box_type, offset, .. } => {
                assert_eq!(box_type, &FourCc(*b"avcC"));
                assert_eq!(*offset, 100);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root_cause(), Error::Format(_)));
        assert!(err.to_string().contains("'avcC' box at offset 100"));
    }
}
