//! Parsed ISO-BMFF box records.
//!
//! Every box shares the same base ([`Mp4Box`]: offset, declared size, type
//! code, optional full-box header) and carries a [`BoxKind`] with the fields
//! decoded for its type. Container kinds own their children in a [`Children`]
//! map. The tree is built once by the parser and never mutated afterwards.

mod children;
mod fourcc;
pub(crate) mod parser;

pub use children::{Children, Slot};
pub use fourcc::FourCc;

use bytes::Bytes;
use std::sync::Arc;

use crate::cursor::U32Record;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Version and flags of a full box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct FullHeader {
    pub version: u8,
    pub flags: u32,
}

/// A parsed box.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Mp4Box {
    /// Absolute offset of the box header in the buffer.
    pub offset: usize,
    /// Declared size including the header.
    pub size: u32,
    pub box_type: FourCc,
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none"))]
    pub header: Option<FullHeader>,
    pub kind: BoxKind,
}

/// Type-specific payload of a box.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum BoxKind {
    Ftyp(Ftyp),
    /// `moov`, `trak`, `mdia`, `minf` and `stbl`.
    Container(Children),
    Mvhd(Mvhd),
    Tkhd(Tkhd),
    Mdhd(Mdhd),
    Hdlr(Hdlr),
    Stsd(Stsd),
    Avc1(Avc1),
    Mp4a(Mp4a),
    /// Elementary stream descriptor, kept opaque.
    Esds,
    AvcC(AvcC),
    Btrt(Btrt),
    Stts(Stts),
    Stss(Stss),
    Stsc(Stsc),
    Stsz(Stsz),
    Stco(Stco),
    Smhd(Smhd),
    Mdat(Mdat),
    /// A type code the parser skips.
    Unknown,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Ftyp {
    pub major_brand: FourCc,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCc>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Mvhd {
    pub creation_time: u32,
    pub modification_time: u32,
    pub timescale: u32,
    pub duration: u32,
    pub rate: f64,
    pub volume: f64,
    pub matrix: [u32; 9],
    pub next_track_id: u32,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Tkhd {
    pub creation_time: u32,
    pub modification_time: u32,
    pub track_id: u32,
    pub duration: u32,
    pub layer: u16,
    pub alternate_group: u16,
    pub volume: f64,
    pub matrix: [u32; 9],
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Mdhd {
    pub creation_time: u32,
    pub modification_time: u32,
    pub timescale: u32,
    pub duration: u32,
    /// ISO-639-2/T language code.
    pub language: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Hdlr {
    pub handler_type: FourCc,
    pub name: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stsd {
    /// Declared entry count; not checked against the parsed children.
    pub entry_count: u32,
    pub children: Children,
}

/// AVC visual sample entry.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Avc1 {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: f64,
    pub vertical_resolution: f64,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
    pub children: Children,
}

/// MPEG-4 audio sample entry.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Mp4a {
    pub data_reference_index: u16,
    pub version: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    pub compression_id: u16,
    pub packet_size: u16,
    /// Integer part of the 16.16 sample rate.
    pub sample_rate: u32,
    pub children: Children,
}

/// AVC decoder configuration record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct AvcC {
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    pub length_size_minus_one: u8,
    /// Sequence parameter sets, views into the source buffer.
    pub sps: Vec<Bytes>,
    /// Picture parameter sets, views into the source buffer.
    pub pps: Vec<Bytes>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Btrt {
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

/// One run of the time-to-sample table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct SttsEntry {
    pub count: u32,
    pub delta: u32,
}

impl U32Record for SttsEntry {
    const FIELDS: usize = 2;

    fn from_fields(fields: &[u32]) -> Self {
        Self {
            count: fields[0],
            delta: fields[1],
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stts {
    pub entries: Vec<SttsEntry>,
}

impl Stts {
    /// Sum of `count * delta` over all runs.
    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.count as u64 * e.delta as u64)
            .sum()
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stss {
    /// 1-based sync sample numbers in increasing order.
    pub samples: Vec<u32>,
}

/// One run of the sample-to-chunk table. Chunk numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_id: u32,
}

impl U32Record for StscEntry {
    const FIELDS: usize = 3;

    fn from_fields(fields: &[u32]) -> Self {
        Self {
            first_chunk: fields[0],
            samples_per_chunk: fields[1],
            sample_description_id: fields[2],
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stsc {
    pub entries: Vec<StscEntry>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stsz {
    /// Uniform sample size, or 0 when `sizes` holds one entry per sample.
    pub sample_size: u32,
    pub sample_count: u32,
    pub sizes: Option<Vec<u32>>,
}

impl Stsz {
    /// Number of samples described by the box.
    pub fn count(&self) -> u32 {
        match &self.sizes {
            Some(sizes) => sizes.len() as u32,
            None => self.sample_count,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Stco {
    pub offsets: Vec<u32>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Smhd {
    pub balance: f64,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Mdat {
    /// View of the media payload.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub data: Bytes,
}

macro_rules! kind_accessors {
    ($($name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $name(&self) -> Option<&$ty> {
                match &self.kind {
                    BoxKind::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl Mp4Box {
    /// Child boxes, for container kinds.
    pub fn children(&self) -> Option<&Children> {
        match &self.kind {
            BoxKind::Container(children) => Some(children),
            BoxKind::Stsd(stsd) => Some(&stsd.children),
            BoxKind::Avc1(avc1) => Some(&avc1.children),
            BoxKind::Mp4a(mp4a) => Some(&mp4a.children),
            _ => None,
        }
    }

    /// First child of `box_type`.
    pub fn child(&self, box_type: FourCc) -> Option<&Arc<Mp4Box>> {
        self.children()?.get(box_type)
    }

    /// Follow a path of first children, e.g. `[MDIA, MINF, STBL]`.
    pub fn descend(&self, path: &[FourCc]) -> Option<&Mp4Box> {
        path.iter()
            .try_fold(self, |node, &box_type| node.child(box_type).map(|b| &**b))
    }

    kind_accessors! {
        ftyp => Ftyp(Ftyp),
        mvhd => Mvhd(Mvhd),
        tkhd => Tkhd(Tkhd),
        mdhd => Mdhd(Mdhd),
        hdlr => Hdlr(Hdlr),
        stsd => Stsd(Stsd),
        avc1 => Avc1(Avc1),
        mp4a => Mp4a(Mp4a),
        avcc => AvcC(AvcC),
        btrt => Btrt(Btrt),
        stts => Stts(Stts),
        stss => Stss(Stss),
        stsc => Stsc(Stsc),
        stsz => Stsz(Stsz),
        stco => Stco(Stco),
        smhd => Smhd(Smhd),
        mdat => Mdat(Mdat),
    }
}
