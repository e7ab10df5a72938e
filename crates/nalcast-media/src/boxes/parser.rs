//! Recursive box parser.
//!
//! `read_boxes` keeps reading boxes while at least four bytes remain and the
//! next size field is non-zero. `read_box` reads the 8-byte header, decodes
//! the body according to the type code and then skips whatever the declared
//! size still covers, so a box always consumes exactly `size` bytes. Nested
//! children are parsed through a sub-cursor bounded to the parent's remaining
//! bytes.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use super::{
    Avc1, AvcC, BoxKind, Btrt, Children, FourCc, Ftyp, FullHeader, Hdlr, Mdat, Mdhd, Mp4Box,
    Mp4a, Mvhd, Smhd, Stco, Stsc, Stsd, Stss, Stsz, Stts, Tkhd,
};
use crate::container::ParseOptions;
use crate::cursor::ByteCursor;
use crate::track::Track;
use crate::{Error, Result};

/// Offset and declared size of the box being parsed.
#[derive(Debug, Clone, Copy)]
struct Frame {
    offset: usize,
    size: u32,
}

impl Frame {
    /// Declared bytes not yet consumed by the cursor.
    fn remaining(&self, cursor: &ByteCursor) -> Result<usize> {
        let consumed = cursor.position() - self.offset;
        (self.size as usize)
            .checked_sub(consumed)
            .ok_or(Error::MalformedBox {
                size: self.size,
                consumed,
            })
    }
}

/// Builds the box tree and registers every `trak` it completes.
pub(crate) struct BoxParser<'a> {
    data: Bytes,
    options: ParseOptions,
    tracks: &'a mut BTreeMap<u32, Track>,
}

impl<'a> BoxParser<'a> {
    pub(crate) fn new(
        data: Bytes,
        options: ParseOptions,
        tracks: &'a mut BTreeMap<u32, Track>,
    ) -> Self {
        Self {
            data,
            options,
            tracks,
        }
    }

    /// Read sibling boxes until the range ends or a zero size is found.
    pub(crate) fn read_boxes(&mut self, cursor: &mut ByteCursor, parent: &mut Children) -> Result<()> {
        while cursor.peek32(false).is_ok_and(|size| size != 0) {
            let offset = cursor.position();
            let child = Arc::new(self.read_box(cursor)?);
            if child.box_type == FourCc::TRAK {
                self.register_track(Arc::clone(&child))
                    .map_err(|e| e.in_box(FourCc::TRAK, offset))?;
            }
            parent.insert(child);
        }
        Ok(())
    }

    fn read_box(&mut self, cursor: &mut ByteCursor) -> Result<Mp4Box> {
        let offset = cursor.position();
        let (size, box_type) = cursor
            .read_u32()
            .and_then(|size| cursor.read_fourcc().map(|box_type| (size, box_type)))
            .map_err(|_| Error::TruncatedHeader {
                offset,
                available: cursor.end().saturating_sub(offset),
            })?;
        let frame = Frame { offset, size };

        let (header, kind) = self
            .read_body(cursor, frame, box_type)
            .and_then(|body| {
                let remaining = frame.remaining(cursor)?;
                if remaining > 0 {
                    cursor.skip(remaining)?;
                }
                Ok(body)
            })
            .map_err(|e| e.in_box(box_type, offset))?;

        tracing::trace!(box_type = %box_type, offset, size, "parsed box");

        Ok(Mp4Box {
            offset,
            size,
            box_type,
            header,
            kind,
        })
    }

    fn read_body(
        &mut self,
        cursor: &mut ByteCursor,
        frame: Frame,
        box_type: FourCc,
    ) -> Result<(Option<FullHeader>, BoxKind)> {
        if frame.size == 1 {
            return Err(Error::unsupported("64-bit box sizes"));
        }

        let kind = match box_type {
            FourCc::FTYP => BoxKind::Ftyp(self.read_ftyp(cursor, frame)?),
            FourCc::MOOV | FourCc::TRAK | FourCc::MDIA | FourCc::MINF | FourCc::STBL => {
                BoxKind::Container(self.read_remaining_boxes(cursor, frame)?)
            }
            FourCc::MVHD => {
                let header = read_full_header(cursor)?;
                require_version(header, "mvhd")?;
                return Ok((Some(header), BoxKind::Mvhd(read_mvhd(cursor)?)));
            }
            FourCc::TKHD => {
                let header = read_full_header(cursor)?;
                require_version(header, "tkhd")?;
                return Ok((Some(header), BoxKind::Tkhd(read_tkhd(cursor)?)));
            }
            FourCc::MDHD => {
                let header = read_full_header(cursor)?;
                require_version(header, "mdhd")?;
                return Ok((Some(header), BoxKind::Mdhd(read_mdhd(cursor)?)));
            }
            FourCc::HDLR => {
                let header = read_full_header(cursor)?;
                return Ok((Some(header), BoxKind::Hdlr(read_hdlr(cursor, frame)?)));
            }
            FourCc::STSD => {
                let header = read_full_header(cursor)?;
                let entry_count = cursor.read_u32()?;
                let children = self.read_remaining_boxes(cursor, frame)?;
                return Ok((
                    Some(header),
                    BoxKind::Stsd(Stsd {
                        entry_count,
                        children,
                    }),
                ));
            }
            FourCc::AVC1 => BoxKind::Avc1(self.read_avc1(cursor, frame)?),
            FourCc::MP4A => BoxKind::Mp4a(self.read_mp4a(cursor, frame)?),
            FourCc::ESDS => {
                // Full header only, the descriptor itself is skipped.
                let header = read_full_header(cursor)?;
                return Ok((Some(header), BoxKind::Esds));
            }
            FourCc::AVCC => BoxKind::AvcC(read_avcc(cursor)?),
            FourCc::BTRT => BoxKind::Btrt(Btrt {
                buffer_size_db: cursor.read_u32()?,
                max_bitrate: cursor.read_u32()?,
                avg_bitrate: cursor.read_u32()?,
            }),
            FourCc::STTS => {
                let header = read_full_header(cursor)?;
                let count = cursor.read_u32()?;
                let entries = cursor.read_records(count)?;
                return Ok((Some(header), BoxKind::Stts(Stts { entries })));
            }
            FourCc::STSS => {
                let header = read_full_header(cursor)?;
                let count = cursor.read_u32()?;
                let samples = cursor.read_u32_array(count)?;
                return Ok((Some(header), BoxKind::Stss(Stss { samples })));
            }
            FourCc::STSC => {
                let header = read_full_header(cursor)?;
                let count = cursor.read_u32()?;
                let entries = cursor.read_records(count)?;
                return Ok((Some(header), BoxKind::Stsc(Stsc { entries })));
            }
            FourCc::STSZ => {
                let header = read_full_header(cursor)?;
                let sample_size = cursor.read_u32()?;
                let sample_count = cursor.read_u32()?;
                let sizes = if sample_size == 0 {
                    Some(cursor.read_u32_array(sample_count)?)
                } else {
                    None
                };
                return Ok((
                    Some(header),
                    BoxKind::Stsz(Stsz {
                        sample_size,
                        sample_count,
                        sizes,
                    }),
                ));
            }
            FourCc::STCO => {
                let header = read_full_header(cursor)?;
                let count = cursor.read_u32()?;
                let offsets = cursor.read_u32_array(count)?;
                return Ok((Some(header), BoxKind::Stco(Stco { offsets })));
            }
            FourCc::SMHD => {
                let header = read_full_header(cursor)?;
                let balance = cursor.read_fp8()?;
                self.reserved(cursor, 2, 0, "smhd reserved")?;
                return Ok((Some(header), BoxKind::Smhd(Smhd { balance })));
            }
            FourCc::MDAT => {
                if frame.size < 8 {
                    return Err(Error::unsupported("media data box smaller than its header"));
                }
                let data = cursor.read_bytes(frame.remaining(cursor)?)?;
                BoxKind::Mdat(Mdat { data })
            }
            _ => BoxKind::Unknown,
        };

        Ok((None, kind))
    }

    /// Parse the rest of the box as child boxes through a bounded sub-cursor.
    fn read_remaining_boxes(&mut self, cursor: &mut ByteCursor, frame: Frame) -> Result<Children> {
        let remaining = frame.remaining(cursor)?;
        let mut sub = cursor.sub_stream(cursor.position(), remaining)?;
        let mut children = Children::default();
        self.read_boxes(&mut sub, &mut children)?;
        cursor.skip(sub.len())?;
        Ok(children)
    }

    fn read_ftyp(&mut self, cursor: &mut ByteCursor, frame: Frame) -> Result<Ftyp> {
        let major_brand = cursor.read_fourcc()?;
        let minor_version = cursor.read_u32()?;
        let brands = (frame.size as usize)
            .checked_sub(16)
            .ok_or(Error::MalformedBox {
                size: frame.size,
                consumed: 16,
            })?
            / 4;
        let compatible_brands = (0..brands)
            .map(|_| cursor.read_fourcc())
            .collect::<Result<Vec<_>>>()?;
        Ok(Ftyp {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    fn read_avc1(&mut self, cursor: &mut ByteCursor, frame: Frame) -> Result<Avc1> {
        self.reserved(cursor, 6, 0, "avc1 reserved")?;
        let data_reference_index = cursor.read_u16()?;
        let version = cursor.read_u16()?;
        let revision = cursor.read_u16()?;
        if version != 0 || revision != 0 {
            return Err(Error::unsupported(format!(
                "avc1 version {version} revision {revision}"
            )));
        }
        // Vendor, temporal quality and spatial quality.
        cursor.skip(12)?;
        let width = cursor.read_u16()?;
        let height = cursor.read_u16()?;
        let horizontal_resolution = cursor.read_fp16()?;
        let vertical_resolution = cursor.read_fp16()?;
        let reserved = cursor.read_u32()?;
        self.expect_field(reserved, 0, "avc1 reserved data size")?;
        let frame_count = cursor.read_u16()?;
        let (compressor_name, padded) = cursor.read_pstring(32)?;
        if !padded && self.options.strict_reserved {
            return Err(Error::format("avc1 compressor name padding is not zero"));
        }
        let depth = cursor.read_u16()?;
        let color_table_id = cursor.read_u16()?;
        self.expect_field(color_table_id as u32, 0xFFFF, "avc1 color table id")?;
        let children = self.read_remaining_boxes(cursor, frame)?;

        Ok(Avc1 {
            data_reference_index,
            width,
            height,
            horizontal_resolution,
            vertical_resolution,
            frame_count,
            compressor_name,
            depth,
            children,
        })
    }

    fn read_mp4a(&mut self, cursor: &mut ByteCursor, frame: Frame) -> Result<Mp4a> {
        self.reserved(cursor, 6, 0, "mp4a reserved")?;
        let data_reference_index = cursor.read_u16()?;
        let version = cursor.read_u16()?;
        // Revision level and vendor.
        cursor.skip(2)?;
        cursor.skip(4)?;
        let channel_count = cursor.read_u16()?;
        let sample_size = cursor.read_u16()?;
        let compression_id = cursor.read_u16()?;
        let packet_size = cursor.read_u16()?;
        let sample_rate = cursor.read_u32()? >> 16;

        // TODO: version 1 and 2 sound descriptions append extra fields here.
        if version != 0 {
            return Err(Error::unsupported(format!("mp4a version {version}")));
        }
        let children = self.read_remaining_boxes(cursor, frame)?;

        Ok(Mp4a {
            data_reference_index,
            version,
            channel_count,
            sample_size,
            compression_id,
            packet_size,
            sample_rate,
            children,
        })
    }

    fn reserved(&self, cursor: &mut ByteCursor, length: usize, value: u8, what: &str) -> Result<()> {
        if !cursor.reserved(length, value)? && self.options.strict_reserved {
            return Err(Error::format(format!("{what}: expected {length} bytes of {value:#04x}")));
        }
        Ok(())
    }

    fn expect_field(&self, actual: u32, expected: u32, what: &str) -> Result<()> {
        if actual == expected {
            return Ok(());
        }
        if self.options.strict_reserved {
            return Err(Error::format(format!(
                "{what}: expected {expected:#x}, found {actual:#x}"
            )));
        }
        tracing::warn!(field = what, expected, actual, "unexpected constant field");
        Ok(())
    }

    fn register_track(&mut self, trak: Arc<Mp4Box>) -> Result<()> {
        let track_id = trak
            .child(FourCc::TKHD)
            .and_then(|b| b.tkhd())
            .map(|tkhd| tkhd.track_id)
            .ok_or(Error::MissingBox("tkhd"))?;

        let track = Track::new(trak, self.data.clone(), self.options);
        if self.tracks.insert(track_id, track).is_some() {
            tracing::warn!(track_id, "duplicate track id, replacing earlier track");
        }
        tracing::debug!(track_id, "registered track");
        Ok(())
    }
}

fn read_full_header(cursor: &mut ByteCursor) -> Result<FullHeader> {
    Ok(FullHeader {
        version: cursor.read_u8()?,
        flags: cursor.read_u24()?,
    })
}

fn require_version(header: FullHeader, what: &str) -> Result<()> {
    if header.version != 0 {
        return Err(Error::unsupported(format!("{what} version {}", header.version)));
    }
    Ok(())
}

fn read_mvhd(cursor: &mut ByteCursor) -> Result<Mvhd> {
    let creation_time = cursor.read_u32()?;
    let modification_time = cursor.read_u32()?;
    let timescale = cursor.read_u32()?;
    let duration = cursor.read_u32()?;
    let rate = cursor.read_fp16()?;
    let volume = cursor.read_fp8()?;
    cursor.skip(10)?;
    let matrix = cursor.read_matrix()?;
    // Pre-defined.
    cursor.skip(6 * 4)?;
    let next_track_id = cursor.read_u32()?;

    Ok(Mvhd {
        creation_time,
        modification_time,
        timescale,
        duration,
        rate,
        volume,
        matrix,
        next_track_id,
    })
}

fn read_tkhd(cursor: &mut ByteCursor) -> Result<Tkhd> {
    let creation_time = cursor.read_u32()?;
    let modification_time = cursor.read_u32()?;
    let track_id = cursor.read_u32()?;
    cursor.skip(4)?;
    let duration = cursor.read_u32()?;
    cursor.skip(8)?;
    let layer = cursor.read_u16()?;
    let alternate_group = cursor.read_u16()?;
    let volume = cursor.read_fp8()?;
    cursor.skip(2)?;
    let matrix = cursor.read_matrix()?;
    let width = cursor.read_fp16()?;
    let height = cursor.read_fp16()?;

    Ok(Tkhd {
        creation_time,
        modification_time,
        track_id,
        duration,
        layer,
        alternate_group,
        volume,
        matrix,
        width,
        height,
    })
}

fn read_mdhd(cursor: &mut ByteCursor) -> Result<Mdhd> {
    let creation_time = cursor.read_u32()?;
    let modification_time = cursor.read_u32()?;
    let timescale = cursor.read_u32()?;
    let duration = cursor.read_u32()?;
    let language = cursor.read_iso639()?;
    cursor.skip(2)?;

    Ok(Mdhd {
        creation_time,
        modification_time,
        timescale,
        duration,
        language,
    })
}

fn read_hdlr(cursor: &mut ByteCursor, frame: Frame) -> Result<Hdlr> {
    cursor.skip(4)?;
    let handler_type = cursor.read_fourcc()?;
    cursor.skip(4 * 3)?;
    let name = match (frame.size as usize).checked_sub(32) {
        Some(left) if left > 0 => cursor.read_utf8(left)?.trim_end_matches('\0').to_string(),
        _ => String::new(),
    };
    Ok(Hdlr { handler_type, name })
}

fn read_avcc(cursor: &mut ByteCursor) -> Result<AvcC> {
    let configuration_version = cursor.read_u8()?;
    let profile_indication = cursor.read_u8()?;
    let profile_compatibility = cursor.read_u8()?;
    let level_indication = cursor.read_u8()?;
    let length_size_minus_one = cursor.read_u8()? & 3;
    if length_size_minus_one != 3 {
        return Err(Error::unsupported(format!(
            "{}-byte NAL length prefixes",
            length_size_minus_one + 1
        )));
    }

    let sps = read_parameter_sets(cursor)?;
    let pps = read_parameter_sets(cursor)?;

    Ok(AvcC {
        configuration_version,
        profile_indication,
        profile_compatibility,
        level_indication,
        length_size_minus_one,
        sps,
        pps,
    })
}

/// A 5-bit count followed by that many u16-length-prefixed parameter sets.
fn read_parameter_sets(cursor: &mut ByteCursor) -> Result<Vec<Bytes>> {
    let count = cursor.read_u8()? & 31;
    (0..count)
        .map(|_| {
            let length = cursor.read_u16()? as usize;
            cursor.read_bytes(length)
        })
        .collect()
}
