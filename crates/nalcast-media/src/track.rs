//! Sample-table navigation for one `trak`.
//!
//! A [`Track`] never copies tables out of the box tree. Every query walks
//! `trak/mdia/minf/stbl` and reads the parsed `stsz`, `stsc`, `stco`, `stts`
//! and `stss` records directly, so the tree stays the single source of truth.
//!
//! Sample and chunk indices are 0-based. The tables themselves use 1-based
//! chunk and sync-sample numbers; the conversion happens here.

use std::sync::Arc;

use bytes::Bytes;

use crate::boxes::{AvcC, FourCc, Mdhd, Mp4Box, Mp4a, Stco, Stsc, Stss, Stsz, Stts, Tkhd};
use crate::container::ParseOptions;
use crate::cursor::ByteCursor;
use crate::{Error, Result};

/// Chunk holding a sample and the sample's position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPosition {
    /// 0-based index into the chunk offset table.
    pub chunk_index: u32,
    /// Number of samples of the same chunk that precede this one.
    pub offset_within_chunk: u32,
}

/// A track registered from a parsed `trak` box.
#[derive(Debug, Clone)]
pub struct Track {
    trak: Arc<Mp4Box>,
    data: Bytes,
    options: ParseOptions,
}

impl Track {
    pub(crate) fn new(trak: Arc<Mp4Box>, data: Bytes, options: ParseOptions) -> Self {
        Self {
            trak,
            data,
            options,
        }
    }

    /// The underlying `trak` box.
    pub fn trak(&self) -> &Mp4Box {
        &self.trak
    }

    fn tkhd(&self) -> Result<&Tkhd> {
        self.trak
            .child(FourCc::TKHD)
            .and_then(|b| b.tkhd())
            .ok_or(Error::MissingBox("tkhd"))
    }

    fn mdia(&self) -> Result<&Mp4Box> {
        self.trak
            .child(FourCc::MDIA)
            .map(|b| &**b)
            .ok_or(Error::MissingBox("mdia"))
    }

    fn mdhd(&self) -> Result<&Mdhd> {
        self.mdia()?
            .child(FourCc::MDHD)
            .and_then(|b| b.mdhd())
            .ok_or(Error::MissingBox("mdhd"))
    }

    fn stbl(&self) -> Result<&Mp4Box> {
        self.mdia()?
            .descend(&[FourCc::MINF, FourCc::STBL])
            .ok_or(Error::MissingBox("stbl"))
    }

    fn stsd_entry(&self, box_type: FourCc, name: &'static str) -> Result<&Mp4Box> {
        self.stbl()?
            .child(FourCc::STSD)
            .ok_or(Error::MissingBox("stsd"))?
            .child(box_type)
            .map(|b| &**b)
            .ok_or(Error::MissingBox(name))
    }

    fn stsz(&self) -> Result<&Stsz> {
        self.stbl()?
            .child(FourCc::STSZ)
            .and_then(|b| b.stsz())
            .ok_or(Error::MissingBox("stsz"))
    }

    fn stsc(&self) -> Result<&Stsc> {
        self.stbl()?
            .child(FourCc::STSC)
            .and_then(|b| b.stsc())
            .ok_or(Error::MissingBox("stsc"))
    }

    fn stco(&self) -> Result<&Stco> {
        self.stbl()?
            .child(FourCc::STCO)
            .and_then(|b| b.stco())
            .ok_or(Error::MissingBox("stco"))
    }

    fn stts(&self) -> Result<&Stts> {
        self.stbl()?
            .child(FourCc::STTS)
            .and_then(|b| b.stts())
            .ok_or(Error::MissingBox("stts"))
    }

    /// `stss` is optional: without it every sample is a sync sample.
    fn stss(&self) -> Result<Option<&Stss>> {
        Ok(self.stbl()?.child(FourCc::STSS).and_then(|b| b.stss()))
    }

    pub fn track_id(&self) -> Result<u32> {
        Ok(self.tkhd()?.track_id)
    }

    /// Handler type from `hdlr`, e.g. `vide` or `soun`.
    pub fn handler_type(&self) -> Result<FourCc> {
        self.mdia()?
            .child(FourCc::HDLR)
            .and_then(|b| b.hdlr())
            .map(|hdlr| hdlr.handler_type)
            .ok_or(Error::MissingBox("hdlr"))
    }

    /// Presentation width from `tkhd`.
    pub fn width(&self) -> Result<f64> {
        Ok(self.tkhd()?.width)
    }

    /// Presentation height from `tkhd`.
    pub fn height(&self) -> Result<f64> {
        Ok(self.tkhd()?.height)
    }

    pub fn language(&self) -> Result<&str> {
        Ok(&self.mdhd()?.language)
    }

    /// Type code of the first sample description entry.
    pub fn sample_entry_type(&self) -> Result<FourCc> {
        self.stbl()?
            .child(FourCc::STSD)
            .and_then(|stsd| stsd.children())
            .and_then(|children| children.iter().next())
            .map(|entry| entry.box_type)
            .ok_or(Error::MissingBox("stsd"))
    }

    /// AVC decoder configuration (`stsd/avc1/avcC`).
    pub fn avc_config(&self) -> Result<&AvcC> {
        self.stsd_entry(FourCc::AVC1, "avc1")?
            .child(FourCc::AVCC)
            .and_then(|b| b.avcc())
            .ok_or(Error::MissingBox("avcC"))
    }

    /// Audio sample entry (`stsd/mp4a`).
    pub fn audio_entry(&self) -> Result<&Mp4a> {
        self.stsd_entry(FourCc::MP4A, "mp4a")?
            .mp4a()
            .ok_or(Error::MissingBox("mp4a"))
    }

    /// Number of samples described by `stsz`.
    pub fn sample_count(&self) -> Result<u32> {
        Ok(self.stsz()?.count())
    }

    fn check_sample(&self, sample: u32) -> Result<()> {
        let count = self.sample_count()?;
        if sample >= count {
            return Err(Error::SampleOutOfRange { sample, count });
        }
        Ok(())
    }

    /// Total size of `count` consecutive samples starting at `start`.
    ///
    /// Returns 0 when `count` is 0.
    pub fn sample_to_size(&self, start: u32, count: u32) -> Result<u64> {
        if count == 0 {
            return Ok(0);
        }
        let stsz = self.stsz()?;
        let total = stsz.count();
        let end = start as u64 + count as u64;
        if end > total as u64 {
            return Err(Error::SampleOutOfRange {
                sample: (end - 1).min(u32::MAX as u64) as u32,
                count: total,
            });
        }

        Ok(match &stsz.sizes {
            Some(sizes) => sizes[start as usize..end as usize]
                .iter()
                .map(|&s| s as u64)
                .sum(),
            None => stsz.sample_size as u64 * count as u64,
        })
    }

    /// Locate the chunk holding `sample`.
    ///
    /// `stsc` run-length encodes chunks: each row covers the chunks from its
    /// `first_chunk` up to the next row's, every one holding
    /// `samples_per_chunk` samples. The last row extends to the end of the
    /// chunk table. For rows `(1,3) (3,1) (5,1)` samples 0..9 land in chunks
    /// `0 0 0 1 1 1 2 3 4`.
    pub fn sample_to_chunk(&self, sample: u32) -> Result<ChunkPosition> {
        self.check_sample(sample)?;
        let table = &self.stsc()?.entries;

        let resolve = |chunks_before: u64, sample: u64, samples_per_chunk: u32| {
            if samples_per_chunk == 0 {
                return Err(Error::format("sample-to-chunk row with zero samples per chunk"));
            }
            let spc = samples_per_chunk as u64;
            let chunk_index = u32::try_from(chunks_before + sample / spc)
                .map_err(|_| Error::format("chunk index overflows 32 bits"))?;
            Ok(ChunkPosition {
                chunk_index,
                offset_within_chunk: (sample % spc) as u32,
            })
        };

        match table.as_slice() {
            [] => Err(Error::format("empty sample-to-chunk table")),
            [row] => {
                if row.first_chunk != 1 {
                    return Err(Error::format(format!(
                        "single sample-to-chunk row starts at chunk {}",
                        row.first_chunk
                    )));
                }
                resolve(0, sample as u64, row.samples_per_chunk)
            }
            rows => {
                let mut sample = sample as u64;
                let mut total_chunks = 0u64;
                for (i, pair) in rows.windows(2).enumerate() {
                    let (previous, row) = (&pair[0], &pair[1]);
                    let chunk_count = row
                        .first_chunk
                        .checked_sub(previous.first_chunk)
                        .ok_or_else(|| Error::format("sample-to-chunk rows out of order"))?
                        as u64;
                    let span = previous.samples_per_chunk as u64 * chunk_count;

                    if sample < span {
                        return resolve(total_chunks, sample, previous.samples_per_chunk);
                    }
                    sample -= span;
                    if i + 2 == rows.len() {
                        return resolve(total_chunks + chunk_count, sample, row.samples_per_chunk);
                    }
                    total_chunks += chunk_count;
                }
                Err(Error::format("sample-to-chunk table does not cover sample"))
            }
        }
    }

    /// Absolute file offset of a 0-based chunk.
    pub fn chunk_to_offset(&self, chunk: u32) -> Result<u64> {
        let offsets = &self.stco()?.offsets;
        offsets
            .get(chunk as usize)
            .map(|&o| o as u64)
            .ok_or(Error::ChunkOutOfRange {
                chunk,
                count: offsets.len() as u32,
            })
    }

    /// Absolute file offset of a sample.
    pub fn sample_to_offset(&self, sample: u32) -> Result<u64> {
        let position = self.sample_to_chunk(sample)?;
        let chunk_offset = self.chunk_to_offset(position.chunk_index)?;
        let preceding = self.sample_to_size(
            sample - position.offset_within_chunk,
            position.offset_within_chunk,
        )?;
        Ok(chunk_offset + preceding)
    }

    /// Sample playing at `time` (in timescale units).
    pub fn time_to_sample(&self, time: u64) -> Result<u32> {
        let stts = self.stts()?;
        let mut remaining = time;
        let mut sample = 0u64;
        for entry in &stts.entries {
            let span = entry.count as u64 * entry.delta as u64;
            if remaining >= span {
                remaining -= span;
                sample += entry.count as u64;
            } else {
                let index = sample + remaining / entry.delta as u64;
                return u32::try_from(index).map_err(|_| Error::TimeOutOfRange {
                    time,
                    duration: stts.total_duration(),
                });
            }
        }
        Err(Error::TimeOutOfRange {
            time,
            duration: stts.total_duration(),
        })
    }

    /// Track duration from `mdhd`.
    ///
    /// With [`ParseOptions::paranoid`] the `stts` total is recomputed and a
    /// mismatch is reported as [`Error::Integrity`].
    pub fn total_time(&self) -> Result<u64> {
        let declared = self.mdhd()?.duration as u64;
        if self.options.paranoid {
            let computed = self.stts()?.total_duration();
            if computed != declared {
                return Err(Error::Integrity { declared, computed });
            }
        }
        Ok(declared)
    }

    pub fn total_time_in_seconds(&self) -> Result<f64> {
        self.time_to_seconds(self.total_time()?)
    }

    /// Time units per second from `mdhd`.
    pub fn time_scale(&self) -> Result<u32> {
        Ok(self.mdhd()?.timescale)
    }

    pub fn time_to_seconds(&self, time: u64) -> Result<f64> {
        let scale = self.non_zero_time_scale()?;
        Ok(time as f64 / scale as f64)
    }

    /// Seconds to timescale units, truncated. Negative input maps to 0.
    pub fn seconds_to_time(&self, seconds: f64) -> Result<u64> {
        let scale = self.non_zero_time_scale()?;
        Ok((seconds * scale as f64) as u64)
    }

    fn non_zero_time_scale(&self) -> Result<u32> {
        match self.time_scale()? {
            0 => Err(Error::format("mdhd timescale is zero")),
            scale => Ok(scale),
        }
    }

    /// Whether `sample` is listed in `stss`.
    pub fn is_sync_sample(&self, sample: u32) -> Result<bool> {
        self.check_sample(sample)?;
        Ok(match self.stss()? {
            Some(stss) => stss.samples.binary_search(&(sample + 1)).is_ok(),
            None => true,
        })
    }

    /// Closest sync sample at or before `sample`, if any.
    pub fn sync_sample_at_or_before(&self, sample: u32) -> Result<Option<u32>> {
        self.check_sample(sample)?;
        let Some(stss) = self.stss()? else {
            return Ok(Some(sample));
        };
        let idx = stss.samples.partition_point(|&s| s <= sample + 1);
        Ok(idx
            .checked_sub(1)
            .map(|i| stss.samples[i].saturating_sub(1)))
    }

    /// Bytes of one sample, as a view into the file buffer.
    pub fn sample_data(&self, sample: u32) -> Result<Bytes> {
        let offset = self.sample_to_offset(sample)?;
        let size = self.sample_to_size(sample, 1)?;
        let have = self.data.len() as u64;
        let end = offset + size;
        if end > have {
            return Err(Error::OutOfBounds {
                offset: offset as usize,
                need: size as usize,
                have: have.saturating_sub(offset) as usize,
            });
        }
        Ok(self.data.slice(offset as usize..end as usize))
    }

    /// NAL units of one sample, length prefixes stripped.
    pub fn sample_nal_units(&self, sample: u32) -> Result<Vec<Bytes>> {
        let data = self.sample_data(sample)?;
        split_nal_units(data).map_err(|e| Error::MalformedSample {
            sample,
            reason: e.to_string(),
        })
    }
}

/// Split a buffer of 4-byte length-prefixed NAL units.
///
/// Fails if a prefix or payload runs past the end of `data`.
pub fn split_nal_units(data: Bytes) -> Result<Vec<Bytes>> {
    let mut cursor = ByteCursor::new(data);
    let mut units = Vec::new();
    while cursor.remaining() > 0 {
        let length = cursor.read_u32()? as usize;
        units.push(cursor.read_bytes(length)?);
    }
    Ok(units)
}
