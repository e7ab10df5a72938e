//! Synthetic MP4 files for tests and benchmarks.
//!
//! Files are laid out as `ftyp`, `mdat`, `moov` so chunk offsets are known
//! before the sample tables are written. Chunks of all tracks are interleaved
//! in the `mdat`: chunk 0 of every track, then chunk 1, and so on.

/// Write a complete box: size (u32 BE) + type (4 ASCII bytes) + content.
pub fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

/// Write a full box: header, version + flags, then content.
pub fn write_full_box(box_type: &[u8; 4], version: u8, flags: u32, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + content.len());
    body.extend_from_slice(&fullbox_header(version, flags));
    body.extend_from_slice(content);
    write_box(box_type, &body)
}

/// Write a container box (size + type + children concatenated).
pub fn write_container_box(box_type: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    write_box(box_type, &children.concat())
}

/// Version + flags word of a full box.
pub fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    (((version as u32) << 24) | (flags & 0x00FF_FFFF)).to_be_bytes()
}

/// Concatenate NAL units, each behind a 4-byte big-endian length.
pub fn length_prefixed(nal_units: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nal_units {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_matrix(out: &mut Vec<u8>) {
    for v in UNITY_MATRIX {
        put_u32(out, v);
    }
}

pub fn write_ftyp() -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(b"isom");
    put_u32(&mut content, 0x200);
    content.extend_from_slice(b"isom");
    content.extend_from_slice(b"avc1");
    write_box(b"ftyp", &content)
}

pub fn write_mvhd(timescale: u32, duration: u32, next_track_id: u32) -> Vec<u8> {
    let mut c = Vec::with_capacity(96);
    put_u32(&mut c, 0);
    put_u32(&mut c, 0);
    put_u32(&mut c, timescale);
    put_u32(&mut c, duration);
    put_u32(&mut c, 0x0001_0000);
    put_u16(&mut c, 0x0100);
    c.extend_from_slice(&[0u8; 10]);
    put_matrix(&mut c);
    c.extend_from_slice(&[0u8; 24]);
    put_u32(&mut c, next_track_id);
    write_full_box(b"mvhd", 0, 0, &c)
}

pub fn write_tkhd(track_id: u32, duration: u32, volume: u16, width: u16, height: u16) -> Vec<u8> {
    let mut c = Vec::with_capacity(80);
    put_u32(&mut c, 0);
    put_u32(&mut c, 0);
    put_u32(&mut c, track_id);
    put_u32(&mut c, 0);
    put_u32(&mut c, duration);
    c.extend_from_slice(&[0u8; 8]);
    put_u16(&mut c, 0);
    put_u16(&mut c, 0);
    put_u16(&mut c, volume);
    put_u16(&mut c, 0);
    put_matrix(&mut c);
    put_u32(&mut c, (width as u32) << 16);
    put_u32(&mut c, (height as u32) << 16);
    write_full_box(b"tkhd", 0, 3, &c)
}

/// `language` must be three lowercase ASCII letters.
pub fn write_mdhd(timescale: u32, duration: u32, language: &str) -> Vec<u8> {
    let packed = language
        .bytes()
        .fold(0u16, |acc, b| (acc << 5) | ((b - 0x60) as u16 & 0x1f));
    let mut c = Vec::with_capacity(20);
    put_u32(&mut c, 0);
    put_u32(&mut c, 0);
    put_u32(&mut c, timescale);
    put_u32(&mut c, duration);
    put_u16(&mut c, packed);
    put_u16(&mut c, 0);
    write_full_box(b"mdhd", 0, 0, &c)
}

pub fn write_hdlr(handler: &[u8; 4], name: &str) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, 0);
    c.extend_from_slice(handler);
    c.extend_from_slice(&[0u8; 12]);
    c.extend_from_slice(name.as_bytes());
    c.push(0);
    write_full_box(b"hdlr", 0, 0, &c)
}

pub fn write_avcc(sps: &[&[u8]], pps: &[&[u8]]) -> Vec<u8> {
    let mut c = vec![0x01, 0x64, 0x00, 0x1F, 0xFC | 3, 0xE0 | sps.len() as u8];
    for set in sps {
        put_u16(&mut c, set.len() as u16);
        c.extend_from_slice(set);
    }
    c.push(pps.len() as u8);
    for set in pps {
        put_u16(&mut c, set.len() as u16);
        c.extend_from_slice(set);
    }
    write_box(b"avcC", &c)
}

pub fn write_avc1(width: u16, height: u16, children: &[Vec<u8>]) -> Vec<u8> {
    let mut c = vec![0u8; 6];
    put_u16(&mut c, 1);
    put_u16(&mut c, 0);
    put_u16(&mut c, 0);
    c.extend_from_slice(&[0u8; 12]);
    put_u16(&mut c, width);
    put_u16(&mut c, height);
    put_u32(&mut c, 0x0048_0000);
    put_u32(&mut c, 0x0048_0000);
    put_u32(&mut c, 0);
    put_u16(&mut c, 1);
    let mut compressor = [0u8; 32];
    compressor[0] = 4;
    compressor[1..5].copy_from_slice(b"x264");
    c.extend_from_slice(&compressor);
    put_u16(&mut c, 0x0018);
    put_u16(&mut c, 0xFFFF);
    c.extend_from_slice(&children.concat());
    write_box(b"avc1", &c)
}

pub fn write_mp4a(channels: u16, sample_rate: u32, children: &[Vec<u8>]) -> Vec<u8> {
    let mut c = vec![0u8; 6];
    put_u16(&mut c, 1);
    put_u16(&mut c, 0);
    put_u16(&mut c, 0);
    put_u32(&mut c, 0);
    put_u16(&mut c, channels);
    put_u16(&mut c, 16);
    put_u16(&mut c, 0);
    put_u16(&mut c, 0);
    put_u32(&mut c, sample_rate << 16);
    c.extend_from_slice(&children.concat());
    write_box(b"mp4a", &c)
}

pub fn write_stsd(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, entries.len() as u32);
    c.extend_from_slice(&entries.concat());
    write_full_box(b"stsd", 0, 0, &c)
}

pub fn write_stts(rows: &[(u32, u32)]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, rows.len() as u32);
    for &(count, delta) in rows {
        put_u32(&mut c, count);
        put_u32(&mut c, delta);
    }
    write_full_box(b"stts", 0, 0, &c)
}

pub fn write_stss(samples: &[u32]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, samples.len() as u32);
    for &s in samples {
        put_u32(&mut c, s);
    }
    write_full_box(b"stss", 0, 0, &c)
}

pub fn write_stsc(rows: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, rows.len() as u32);
    for &(first_chunk, samples_per_chunk, description) in rows {
        put_u32(&mut c, first_chunk);
        put_u32(&mut c, samples_per_chunk);
        put_u32(&mut c, description);
    }
    write_full_box(b"stsc", 0, 0, &c)
}

/// `stsz` with a per-sample table.
pub fn write_stsz(sizes: &[u32]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, 0);
    put_u32(&mut c, sizes.len() as u32);
    for &s in sizes {
        put_u32(&mut c, s);
    }
    write_full_box(b"stsz", 0, 0, &c)
}

/// `stsz` declaring one size for every sample, with no table.
pub fn write_stsz_uniform(sample_size: u32, count: u32) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, sample_size);
    put_u32(&mut c, count);
    write_full_box(b"stsz", 0, 0, &c)
}

pub fn write_stco(offsets: &[u32]) -> Vec<u8> {
    let mut c = Vec::new();
    put_u32(&mut c, offsets.len() as u32);
    for &o in offsets {
        put_u32(&mut c, o);
    }
    write_full_box(b"stco", 0, 0, &c)
}

pub fn write_smhd() -> Vec<u8> {
    write_full_box(b"smhd", 0, 0, &[0, 0, 0, 0])
}

/// Description of one track of a synthetic file.
#[derive(Debug, Clone)]
pub struct FixtureTrack {
    pub track_id: u32,
    pub handler: [u8; 4],
    pub timescale: u32,
    /// `mdhd` duration; defaults to the `stts` total.
    pub duration: Option<u32>,
    pub width: u16,
    pub height: u16,
    pub language: String,
    pub stts: Vec<(u32, u32)>,
    /// `None` leaves out the `stss` box.
    pub sync_samples: Option<Vec<u32>>,
    pub stsc: Vec<(u32, u32, u32)>,
    /// Write `stsz` with a uniform size instead of a table.
    pub uniform_size: bool,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
    pub samples: Vec<Vec<u8>>,
}

impl FixtureTrack {
    /// An AVC track with 40-unit frames, one chunk, and a sync sample at 1.
    pub fn video(track_id: u32, samples: Vec<Vec<u8>>) -> Self {
        let n = samples.len() as u32;
        Self {
            track_id,
            handler: *b"vide",
            timescale: 1000,
            duration: None,
            width: 640,
            height: 368,
            language: "und".to_string(),
            stts: vec![(n, 40)],
            sync_samples: Some(vec![1]),
            stsc: vec![(1, n.max(1), 1)],
            uniform_size: false,
            sps: vec![0x67, 0x64, 0x00, 0x1F, 0xAC],
            pps: vec![0x68, 0xEE, 0x3C, 0x80],
            samples,
        }
    }

    /// An AAC track with 1024-unit frames, one sample per chunk.
    pub fn audio(track_id: u32, samples: Vec<Vec<u8>>) -> Self {
        let n = samples.len() as u32;
        Self {
            track_id,
            handler: *b"soun",
            timescale: 48000,
            duration: None,
            width: 0,
            height: 0,
            language: "eng".to_string(),
            stts: vec![(n, 1024)],
            sync_samples: None,
            stsc: vec![(1, 1, 1)],
            uniform_size: false,
            sps: Vec::new(),
            pps: Vec::new(),
            samples,
        }
    }

    pub fn with_stsc(mut self, rows: Vec<(u32, u32, u32)>) -> Self {
        self.stsc = rows;
        self
    }

    pub fn with_stts(mut self, rows: Vec<(u32, u32)>) -> Self {
        self.stts = rows;
        self
    }

    pub fn with_sync_samples(mut self, samples: Option<Vec<u32>>) -> Self {
        self.sync_samples = samples;
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_uniform_size(mut self) -> Self {
        self.uniform_size = true;
        self
    }

    fn total_duration(&self) -> u32 {
        self.duration
            .unwrap_or_else(|| self.stts.iter().map(|(c, d)| c * d).sum())
    }

    /// Number of samples in each chunk, following the `stsc` runs.
    pub fn chunk_layout(&self) -> Vec<usize> {
        let mut chunks = Vec::new();
        let mut remaining = self.samples.len();
        for (i, &(first_chunk, per_chunk, _)) in self.stsc.iter().enumerate() {
            let next_first = self.stsc.get(i + 1).map(|row| row.0);
            let mut chunk = first_chunk;
            while remaining > 0 && per_chunk > 0 && next_first.map_or(true, |next| chunk < next) {
                let take = (per_chunk as usize).min(remaining);
                chunks.push(take);
                remaining -= take;
                chunk += 1;
            }
        }
        chunks
    }

    fn chunks(&self) -> Vec<Vec<u8>> {
        let mut samples = self.samples.iter();
        self.chunk_layout()
            .into_iter()
            .map(|count| samples.by_ref().take(count).flatten().copied().collect())
            .collect()
    }

    fn sample_entry(&self) -> Vec<u8> {
        if &self.handler == b"soun" {
            let esds = write_full_box(b"esds", 0, 0, &[0x03, 0x19, 0x00, 0x01, 0x00]);
            write_mp4a(2, self.timescale, &[esds])
        } else {
            let avcc = write_avcc(&[&self.sps], &[&self.pps]);
            let btrt = write_box(b"btrt", &[0u8; 12]);
            write_avc1(self.width, self.height, &[avcc, btrt])
        }
    }

    fn write_trak(&self, chunk_offsets: &[u32]) -> Vec<u8> {
        let duration = self.total_duration();
        let sizes: Vec<u32> = self.samples.iter().map(|s| s.len() as u32).collect();

        let mut stbl = vec![
            write_stsd(&[self.sample_entry()]),
            write_stts(&self.stts),
        ];
        if let Some(sync) = &self.sync_samples {
            stbl.push(write_stss(sync));
        }
        stbl.push(write_stsc(&self.stsc));
        if self.uniform_size {
            let size = sizes.first().copied().unwrap_or(0);
            stbl.push(write_stsz_uniform(size, sizes.len() as u32));
        } else {
            stbl.push(write_stsz(&sizes));
        }
        stbl.push(write_stco(chunk_offsets));

        let mut minf = Vec::new();
        if &self.handler == b"soun" {
            minf.push(write_smhd());
        } else {
            minf.push(write_full_box(b"vmhd", 0, 1, &[0u8; 8]));
        }
        minf.push(write_container_box(b"stbl", &stbl));

        let handler_name = if &self.handler == b"soun" {
            "SoundHandler"
        } else {
            "VideoHandler"
        };
        let volume = if &self.handler == b"soun" { 0x0100 } else { 0 };

        write_container_box(
            b"trak",
            &[
                write_tkhd(self.track_id, duration, volume, self.width, self.height),
                write_container_box(
                    b"mdia",
                    &[
                        write_mdhd(self.timescale, duration, &self.language),
                        write_hdlr(&self.handler, handler_name),
                        write_container_box(b"minf", &minf),
                    ],
                ),
            ],
        )
    }
}

/// Assemble `ftyp` + `mdat` + `moov` for the given tracks.
pub fn build_file(tracks: &[FixtureTrack]) -> Vec<u8> {
    let ftyp = write_ftyp();
    let data_start = ftyp.len() + 8;

    let chunks: Vec<Vec<Vec<u8>>> = tracks.iter().map(FixtureTrack::chunks).collect();
    let mut offsets: Vec<Vec<u32>> = vec![Vec::new(); tracks.len()];
    let mut mdat = Vec::new();
    let rounds = chunks.iter().map(Vec::len).max().unwrap_or(0);
    for round in 0..rounds {
        for (track, track_chunks) in chunks.iter().enumerate() {
            if let Some(chunk) = track_chunks.get(round) {
                offsets[track].push((data_start + mdat.len()) as u32);
                mdat.extend_from_slice(chunk);
            }
        }
    }

    let next_track_id = tracks.iter().map(|t| t.track_id).max().unwrap_or(0) + 1;
    let mut moov = vec![write_mvhd(1000, 0, next_track_id)];
    for (track, chunk_offsets) in tracks.iter().zip(&offsets) {
        moov.push(track.write_trak(chunk_offsets));
    }

    [ftyp, write_box(b"mdat", &mdat), write_container_box(b"moov", &moov)].concat()
}
