//! Interleaved walk over the samples of several tracks in file order.

use anyhow::{Context, Result};
use nalcast_media::{Container, Track};
use serde::Serialize;

/// One sample visited by [`trace_samples`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub track_id: u32,
    pub sample: u32,
    pub offset: u64,
    pub size: u64,
}

struct Cursor<'a> {
    track_id: u32,
    track: &'a Track,
    next: u32,
    count: u32,
}

impl Cursor<'_> {
    fn peek(&self) -> Result<Option<TraceEntry>> {
        if self.next >= self.count {
            return Ok(None);
        }
        Ok(Some(TraceEntry {
            track_id: self.track_id,
            sample: self.next,
            offset: self.track.sample_to_offset(self.next)?,
            size: self.track.sample_to_size(self.next, 1)?,
        }))
    }
}

/// Visit samples of `track_ids` (every track when empty) by increasing byte
/// offset, stopping after `limit` samples or when all tracks are exhausted.
///
/// On equal offsets the track listed first wins.
pub fn trace_samples(
    container: &Container,
    track_ids: &[u32],
    limit: usize,
) -> Result<Vec<TraceEntry>> {
    let ids: Vec<u32> = if track_ids.is_empty() {
        container.tracks().keys().copied().collect()
    } else {
        track_ids.to_vec()
    };

    let mut cursors = ids
        .iter()
        .map(|&track_id| -> Result<Cursor<'_>> {
            let track = container
                .track(track_id)
                .with_context(|| format!("Track {} not found", track_id))?;
            Ok(Cursor {
                track_id,
                track,
                next: 0,
                count: track.sample_count()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut entries = Vec::new();
    while entries.len() < limit {
        let mut best: Option<(usize, TraceEntry)> = None;
        for (i, cursor) in cursors.iter().enumerate() {
            if let Some(entry) = cursor.peek()? {
                if best.map_or(true, |(_, b)| entry.offset < b.offset) {
                    best = Some((i, entry));
                }
            }
        }

        let Some((i, entry)) = best else {
            break;
        };
        cursors[i].next += 1;
        tracing::trace!(
            "Track {} sample {} at offset {} ({} bytes)",
            entry.track_id,
            entry.sample,
            entry.offset,
            entry.size
        );
        entries.push(entry);
    }

    Ok(entries)
}
