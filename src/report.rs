//! Human and JSON summaries of a parsed container.

use nalcast_media::{Container, Mp4Box, Track};
use serde::Serialize;

/// Summary of one track.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub id: u32,
    pub handler: String,
    pub codec: Option<String>,
    pub width: f64,
    pub height: f64,
    pub language: Option<String>,
    pub timescale: u32,
    pub duration: u64,
    pub duration_secs: Option<f64>,
    pub sample_count: u32,
    pub sync_samples: u32,
}

impl TrackSummary {
    pub fn from_track(id: u32, track: &Track) -> anyhow::Result<Self> {
        let sample_count = track.sample_count()?;
        let mut sync_samples = 0;
        for sample in 0..sample_count {
            if track.is_sync_sample(sample)? {
                sync_samples += 1;
            }
        }

        Ok(Self {
            id,
            handler: track.handler_type()?.to_string(),
            codec: track.sample_entry_type().ok().map(|c| c.to_string()),
            width: track.width()?,
            height: track.height()?,
            language: track.language().ok().map(str::to_string),
            timescale: track.time_scale()?,
            duration: track.total_time()?,
            duration_secs: track.total_time_in_seconds().ok(),
            sample_count,
            sync_samples,
        })
    }
}

/// Summary of a whole file.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub size: usize,
    pub major_brand: Option<String>,
    pub compatible_brands: Vec<String>,
    pub duration_secs: Option<f64>,
    pub tracks: Vec<TrackSummary>,
}

impl ProbeReport {
    pub fn from_container(container: &Container) -> anyhow::Result<Self> {
        let tracks = container
            .tracks()
            .iter()
            .map(|(&id, track)| TrackSummary::from_track(id, track))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let ftyp = container.ftyp();
        Ok(Self {
            size: container.data().len(),
            major_brand: ftyp.map(|f| f.major_brand.to_string()),
            compatible_brands: ftyp
                .map(|f| f.compatible_brands.iter().map(|b| b.to_string()).collect())
                .unwrap_or_default(),
            duration_secs: container.duration_secs(),
            tracks,
        })
    }
}

/// Indented one-line-per-box dump of the tree.
pub fn box_tree_lines(container: &Container) -> Vec<String> {
    let mut lines = Vec::new();
    for child in container.root().iter() {
        push_box(&mut lines, child, 0);
    }
    lines
}

fn push_box(lines: &mut Vec<String>, node: &Mp4Box, depth: usize) {
    let mut line = format!(
        "{:indent$}{} @{} size {}",
        "",
        node.box_type,
        node.offset,
        node.size,
        indent = depth * 2
    );
    if let Some(header) = node.header {
        line.push_str(&format!(" v{} flags {:#x}", header.version, header.flags));
    }
    if let Some(description) = node.box_type.description() {
        line.push_str(&format!(" ({})", description));
    }
    lines.push(line);

    if let Some(children) = node.children() {
        for child in children.iter() {
            push_box(lines, child, depth + 1);
        }
    }
}
