//! Drives an external decoder with the NAL units of one AVC track.
//!
//! The player primes the decoder with the first SPS and PPS of the track's
//! `avcC` box, then submits every NAL unit of each sample in playback order,
//! one sample per tick.

mod nal;
mod stats;

pub use nal::{nal_type, nal_type_name, NalCounter};
pub use stats::Statistics;

use crate::config::PlayerConfig;
use anyhow::{Context, Result};
use nalcast_media::{Container, Error as MediaError, FourCc, Track};
use std::time::{Duration, Instant};

/// Consumer of raw NAL units.
pub trait Decoder {
    /// Submit one NAL unit (no length prefix). Returns true when a picture
    /// was produced.
    fn decode(&mut self, nal: &[u8]) -> Result<bool>;
}

type StatisticsCallback = Box<dyn FnMut(&Statistics) + Send>;

/// Playback state over one video track.
pub struct Player {
    track: Track,
    sample_count: u32,
    position: u32,
    frame_interval: Duration,
    max_frames: u32,
    statistics: Statistics,
    on_statistics: Option<StatisticsCallback>,
}

impl Player {
    /// Select the configured video track of `container`.
    pub fn new(container: &Container, config: &PlayerConfig) -> Result<Self> {
        let track = container
            .track(config.video_track)
            .cloned()
            .with_context(|| format!("Track {} not found", config.video_track))?;

        let handler = track.handler_type()?;
        if handler != FourCc::VIDE {
            anyhow::bail!(
                "Track {} is not a video track (handler '{}')",
                config.video_track,
                handler
            );
        }
        track
            .avc_config()
            .with_context(|| format!("Track {} has no AVC configuration", config.video_track))?;
        let sample_count = track.sample_count()?;

        tracing::debug!(
            "Player on track {} with {} samples",
            config.video_track,
            sample_count
        );

        Ok(Self {
            track,
            sample_count,
            position: 0,
            frame_interval: Duration::from_millis(config.frame_interval_ms),
            max_frames: config.max_frames,
            statistics: Statistics::default(),
            on_statistics: None,
        })
    }

    /// Call `callback` whenever the frame rates are refreshed.
    pub fn on_statistics(&mut self, callback: impl FnMut(&Statistics) + Send + 'static) {
        self.on_statistics = Some(Box::new(callback));
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Index of the next sample `step` will submit.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Submit the first SPS and PPS.
    pub fn prime<D: Decoder + ?Sized>(&mut self, decoder: &mut D) -> Result<()> {
        let avcc = self.track.avc_config()?;
        let sps = avcc.sps.first().context("avcC has no sequence parameter set")?;
        let pps = avcc.pps.first().context("avcC has no picture parameter set")?;

        decoder.decode(sps).context("Decoder rejected SPS")?;
        decoder.decode(pps).context("Decoder rejected PPS")?;
        Ok(())
    }

    /// Submit the NAL units of the next sample. Returns false at the end of
    /// the track.
    pub fn step<D: Decoder + ?Sized>(&mut self, decoder: &mut D) -> Result<bool> {
        if self.position >= self.sample_count {
            return Ok(false);
        }

        let sample = self.position;
        let units = self.track.sample_nal_units(sample)?;
        for nal in &units {
            let picture = decoder
                .decode(nal)
                .with_context(|| format!("Decoder failed on sample {}", sample))?;
            if picture && self.statistics.record_picture(Instant::now()) {
                if let Some(callback) = self.on_statistics.as_mut() {
                    callback(&self.statistics);
                }
            }
        }

        tracing::trace!("Submitted sample {} ({} NAL units)", sample, units.len());
        self.position += 1;
        Ok(true)
    }

    /// Move to the sync sample at or before `seconds`.
    ///
    /// Times past the end land on the last sample's sync point.
    pub fn seek(&mut self, seconds: f64) -> Result<u32> {
        if self.sample_count == 0 {
            self.position = 0;
            return Ok(0);
        }

        let time = self.track.seconds_to_time(seconds)?;
        let sample = match self.track.time_to_sample(time) {
            Ok(sample) => sample.min(self.sample_count - 1),
            Err(MediaError::TimeOutOfRange { .. }) => self.sample_count - 1,
            Err(e) => return Err(e.into()),
        };
        let target = self.track.sync_sample_at_or_before(sample)?.unwrap_or(0);

        tracing::debug!("Seek to {:.3}s: sample {}, sync sample {}", seconds, sample, target);
        self.position = target;
        Ok(target)
    }

    /// Prime the decoder, then submit one sample per frame interval until
    /// `max_frames` samples were played or the track ends.
    ///
    /// Returns the number of samples submitted.
    pub async fn play<D: Decoder + ?Sized>(&mut self, decoder: &mut D) -> Result<u32> {
        self.prime(decoder)?;

        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut played = 0;
        while played < self.max_frames {
            interval.tick().await;
            if !self.step(decoder)? {
                break;
            }
            played += 1;
        }

        tracing::info!(
            "Played {} samples, {} pictures decoded",
            played,
            self.statistics.pictures
        );
        Ok(played)
    }
}
