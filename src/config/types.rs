use nalcast_media::ParseOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub demux: DemuxConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Strictness of the MP4 parser.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct DemuxConfig {
    /// Cross-check track durations against the time-to-sample table
    #[serde(default)]
    pub paranoid: bool,

    /// Fail on reserved or constant field mismatches instead of warning
    #[serde(default)]
    pub strict_reserved: bool,
}

impl From<DemuxConfig> for ParseOptions {
    fn from(config: DemuxConfig) -> Self {
        ParseOptions {
            paranoid: config.paranoid,
            strict_reserved: config.strict_reserved,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Track id of the AVC track to play
    #[serde(default = "default_video_track")]
    pub video_track: u32,

    /// Delay between two decoded samples
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,

    /// Stop after this many samples
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
}

fn default_video_track() -> u32 {
    1
}
fn default_frame_interval() -> u64 {
    1
}
fn default_max_frames() -> u32 {
    5000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video_track: default_video_track(),
            frame_interval_ms: default_frame_interval(),
            max_frames: default_max_frames(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Retries after a failed HTTP fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff step between retries, multiplied by the attempt number
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Request timeout for HTTP sources
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff() -> u64 {
    250
}
fn default_timeout() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}
