use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nalcast")]
#[command(author, version, about = "MP4 demuxer and NAL unit player")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe an MP4 file and display its tracks
    Probe {
        /// File path or http(s) URL
        #[arg(required = true)]
        locator: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump the parsed box tree
    Boxes {
        /// File path or http(s) URL
        #[arg(required = true)]
        locator: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List samples of all tracks in file order
    Trace {
        /// File path or http(s) URL
        #[arg(required = true)]
        locator: String,

        /// Restrict to these track ids
        #[arg(short, long = "track")]
        tracks: Vec<u32>,

        /// Maximum number of samples to list
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Show the NAL units of one sample
    Nals {
        /// File path or http(s) URL
        #[arg(required = true)]
        locator: String,

        /// Track id
        #[arg(short, long, default_value = "1")]
        track: u32,

        /// 0-based sample index
        #[arg(short, long, default_value = "0")]
        sample: u32,
    },

    /// Feed the video track to a NAL counting decoder
    Play {
        /// File path or http(s) URL
        #[arg(required = true)]
        locator: String,

        /// Stop after this many samples (overrides config)
        #[arg(long)]
        frames: Option<u32>,

        /// Start from the sync sample at or before this time
        #[arg(long)]
        seek: Option<f64>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
