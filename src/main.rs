mod cli;

use nalcast::{
    config::{self, Config},
    player::{nal_type, nal_type_name, NalCounter, Player},
    report::{box_tree_lines, ProbeReport},
    source,
    trace::trace_samples,
};
use nalcast_media::Container;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Validate and Version must work without a usable config
    let config = match &cli.command {
        Commands::Validate { .. } | Commands::Version => None,
        _ => Some(config::load_config_or_default(cli.config.as_deref())?),
    };

    // Respect RUST_LOG env var if set, then the config filter, then defaults
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| config.as_ref().and_then(|c| c.logging.filter.clone()))
        .unwrap_or_else(|| {
            if cli.verbose {
                "nalcast=trace,nalcast_media=trace".to_string()
            } else {
                "nalcast=info,nalcast_media=warn".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config.unwrap_or_default();

    match cli.command {
        Commands::Probe { locator, json } => block_on(probe(&locator, &config, json)),
        Commands::Boxes { locator, json } => block_on(boxes(&locator, &config, json)),
        Commands::Trace {
            locator,
            tracks,
            limit,
        } => block_on(trace(&locator, &config, &tracks, limit)),
        Commands::Nals {
            locator,
            track,
            sample,
        } => block_on(nals(&locator, &config, track, sample)),
        Commands::Play {
            locator,
            frames,
            seek,
        } => block_on(play(&locator, config, frames, seek)),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("nalcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

async fn load(locator: &str, config: &Config) -> Result<Container> {
    source::load_container(locator, &config.source, config.demux).await
}

async fn probe(locator: &str, config: &Config, json: bool) -> Result<()> {
    let container = load(locator, config).await?;
    let report = ProbeReport::from_container(&container)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", locator);
    println!("Size: {} bytes", report.size);
    if let Some(ref brand) = report.major_brand {
        println!("Brand: {} ({})", brand, report.compatible_brands.join(", "));
    }
    if let Some(secs) = report.duration_secs {
        println!("Duration: {:.3}s", secs);
    }

    println!("\nTracks: {}", report.tracks.len());
    for track in &report.tracks {
        print!(
            "  [{}] {} {}",
            track.id,
            track.handler,
            track.codec.as_deref().unwrap_or("?")
        );
        if track.width > 0.0 && track.height > 0.0 {
            print!(" {}x{}", track.width, track.height);
        }
        if let Some(ref lang) = track.language {
            print!(" ({})", lang);
        }
        println!();
        print!(
            "      {} samples, {} sync, timescale {}, duration {}",
            track.sample_count, track.sync_samples, track.timescale, track.duration
        );
        if let Some(secs) = track.duration_secs {
            print!(" ({:.3}s)", secs);
        }
        println!();
    }

    Ok(())
}

async fn boxes(locator: &str, config: &Config, json: bool) -> Result<()> {
    let container = load(locator, config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(container.root())?);
    } else {
        for line in box_tree_lines(&container) {
            println!("{}", line);
        }
    }

    Ok(())
}

async fn trace(locator: &str, config: &Config, tracks: &[u32], limit: usize) -> Result<()> {
    let container = load(locator, config).await?;

    for entry in trace_samples(&container, tracks, limit)? {
        println!(
            "T{} Sample {} Offset: {}, Size: {}",
            entry.track_id, entry.sample, entry.offset, entry.size
        );
    }

    Ok(())
}

async fn nals(locator: &str, config: &Config, track_id: u32, sample: u32) -> Result<()> {
    let container = load(locator, config).await?;
    let track = container
        .track(track_id)
        .with_context(|| format!("Track {} not found", track_id))?;

    let offset = track.sample_to_offset(sample)?;
    let size = track.sample_to_size(sample, 1)?;
    let units = track.sample_nal_units(sample)?;
    println!(
        "Track {} sample {}: offset {}, size {}, {} NAL units",
        track_id,
        sample,
        offset,
        size,
        units.len()
    );

    for (i, nal) in units.iter().enumerate() {
        let kind = nal_type(nal)
            .map(|t| format!("{} ({})", t, nal_type_name(t)))
            .unwrap_or_else(|| "empty".to_string());
        let head: Vec<String> = nal.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        println!("  [{}] type {} len {} {}", i, kind, nal.len(), head.join(" "));
    }

    Ok(())
}

async fn play(locator: &str, mut config: Config, frames: Option<u32>, seek: Option<f64>) -> Result<()> {
    if let Some(frames) = frames {
        config.player.max_frames = frames;
    }

    let container = load(locator, &config).await?;
    let mut player = Player::new(&container, &config.player)?;
    player.on_statistics(|stats| {
        tracing::debug!(
            "fps {:.2} (min {:.2}, max {:.2}), avg {:.2}",
            stats.fps.unwrap_or_default(),
            stats.fps_min.unwrap_or_default(),
            stats.fps_max.unwrap_or_default(),
            stats.fps_since_start.unwrap_or_default()
        );
    });

    if let Some(seconds) = seek {
        let sample = player.seek(seconds)?;
        println!("Seeked to sample {}", sample);
    }

    let mut decoder = NalCounter::new();
    let played = player.play(&mut decoder).await?;

    let stats = player.statistics();
    println!("Samples: {}", played);
    println!("Pictures: {}", decoder.pictures());
    println!(
        "NAL units: {} ({} bytes)",
        decoder.total_units(),
        decoder.total_bytes()
    );
    for (nal_type, count) in decoder.counts() {
        println!("  type {:>2} {:<22} {}", nal_type, nal_type_name(*nal_type), count);
    }
    println!("Elapsed: {:.3}s", stats.elapsed_secs);
    if let Some(fps) = stats.fps_since_start {
        println!("Average fps: {:.2}", fps);
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!(
        "  Demux: paranoid={}, strict_reserved={}",
        config.demux.paranoid, config.demux.strict_reserved
    );
    println!(
        "  Player: track {}, {} ms per frame, at most {} frames",
        config.player.video_track, config.player.frame_interval_ms, config.player.max_frames
    );
    println!(
        "  Source: {} retries, {} ms backoff, {} s timeout",
        config.source.max_retries, config.source.retry_backoff_ms, config.source.timeout_secs
    );

    Ok(())
}
