mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./nalcast.toml",
        "~/.config/nalcast/config.toml",
        "/etc/nalcast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.player.video_track == 0 {
        anyhow::bail!("player.video_track must be a positive track id");
    }

    if config.player.frame_interval_ms == 0 {
        anyhow::bail!("player.frame_interval_ms cannot be 0");
    }

    if config.player.max_frames == 0 {
        tracing::warn!("player.max_frames is 0, playback will stop immediately");
    }

    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs cannot be 0");
    }

    Ok(())
}
