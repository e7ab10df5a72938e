//! CLI end-to-end tests
//!
//! Tests for the nalcast command-line interface over synthetic media.

mod common;

use assert_cmd::prelude::*;
use common::MediaDir;
use predicates::prelude::*;
use std::process::Command;

/// Get a command for the nalcast binary
#[allow(deprecated)]
fn nalcast_cmd() -> Command {
    Command::cargo_bin("nalcast").unwrap()
}

const FAST_CONFIG: &str = r#"
[player]
frame_interval_ms = 1

[logging]
filter = "nalcast=warn"
"#;

/// A media dir with the sample clip and a config pointing at fast playback.
fn setup() -> (MediaDir, String, String) {
    let media = MediaDir::new();
    let clip = media.clip().to_string_lossy().to_string();
    let config = media.config(FAST_CONFIG).to_string_lossy().to_string();
    (media, clip, config)
}

#[test]
fn test_cli_no_args_shows_help() {
    nalcast_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    nalcast_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("nalcast"))
        .stdout(predicate::str::contains("probe"));
}

#[test]
fn test_cli_version_command() {
    nalcast_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nalcast"));
}

#[test]
fn test_cli_probe() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "probe", &clip])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tracks: 2"))
        .stdout(predicate::str::contains("[1] vide avc1 640x368"))
        .stdout(predicate::str::contains("[2] soun mp4a"))
        .stdout(predicate::str::contains("12 samples, 3 sync"));
}

#[test]
fn test_cli_probe_json() {
    let (_media, clip, config) = setup();
    let output = nalcast_cmd()
        .args(["--config", &config, "probe", "--json", &clip])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["major_brand"], "isom");
    assert_eq!(report["tracks"][0]["handler"], "vide");
    assert_eq!(report["tracks"][0]["sample_count"], 12);
    assert_eq!(report["tracks"][1]["timescale"], 48000);
}

#[test]
fn test_cli_boxes() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "boxes", &clip])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ftyp @0 size 24"))
        .stdout(predicate::str::contains("\n  trak @"))
        .stdout(predicate::str::contains("avcC @"));
}

#[test]
fn test_cli_trace_limit() {
    let (_media, clip, config) = setup();
    let output = nalcast_cmd()
        .args(["--config", &config, "trace", "--limit", "5", &clip])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("T1 Sample 0 Offset: "));
    assert!(lines[2].starts_with("T2 Sample 0 Offset: "));
}

#[test]
fn test_cli_trace_single_track() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "trace", "--track", "2", &clip])
        .assert()
        .success()
        .stdout(predicate::str::contains("T2 Sample 5"))
        .stdout(predicate::str::contains("T1").not());
}

#[test]
fn test_cli_nals() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "nals", "--sample", "4", &clip])
        .assert()
        .success()
        .stdout(predicate::str::contains("Track 1 sample 4"))
        .stdout(predicate::str::contains("2 NAL units"))
        .stdout(predicate::str::contains("type 9 (access unit delimiter)"))
        .stdout(predicate::str::contains("type 5 (IDR slice) len 3 65 88 04"));
}

#[test]
fn test_cli_nals_sample_out_of_range() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "nals", "--sample", "12", &clip])
        .assert()
        .failure();
}

#[test]
fn test_cli_play() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "play", &clip])
        .assert()
        .success()
        .stdout(predicate::str::contains("Samples: 12"))
        .stdout(predicate::str::contains("Pictures: 12"))
        .stdout(predicate::str::contains("IDR slice"));
}

#[test]
fn test_cli_play_seek_and_frames() {
    let (_media, clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "play", "--seek", "0.2", "--frames", "3", &clip])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeked to sample 4"))
        .stdout(predicate::str::contains("Samples: 3"));
}

#[test]
fn test_cli_play_rejects_audio_track() {
    let media = MediaDir::new();
    let clip = media.clip();
    let config = media.config("[player]\nvideo_track = 2\n");
    nalcast_cmd()
        .arg("--config")
        .arg(&config)
        .arg("play")
        .arg(&clip)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a video track"));
}

#[test]
fn test_cli_missing_file() {
    let (_media, _clip, config) = setup();
    nalcast_cmd()
        .args(["--config", &config, "probe", "/nonexistent/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn test_cli_validate_config() {
    let (_media, _clip, config) = setup();
    nalcast_cmd()
        .args(["validate", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("1 ms per frame"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let media = MediaDir::new();
    let config = media.config("[player]\nvideo_track = 0\n");
    nalcast_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure();
}
