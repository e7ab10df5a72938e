//! Integration tests for byte sources and the player over loaded media.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};

use common::{sample_clip, MediaDir, CLIP_SAMPLES};
use nalcast::config::{DemuxConfig, PlayerConfig, SourceConfig};
use nalcast::player::{NalCounter, Player};
use nalcast::source::{load_container, open_source, HttpSource, LoadProgress};
use nalcast::source::ByteSource;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retries() -> SourceConfig {
    SourceConfig {
        max_retries: 2,
        retry_backoff_ms: 1,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_http_source_fetches_body() {
    let server = MockServer::start().await;
    let body = sample_clip();
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let url = format!("{}/clip.mp4", server.uri());
    let source = open_source(&url, &fast_retries()).unwrap();

    let loaded = AtomicU64::new(0);
    let report = |p: LoadProgress| loaded.store(p.loaded, Ordering::SeqCst);
    let bytes = source.read_all(Some(&report)).await.unwrap();

    assert_eq!(&bytes[..], &body[..]);
    assert_eq!(loaded.load(Ordering::SeqCst), body.len() as u64);
}

#[tokio::test]
async fn test_http_source_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .mount(&server)
        .await;

    let source = HttpSource::new(&format!("{}/clip.mp4", server.uri()), &fast_retries()).unwrap();
    let bytes = source.read_all(None).await.unwrap();
    assert_eq!(&bytes[..], &[1, 2, 3]);
}

#[tokio::test]
async fn test_http_source_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let source = HttpSource::new(&format!("{}/clip.mp4", server.uri()), &fast_retries()).unwrap();
    let err = source.read_all(None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("after 3 attempts"));
}

#[tokio::test]
async fn test_http_source_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpSource::new(&format!("{}/missing.mp4", server.uri()), &fast_retries()).unwrap();
    let err = source.read_all(None).await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_load_and_play_from_file() {
    let media = MediaDir::new();
    let path = media.clip();

    let container = load_container(
        path.to_str().unwrap(),
        &SourceConfig::default(),
        DemuxConfig::default(),
    )
    .await
    .unwrap();

    let config = PlayerConfig {
        video_track: 1,
        frame_interval_ms: 1,
        max_frames: 1000,
    };
    let mut player = Player::new(&container, &config).unwrap();
    let mut decoder = NalCounter::new();
    let played = player.play(&mut decoder).await.unwrap();

    assert_eq!(played, CLIP_SAMPLES as u32);
    assert_eq!(decoder.pictures(), CLIP_SAMPLES as u64);
    assert_eq!(decoder.counts().get(&5), Some(&3));
    assert_eq!(decoder.counts().get(&9), Some(&(CLIP_SAMPLES as u64)));
}

#[tokio::test]
async fn test_load_reports_parse_failure() {
    let media = MediaDir::new();
    let path = media.write("broken.mp4", &[0, 0, 0, 40, b'm', b'o', b'o', b'v', 0, 0]);

    let err = load_container(
        path.to_str().unwrap(),
        &SourceConfig::default(),
        DemuxConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}
