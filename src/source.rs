//! Byte sources that produce the complete MP4 buffer for a locator.
//!
//! The demuxer only ever sees a fully loaded [`Bytes`] buffer. Fetching it,
//! retrying and progress reporting all happen here.

use crate::config::{DemuxConfig, SourceConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use nalcast_media::Container;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Bytes loaded so far and the expected total when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

/// Callback invoked after every chunk read.
pub type ProgressFn<'a> = Option<&'a (dyn Fn(LoadProgress) + Send + Sync)>;

/// Something that can produce a complete media buffer.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Path or URL this source reads.
    fn locator(&self) -> &str;

    /// Read the whole resource.
    async fn read_all(&self, progress: ProgressFn<'_>) -> Result<Bytes>;
}

/// Pick an HTTP source for `http(s)://` locators, a file source otherwise.
pub fn open_source(locator: &str, config: &SourceConfig) -> Result<Box<dyn ByteSource>> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        Ok(Box::new(HttpSource::new(locator, config)?))
    } else {
        Ok(Box::new(FileSource::new(locator)))
    }
}

/// Fetch `locator` and parse it off the async runtime.
pub async fn load_container(
    locator: &str,
    source: &SourceConfig,
    demux: DemuxConfig,
) -> Result<Container> {
    let bytes = open_source(locator, source)?.read_all(None).await?;
    tracing::info!("Loaded {} bytes from {}", bytes.len(), locator);

    let container = tokio::task::spawn_blocking(move || Container::parse(bytes, demux.into()))
        .await
        .context("Parser task panicked")?
        .with_context(|| format!("Failed to parse {}", locator))?;
    Ok(container)
}

/// Local file read through `tokio::fs`.
pub struct FileSource {
    path: PathBuf,
    locator: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
        let locator = path.display().to_string();
        Self { path, locator }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn read_all(&self, progress: ProgressFn<'_>) -> Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        let total = file.metadata().await.ok().map(|m| m.len());

        let mut buffer = BytesMut::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file
                .read(&mut chunk)
                .await
                .with_context(|| format!("Failed to read {:?}", self.path))?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(report) = progress {
                report(LoadProgress {
                    loaded: buffer.len() as u64,
                    total,
                });
            }
        }

        Ok(buffer.freeze())
    }
}

/// Failure of a single HTTP attempt.
enum FetchError {
    /// Transport errors and 5xx responses.
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Resource fetched with an HTTP GET, retried on transient failures.
pub struct HttpSource {
    client: Client,
    url: String,
    max_retries: u32,
    backoff: Duration,
}

impl HttpSource {
    pub fn new(url: &str, config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn fetch_once(&self, progress: ProgressFn<'_>) -> std::result::Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", self.url))
            .map_err(FetchError::Transient)?;

        let status = response.status();
        if !status.is_success() {
            let err = anyhow::anyhow!("GET {} returned {}", self.url, status);
            return Err(if status.is_server_error() {
                FetchError::Transient(err)
            } else {
                FetchError::Fatal(err)
            });
        }

        let total = response.content_length();
        let mut buffer = BytesMut::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body of {}", self.url))
            .map_err(FetchError::Transient)?
        {
            buffer.extend_from_slice(&chunk);
            if let Some(report) = progress {
                report(LoadProgress {
                    loaded: buffer.len() as u64,
                    total,
                });
            }
        }

        Ok(buffer.freeze())
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    fn locator(&self) -> &str {
        &self.url
    }

    async fn read_all(&self, progress: ProgressFn<'_>) -> Result<Bytes> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(progress).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::Fatal(e)) => return Err(e),
                Err(FetchError::Transient(e)) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    tracing::warn!(
                        "Fetching {} failed (attempt {}/{}): {:#}, retrying in {:?}",
                        self.url,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(FetchError::Transient(e)) => {
                    return Err(e.context(format!(
                        "Giving up on {} after {} attempts",
                        self.url,
                        attempt + 1
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_source_picks_by_scheme() {
        let config = SourceConfig::default();
        let http = open_source("https://example.com/clip.mp4", &config).unwrap();
        assert_eq!(http.locator(), "https://example.com/clip.mp4");

        let file = open_source("/tmp/clip.mp4", &config).unwrap();
        assert_eq!(file.locator(), "/tmp/clip.mp4");
    }

    #[tokio::test]
    async fn test_file_source_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let content = vec![7u8; READ_CHUNK + 10];
        tokio::fs::write(&path, &content).await.unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        let report = |p: LoadProgress| seen.lock().unwrap().push(p);
        let bytes = FileSource::new(&path).read_all(Some(&report)).await.unwrap();

        assert_eq!(bytes.len(), content.len());
        let seen = seen.into_inner().unwrap();
        assert!(seen.len() >= 2);
        let last = seen.last().unwrap();
        assert_eq!(last.loaded, content.len() as u64);
        assert_eq!(last.total, Some(content.len() as u64));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = FileSource::new("/nonexistent/clip.mp4")
            .read_all(None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
