//! Transports for the static survey file tree.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use surveyscope_core::AppConfig;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{LoaderError, Result};

/// Read-only access to the pre-built survey files, addressed by relative path.
#[async_trait]
pub trait StaticSource: Send + Sync {
    /// Human-readable location, used in log lines.
    fn describe(&self) -> String;

    async fn read(&self, path: &str) -> Result<String>;
}

/// Read `path` and decode it as one JSON document.
pub async fn read_json<T: DeserializeOwned>(source: &dyn StaticSource, path: &str) -> Result<T> {
    let text = source.read(path).await?;
    serde_json::from_str(&text).map_err(|e| LoaderError::Decode {
        path: path.to_string(),
        source: e,
    })
}

/// Build the source named by `config.source.location`.
pub fn open_source(config: &AppConfig) -> Result<Arc<dyn StaticSource>> {
    if config.is_remote() {
        let source = HttpSource::new(
            &config.source.location,
            &config.http.user_agent,
            config.http.max_retries,
            Duration::from_secs(config.http.timeout_secs),
        )?;
        Ok(Arc::new(source))
    } else {
        Ok(Arc::new(DirSource::new(&config.source.location)))
    }
}

// ─── HttpSource ───────────────────────────────────────────────────────────────

/// Longest single wait between retries, whatever the server asks for.
const MAX_WAIT: Duration = Duration::from_secs(60);

pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl HttpSource {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Base delay between retries; doubled on every attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Exponential backoff for `attempt`, capped at [`MAX_WAIT`].
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_WAIT)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl StaticSource for HttpSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn read(&self, path: &str) -> Result<String> {
        let url = self.url_for(path);
        let mut attempt = 0u32;
        loop {
            debug!(%url, attempt, "GET");
            match self.client.get(&url).send().await {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(LoaderError::Status { url, status: 429 });
                    }
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| self.delay(attempt))
                        .min(MAX_WAIT);
                    sleep(wait).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == StatusCode::NOT_FOUND => {
                    return Err(LoaderError::NotFound(url));
                }
                Ok(r) if !r.status().is_success() => {
                    return Err(LoaderError::Status {
                        url,
                        status: r.status().as_u16(),
                    });
                }
                Ok(r) => return r.text().await.map_err(LoaderError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(LoaderError::Http(e));
                    }
                    warn!(%url, attempt, error = %e, "request failed, retrying");
                    sleep(self.delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ─── DirSource ────────────────────────────────────────────────────────────────

/// A survey tree on the local filesystem.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StaticSource for DirSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path.trim_start_matches('/'));
        // Decoded lossily so one bad byte only spoils its own line.
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(LoaderError::NotFound(full.display().to_string()))
            }
            Err(e) => Err(LoaderError::Io {
                path: full.display().to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{ShardFetcher, parse_shard};
    use mockito::Server;
    use surveyscope_core::ChapterId;
    use tempfile::TempDir;

    fn http(base: &str) -> HttpSource {
        HttpSource::new(base, "surveyscope-test", 1, Duration::from_secs(5))
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn http_reads_relative_path() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/site/survey_data_by_date/a/dates_index.json")
            .with_status(200)
            .with_body(r#"{"dates":["2024-03-10"]}"#)
            .create_async()
            .await;

        let source = http(&format!("{}/site/", server.url()));
        let body = source.read("survey_data_by_date/a/dates_index.json").await.unwrap();
        assert!(body.contains("2024-03-10"));
    }

    #[tokio::test]
    async fn http_maps_404_and_5xx() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing.json")
            .with_status(404)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/broken.json")
            .with_status(503)
            .create_async()
            .await;

        let source = http(&server.url());
        assert!(matches!(
            source.read("missing.json").await,
            Err(LoaderError::NotFound(_))
        ));
        assert!(matches!(
            source.read("broken.json").await,
            Err(LoaderError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn http_retries_after_429() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/stats.json")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(2)
            .create_async()
            .await;

        let source = http(&server.url());
        let err = source.read("stats.json").await.unwrap_err();
        assert!(matches!(err, LoaderError::Status { status: 429, .. }));
        assert!(err.is_retryable());
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn http_retries_transport_errors_then_gives_up() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSource::new(
            &format!("http://{addr}"),
            "surveyscope-test",
            2,
            Duration::from_secs(5),
        )
        .unwrap()
        .with_backoff(Duration::from_millis(1));
        let err = source.read("stats.json").await.unwrap_err();
        assert!(matches!(err, LoaderError::Http(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn backoff_is_capped() {
        let source = http("http://localhost").with_backoff(Duration::from_secs(1));
        assert_eq!(source.delay(0), Duration::from_secs(1));
        assert_eq!(source.delay(3), Duration::from_secs(8));
        assert_eq!(source.delay(40), MAX_WAIT);
    }

    #[tokio::test]
    async fn dir_invalid_utf8_does_not_fail_the_shard() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        let mut shard = b"{\"id\":\"good1\"}\n{\"id\":\"bad".to_vec();
        shard.extend_from_slice(b"\xff\"}\n{\"id\":\"junk\"}\xff\n{\"id\":\"good2\"}\n");
        std::fs::write(dir.path().join("a/2024-03-10.jsonl"), shard).unwrap();

        let fetcher = ShardFetcher::new(Arc::new(DirSource::new(dir.path())), "");
        let papers = fetcher
            .fetch_shard(&ChapterId::new("a"), "2024-03-10")
            .await
            .unwrap();
        let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["good1", "bad\u{FFFD}", "good2"]);

        let text = DirSource::new(dir.path())
            .read("a/2024-03-10.jsonl")
            .await
            .unwrap();
        let lines: Vec<usize> = parse_shard(&text).skipped.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3]);
    }

    #[tokio::test]
    async fn dir_reads_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/2024-03-10.jsonl"), "{\"id\":\"1\"}\n").unwrap();

        let source = DirSource::new(dir.path());
        let text = source.read("a/2024-03-10.jsonl").await.unwrap();
        assert_eq!(text.trim(), "{\"id\":\"1\"}");
        assert!(matches!(
            source.read("a/nope.jsonl").await,
            Err(LoaderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn read_json_reports_decode_errors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let source = DirSource::new(dir.path());

        let err = read_json::<serde_json::Value>(&source, "bad.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Decode { ref path, .. } if path == "bad.json"));
    }

    #[test]
    fn open_source_picks_transport() {
        let mut cfg = AppConfig::default();
        assert!(open_source(&cfg).unwrap().describe().starts_with('.'));
        cfg.source.location = "https://example.org/survey/".to_string();
        assert_eq!(
            open_source(&cfg).unwrap().describe(),
            "https://example.org/survey"
        );
    }
}
