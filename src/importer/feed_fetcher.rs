// ==========================================
// Product Feed Import - feed fetcher
// ==========================================
// http(s):// URLs go through reqwest; file:// URLs and bare
// paths are read from disk.
// The whole body is buffered once per run; parsing pulls from it.
// ==========================================

use crate::config::pipeline_config_trait::{DEFAULT_FETCH_MAX_BYTES, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FeedFetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct HttpFeedFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> ImportResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .use_rustls_tls()
            .user_agent(concat!("feed-import/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::InternalError(format!("http client: {}", e)))?;

        Ok(Self { client, max_bytes })
    }

    pub fn with_defaults() -> ImportResult<Self> {
        Self::new(
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            DEFAULT_FETCH_MAX_BYTES,
        )
    }

    async fn fetch_http(&self, url: &str) -> ImportResult<Vec<u8>> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        if let Some(len) = resp.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn fetch_file(&self, path: &str) -> ImportResult<Vec<u8>> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ImportError::FeedUnreachable(format!("{}: {}", path, e)))?;
        if meta.len() > self.max_bytes {
            return Err(self.too_large(path));
        }
        tokio::fs::read(path)
            .await
            .map_err(|e| ImportError::FeedUnreachable(format!("{}: {}", path, e)))
    }

    fn too_large(&self, url: &str) -> ImportError {
        ImportError::FeedUnreachable(format!(
            "{} exceeds the {} byte size limit",
            url, self.max_bytes
        ))
    }
}

/// Local path behind a `file://` URL or a bare path, None for remote URLs.
pub fn local_path(url: &str) -> Option<&str> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(path);
    }
    if url.contains("://") {
        None
    } else {
        Some(url)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> ImportResult<Vec<u8>> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ImportError::FeedUnreachable("empty source URL".to_string()));
        }

        let body = match local_path(url) {
            Some(path) => self.fetch_file(path).await?,
            None if url.starts_with("http://") || url.starts_with("https://") => {
                self.fetch_http(url).await?
            }
            None => {
                return Err(ImportError::FeedUnreachable(format!(
                    "unsupported URL scheme: {}",
                    url
                )))
            }
        };

        if body.is_empty() {
            return Err(ImportError::FeedUnreachable(format!("{} returned an empty body", url)));
        }
        debug!(bytes = body.len(), "feed fetched");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///tmp/feed.xml"), Some("/tmp/feed.xml"));
        assert_eq!(local_path("./feed.csv"), Some("./feed.csv"));
        assert_eq!(local_path("https://example.com/feed.xml"), None);
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ean;name\n1;A\n").unwrap();
        let fetcher = HttpFeedFetcher::with_defaults().unwrap();

        let url = format!("file://{}", file.path().display());
        let body = fetcher.fetch(&url).await.unwrap();
        assert_eq!(body, b"ean;name\n1;A\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_unreachable() {
        let fetcher = HttpFeedFetcher::with_defaults().unwrap();
        let err = fetcher.fetch("/definitely/not/here.xml").await.unwrap_err();
        assert!(matches!(err, ImportError::FeedUnreachable(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 64]).unwrap();
        let fetcher = HttpFeedFetcher::new(Duration::from_secs(5), 16).unwrap();

        let err = fetcher
            .fetch(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::FeedUnreachable(_)));
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let fetcher = HttpFeedFetcher::with_defaults().unwrap();
        let err = fetcher.fetch("ftp://example.com/feed.xml").await.unwrap_err();
        assert!(matches!(err, ImportError::FeedUnreachable(_)));
    }
}
