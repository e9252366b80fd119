//! Page fetching for partner landing pages
//!
//! [`PageFetcher`] is the seam the scan orchestrator depends on. The HTTP
//! implementation rate-limits with `governor` and retries transient failures
//! with exponential backoff; a rendering fetcher can sit behind the same trait.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::infrastructure::config::defaults;

/// Raw page as returned by a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub status: u16,
    /// Whether the card marker class occurs anywhere in the body
    pub marker_found: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to retrieve page content from {url}: empty body")]
    EmptyBody { url: String },

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl FetchError {
    /// Network trouble, timeouts, 5xx and 429 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::InvalidUrl { .. }
            | Self::Body { .. }
            | Self::EmptyBody { .. }
            | Self::ClientSetup(_) => false,
        }
    }

    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Capability to turn a partner URL into page HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_requests_per_second: u32,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub max_redirects: usize,
    /// Class name whose presence means the card template rendered
    pub content_marker: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_redirects: defaults::MAX_REDIRECTS,
            content_marker: defaults::CONTENT_MARKER.to_string(),
        }
    }
}

/// reqwest-backed fetcher with rate limiting and retries
pub struct HttpPageFetcher {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetcherConfig,
}

impl HttpPageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| FetchError::ClientSetup(format!("invalid user agent: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;

        let per_second = NonZeroU32::new(config.max_requests_per_second).ok_or_else(|| {
            FetchError::ClientSetup("rate limit must be greater than 0".to_string())
        })?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    fn validate_url(url: &str) -> Result<(), FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            }),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.config.retry_base_delay_ms.saturating_mul(factor))
    }

    /// One request. On failure also returns the server's Retry-After, if any.
    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, (FetchError, Option<Duration>)> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| (FetchError::from_reqwest(url, &e), None))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.min(defaults::MAX_RETRY_AFTER_SECS)));
            return Err((
                FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                },
                retry_after,
            ));
        }

        let html = response.text().await.map_err(|e| {
            let err = if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            };
            (err, None)
        })?;

        if html.trim().is_empty() {
            return Err((
                FetchError::EmptyBody {
                    url: url.to_string(),
                },
                None,
            ));
        }

        let marker_found = html.contains(&self.config.content_marker);
        Ok(FetchedPage {
            url: url.to_string(),
            html,
            status: status.as_u16(),
            marker_found,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        Self::validate_url(url)?;

        let attempts = self.config.max_retries + 1;
        let mut attempt = 1;
        loop {
            info!("🌐 GET (attempt {}/{}) {}", attempt, attempts, url);
            match self.fetch_once(url).await {
                Ok(page) => {
                    debug!(
                        "Fetched {} ({} bytes, marker found: {})",
                        url,
                        page.html.len(),
                        page.marker_found
                    );
                    return Ok(page);
                }
                Err((err, retry_after)) => {
                    if !err.is_retryable() || attempt >= attempts {
                        return Err(err);
                    }
                    let delay = retry_after.map_or_else(
                        || self.backoff(attempt),
                        |server| server.max(self.backoff(attempt)),
                    );
                    warn!(
                        "⚠️ Attempt {} for {} failed: {} (retrying in {:?})",
                        attempt, url, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> FetcherConfig {
        FetcherConfig {
            timeout_secs: 5,
            max_requests_per_second: 50,
            max_retries: 2,
            retry_base_delay_ms: 10,
            ..FetcherConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_success_reports_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/moon/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<div class="domain-card"></div>"#),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let page = fetcher.fetch(&format!("{}/moon/", server.uri())).await.unwrap();

        assert_eq!(page.status, 200);
        assert!(page.marker_found);
        assert!(page.html.contains("domain-card"));
    }

    #[tokio::test]
    async fn test_missing_marker_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no cards</p>"))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let page = fetcher.fetch(&server.uri()).await.unwrap();
        assert!(!page.marker_found);
    }

    #[tokio::test]
    async fn test_blank_body_is_a_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  \n\t "))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let page = fetcher.fetch(&server.uri()).await.unwrap();
        assert_eq!(page.html, "ok");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_fast() {
        let fetcher = HttpPageFetcher::new(fast_config()).unwrap();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            fetcher.fetch("ftp://example.com/").await,
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_zero_rate_is_setup_error() {
        let config = FetcherConfig {
            max_requests_per_second: 0,
            ..FetcherConfig::default()
        };
        assert!(matches!(
            HttpPageFetcher::new(config),
            Err(FetchError::ClientSetup(_))
        ));
    }

    #[test]
    fn test_retry_classification() {
        let status = |status| FetchError::HttpStatus {
            status,
            url: "u".into(),
        };
        assert!(status(429).is_retryable());
        assert!(status(502).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(FetchError::Timeout { url: "u".into() }.is_retryable());
    }
}
