//! Page fetching for result sites.
//!
//! The extraction core only ever sees HTML text; retrieval, throttling,
//! retries and caching all live here.

pub mod cache;
pub mod rate_limiter;
pub mod retry;

pub use cache::PageCache;
pub use rate_limiter::RateLimiter;
pub use retry::RetryConfig;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Source of page HTML
pub trait Fetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// reqwest-backed fetcher with rate limiting, retry and optional caching
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    retry: RetryConfig,
    cache: Option<PageCache>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(FetchError::Client)?;

        let cache = config
            .cache_dir
            .as_ref()
            .map(|dir| PageCache::new(dir, chrono::Duration::hours(config.cache_ttl_hours)));

        Ok(Self {
            client,
            limiter: RateLimiter::from_config(config),
            retry: RetryConfig::from_config(config),
            cache,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.limiter.acquire().await;
        debug!("GET {}", url);

        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some(html) = self.cache.as_ref().and_then(|c| c.get(url)) {
            debug!("cache hit: {}", url);
            return Ok(html);
        }

        let html = retry::retry_when(
            &self.retry,
            &format!("fetch {}", url),
            FetchError::is_retryable,
            || self.fetch_once(url),
        )
        .await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(url, &html) {
                warn!("Failed to cache {}: {}", url, e);
            }
        }
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cached_page_served_without_network() {
        let dir = std::env::temp_dir().join(format!("regatta-fetch-{}", std::process::id()));
        let config = FetchConfig {
            cache_dir: Some(dir.to_string_lossy().into_owned()),
            ..FetchConfig::default()
        };
        // Unroutable host: only the cache can answer
        let url = "http://regatta.invalid/results";
        PageCache::new(&dir, chrono::Duration::hours(1))
            .set(url, "<table></table>")
            .unwrap();

        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.fetch(url).await.unwrap(), "<table></table>");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
