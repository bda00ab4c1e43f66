//! HTTP fetcher implementation
//!
//! Every outbound request of a crawl run goes through [`RetryingFetcher`]:
//! - one rate limiter token per attempt, retries included
//! - a bounded per-request timeout
//! - jittered exponential backoff on HTTP 429, capped in attempts
//! - classification of every other failure into [`FetchError`]

use crate::config::{Config, RetryConfig};
use crate::crawler::RateLimiter;
use crate::output::StatsRecorder;
use crate::FetchError;
use rand::Rng;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A pending request and the number of attempts made so far
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub url: Url,
    pub attempts: u32,
}

impl FetchTask {
    pub fn new(url: Url) -> Self {
        Self { url, attempts: 0 }
    }

    /// Retries used so far (attempts after the first)
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Backoff schedule for rate-limited responses
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_rate_limit_retries,
            backoff_min: Duration::from_millis(config.backoff_min),
            backoff_max: Duration::from_millis(config.backoff_max),
            backoff_cap: Duration::from_millis(config.backoff_cap),
        }
    }

    /// Delay before retry number `retry` (0-based)
    ///
    /// `uniform(min, max) * 2^retry`, never above the cap.
    pub fn backoff(&self, retry: u32) -> Duration {
        let min = self.backoff_min.as_millis() as u64;
        let max = self.backoff_max.as_millis() as u64;
        let jitter = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };

        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(jitter.saturating_mul(factor));
        delay.min(self.backoff_cap)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent comes from the `[user-agent]` section and the request
/// timeout from `[crawler]`.
///
/// # Example
///
/// ```no_run
/// use forum_harvest::config::load_config;
/// use forum_harvest::crawler::build_http_client;
/// use std::path::Path;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(config.crawler.request_timeout())
        .connect_timeout(config.crawler.request_timeout())
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited HTTP GET with 429-aware retry
///
/// Cheap to share: wrap it in an `Arc` and hand it to every task.
#[derive(Debug)]
pub struct RetryingFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    stats: Arc<StatsRecorder>,
}

impl RetryingFetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            client,
            limiter,
            policy,
            stats,
        }
    }

    /// Builds the client, limiter and retry policy from configuration
    pub fn from_config(config: &Config, stats: Arc<StatsRecorder>) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(config)?,
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            RetryPolicy::from_config(&config.retry),
            stats,
        ))
    }

    /// Fetches `url` and returns the response body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body |
    /// | HTTP 429 | Back off and retry, `RateLimited` once retries run out |
    /// | Other HTTP 4xx | Immediate → `Permanent` |
    /// | HTTP 5xx | Immediate → `Transient` |
    /// | Timeout / connection error | Immediate → `Transient` |
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut task = FetchTask::new(url.clone());

        loop {
            task.attempts += 1;
            self.limiter.acquire().await;
            self.stats.record_request();
            tracing::debug!(url = %task.url, attempt = task.attempts, "Fetching");

            let response = self
                .client
                .get(task.url.clone())
                .send()
                .await
                .map_err(|e| transient(&task.url, &e))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry = task.retries();
                if retry >= self.policy.max_retries {
                    tracing::warn!(url = %task.url, attempts = task.attempts, "Rate limit retries exhausted");
                    return Err(FetchError::RateLimited {
                        url: task.url.to_string(),
                        attempts: task.attempts,
                    });
                }

                let delay = self.policy.backoff(retry);
                self.stats.record_rate_limit_retry();
                tracing::warn!(
                    url = %task.url,
                    attempt = task.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status.is_client_error() {
                return Err(FetchError::Permanent {
                    url: task.url.to_string(),
                    status: status.as_u16(),
                });
            }

            if !status.is_success() {
                return Err(FetchError::Transient {
                    url: task.url.to_string(),
                    message: format!("HTTP {}", status.as_u16()),
                });
            }

            return response.text().await.map_err(|e| transient(&task.url, &e));
        }
    }
}

fn transient(url: &Url, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else {
        error.to_string()
    };
    FetchError::Transient {
        url: url.to_string(),
        message,
    }
}
