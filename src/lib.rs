//! Forum-Harvest: a budgeted discussion-thread harvester
//!
//! This crate crawls forum posts together with their lazily paginated comment
//! trees under a global request budget, checkpointing completed posts so that
//! an interrupted run can resume without losing collected data.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod page;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Forum-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to load seed list {path}: {message}")]
    SeedList { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Failure of a single outbound request
///
/// None of these abort a crawl: the caller drops the one item (or subtree)
/// the request belonged to.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, timeout or server-side failure
    #[error("Transient failure fetching {url}: {message}")]
    Transient { url: String, message: String },

    /// HTTP 429 persisted through every allowed retry
    #[error("Rate limited fetching {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    /// Client-side HTTP status other than 429
    #[error("Permanent failure fetching {url}: HTTP {status}")]
    Permanent { url: String, status: u16 },
}

impl FetchError {
    /// The URL of the request that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. }
            | Self::RateLimited { url, .. }
            | Self::Permanent { url, .. } => url,
        }
    }
}

/// Checkpoint persistence errors
///
/// Reported to the caller but never fatal to a crawl.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode checkpoint {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for Forum-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlScheduler, PostCrawler, RateLimiter, RetryingFetcher};
pub use model::{Comment, ItemOutcome, Post};
pub use page::{PageParser, SelectorParser};
pub use storage::{CheckpointStorage, JsonCheckpointStore};
pub use url::{extract_post_id, SiteUrls};
