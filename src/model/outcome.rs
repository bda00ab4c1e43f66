//! Terminal outcomes of post crawls

use crate::FetchError;
use std::fmt;

/// Terminal outcome of one post crawl
///
/// Every post URL handed to the scheduler ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemOutcome {
    /// Post page fetched, parsed, and comment forest attached
    Completed,

    /// Post page could not be fetched (network, timeout, 4xx/5xx)
    FetchFailed,

    /// Post page stayed rate limited through every retry
    RateLimited,

    /// Page fetched but the expected post marker was absent
    MarkerMissing,

    /// Run was cancelled before the post finished
    Cancelled,
}

impl ItemOutcome {
    /// Returns true if the post made it into the results
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if this represents a failure of the item itself
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::RateLimited | Self::MarkerMissing
        )
    }

    /// Maps a fetch failure of the post page to its outcome
    pub fn from_fetch_error(error: &FetchError) -> Self {
        match error {
            FetchError::RateLimited { .. } => Self::RateLimited,
            FetchError::Transient { .. } | FetchError::Permanent { .. } => Self::FetchFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::FetchFailed => "fetch_failed",
            Self::RateLimited => "rate_limited",
            Self::MarkerMissing => "marker_missing",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Completed,
            Self::FetchFailed,
            Self::RateLimited,
            Self::MarkerMissing,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
