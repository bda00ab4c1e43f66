//! URL handling module for Forum-Harvest
//!
//! This module provides seed normalization and loading, post identifier
//! derivation, and the site URL builders used by the crawl engine.

mod normalize;
mod seeds;

use crate::config::SiteConfig;
use url::Url;

// Re-export main functions
pub use normalize::normalize_seed;
pub use seeds::{load_seeds, normalize_seeds};

/// Derives a post identifier from a post URL
///
/// The identifier is the path segment following `/comments/`, with `prefix`
/// prepended. Returns `None` when the URL has no such segment.
///
/// # Examples
///
/// ```
/// use forum_harvest::url::extract_post_id;
/// use url::Url;
///
/// let url = Url::parse("https://forum.example.com/r/pain/comments/1hfrzk9/title/").unwrap();
/// assert_eq!(extract_post_id(&url, "t3_"), Some("t3_1hfrzk9".to_string()));
///
/// let url = Url::parse("https://forum.example.com/r/pain/").unwrap();
/// assert_eq!(extract_post_id(&url, "t3_"), None);
/// ```
pub fn extract_post_id(url: &Url, prefix: &str) -> Option<String> {
    let (_, rest) = url.path().split_once("/comments/")?;
    let segment = rest.split('/').next().unwrap_or_default();
    if segment.is_empty() {
        return None;
    }
    Some(format!("{}{}", prefix, segment))
}

/// Builds the URLs the crawl engine fetches beyond the seed list
#[derive(Debug, Clone)]
pub struct SiteUrls {
    base: Url,
    comments_path: String,
    continuation_query: String,
    post_id_prefix: String,
}

impl SiteUrls {
    /// Creates the builders from the `[site]` configuration section
    pub fn from_config(config: &SiteConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(&config.base_url)?,
            comments_path: config.comments_path.clone(),
            continuation_query: config.continuation_query.clone(),
            post_id_prefix: config.post_id_prefix.clone(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Derives the identifier of a post URL using the configured prefix
    pub fn post_id(&self, url: &Url) -> Option<String> {
        extract_post_id(url, &self.post_id_prefix)
    }

    /// URL of the comments endpoint for a post
    pub fn comments_url(&self, post_id: &str) -> Result<Url, url::ParseError> {
        self.base
            .join(&self.comments_path.replace("{post_id}", post_id))
    }

    /// Resolves a continuation link against the base URL
    ///
    /// The configured continuation query pairs are appended after any pairs
    /// the link already carries.
    pub fn continuation_url(&self, href: &str) -> Result<Url, url::ParseError> {
        let mut url = self.base.join(href)?;
        if !self.continuation_query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(url::form_urlencoded::parse(self.continuation_query.as_bytes()));
        }
        Ok(url)
    }
}
