use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Forum-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of posts crawled concurrently
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Number of completed posts between checkpoint flushes
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

/// Token bucket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum tokens in the bucket
    pub capacity: u32,

    /// Time after which the bucket is refilled to capacity (milliseconds)
    #[serde(rename = "refill-interval")]
    pub refill_interval: u64,

    /// Fixed delay after every granted token (milliseconds)
    #[serde(rename = "request-spacing")]
    pub request_spacing: u64,

    /// Sleep between checks while the bucket is empty (milliseconds)
    #[serde(rename = "poll-interval")]
    pub poll_interval: u64,
}

/// Retry policy for HTTP 429 responses
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after the first rate-limited attempt
    #[serde(rename = "max-rate-limit-retries")]
    pub max_rate_limit_retries: u32,

    /// Lower bound of the jitter range (milliseconds)
    #[serde(rename = "backoff-min")]
    pub backoff_min: u64,

    /// Upper bound of the jitter range (milliseconds)
    #[serde(rename = "backoff-max")]
    pub backoff_max: u64,

    /// Ceiling for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-cap")]
    pub backoff_cap: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent as `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL that relative seeds and continuation links resolve against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of a post's comments endpoint; `{post_id}` is substituted
    #[serde(rename = "comments-path")]
    pub comments_path: String,

    /// Query pairs appended to every continuation URL
    #[serde(rename = "continuation-query", default)]
    pub continuation_query: String,

    /// Prefix added to the id segment of a post URL
    #[serde(rename = "post-id-prefix", default)]
    pub post_id_prefix: String,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON array of post URLs to crawl
    #[serde(rename = "seeds-path")]
    pub seeds_path: String,

    /// Directory holding the per-day checkpoint files
    #[serde(rename = "checkpoint-dir")]
    pub checkpoint_dir: String,

    /// Directory receiving the final result file of each run
    #[serde(rename = "results-dir")]
    pub results_dir: String,
}

/// Selectors and attribute names for the default page parser
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    #[serde(rename = "post-selector")]
    pub post_selector: String,
    #[serde(rename = "post-body-selector")]
    pub post_body_selector: String,
    #[serde(rename = "title-attr")]
    pub title_attr: String,
    #[serde(rename = "author-attr")]
    pub author_attr: String,
    #[serde(rename = "created-attr")]
    pub created_attr: String,
    #[serde(rename = "score-attr")]
    pub score_attr: String,
    #[serde(rename = "upvote-ratio-attr")]
    pub upvote_ratio_attr: String,
    #[serde(rename = "comment-count-attr")]
    pub comment_count_attr: String,
    #[serde(rename = "image-attr")]
    pub image_attr: String,

    #[serde(rename = "comment-selector")]
    pub comment_selector: String,
    #[serde(rename = "comment-id-attr")]
    pub comment_id_attr: String,
    #[serde(rename = "comment-depth-attr")]
    pub comment_depth_attr: String,
    #[serde(rename = "comment-author-attr")]
    pub comment_author_attr: String,
    #[serde(rename = "comment-text-selector")]
    pub comment_text_selector: String,
    #[serde(rename = "more-replies-selector")]
    pub more_replies_selector: String,
    /// Action row of a comment, source of its action id
    #[serde(rename = "action-row-selector")]
    pub action_row_selector: String,
    #[serde(rename = "action-id-attr")]
    pub action_id_attr: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            post_selector: "shreddit-post".to_string(),
            post_body_selector: "div[slot=\"text-body\"]".to_string(),
            title_attr: "post-title".to_string(),
            author_attr: "author".to_string(),
            created_attr: "created-timestamp".to_string(),
            score_attr: "score".to_string(),
            upvote_ratio_attr: "upvote-ratio".to_string(),
            comment_count_attr: "comment-count".to_string(),
            image_attr: "content-href".to_string(),
            comment_selector: "shreddit-comment".to_string(),
            comment_id_attr: "thingid".to_string(),
            comment_depth_attr: "depth".to_string(),
            comment_author_attr: "author".to_string(),
            comment_text_selector: "div[id$=\"-post-rtjson-content\"]".to_string(),
            more_replies_selector: "a[slot=\"more-comments-permalink\"]".to_string(),
            action_row_selector: "shreddit-comment-action-row".to_string(),
            action_id_attr: "comment-id".to_string(),
        }
    }
}
