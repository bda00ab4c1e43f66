//! Crawler module: the concurrent crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Process-wide token bucket rate limiting
//! - HTTP fetching with 429-aware retry
//! - Comment forest assembly with continuation fetches
//! - Single-post crawls
//! - Bounded-concurrency scheduling with checkpointing

mod assembler;
mod fetcher;
mod limiter;
mod post;
mod scheduler;

pub use assembler::{CommentTreeAssembler, ForestBuilder};
pub use fetcher::{build_http_client, FetchTask, RetryPolicy, RetryingFetcher};
pub use limiter::RateLimiter;
pub use post::PostCrawler;
pub use scheduler::{CrawlReport, CrawlScheduler, PostStream, SchedulerOptions};

use crate::config::Config;
use crate::model::Post;
use crate::output::StatsRecorder;
use crate::page::{PageParser, SelectorParser};
use crate::storage::{CheckpointStorage, JsonCheckpointStore};
use crate::url::SiteUrls;
use crate::HarvestError;
use std::sync::Arc;
use url::Url;

/// Wires a scheduler from configuration
///
/// Builds one HTTP client, one rate limiter and one statistics recorder,
/// shared by every task of the run.
///
/// # Returns
///
/// * `Ok(CrawlScheduler)` - Ready to `run`
/// * `Err(HarvestError)` - Invalid site URL or selector, or the HTTP client
///   could not be built
pub fn build_scheduler(
    config: &Config,
    storage: Box<dyn CheckpointStorage>,
) -> Result<CrawlScheduler, HarvestError> {
    let stats = Arc::new(StatsRecorder::new());
    let site = Arc::new(SiteUrls::from_config(&config.site)?);
    let parser: Arc<dyn PageParser> = Arc::new(SelectorParser::new(&config.parser)?);
    let fetcher = Arc::new(RetryingFetcher::from_config(config, Arc::clone(&stats))?);
    let crawler = Arc::new(PostCrawler::new(fetcher, parser, site, Arc::clone(&stats)));

    Ok(CrawlScheduler::new(
        crawler,
        storage,
        stats,
        SchedulerOptions::from_config(&config.crawler),
    ))
}

/// Crawls `urls` and returns every harvested post
///
/// Completed posts are checkpointed to today's file in the configured
/// checkpoint directory as the run progresses.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `urls` - Normalized post URLs
///
/// # Returns
///
/// * `Ok(Vec<Post>)` - Posts in completion order; failed posts are absent
/// * `Err(HarvestError)` - The crawl could not be set up
pub async fn crawl(config: &Config, urls: Vec<Url>) -> Result<Vec<Post>, HarvestError> {
    let storage = Box::new(JsonCheckpointStore::new(&config.output.checkpoint_dir));
    let report = build_scheduler(config, storage)?.run(urls).finish().await;
    Ok(report.posts)
}
