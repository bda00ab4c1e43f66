//! Scheduler for running many post crawls
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Streaming completed posts to the caller in completion order
//! - Batching completed posts into checkpoint flushes
//! - Run-wide cancellation

use crate::config::CrawlerConfig;
use crate::crawler::PostCrawler;
use crate::model::{ItemOutcome, Post};
use crate::output::{CrawlStatistics, StatsRecorder};
use crate::storage::CheckpointStorage;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Tuning knobs of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Posts crawled concurrently
    pub max_workers: usize,
    /// Completed posts per checkpoint flush
    pub checkpoint_interval: usize,
    /// Completed posts buffered for a slow consumer
    pub channel_capacity: usize,
}

impl SchedulerOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        let max_workers = config.max_workers.max(1) as usize;
        Self {
            max_workers,
            checkpoint_interval: config.checkpoint_interval.max(1) as usize,
            channel_capacity: max_workers * 2,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Posts not already taken through [`PostStream::next`]
    pub posts: Vec<Post>,
    pub statistics: CrawlStatistics,
}

/// Runs post crawls under one concurrency gate
pub struct CrawlScheduler {
    crawler: Arc<PostCrawler>,
    storage: Box<dyn CheckpointStorage>,
    stats: Arc<StatsRecorder>,
    options: SchedulerOptions,
    cancel: CancellationToken,
}

impl CrawlScheduler {
    pub fn new(
        crawler: Arc<PostCrawler>,
        storage: Box<dyn CheckpointStorage>,
        stats: Arc<StatsRecorder>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            crawler,
            storage,
            stats,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned token (e.g. one cancelled on Ctrl-C)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<StatsRecorder> {
        Arc::clone(&self.stats)
    }

    /// Starts crawling `urls` and returns the stream of completed posts
    ///
    /// Must be called inside a tokio runtime. Posts arrive in completion
    /// order, not input order.
    pub fn run(self, urls: Vec<Url>) -> PostStream {
        let (sender, receiver) = mpsc::channel(self.options.channel_capacity.max(1));
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();

        tracing::info!(
            posts = urls.len(),
            max_workers = self.options.max_workers,
            checkpoint = %self.storage.location().display(),
            "Starting crawl"
        );
        let driver = tokio::spawn(self.drive(urls, sender));

        PostStream {
            receiver,
            driver: Some(driver),
            stats,
            cancel,
        }
    }

    async fn drive(mut self, urls: Vec<Url>, sender: mpsc::Sender<Post>) {
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for url in urls {
            let crawler = Arc::clone(&self.crawler);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let stats = Arc::clone(&self.stats);

            tasks.spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        stats.record_outcome(ItemOutcome::Cancelled);
                        None
                    }
                    post = async {
                        let _permit = semaphore.acquire_owned().await.ok()?;
                        crawler.crawl(&url).await
                    } => post,
                }
            });
        }

        let mut batch = Vec::new();
        let mut consumer_gone = false;

        while let Some(joined) = tasks.join_next().await {
            let post = match joined {
                Ok(Some(post)) => post,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Post task failed");
                    continue;
                }
            };

            batch.push(post.clone());
            if batch.len() >= self.options.checkpoint_interval {
                flush_batch(self.storage.as_mut(), &self.stats, &mut batch);
            }

            if !consumer_gone && sender.send(post).await.is_err() {
                tracing::debug!("Post stream dropped, continuing with checkpoints only");
                consumer_gone = true;
            }
        }

        flush_batch(self.storage.as_mut(), &self.stats, &mut batch);

        if self.cancel.is_cancelled() {
            tracing::warn!("Crawl cancelled; completed posts were checkpointed");
        } else {
            tracing::info!("Crawl finished");
        }
    }
}

/// Hands the batch to the checkpoint backend
///
/// A failed flush keeps the batch so the next flush retries it; the crawl
/// itself carries on either way.
fn flush_batch(storage: &mut dyn CheckpointStorage, stats: &StatsRecorder, batch: &mut Vec<Post>) {
    if batch.is_empty() {
        return;
    }

    match storage.flush(batch) {
        Ok(total) => {
            stats.record_flush(true);
            tracing::debug!(flushed = batch.len(), total, "Checkpoint flushed");
            batch.clear();
        }
        Err(e) => {
            stats.record_flush(false);
            tracing::warn!(error = %e, pending = batch.len(), "Checkpoint flush failed, keeping posts in memory");
        }
    }
}

/// Completed posts of a running crawl
///
/// Dropping the stream before [`PostStream::finish`] cancels the run.
pub struct PostStream {
    receiver: mpsc::Receiver<Post>,
    driver: Option<JoinHandle<()>>,
    stats: Arc<StatsRecorder>,
    cancel: CancellationToken,
}

impl PostStream {
    /// Next completed post, `None` once the run is over
    pub async fn next(&mut self) -> Option<Post> {
        self.receiver.recv().await
    }

    /// Abandons in-flight posts; completed ones are still checkpointed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to end and collects the remaining posts
    pub async fn finish(mut self) -> CrawlReport {
        let mut posts = Vec::new();
        while let Some(post) = self.receiver.recv().await {
            posts.push(post);
        }

        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                tracing::error!(error = %e, "Crawl driver failed");
            }
        }

        CrawlReport {
            posts,
            statistics: self.stats.snapshot(),
        }
    }
}

impl Drop for PostStream {
    fn drop(&mut self) {
        if self.driver.is_some() {
            self.cancel.cancel();
        }
    }
}
