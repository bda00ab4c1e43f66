//! Crawl statistics
//!
//! This module provides the counters shared by every task of a crawl run and
//! the snapshot/printing helpers used at the end of a run and by `--stats`.

use crate::model::{ItemOutcome, Post};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one crawl run
///
/// Shared via `Arc` between the scheduler, post crawlers and the fetcher.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    requests: AtomicU64,
    rate_limit_retries: AtomicU64,
    completed: AtomicU64,
    fetch_failed: AtomicU64,
    rate_limited: AtomicU64,
    marker_missing: AtomicU64,
    cancelled: AtomicU64,
    continuations_resolved: AtomicU64,
    continuations_failed: AtomicU64,
    checkpoint_flushes: AtomicU64,
    checkpoint_failures: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outbound HTTP request (first attempt or retry)
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_retry(&self) {
        self.rate_limit_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the terminal outcome of one post
    pub fn record_outcome(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Completed => &self.completed,
            ItemOutcome::FetchFailed => &self.fetch_failed,
            ItemOutcome::RateLimited => &self.rate_limited,
            ItemOutcome::MarkerMissing => &self.marker_missing,
            ItemOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_continuation(&self, resolved: bool) {
        if resolved {
            self.continuations_resolved.fetch_add(1, Ordering::Relaxed);
        } else {
            self.continuations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_flush(&self, succeeded: bool) {
        if succeeded {
            self.checkpoint_flushes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of every counter
    pub fn snapshot(&self) -> CrawlStatistics {
        let mut outcomes = HashMap::new();
        for outcome in ItemOutcome::all() {
            let count = match outcome {
                ItemOutcome::Completed => &self.completed,
                ItemOutcome::FetchFailed => &self.fetch_failed,
                ItemOutcome::RateLimited => &self.rate_limited,
                ItemOutcome::MarkerMissing => &self.marker_missing,
                ItemOutcome::Cancelled => &self.cancelled,
            }
            .load(Ordering::Relaxed);
            if count > 0 {
                outcomes.insert(outcome, count);
            }
        }

        CrawlStatistics {
            requests: self.requests.load(Ordering::Relaxed),
            rate_limit_retries: self.rate_limit_retries.load(Ordering::Relaxed),
            outcomes,
            continuations_resolved: self.continuations_resolved.load(Ordering::Relaxed),
            continuations_failed: self.continuations_failed.load(Ordering::Relaxed),
            checkpoint_flushes: self.checkpoint_flushes.load(Ordering::Relaxed),
            checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
        }
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Outbound HTTP requests, retries included
    pub requests: u64,

    /// Retries caused by HTTP 429
    pub rate_limit_retries: u64,

    /// Post count per terminal outcome (zero counts omitted)
    pub outcomes: HashMap<ItemOutcome, u64>,

    pub continuations_resolved: u64,
    pub continuations_failed: u64,

    pub checkpoint_flushes: u64,
    pub checkpoint_failures: u64,
}

impl CrawlStatistics {
    /// Number of posts that reached any terminal outcome
    pub fn total_posts(&self) -> u64 {
        self.outcomes.values().sum()
    }

    pub fn outcome(&self, outcome: ItemOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

/// Shape of a set of harvested posts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSummary {
    pub posts: usize,
    pub posts_with_comments: usize,
    pub comments: usize,
    pub max_depth: Option<u32>,
    /// Posts whose id fell back to the URL (no comments fetched)
    pub url_keyed_posts: usize,
}

/// Computes post/comment/depth counts for a post list
pub fn summarize_posts(posts: &[Post]) -> PostSummary {
    let mut summary = PostSummary {
        posts: posts.len(),
        ..PostSummary::default()
    };

    for post in posts {
        let comments = post.total_comments();
        summary.comments += comments;
        if comments > 0 {
            summary.posts_with_comments += 1;
        }
        summary.max_depth = summary.max_depth.max(post.max_depth());
        if post.post_id == post.url {
            summary.url_keyed_posts += 1;
        }
    }

    summary
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Posts attempted: {}", stats.total_posts());
    println!("  Requests issued: {}", stats.requests);
    println!("  Rate-limit retries: {}", stats.rate_limit_retries);
    println!();

    println!("Posts by Outcome:");
    let mut outcome_counts: Vec<_> = stats.outcomes.iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));

    let total = stats.total_posts();
    for (outcome, count) in outcome_counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", outcome, count, percentage);
    }
    println!();

    println!("Comment continuations:");
    println!("  Resolved: {}", stats.continuations_resolved);
    println!("  Failed: {}", stats.continuations_failed);
    println!();

    println!("Checkpoints:");
    println!("  Flushes: {}", stats.checkpoint_flushes);
    if stats.checkpoint_failures > 0 {
        println!("  Failed flushes: {}", stats.checkpoint_failures);
    }
}

/// Prints the shape of a post list
pub fn print_post_summary(summary: &PostSummary) {
    println!("=== Harvest Summary ===\n");
    println!("  Posts: {}", summary.posts);
    println!("  Posts with comments: {}", summary.posts_with_comments);
    println!("  Comments: {}", summary.comments);
    match summary.max_depth {
        Some(depth) => println!("  Deepest reply level: {}", depth),
        None => println!("  Deepest reply level: -"),
    }
    if summary.url_keyed_posts > 0 {
        println!("  Posts keyed by URL: {}", summary.url_keyed_posts);
    }
}
