//! Output module for crawl results and statistics
//!
//! This module handles:
//! - Writing the final post list of a run
//! - Recording and printing crawl statistics

pub mod stats;

pub use stats::{
    print_post_summary, print_statistics, summarize_posts, CrawlStatistics, PostSummary,
    StatsRecorder,
};

use crate::model::Post;
use crate::storage::write_atomic;
use crate::HarvestError;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Writes the final post list of a run to `posts_<YYYYMMDD_HHMMSS>.json`
///
/// # Arguments
///
/// * `dir` - Results directory, created if missing
/// * `posts` - Posts to write, in the order given
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(HarvestError)` - Encoding or writing failed
pub fn write_results(dir: &Path, posts: &[Post]) -> Result<PathBuf, HarvestError> {
    let path = dir.join(format!(
        "posts_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let bytes = serde_json::to_vec_pretty(posts)?;
    write_atomic(&path, &bytes)?;

    tracing::info!(path = %path.display(), posts = posts.len(), "Results written");
    Ok(path)
}
