//! Single-post crawl
//!
//! Resolves one post URL into a [`Post`]: post page, parsed fields, then the
//! comment forest. Every failure here is soft; the caller only ever sees
//! `Some(post)` or `None` plus the outcome recorded in the statistics.

use crate::crawler::{CommentTreeAssembler, RetryingFetcher};
use crate::model::{ItemOutcome, Post};
use crate::output::StatsRecorder;
use crate::page::PageParser;
use crate::url::SiteUrls;
use chrono::Utc;
use std::sync::Arc;
use url::Url;

/// Crawls individual posts
pub struct PostCrawler {
    fetcher: Arc<RetryingFetcher>,
    parser: Arc<dyn PageParser>,
    site: Arc<SiteUrls>,
    assembler: CommentTreeAssembler,
    stats: Arc<StatsRecorder>,
}

impl PostCrawler {
    pub fn new(
        fetcher: Arc<RetryingFetcher>,
        parser: Arc<dyn PageParser>,
        site: Arc<SiteUrls>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        let assembler = CommentTreeAssembler::new(
            Arc::clone(&fetcher),
            Arc::clone(&parser),
            Arc::clone(&site),
            Arc::clone(&stats),
        );
        Self {
            fetcher,
            parser,
            site,
            assembler,
            stats,
        }
    }

    /// Crawls one post with its comments
    ///
    /// # Returns
    ///
    /// * `Some(Post)` - Post page parsed; comments attached when an id could
    ///   be derived from the URL
    /// * `None` - Page could not be fetched or had no post marker
    pub async fn crawl(&self, url: &Url) -> Option<Post> {
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Post fetch failed");
                self.stats.record_outcome(ItemOutcome::from_fetch_error(&e));
                return None;
            }
        };

        let Some(fields) = self.parser.parse_post_page(&body) else {
            tracing::warn!(url = %url, "Post marker missing from page");
            self.stats.record_outcome(ItemOutcome::MarkerMissing);
            return None;
        };

        let (post_id, comments) = match self.site.post_id(url) {
            Some(post_id) => {
                let comments = self.assembler.build(&post_id).await;
                (post_id, comments)
            }
            None => {
                tracing::debug!(url = %url, "No post id in URL, keying post by URL");
                (url.to_string(), Vec::new())
            }
        };

        tracing::info!(
            post_id = %post_id,
            comments = crate::model::count_comments(&comments),
            "Post harvested"
        );
        self.stats.record_outcome(ItemOutcome::Completed);

        Some(Post {
            post_id,
            url: url.to_string(),
            title: fields.title,
            author: fields.author,
            created_at: fields.created_at,
            score: fields.score,
            upvote_ratio: fields.upvote_ratio,
            content: fields.body_text,
            comment_count: fields.comment_count,
            image_url: fields.image_url,
            comments,
            fetched_at: Utc::now(),
        })
    }
}
