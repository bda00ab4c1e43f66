//! Harvested records
//!
//! A [`Post`] owns its comment forest; every [`Comment`] owns its replies, so
//! the forest is a plain tree with no shared nodes between siblings. Dropping,
//! cloning, comparing and serializing a forest never recurse, so thread depth
//! is bounded by memory rather than by the stack.

mod forest;
mod outcome;

pub use outcome::ItemOutcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A harvested post with its comment forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Identifier derived from the post's canonical URL
    pub post_id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub upvote_ratio: f64,
    /// Body text, empty for link or image posts
    pub content: String,
    /// Comment count as reported by the page, not the size of `comments`
    pub comment_count: u64,
    pub image_url: Option<String>,
    /// Depth-0 comments, stored on disk as a flat pre-order array
    #[serde(with = "forest")]
    pub comments: Vec<Comment>,
    pub fetched_at: DateTime<Utc>,
}

impl Post {
    /// Total number of comments in the forest
    pub fn total_comments(&self) -> usize {
        count_comments(&self.comments)
    }

    /// Greatest comment depth in the forest, `None` without comments
    pub fn max_depth(&self) -> Option<u32> {
        let mut stack: Vec<&Comment> = self.comments.iter().collect();
        let mut max = None;
        while let Some(comment) = stack.pop() {
            max = max.max(Some(comment.depth));
            stack.extend(comment.replies.iter());
        }
        max
    }
}

/// One comment and its ordered replies
pub struct Comment {
    pub id: String,
    /// Distance from the thread root; top-level comments are 0
    pub depth: u32,
    /// `None` only for depth-0 comments
    pub parent_id: Option<String>,
    pub author: Option<String>,
    /// `None` when the page carried no text for the comment
    pub text: Option<String>,
    /// Continuation link for replies not included in the page
    pub more_replies: Option<String>,
    /// Identifier carried by the comment's action row, when rendered
    pub action_id: Option<String>,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Same comment without its replies
    fn detached(&self) -> Comment {
        Comment {
            id: self.id.clone(),
            depth: self.depth,
            parent_id: self.parent_id.clone(),
            author: self.author.clone(),
            text: self.text.clone(),
            more_replies: self.more_replies.clone(),
            action_id: self.action_id.clone(),
            replies: Vec::new(),
        }
    }

    fn same_fields(&self, other: &Comment) -> bool {
        self.id == other.id
            && self.depth == other.depth
            && self.parent_id == other.parent_id
            && self.author == other.author
            && self.text == other.text
            && self.more_replies == other.more_replies
            && self.action_id == other.action_id
            && self.replies.len() == other.replies.len()
    }
}

impl Clone for Comment {
    fn clone(&self) -> Self {
        let entries = forest::preorder(std::slice::from_ref(self))
            .into_iter()
            .map(|(level, c)| (level, c.detached()));
        forest::from_preorder(entries)
            .pop()
            .unwrap_or_else(|| self.detached())
    }
}

impl PartialEq for Comment {
    fn eq(&self, other: &Self) -> bool {
        let ours = forest::preorder(std::slice::from_ref(self));
        let theirs = forest::preorder(std::slice::from_ref(other));
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|((la, a), (lb, b))| la == lb && a.same_fields(b))
    }
}

impl fmt::Debug for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comment")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("parent_id", &self.parent_id)
            .field("author", &self.author)
            .field("text", &self.text)
            .field("more_replies", &self.more_replies)
            .field("action_id", &self.action_id)
            .field("replies", &self.replies.len())
            .finish()
    }
}

impl Drop for Comment {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.replies);
        while let Some(mut comment) = stack.pop() {
            stack.append(&mut comment.replies);
        }
    }
}

/// Counts comments in a forest without recursing
pub fn count_comments(forest: &[Comment]) -> usize {
    let mut stack: Vec<&Comment> = forest.iter().collect();
    let mut count = 0;
    while let Some(comment) = stack.pop() {
        count += 1;
        stack.extend(comment.replies.iter());
    }
    count
}
