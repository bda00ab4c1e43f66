//! Page parsing capability
//!
//! The crawl engine never looks at markup itself. It hands response bodies to
//! a [`PageParser`] and works with the plain values that come back:
//! - [`PostFields`] for a post page
//! - a [`CommentDocument`] arena for a comments or continuation response

mod selector;

pub use selector::SelectorParser;

use chrono::{DateTime, Utc};

/// Top-level fields of a post page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFields {
    pub title: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub upvote_ratio: f64,
    pub body_text: String,
    pub comment_count: u64,
    pub image_url: Option<String>,
}

/// One comment marker as found in a response body
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommentNode {
    pub id: String,
    /// Depth reported by the markup, 0 when absent or unparsable
    pub declared_depth: u32,
    pub author: Option<String>,
    /// `None` when the marker carried no text element
    pub text: Option<String>,
    /// Relative continuation link for replies not rendered in this body
    pub more_replies: Option<String>,
    pub action_id: Option<String>,
    /// Indices of every nested comment marker, all levels, document order
    pub descendants: Vec<usize>,
}

/// Comment markers of one response body, stored as an arena
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentDocument {
    pub nodes: Vec<RawCommentNode>,
    /// Markers not nested inside any other marker, document order
    pub roots: Vec<usize>,
}

impl CommentDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&RawCommentNode> {
        self.nodes.get(index)
    }
}

/// Turns response bodies into field values
///
/// Implementations must be cheap to share across tasks; parsing happens
/// synchronously between network awaits.
pub trait PageParser: Send + Sync {
    /// Extracts post fields, `None` when the post marker is absent
    fn parse_post_page(&self, body: &str) -> Option<PostFields>;

    /// Extracts every comment marker in the body
    fn parse_comment_nodes(&self, body: &str) -> CommentDocument;
}
