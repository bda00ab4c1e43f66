//! Comment forest assembly
//!
//! A post's comments arrive in pieces: the comments endpoint renders the top
//! of the forest, and any comment may carry a continuation link whose
//! response holds more replies. The assembler keeps the forest in an
//! index-based arena ([`ForestBuilder`]) and drives continuations through a
//! `JoinSet`, so neither thread depth nor reply count grows the call stack.

use crate::crawler::RetryingFetcher;
use crate::model::Comment;
use crate::output::StatsRecorder;
use crate::page::{CommentDocument, PageParser};
use crate::url::SiteUrls;
use crate::FetchError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Comment stored in the arena; `children` index into the same arena
#[derive(Debug, Clone)]
struct ArenaNode {
    id: String,
    depth: u32,
    parent_id: Option<String>,
    author: Option<String>,
    text: Option<String>,
    more_replies: Option<String>,
    action_id: Option<String>,
    children: Vec<usize>,
}

/// Index-based comment forest under construction
///
/// Children are always appended after their parent, so every child index is
/// greater than its parent's.
#[derive(Debug, Default)]
pub struct ForestBuilder {
    nodes: Vec<ArenaNode>,
    roots: Vec<usize>,
    seen: HashSet<String>,
}

impl ForestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of direct children of an arena node
    pub fn child_count(&self, node: usize) -> usize {
        self.nodes.get(node).map_or(0, |n| n.children.len())
    }

    /// Continuation link of an arena node, if any
    pub fn continuation(&self, node: usize) -> Option<&str> {
        self.nodes.get(node).and_then(|n| n.more_replies.as_deref())
    }

    /// Adds the depth-0 comments of a comments response with their subtrees
    ///
    /// Returns the arena indices of every node added.
    pub fn graft_roots(&mut self, doc: &CommentDocument) -> Vec<usize> {
        let mut added = Vec::new();
        for &raw in &doc.roots {
            if doc.nodes[raw].declared_depth != 0 {
                continue;
            }
            if let Some(node) = self.attach(None, doc, raw) {
                added.push(node);
                self.expand(doc, node, raw, &mut added);
            }
        }
        added
    }

    /// Appends the top-level comments of a continuation response as replies
    /// of `parent`, with their subtrees
    ///
    /// Depth and parent id are stamped from `parent`, whatever the response
    /// declares. Existing children are kept. Returns the arena indices of
    /// every node added.
    pub fn graft_replies(&mut self, parent: usize, doc: &CommentDocument) -> Vec<usize> {
        let mut added = Vec::new();
        if parent >= self.nodes.len() {
            return added;
        }
        for &raw in &doc.roots {
            if let Some(node) = self.attach(Some(parent), doc, raw) {
                added.push(node);
                self.expand(doc, node, raw, &mut added);
            }
        }
        added
    }

    /// Resolves nested markers below an attached node
    ///
    /// A marker becomes a child only if it is declared exactly one level
    /// below the marker it was found under; markers re-rendered at other
    /// levels are left to the node they belong to.
    fn expand(&mut self, doc: &CommentDocument, node: usize, raw: usize, added: &mut Vec<usize>) {
        let mut stack = vec![(node, raw)];

        while let Some((node, raw)) = stack.pop() {
            let parent = &doc.nodes[raw];
            let child_depth = parent.declared_depth + 1;

            for &candidate in &parent.descendants {
                if doc.nodes[candidate].declared_depth != child_depth {
                    continue;
                }
                if let Some(child) = self.attach(Some(node), doc, candidate) {
                    added.push(child);
                    stack.push((child, candidate));
                }
            }
        }
    }

    /// Adds one raw marker to the arena, `None` if its id is already present
    fn attach(&mut self, parent: Option<usize>, doc: &CommentDocument, raw: usize) -> Option<usize> {
        let raw = &doc.nodes[raw];
        if !self.seen.insert(raw.id.clone()) {
            tracing::trace!(comment_id = %raw.id, "Skipping comment already in forest");
            return None;
        }

        let (depth, parent_id) = match parent {
            Some(p) => (self.nodes[p].depth + 1, Some(self.nodes[p].id.clone())),
            None => (0, None),
        };

        let index = self.nodes.len();
        self.nodes.push(ArenaNode {
            id: raw.id.clone(),
            depth,
            parent_id,
            author: raw.author.clone(),
            text: raw.text.clone(),
            more_replies: raw.more_replies.clone(),
            action_id: raw.action_id.clone(),
            children: Vec::new(),
        });

        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        Some(index)
    }

    /// Converts the arena into an owned forest
    pub fn into_forest(self) -> Vec<Comment> {
        let mut built: Vec<Option<Comment>> = (0..self.nodes.len()).map(|_| None).collect();

        // Children sit at higher indices, so walking backwards builds them first
        for (index, node) in self.nodes.into_iter().enumerate().rev() {
            let replies = node
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[index] = Some(Comment {
                id: node.id,
                depth: node.depth,
                parent_id: node.parent_id,
                author: node.author,
                text: node.text,
                more_replies: node.more_replies,
                action_id: node.action_id,
                replies,
            });
        }

        self.roots
            .iter()
            .filter_map(|&root| built[root].take())
            .collect()
    }
}

/// Result of one continuation fetch: arena node, URL, body
type ContinuationResult = (usize, Url, Result<String, FetchError>);

/// Builds a post's comment forest, following continuation links
pub struct CommentTreeAssembler {
    fetcher: Arc<RetryingFetcher>,
    parser: Arc<dyn PageParser>,
    site: Arc<SiteUrls>,
    stats: Arc<StatsRecorder>,
}

impl CommentTreeAssembler {
    pub fn new(
        fetcher: Arc<RetryingFetcher>,
        parser: Arc<dyn PageParser>,
        site: Arc<SiteUrls>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            site,
            stats,
        }
    }

    /// Builds the comment forest of a post
    ///
    /// Never fails: an unreachable comments endpoint yields an empty forest,
    /// and a failed continuation leaves its node's replies as they were.
    pub async fn build(&self, post_id: &str) -> Vec<Comment> {
        let url = match self.site.comments_url(post_id) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "Cannot build comments URL");
                return Vec::new();
            }
        };

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "Comments fetch failed, keeping post without comments");
                return Vec::new();
            }
        };

        let mut forest = ForestBuilder::new();
        let doc = self.parser.parse_comment_nodes(&body);
        let added = forest.graft_roots(&doc);

        let mut pending = JoinSet::new();
        let mut requested = HashSet::new();
        self.spawn_continuations(&forest, &added, &mut requested, &mut pending);

        while let Some(joined) = pending.join_next().await {
            let (node, url, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(post_id, error = %e, "Continuation task failed");
                    continue;
                }
            };

            match result {
                Ok(body) => {
                    self.stats.record_continuation(true);
                    let doc = self.parser.parse_comment_nodes(&body);
                    let added = forest.graft_replies(node, &doc);
                    tracing::debug!(post_id, url = %url, replies = added.len(), "Continuation resolved");
                    self.spawn_continuations(&forest, &added, &mut requested, &mut pending);
                }
                Err(e) => {
                    self.stats.record_continuation(false);
                    tracing::warn!(post_id, url = %url, error = %e, "Continuation fetch failed, subtree dropped");
                }
            }
        }

        forest.into_forest()
    }

    /// Starts a fetch for every new node carrying a continuation link
    ///
    /// Each continuation URL is requested at most once per post.
    fn spawn_continuations(
        &self,
        forest: &ForestBuilder,
        nodes: &[usize],
        requested: &mut HashSet<String>,
        pending: &mut JoinSet<ContinuationResult>,
    ) {
        for &node in nodes {
            let Some(href) = forest.continuation(node) else {
                continue;
            };

            let url = match self.site.continuation_url(href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(href, error = %e, "Invalid continuation link");
                    continue;
                }
            };

            if !requested.insert(url.as_str().to_string()) {
                continue;
            }

            let fetcher = Arc::clone(&self.fetcher);
            pending.spawn(async move {
                let result = fetcher.fetch(&url).await;
                (node, url, result)
            });
        }
    }
}
