//! Storage traits
//!
//! This module defines the trait interface for checkpoint backends and the
//! in-memory [`Checkpoint`] they load and merge into.

use crate::model::Post;
use crate::CheckpointError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Trait for checkpoint backend implementations
///
/// Only the scheduler's driver task calls `flush`, so implementations need
/// not guard against concurrent writers.
pub trait CheckpointStorage: Send {
    /// Loads the current checkpoint; a missing checkpoint is empty, not an error
    fn load(&self) -> CheckpointResult<Checkpoint>;

    /// Merges `posts` into the stored checkpoint and persists the result
    ///
    /// # Returns
    ///
    /// The number of posts in the checkpoint after the merge
    fn flush(&mut self, posts: &[Post]) -> CheckpointResult<usize>;

    /// Where the checkpoint currently lives, for diagnostics
    fn location(&self) -> PathBuf;
}

/// Ordered, identifier-keyed set of completed posts
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    posts: Vec<Post>,
    index: HashMap<String, usize>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a checkpoint from a stored post list
    ///
    /// Repeated identifiers collapse onto their first position, later
    /// entries winning.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let mut checkpoint = Self::new();
        for post in posts {
            checkpoint.upsert(post);
        }
        checkpoint
    }

    /// Merges posts by identifier
    ///
    /// A post already present keeps its position and takes the new content.
    ///
    /// # Returns
    ///
    /// The number of identifiers that were not present before
    pub fn merge(&mut self, posts: &[Post]) -> usize {
        posts
            .iter()
            .filter(|post| self.upsert((*post).clone()))
            .count()
    }

    /// Inserts or replaces one post, true if it was new
    fn upsert(&mut self, post: Post) -> bool {
        match self.index.get(&post.post_id) {
            Some(&position) => {
                self.posts[position] = post;
                false
            }
            None => {
                self.index.insert(post.post_id.clone(), self.posts.len());
                self.posts.push(post);
                true
            }
        }
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.index.contains_key(post_id)
    }

    /// Identifiers of every post in the checkpoint
    pub fn known_ids(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Posts in checkpoint order, replacements keeping their first position
    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
