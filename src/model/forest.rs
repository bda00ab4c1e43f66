//! Stack-free handling of comment forests
//!
//! Threads can nest arbitrarily deep, so nothing here recurses over
//! `replies`: forests are walked in pre-order with an explicit stack and
//! rebuilt from `(level, comment)` pairs. The serialized form is the same
//! pre-order walk as a flat JSON array, each entry carrying its `depth`, which
//! keeps the nesting of the file constant whatever the depth of the thread.

use crate::model::Comment;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pre-order walk; `level` is 0 for the given roots
pub(crate) fn preorder(forest: &[Comment]) -> Vec<(usize, &Comment)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &Comment)> = forest.iter().rev().map(|c| (0, c)).collect();
    while let Some((level, comment)) = stack.pop() {
        out.push((level, comment));
        stack.extend(comment.replies.iter().rev().map(|r| (level + 1, r)));
    }
    out
}

/// Rebuilds a forest from pre-order entries whose `replies` are empty
///
/// A level deeper than the open path allows attaches to the innermost open
/// comment.
pub(crate) fn from_preorder(entries: impl IntoIterator<Item = (usize, Comment)>) -> Vec<Comment> {
    let mut roots = Vec::new();
    let mut open: Vec<Comment> = Vec::new();

    for (level, comment) in entries {
        while open.len() > level {
            close(&mut open, &mut roots);
        }
        open.push(comment);
    }
    while !open.is_empty() {
        close(&mut open, &mut roots);
    }
    roots
}

fn close(open: &mut Vec<Comment>, roots: &mut Vec<Comment>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.replies.push(done),
            None => roots.push(done),
        }
    }
}

#[derive(Serialize)]
struct FlatCommentRef<'a> {
    id: &'a str,
    depth: u32,
    parent_id: Option<&'a str>,
    author: Option<&'a str>,
    text: Option<&'a str>,
    more_replies: Option<&'a str>,
    action_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct FlatComment {
    id: String,
    depth: u32,
    parent_id: Option<String>,
    author: Option<String>,
    text: Option<String>,
    more_replies: Option<String>,
    #[serde(default)]
    action_id: Option<String>,
}

pub fn serialize<S: Serializer>(forest: &[Comment], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(preorder(forest).into_iter().map(|(_, c)| FlatCommentRef {
        id: &c.id,
        depth: c.depth,
        parent_id: c.parent_id.as_deref(),
        author: c.author.as_deref(),
        text: c.text.as_deref(),
        more_replies: c.more_replies.as_deref(),
        action_id: c.action_id.as_deref(),
    }))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Comment>, D::Error> {
    let flat = Vec::<FlatComment>::deserialize(deserializer)?;
    Ok(from_preorder(flat.into_iter().map(|f| {
        (
            f.depth as usize,
            Comment {
                id: f.id,
                depth: f.depth,
                parent_id: f.parent_id,
                author: f.author,
                text: f.text,
                more_replies: f.more_replies,
                action_id: f.action_id,
                replies: Vec::new(),
            },
        )
    })))
}
