//! Selector-driven page parser
//!
//! Default [`PageParser`] implementation. All markup knowledge (element
//! selectors and attribute names) comes from [`ParserConfig`], so pointing the
//! harvester at different markup is a configuration change.

use crate::config::ParserConfig;
use crate::page::{CommentDocument, PageParser, PostFields, RawCommentNode};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Parses post pages and comment responses with CSS selectors
#[derive(Debug)]
pub struct SelectorParser {
    post: Selector,
    post_body: Selector,
    comment: Selector,
    comment_text: Selector,
    more_replies: Selector,
    action_row: Selector,
    attrs: ParserConfig,
}

impl SelectorParser {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorParser)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector failed to parse
    pub fn new(config: &ParserConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            post: compile(&config.post_selector)?,
            post_body: compile(&config.post_body_selector)?,
            comment: compile(&config.comment_selector)?,
            comment_text: compile(&config.comment_text_selector)?,
            more_replies: compile(&config.more_replies_selector)?,
            action_row: compile(&config.action_row_selector)?,
            attrs: config.clone(),
        })
    }

    /// Returns true if `inner`'s closest enclosing comment marker is `comment`
    ///
    /// Text and continuation elements of nested replies also sit below the
    /// outer comment; only the ones it owns directly count.
    fn owned_by(&self, inner: &ElementRef<'_>, comment: &ElementRef<'_>) -> bool {
        inner
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| self.comment.matches(ancestor))
            .map(|ancestor| ancestor.id() == comment.id())
            .unwrap_or(false)
    }

    fn comment_text(&self, comment: &ElementRef<'_>) -> Option<String> {
        comment
            .select(&self.comment_text)
            .find(|el| self.owned_by(el, comment))
            .map(|el| collect_text(&el))
    }

    fn more_replies(&self, comment: &ElementRef<'_>) -> Option<String> {
        comment
            .select(&self.more_replies)
            .find(|el| self.owned_by(el, comment))
            .and_then(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
    }

    fn action_id(&self, comment: &ElementRef<'_>) -> Option<String> {
        comment
            .select(&self.action_row)
            .find(|el| self.owned_by(el, comment))
            .and_then(|el| el.value().attr(self.attrs.action_id_attr.as_str()))
            .map(str::to_string)
    }
}

impl PageParser for SelectorParser {
    fn parse_post_page(&self, body: &str) -> Option<PostFields> {
        let document = Html::parse_document(body);
        let post = document.select(&self.post).next()?;
        let attr = |name: &str| post.value().attr(name).map(str::trim);

        let body_text = post
            .select(&self.post_body)
            .next()
            .map(|el| collect_text(&el))
            .unwrap_or_default();

        Some(PostFields {
            title: attr(self.attrs.title_attr.as_str()).unwrap_or_default().to_string(),
            author: attr(self.attrs.author_attr.as_str()).unwrap_or_default().to_string(),
            created_at: attr(self.attrs.created_attr.as_str()).and_then(parse_timestamp),
            score: attr(self.attrs.score_attr.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            upvote_ratio: attr(self.attrs.upvote_ratio_attr.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            body_text,
            comment_count: attr(self.attrs.comment_count_attr.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            image_url: attr(self.attrs.image_attr.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    fn parse_comment_nodes(&self, body: &str) -> CommentDocument {
        let document = Html::parse_document(body);

        // First pass: index every comment marker that carries an id
        let elements: Vec<ElementRef<'_>> = document
            .select(&self.comment)
            .filter(|el| el.value().attr(self.attrs.comment_id_attr.as_str()).is_some())
            .collect();
        let index: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, el)| (el.id(), i))
            .collect();

        let mut nodes = Vec::with_capacity(elements.len());
        let mut roots = Vec::new();

        for (i, el) in elements.iter().enumerate() {
            let value = el.value();
            let descendants = el
                .select(&self.comment)
                .filter(|inner| inner.id() != el.id())
                .filter_map(|inner| index.get(&inner.id()).copied())
                .collect();

            let nested = el
                .ancestors()
                .any(|ancestor| index.contains_key(&ancestor.id()));
            if !nested {
                roots.push(i);
            }

            nodes.push(RawCommentNode {
                id: value
                    .attr(self.attrs.comment_id_attr.as_str())
                    .unwrap_or_default()
                    .to_string(),
                declared_depth: value
                    .attr(self.attrs.comment_depth_attr.as_str())
                    .and_then(|d| d.trim().parse().ok())
                    .unwrap_or(0),
                author: value
                    .attr(self.attrs.comment_author_attr.as_str())
                    .map(str::to_string),
                text: self.comment_text(el),
                more_replies: self.more_replies(el),
                action_id: self.action_id(el),
                descendants,
            });
        }

        CommentDocument { nodes, roots }
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Concatenates the trimmed text nodes of an element
fn collect_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses RFC 3339 or `2024-12-10T15:32:11.123000+0000` style timestamps
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
