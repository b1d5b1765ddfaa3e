//! Data models for extracted news items and the ranked digest.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`]: One validated story pulled out of a search response
//! - [`RankedDigest`]: The deduplicated, ranked, bounded list handed to delivery
//! - [`ValidationError`]: Why a candidate item was rejected
//!
//! A `NewsItem` cannot be built with an out-of-range score or an empty title
//! or URL, so every stage downstream of the parser can trust its input.

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

/// Maximum number of items carried by a [`RankedDigest`].
pub const MAX_DIGEST_ITEMS: usize = 10;

/// Reasons a [`NewsItem`] cannot be constructed.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("relevance score {0} is outside [0.0, 1.0]")]
    ScoreOutOfRange(f64),
    #[error("relevance score is not a finite number")]
    ScoreNotFinite,
    #[error("title is empty")]
    EmptyTitle,
    #[error("url is empty")]
    EmptyUrl,
}

/// A single news story extracted from a search response.
///
/// Fields are private; once built, an item is only ever moved around whole.
///
/// # Fields
///
/// * `title` - The cleaned headline
/// * `url` - Link to the story, also the deduplication key (treated as opaque)
/// * `summary` - Short free-text summary, may be empty
/// * `relevance_score` - How relevant the search service judged the story, in `[0.0, 1.0]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    title: String,
    url: String,
    summary: String,
    relevance_score: f64,
}

impl NewsItem {
    /// Build a validated item.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the score is not finite or lies outside
    /// `[0.0, 1.0]`, or if the title or URL is empty after trimming.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        summary: impl Into<String>,
        relevance_score: f64,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let url = url.into();

        if !relevance_score.is_finite() {
            return Err(ValidationError::ScoreNotFinite);
        }
        if !(0.0..=1.0).contains(&relevance_score) {
            return Err(ValidationError::ScoreOutOfRange(relevance_score));
        }
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        Ok(Self {
            title,
            url,
            summary: summary.into(),
            relevance_score,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }
}

/// The final list of stories for one run.
///
/// Guarantees, upheld by [`RankedDigest::rank`]:
/// - no two items share a URL (the first one seen wins)
/// - items are ordered by descending relevance score
/// - at most [`MAX_DIGEST_ITEMS`] items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDigest {
    items: Vec<NewsItem>,
}

impl RankedDigest {
    /// Dedupe, sort, and truncate candidates that are already in merge order.
    ///
    /// Equal scores keep their merge order because the sort is stable.
    pub fn rank(candidates: impl IntoIterator<Item = NewsItem>) -> Self {
        let mut items = dedupe_by_url(candidates);
        items.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        items.truncate(MAX_DIGEST_ITEMS);
        Self { items }
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Keep the first occurrence of every URL, preserving order.
pub fn dedupe_by_url(items: impl IntoIterator<Item = NewsItem>) -> Vec<NewsItem> {
    items
        .into_iter()
        .unique_by(|item| item.url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, score: f64) -> NewsItem {
        NewsItem::new(format!("Story {url}"), url, "Summary", score).unwrap()
    }

    #[test]
    fn test_news_item_creation() {
        let item = NewsItem::new(
            "OpenAI launches new tool",
            "http://x.com/a",
            "A new tool was released.",
            0.95,
        )
        .unwrap();
        assert_eq!(item.title(), "OpenAI launches new tool");
        assert_eq!(item.url(), "http://x.com/a");
        assert_eq!(item.summary(), "A new tool was released.");
        assert_eq!(item.relevance_score(), 0.95);
    }

    #[test]
    fn test_score_bounds_are_inclusive() {
        assert!(NewsItem::new("t", "u", "s", 0.0).is_ok());
        assert!(NewsItem::new("t", "u", "s", 1.0).is_ok());
    }

    #[test]
    fn test_score_out_of_range_rejected() {
        assert_eq!(
            NewsItem::new("t", "u", "s", 1.5),
            Err(ValidationError::ScoreOutOfRange(1.5))
        );
        assert_eq!(
            NewsItem::new("t", "u", "s", -0.1),
            Err(ValidationError::ScoreOutOfRange(-0.1))
        );
    }

    #[test]
    fn test_score_not_finite_rejected() {
        assert_eq!(
            NewsItem::new("t", "u", "s", f64::NAN),
            Err(ValidationError::ScoreNotFinite)
        );
        assert_eq!(
            NewsItem::new("t", "u", "s", f64::INFINITY),
            Err(ValidationError::ScoreNotFinite)
        );
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert_eq!(
            NewsItem::new("   ", "u", "s", 0.5),
            Err(ValidationError::EmptyTitle)
        );
        assert_eq!(
            NewsItem::new("t", "", "s", 0.5),
            Err(ValidationError::EmptyUrl)
        );
        assert!(NewsItem::new("t", "u", "", 0.5).is_ok());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let first = item("http://x.com/a", 0.9);
        let items = vec![
            first.clone(),
            item("http://x.com/b", 0.5),
            item("http://x.com/a", 0.95),
        ];
        let deduped = dedupe_by_url(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], first);
        assert_eq!(deduped[1].url(), "http://x.com/b");
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let items = vec![
            item("http://x.com/a", 0.9),
            item("http://x.com/a", 0.1),
            item("http://x.com/b", 0.5),
            item("http://x.com/c", 0.7),
            item("http://x.com/b", 0.8),
        ];
        let once = dedupe_by_url(items);
        let twice = dedupe_by_url(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rank_sorts_descending() {
        let digest = RankedDigest::rank(vec![
            item("a", 0.3),
            item("b", 0.9),
            item("c", 0.6),
        ]);
        let scores: Vec<f64> = digest.items().iter().map(|i| i.relevance_score()).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.3]);
        for pair in digest.items().windows(2) {
            assert!(pair[0].relevance_score() >= pair[1].relevance_score());
        }
    }

    #[test]
    fn test_rank_keeps_merge_order_on_ties() {
        let digest = RankedDigest::rank(vec![
            item("first", 0.5),
            item("top", 0.8),
            item("second", 0.5),
        ]);
        let urls: Vec<&str> = digest.items().iter().map(|i| i.url()).collect();
        assert_eq!(urls, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_rank_truncates_to_ten() {
        let candidates: Vec<NewsItem> = (0..12)
            .map(|i| item(&format!("http://x.com/{i}"), f64::from(i) / 20.0))
            .collect();
        let digest = RankedDigest::rank(candidates);
        assert_eq!(digest.len(), MAX_DIGEST_ITEMS);
        // 0.00 and 0.05 are the two lowest and get cut
        assert!(digest.items().iter().all(|i| i.relevance_score() >= 0.1));
        assert_eq!(digest.items()[0].relevance_score(), 0.55);
    }

    #[test]
    fn test_rank_short_input_keeps_everything() {
        let digest = RankedDigest::rank(vec![item("a", 0.2), item("b", 0.4)]);
        assert_eq!(digest.len(), 2);
        assert!(!digest.is_empty());
        assert!(RankedDigest::rank(Vec::new()).is_empty());
    }

    #[test]
    fn test_digest_serialization() {
        let digest = RankedDigest::rank(vec![item("http://x.com/a", 0.7)]);
        let json = serde_json::to_string(&digest).unwrap();
        assert!(json.contains("http://x.com/a"));
        assert!(json.contains("relevance_score"));
    }
}
