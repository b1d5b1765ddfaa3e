//! Extraction of [`NewsItem`]s from free-text search responses.
//!
//! The search service is asked to answer with one story per line in the form
//!
//! ```text
//! Headline | URL | Summary | 0.9
//! ```
//!
//! but models decorate their answers with numbering, markdown emphasis, link
//! brackets, headings and prose. Parsing is therefore best effort: every line
//! is handled on its own and any line that cannot be turned into a valid item
//! is logged and skipped.

use crate::models::NewsItem;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

/// Separator between fields on a result line.
const FIELD_DELIMITER: char = '|';

/// A result line needs headline, url, summary and score.
const MIN_FIELDS: usize = 4;

/// Characters used for list numbering in front of a headline.
const NUMBERING_CHARS: &[char] = &['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', ' '];

/// ASCII digits only, so every match is something `f64::from_str` accepts.
static SCORE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0\.[0-9]+").expect("score pattern is a valid regex"));

/// Parse every result line of a response into validated items.
///
/// # Arguments
///
/// * `topic` - Topic the response was fetched for (only used for logging)
/// * `raw` - The raw response text
///
/// # Returns
///
/// The valid items in the order their lines appeared. Never fails; bad lines
/// are dropped.
#[instrument(level = "debug", skip_all, fields(%topic))]
pub fn parse_items(topic: &str, raw: &str) -> Vec<NewsItem> {
    let items: Vec<NewsItem> = raw
        .lines()
        .filter_map(|line| parse_line(topic, line))
        .collect();
    debug!(count = items.len(), "Parsed response lines");
    items
}

/// Parse one line, returning `None` for anything that is not a valid result.
fn parse_line(topic: &str, line: &str) -> Option<NewsItem> {
    if line.trim().is_empty() || line.starts_with('#') || line.starts_with('*') {
        return None;
    }

    let line = strip_markdown(line);
    if !line.contains(FIELD_DELIMITER) {
        debug!(%topic, line = %truncate_for_log(&line, 120), "Skipping line without delimiter");
        return None;
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
    if fields.len() < MIN_FIELDS {
        warn!(
            %topic,
            fields = fields.len(),
            line = %truncate_for_log(&line, 200),
            "Skipping line with too few fields"
        );
        return None;
    }

    let title = clean_title(fields[0]);
    let url = fields[1];
    let summary = fields[2];
    let score_text = fields[fields.len() - 1];

    let Some(score) = extract_score(score_text) else {
        warn!(%topic, %score_text, "Skipping line without a relevance score");
        return None;
    };

    match NewsItem::new(title, url, summary, score) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!(
                %topic,
                error = %e,
                line = %truncate_for_log(&line, 200),
                "Skipping invalid news item"
            );
            None
        }
    }
}

/// Drop bold markers and link brackets.
fn strip_markdown(line: &str) -> String {
    line.replace("**", "").replace(['[', ']'], "")
}

/// Remove list numbering and a `Title:` label from a headline.
///
/// ```ignore
/// assert_eq!(clean_title("3. Title: Enterprise AI Adoption Surges"), "Enterprise AI Adoption Surges");
/// ```
pub fn clean_title(raw: &str) -> String {
    let title = raw.trim().trim_start_matches(NUMBERING_CHARS);
    let title = title.strip_prefix("Title:").unwrap_or(title);
    title.trim().to_string()
}

/// Find the relevance score in a field.
///
/// Takes the first substring of the form `0.` followed by one or more digits.
/// There is no fallback: a field without such a substring has no score.
pub fn extract_score(text: &str) -> Option<f64> {
    SCORE_PATTERN
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
