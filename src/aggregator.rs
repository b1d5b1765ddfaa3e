//! Concurrent fan-out over topics and merging into a [`RankedDigest`].
//!
//! One task is spawned per topic on a [`JoinSet`]; each task queries the
//! search service and parses the answer. The pipeline waits for every task
//! before merging, and results are slotted back by topic position so the
//! merge order (and therefore which duplicate survives) does not depend on
//! which request finished first.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, instrument, warn, Instrument, Span};

use crate::api::TopicSearch;
use crate::digest::{DispatchError, Dispatcher};
use crate::models::{NewsItem, RankedDigest};
use crate::parser::parse_items;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A digest with this many items was handed to the dispatcher.
    Delivered { items: usize },
    /// Nothing survived parsing and deduplication; no digest was sent.
    NothingToReport,
}

/// The news extraction and ranking pipeline for one run.
///
/// Log output from every topic task is nested under `span`, so callers can
/// scope a run's logs however they like.
pub struct Pipeline<S> {
    search: Arc<S>,
    topics: Vec<String>,
    span: Span,
}

impl<S> Pipeline<S>
where
    S: TopicSearch,
{
    pub fn new(search: S, topics: Vec<String>, span: Span) -> Self {
        Self {
            search: Arc::new(search),
            topics,
            span,
        }
    }

    /// Fetch every topic and rank the merged results.
    pub async fn collect(&self) -> RankedDigest {
        let per_topic = self.fetch_all().await;
        let candidates: usize = per_topic.iter().map(Vec::len).sum();
        let digest = RankedDigest::rank(per_topic.into_iter().flatten());
        info!(
            parent: &self.span,
            topics = self.topics.len(),
            candidates,
            ranked = digest.len(),
            "Merged topic results"
        );
        digest
    }

    /// Collect a digest and hand it to `dispatcher` unless it is empty.
    ///
    /// # Errors
    ///
    /// Only a delivery failure is returned; per-topic failures have already
    /// been absorbed as empty results.
    pub async fn run<D>(&self, dispatcher: &D) -> Result<RunOutcome, DispatchError>
    where
        D: Dispatcher,
    {
        let digest = self.collect().await;
        if digest.is_empty() {
            warn!(parent: &self.span, "No relevant news found");
            return Ok(RunOutcome::NothingToReport);
        }

        let items = digest.len();
        info!(parent: &self.span, items, "Sending newsletter with most relevant news items");
        if let Err(e) = dispatcher.dispatch(digest).instrument(self.span.clone()).await {
            error!(parent: &self.span, error = %e, "Failed to deliver newsletter");
            return Err(e);
        }
        Ok(RunOutcome::Delivered { items })
    }

    /// Run one task per topic and wait for all of them.
    ///
    /// The returned vector has one entry per configured topic, in topic order.
    async fn fetch_all(&self) -> Vec<Vec<NewsItem>> {
        let mut tasks = JoinSet::new();
        for (index, topic) in self.topics.iter().cloned().enumerate() {
            let search = Arc::clone(&self.search);
            let span = info_span!(parent: &self.span, "topic", %topic, index);
            tasks.spawn(
                async move {
                    let items = fetch_topic(search.as_ref(), &topic).await;
                    (index, items)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Vec<NewsItem>> = vec![Vec::new(); self.topics.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, items)) => slots[index] = items,
                Err(e) => {
                    error!(parent: &self.span, error = %e, "Topic task aborted; treating as no results")
                }
            }
        }
        slots
    }
}

/// Query and parse a single topic, degrading every failure to no items.
#[instrument(level = "debug", skip(search))]
pub async fn fetch_topic<S>(search: &S, topic: &str) -> Vec<NewsItem>
where
    S: TopicSearch,
{
    match search.search(topic).await {
        Ok(Some(raw)) => {
            let items = parse_items(topic, &raw);
            if items.is_empty() {
                warn!("No news items found for topic");
            } else {
                info!(count = items.len(), "Found news items for topic");
            }
            items
        }
        Ok(None) => {
            error!("No content in search response");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, "Error fetching news for topic");
            Vec::new()
        }
    }
}
