//! Search API interaction for per-topic news queries.
//!
//! This module talks to an OpenAI-compatible, search-backed chat completions
//! endpoint (Perplexity by default). One request is made per topic asking for
//! recent stories in a pipe-delimited layout; the reply text is handed back
//! untouched for the [`parser`](crate::parser) to pick apart.
//!
//! # Architecture
//!
//! - [`TopicSearch`]: Trait for "give me the raw answer for this topic"
//! - [`PerplexityClient`]: The HTTP implementation, sharing one connection pool
//!
//! # Failure Policy
//!
//! There are no retries. Every failure mode (network, timeout, HTTP status,
//! malformed envelope, API error object) comes back as a [`QueryError`] and
//! the caller decides what it means for the run.

use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::utils::truncate_for_log;

/// Default search model.
pub const DEFAULT_MODEL: &str = "sonar";

/// Default completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.2;
const SEARCH_RECENCY_FILTER: &str = "week";
const SEARCH_CONTEXT_SIZE: &str = "high";

/// Ways a single topic query can fail.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response envelope: {0}")]
    Envelope(#[source] reqwest::Error),
    #[error("API returned error: {0}")]
    Api(String),
}

/// Something that can answer a news query for one topic.
///
/// `Ok(None)` means the service answered but the answer had no text.
pub trait TopicSearch: Send + Sync + 'static {
    fn search(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Option<String>, QueryError>> + Send;
}

/// Build the prompt sent for a topic.
pub fn build_prompt(topic: &str) -> String {
    format!(
        "Find the latest news about {topic} in digital transformation and enterprise technology. \
         For each news item, provide the actual headline (without any numbering or \"Title:\" prefix), URL, \
         brief summary, and relevance score (0-1). Return in this exact format:\n\
         Headline | URL | Summary | 0.9"
    )
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage>,
    max_tokens: u32,
    temperature: f32,
    search_recency_filter: &'a str,
    web_search_options: WebSearchOptions<'a>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WebSearchOptions<'a> {
    search_context_size: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    /// `Some` whenever the key is present, even as `"error": null`.
    #[serde(default, deserialize_with = "present")]
    error: Option<serde_json::Value>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl CompletionResponse {
    /// Pull the answer text out of the envelope.
    ///
    /// Prefers `choices[0].message.content`; falls back to `choices[0].text`
    /// only when there is no `message` at all.
    fn into_content(self) -> Result<Option<String>, QueryError> {
        if let Some(error) = self.error {
            return Err(QueryError::Api(error.to_string()));
        }
        let content = self.choices.into_iter().next().and_then(|choice| match choice.message {
            Some(message) => message.content,
            None => choice.text,
        });
        Ok(content.filter(|text| !text.is_empty()))
    }
}

/// HTTP client for the search-backed completions API.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct PerplexityClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for PerplexityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerplexityClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl PerplexityClient {
    /// Create a client whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Client`] if the TLS backend cannot be initialised.
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(QueryError::Client)?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

impl TopicSearch for PerplexityClient {
    #[instrument(level = "info", skip(self))]
    async fn search(&self, topic: &str) -> Result<Option<String>, QueryError> {
        let t0 = Instant::now();
        info!("Fetching news for topic");

        let body = CompletionRequest {
            model: &self.model,
            messages: vec![RequestMessage {
                role: "user",
                content: build_prompt(topic),
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            search_recency_filter: SEARCH_RECENCY_FILTER,
            web_search_options: WebSearchOptions {
                search_context_size: SEARCH_CONTEXT_SIZE,
            },
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(QueryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status,
                body: truncate_for_log(&body, 500),
            });
        }

        let envelope: CompletionResponse = response.json().await.map_err(QueryError::Envelope)?;
        let content = envelope.into_content()?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.as_ref().map_or(0, String::len),
            "Search API answered"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    async fn client_for(server: &mockito::ServerGuard) -> PerplexityClient {
        let endpoint = Url::parse(&format!("{}/chat/completions", server.url())).unwrap();
        PerplexityClient::new(endpoint, "test-key", DEFAULT_MODEL, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_prompt_mentions_topic_and_layout() {
        let prompt = build_prompt("agentic ai");
        assert!(prompt.starts_with("Find the latest news about agentic ai in digital transformation"));
        assert!(prompt.ends_with("Return in this exact format:\nHeadline | URL | Summary | 0.9"));
        assert!(prompt.contains("\"Title:\" prefix"));
    }

    #[test]
    fn test_into_content_message_shape() {
        let envelope: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "A | u | s | 0.5"}}]
        }))
        .unwrap();
        assert_eq!(envelope.into_content().unwrap().as_deref(), Some("A | u | s | 0.5"));
    }

    #[test]
    fn test_into_content_text_shape() {
        let envelope: CompletionResponse =
            serde_json::from_value(json!({"choices": [{"text": "legacy"}]})).unwrap();
        assert_eq!(envelope.into_content().unwrap().as_deref(), Some("legacy"));
    }

    #[test]
    fn test_into_content_message_without_content_does_not_fall_back() {
        let envelope: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant"}, "text": "ignored"}]
        }))
        .unwrap();
        assert_eq!(envelope.into_content().unwrap(), None);
    }

    #[test]
    fn test_into_content_empty_choices() {
        let envelope: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert_eq!(envelope.into_content().unwrap(), None);
        let envelope: CompletionResponse = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert_eq!(envelope.into_content().unwrap(), None);
    }

    #[test]
    fn test_into_content_error_object() {
        let envelope: CompletionResponse =
            serde_json::from_value(json!({"error": {"message": "bad key"}})).unwrap();
        assert!(matches!(envelope.into_content(), Err(QueryError::Api(msg)) if msg.contains("bad key")));
    }

    #[test]
    fn test_into_content_null_error_key_is_still_an_error() {
        let envelope: CompletionResponse = serde_json::from_value(json!({
            "error": null,
            "choices": [{"message": {"content": "A | u | s | 0.5"}}]
        }))
        .unwrap();
        assert!(matches!(envelope.into_content(), Err(QueryError::Api(_))));
    }

    #[tokio::test]
    async fn test_search_sends_expected_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "sonar",
                "max_tokens": 1024,
                "search_recency_filter": "week",
                "web_search_options": {"search_context_size": "high"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "Story | http://x.com/a | Sum | 0.9"}}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server).await;
        let content = client.search("claude").await.unwrap();
        assert_eq!(content.as_deref(), Some("Story | http://x.com/a | Sum | 0.9"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        match client.search("agi").await {
            Err(QueryError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 429);
                assert!(body.contains("Rate limit exceeded"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_malformed_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(matches!(client.search("agi").await, Err(QueryError::Envelope(_))));
    }

    #[tokio::test]
    async fn test_search_error_object_with_ok_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"error": "quota exhausted"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(matches!(client.search("agi").await, Err(QueryError::Api(_))));
    }

    #[tokio::test]
    async fn test_search_connection_refused() {
        let endpoint = Url::parse("http://127.0.0.1:9/chat/completions").unwrap();
        let client =
            PerplexityClient::new(endpoint, "k", DEFAULT_MODEL, Duration::from_secs(2)).unwrap();
        assert!(matches!(client.search("agi").await, Err(QueryError::Transport(_))));
    }

    #[tokio::test]
    async fn test_search_times_out_on_stalled_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without ever answering.
        let stall = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let endpoint = Url::parse(&format!("http://{addr}/chat/completions")).unwrap();
        let client =
            PerplexityClient::new(endpoint, "k", DEFAULT_MODEL, Duration::from_millis(300)).unwrap();

        let started = Instant::now();
        match client.search("agi").await {
            Err(QueryError::Transport(e)) => assert!(e.is_timeout(), "not a timeout: {e}"),
            other => panic!("expected a transport timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        stall.abort();
    }
}
