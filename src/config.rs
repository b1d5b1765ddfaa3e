//! Run configuration assembled from the CLI, the environment, and an optional
//! topics file.
//!
//! [`Config::from_cli`] only normalises values; [`Config::validate`] is the
//! pre-flight check that reports every missing setting at once.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};
use url::Url;

use crate::cli::Cli;
use crate::digest::{DigestTemplate, SmtpSettings};
use crate::utils::edition_date;

/// Topics searched when no topics file is given.
pub const DEFAULT_TOPICS: &[&str] = &[
    "enterprise AI",
    "open ai",
    "chatgpt",
    "generative ai",
    "perplexity",
    "agi",
    "claude",
    "agentic ai",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("no topics configured")]
    NoTopics,
    #[error("failed to read topics file {path}: {source}")]
    TopicsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse topics file {path}: {source}")]
    TopicsParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Accepted layouts for the topics file: a bare list, or a `topics:` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicsDocument {
    List(Vec<String>),
    Keyed { topics: Vec<String> },
}

impl TopicsDocument {
    fn into_topics(self) -> Vec<String> {
        match self {
            TopicsDocument::List(topics) | TopicsDocument::Keyed { topics } => topics,
        }
    }
}

/// Everything one run needs.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: Url,
    pub model: String,
    pub email_from: String,
    pub email_to: Vec<String>,
    pub email_password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub subject: String,
    pub topics: Vec<String>,
    pub request_timeout: Duration,
    pub preview: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url.as_str())
            .field("model", &self.model)
            .field("email_from", &self.email_from)
            .field("email_to", &self.email_to)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("topics", &self.topics)
            .field("request_timeout", &self.request_timeout)
            .field("preview", &self.preview)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Normalise CLI values and load the topics file if one was given.
    ///
    /// Blank entries are dropped from the recipient and topic lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the topics file cannot be read or parsed.
    #[instrument(level = "info", skip_all)]
    pub async fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let topics = match &cli.topics_file {
            Some(path) => load_topics(path).await?,
            None => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        };

        Ok(Self {
            api_key: trimmed(cli.api_key),
            api_url: cli.api_url,
            model: cli.model,
            email_from: trimmed(cli.email_from),
            email_to: non_blank(cli.email_to),
            email_password: cli.email_password.unwrap_or_default(),
            smtp_host: cli.smtp_host,
            smtp_port: cli.smtp_port,
            subject: cli.subject,
            topics,
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            preview: cli.preview,
        })
    }

    /// Pre-flight check run before any network traffic.
    ///
    /// The SMTP password is only required when the digest will be emailed.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] lists every absent setting by its environment
    /// variable name; [`ConfigError::NoTopics`] if the topic list is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("PERPLEXITY_API_KEY");
        }
        if self.email_from.is_empty() {
            missing.push("EMAIL_FROM");
        }
        if self.email_to.is_empty() {
            missing.push("EMAIL_TO");
        }
        if self.preview.is_none() && self.email_password.is_empty() {
            missing.push("EMAIL_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        Ok(())
    }

    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.email_from.clone(),
            password: self.email_password.clone(),
        }
    }

    /// Text around the stories for an edition published at `now`.
    pub fn digest_template(&self, now: DateTime<Local>) -> DigestTemplate {
        DigestTemplate {
            heading: self.subject.clone(),
            tagline: "Stories selected from this week's search results".to_string(),
            intro: "Here are the most relevant stories on AI and digital transformation this week:"
                .to_string(),
            edition: edition_date(now),
            contact: self.email_from.clone(),
        }
    }
}

/// Read a YAML topics file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_topics(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::TopicsRead {
            path: path.to_path_buf(),
            source,
        })?;
    let document: TopicsDocument =
        serde_yaml::from_str(&text).map_err(|source| ConfigError::TopicsParse {
            path: path.to_path_buf(),
            source,
        })?;
    let topics = non_blank(document.into_topics());
    debug!(count = topics.len(), "Loaded topics file");
    Ok(topics)
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
