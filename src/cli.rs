//! Command-line interface definitions for the topic news digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every setting can also come from an environment variable, and a `.env`
//! file in the working directory is loaded before parsing.

use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::api::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// Default subject line and banner heading.
pub const DEFAULT_SUBJECT: &str = "AI & Digital Transformation News Update";

/// Command-line arguments for the digest run.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment / .env, send the email
/// topic_news_digest
///
/// # Only check that the configuration is complete
/// topic_news_digest --check
///
/// # Write the digest to a file instead of emailing it
/// topic_news_digest --preview ./out/digest.html
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Perplexity API key
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat completions endpoint
    #[arg(long, env = "PERPLEXITY_API_URL", default_value = DEFAULT_ENDPOINT)]
    pub api_url: Url,

    /// Search model name
    #[arg(long, env = "PERPLEXITY_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sender address, also used as the SMTP login
    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Comma-separated recipient addresses
    #[arg(long, env = "EMAIL_TO", value_delimiter = ',')]
    pub email_to: Vec<String>,

    /// SMTP password for the sender account
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// SMTP relay host (STARTTLS)
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// SMTP submission port
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// Email subject and banner heading
    #[arg(long, env = "DIGEST_SUBJECT", default_value = DEFAULT_SUBJECT)]
    pub subject: String,

    /// YAML file with the topics to search (replaces the built-in list)
    #[arg(short, long, env = "TOPICS_FILE")]
    pub topics_file: Option<PathBuf>,

    /// Per-request timeout for the search API, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Write the digest to this file instead of emailing it (.json for raw items)
    #[arg(short, long)]
    pub preview: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}
