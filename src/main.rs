//! # Topic News Digest
//!
//! Asks a search-backed LLM (Perplexity `sonar`) for the week's news on a
//! fixed list of topics, pulls structured stories out of its free-text
//! answers, and emails the ten most relevant ones as an HTML digest.
//!
//! ## Usage
//!
//! ```sh
//! topic_news_digest                                # send the digest
//! topic_news_digest --check                        # validate configuration only
//! topic_news_digest --preview ./out/digest.html    # write instead of send
//! ```
//!
//! ## Architecture
//!
//! 1. **Query**: One request per topic, all in flight at once ([`api`])
//! 2. **Parse**: Pipe-delimited answer lines become validated items ([`parser`])
//! 3. **Rank**: Merge in topic order, dedupe by URL, sort by score, keep ten ([`aggregator`])
//! 4. **Deliver**: Render HTML and send over SMTP, or write a preview ([`digest`])
//!
//! A topic whose request fails contributes no items; only a delivery failure
//! fails the run.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod aggregator;
mod api;
mod cli;
mod config;
mod digest;
mod models;
mod parser;
mod utils;

use aggregator::{Pipeline, RunOutcome};
use api::PerplexityClient;
use cli::Cli;
use config::Config;
use digest::{PreviewDispatcher, SmtpDispatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env must be loaded before clap reads the environment
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("topic_news_digest starting up");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }

    let args = Cli::parse();
    let check_only = args.check;

    // --- Configuration & pre-flight ---
    let config = Config::from_cli(args).await?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration is incomplete; check your environment or .env file");
        return Err(e.into());
    }
    info!(
        topics = %config.topics.join(", "),
        recipients = %config.email_to.join(", "),
        "Configuration loaded successfully"
    );
    if check_only {
        return Ok(());
    }

    // --- Run ---
    let now = Local::now();
    let template = config.digest_template(now);
    let run_span = info_span!("run", started = %now.to_rfc3339());

    let client = PerplexityClient::new(
        config.api_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.request_timeout,
    )?;
    let pipeline = Pipeline::new(client, config.topics.clone(), run_span);

    let outcome = match &config.preview {
        Some(path) => {
            let dispatcher = PreviewDispatcher::new(path, template);
            pipeline.run(&dispatcher).await?
        }
        None => {
            let dispatcher = SmtpDispatcher::new(
                config.smtp_settings(),
                &config.email_from,
                &config.email_to,
                template,
            )?;
            pipeline.run(&dispatcher).await?
        }
    };

    let elapsed = start_time.elapsed();
    match outcome {
        RunOutcome::Delivered { items } => info!(
            items,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        ),
        RunOutcome::NothingToReport => info!(
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete; no digest sent"
        ),
    }

    Ok(())
}
