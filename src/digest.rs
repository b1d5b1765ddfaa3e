//! Rendering and delivery of the ranked digest.
//!
//! - [`render_html`]: Turns a [`RankedDigest`] into a self-contained HTML email body
//! - [`SmtpDispatcher`]: Sends the rendered digest over SMTP with STARTTLS
//! - [`PreviewDispatcher`]: Writes the digest to a file instead of sending it
//!
//! Everything taken from the model's answer is HTML-escaped before it is
//! placed in the page, and only `http`/`https` URLs are turned into links.

use html_escape::{encode_double_quoted_attribute, encode_text};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use crate::models::RankedDigest;
use crate::utils::ensure_parent_writable;

/// Ways delivering a digest can fail.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("failed to write digest: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize digest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Something that can deliver a ranked digest.
pub trait Dispatcher {
    async fn dispatch(&self, digest: RankedDigest) -> Result<(), DispatchError>;
}

/// Static text around the stories in the rendered email.
#[derive(Debug, Clone)]
pub struct DigestTemplate {
    /// Banner heading; also used as the email subject.
    pub heading: String,
    /// Line under the heading.
    pub tagline: String,
    /// Paragraph before the first story.
    pub intro: String,
    /// Human-readable edition date shown in the banner.
    pub edition: String,
    /// Address readers can write to, shown in the footer.
    pub contact: String,
}

/// Whether a model-supplied URL is safe to put in an `href`.
fn is_linkable(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

/// Render the digest as an HTML email body.
///
/// A story whose URL is not an absolute `http`/`https` URL is still listed,
/// but without a "Read more" link.
pub fn render_html(digest: &RankedDigest, template: &DigestTemplate) -> String {
    let mut cards = String::new();
    for (idx, item) in digest.items().iter().enumerate() {
        let link = if is_linkable(item.url()) {
            format!(
                r#"
            <a href="{url}" style="display: inline-block; background-color: #FF6B35; color: white; text-decoration: none; padding: 8px 15px; border-radius: 3px; font-size: 14px;">Read more &rarr;</a>"#,
                url = encode_double_quoted_attribute(item.url()),
            )
        } else {
            debug!(url = %item.url(), "Not linking story with non-web URL");
            String::new()
        };

        // Writing into a String cannot fail.
        let _ = write!(
            cards,
            r#"
        <div class="news-item" style="margin-bottom: 30px; padding: 20px; border: 1px solid #eee; border-radius: 5px;">
            <h2 style="color: #1E3C72; margin-top: 0; font-size: 20px;">{rank}. {title}</h2>
            <p style="margin: 10px 0;">{summary}</p>{link}
        </div>"#,
            rank = idx + 1,
            title = encode_text(item.title()),
            summary = encode_text(item.summary()),
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0;">
    <div class="banner" style="background-color: #1E3C72; color: white; padding: 30px; text-align: center;">
        <h1 style="margin: 0; font-size: 24px;">{heading}</h1>
        <p style="margin: 10px 0 0 0;">{tagline}</p>
        <p class="edition" style="margin: 5px 0 0 0; font-size: 13px;">{edition}</p>
    </div>
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <p class="intro" style="color: #666; margin-bottom: 20px;">{intro}</p>{cards}
    </div>
    <div class="footer" style="background-color: #f5f5f5; padding: 20px; text-align: center; font-size: 12px; color: #666;">
        <p style="margin: 5px 0;">This digest is curated automatically from search results.</p>
        <p style="margin: 5px 0;">To unsubscribe or manage preferences, contact <a href="mailto:{contact_attr}">{contact}</a></p>
    </div>
</body>
</html>
"#,
        heading = encode_text(&template.heading),
        tagline = encode_text(&template.tagline),
        edition = encode_text(&template.edition),
        intro = encode_text(&template.intro),
        contact_attr = encode_double_quoted_attribute(&template.contact),
        contact = encode_text(&template.contact),
    )
}

/// Parse an address, keeping the offending text for the error.
pub fn parse_mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address
        .parse::<Mailbox>()
        .map_err(|source| DispatchError::Address {
            address: address.to_string(),
            source,
        })
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Sends the digest as one HTML email to every recipient.
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    template: DigestTemplate,
}

impl SmtpDispatcher {
    /// Validate addresses and prepare a STARTTLS transport.
    ///
    /// No connection is opened until the first dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Address`] for an unparseable sender or
    /// recipient, or [`DispatchError::Smtp`] if the relay cannot be set up.
    pub fn new(
        settings: SmtpSettings,
        from: &str,
        to: &[String],
        template: DigestTemplate,
    ) -> Result<Self, DispatchError> {
        let from = parse_mailbox(from)?;
        let to = to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            template,
        })
    }

    fn build_message(&self, digest: &RankedDigest) -> Result<Message, DispatchError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(self.template.heading.clone());
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(render_html(digest, &self.template))?;
        Ok(message)
    }
}

impl Dispatcher for SmtpDispatcher {
    #[instrument(level = "info", skip_all, fields(recipients = self.to.len(), items = digest.len()))]
    async fn dispatch(&self, digest: RankedDigest) -> Result<(), DispatchError> {
        let message = self.build_message(&digest)?;
        self.transport.send(message).await?;
        info!("Newsletter sent successfully");
        Ok(())
    }
}

/// Writes the digest to a local file instead of emailing it.
///
/// A path ending in `.json` gets the digest as JSON; anything else gets the
/// rendered HTML.
#[derive(Debug, Clone)]
pub struct PreviewDispatcher {
    path: PathBuf,
    template: DigestTemplate,
}

impl PreviewDispatcher {
    pub fn new(path: impl Into<PathBuf>, template: DigestTemplate) -> Self {
        Self {
            path: path.into(),
            template,
        }
    }
}

impl Dispatcher for PreviewDispatcher {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn dispatch(&self, digest: RankedDigest) -> Result<(), DispatchError> {
        ensure_parent_writable(&self.path).await?;
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let body = if is_json {
            serde_json::to_string_pretty(&digest)?
        } else {
            render_html(&digest, &self.template)
        };
        fs::write(&self.path, body).await?;
        info!(items = digest.len(), "Wrote digest preview");
        Ok(())
    }
}
