//! Subscriber notification: digest rendering and delivery.
//!
//! [`DigestNotifier`] renders finalized articles into a plain-text and an
//! HTML body and hands both to a [`Delivery`] once per recipient. Source
//! dates are shown as `Month DD, YYYY`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use newsdesk_types::{Article, DeliveryStatus, NewsdeskError, Result};

// ---------------------------------------------------------------------------
// Notifier trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestTemplate {
    Text,
    Html,
}

/// Both bodies of one digest message.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDigest {
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn render(&self, template: DigestTemplate, articles: &[Article]) -> String;

    async fn deliver(
        &self,
        subject: &str,
        digest: &RenderedDigest,
        recipients: &[String],
    ) -> Result<DeliveryStatus>;

    fn recipients(&self) -> &[String];

    fn subject(&self) -> String {
        "Legal news digest".into()
    }

    /// Render and deliver `articles` to every recipient. Nothing is sent for
    /// an empty batch.
    async fn notify(&self, articles: &[Article]) -> Result<DeliveryStatus> {
        if articles.is_empty() {
            tracing::info!("No articles to announce, skipping notification");
            return Ok(DeliveryStatus::Skipped);
        }
        let digest = RenderedDigest {
            text: self.render(DigestTemplate::Text, articles),
            html: self.render(DigestTemplate::Html, articles),
        };
        self.deliver(&self.subject(), &digest, self.recipients())
            .await
    }
}

// ---------------------------------------------------------------------------
// DigestRenderer
// ---------------------------------------------------------------------------

const DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone)]
pub struct DigestRenderer {
    today: NaiveDate,
}

impl Default for DigestRenderer {
    fn default() -> Self {
        Self {
            today: Utc::now().date_naive(),
        }
    }
}

impl DigestRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the digest date instead of using today's UTC date.
    pub fn dated(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> String {
        self.today.format(DATE_FORMAT).to_string()
    }

    pub fn render(&self, template: DigestTemplate, articles: &[Article]) -> String {
        match template {
            DigestTemplate::Text => self.render_text(articles),
            DigestTemplate::Html => self.render_html(articles),
        }
    }

    fn render_text(&self, articles: &[Article]) -> String {
        let mut out = format!("Legal News Digest\n{}\n", self.today());
        for a in articles {
            let _ = write!(out, "\n{}\n{}\n", a.headline, "=".repeat(a.headline.chars().count()));
            if let Some(filed) = a.source_date_created.as_deref().map(format_date) {
                let _ = writeln!(out, "Filed: {filed}");
            }
            let _ = writeln!(out, "Source: {}", a.source_url);
            if !a.keywords.is_empty() {
                let _ = writeln!(out, "Keywords: {}", a.keywords.join(", "));
            }
            let _ = write!(
                out,
                "\n{}\n\nWhy it matters: {}\n",
                article_text(&a.news_article),
                a.why_newsworthy
            );
        }
        out
    }

    fn render_html(&self, articles: &[Article]) -> String {
        let mut out = format!(
            "<html><body>\n<h1>Legal News Digest</h1>\n<p>{}</p>\n",
            self.today()
        );
        for a in articles {
            out.push_str("<article>\n");
            let _ = writeln!(out, "<h2>{}</h2>", escape_html(&a.headline));
            if let Some(filed) = a.source_date_created.as_deref().map(format_date) {
                let _ = writeln!(out, "<p><em>Filed {}</em></p>", escape_html(&filed));
            }
            for para in article_text(&a.news_article).split("\n\n") {
                let _ = writeln!(out, "<p>{}</p>", escape_html(para));
            }
            let _ = writeln!(
                out,
                "<p><strong>Why it matters:</strong> {}</p>",
                escape_html(&a.why_newsworthy)
            );
            let _ = writeln!(
                out,
                "<p><a href=\"{0}\">{0}</a></p>",
                escape_html(&a.source_url)
            );
            out.push_str("</article>\n");
        }
        out.push_str("</body></html>\n");
        out
    }
}

/// `Month DD, YYYY` for RFC 3339 timestamps and plain dates; anything else
/// is shown as given.
fn format_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DATE_FORMAT).to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d") {
        return d.format(DATE_FORMAT).to_string();
    }
    raw.to_string()
}

/// Sections rendered first, in reading order. Any other string fields
/// follow in key order.
const SECTION_ORDER: [&str; 3] = ["title", "lede", "body"];

/// Article bodies are free-form generation output: a string, or an object
/// whose string fields are the sections.
fn article_text(body: &serde_json::Value) -> String {
    match body {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => {
            let known = SECTION_ORDER.iter().filter_map(|k| map.get(*k));
            let rest = map
                .iter()
                .filter(|(k, _)| !SECTION_ORDER.contains(&k.as_str()))
                .map(|(_, v)| v);
            known
                .chain(rest)
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        }
        other => other.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Transport for a single message to a single recipient.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, digest: &RenderedDigest) -> Result<()>;
}

/// Drops one multipart message file per recipient into a directory, for a
/// mail relay or a human to pick up.
#[derive(Debug)]
pub struct OutboxDelivery {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl OutboxDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message(recipient: &str, subject: &str, digest: &RenderedDigest) -> String {
        const BOUNDARY: &str = "newsdesk-digest";
        format!(
            "To: {recipient}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\n\
             Content-Type: multipart/alternative; boundary=\"{BOUNDARY}\"\r\n\r\n\
             --{BOUNDARY}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n\
             --{BOUNDARY}\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}\r\n\
             --{BOUNDARY}--\r\n",
            digest.text, digest.html
        )
    }
}

#[async_trait]
impl Delivery for OutboxDelivery {
    async fn send(&self, recipient: &str, subject: &str, digest: &RenderedDigest) -> Result<()> {
        if !recipient.contains('@') {
            return Err(NewsdeskError::DeliveryError(format!(
                "invalid recipient address '{recipient}'"
            )));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let safe: String = recipient
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        // Distinct addresses can sanitize to the same name within one second.
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{stamp}_{seq:04}_{safe}.eml"));
        tokio::fs::write(&path, Self::message(recipient, subject, digest)).await?;
        tracing::debug!(path = %path.display(), "Digest written to outbox");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DigestNotifier
// ---------------------------------------------------------------------------

pub struct DigestNotifier {
    renderer: DigestRenderer,
    delivery: Arc<dyn Delivery>,
    recipients: Vec<String>,
}

impl DigestNotifier {
    pub fn new(delivery: Arc<dyn Delivery>, recipients: Vec<String>) -> Self {
        Self {
            renderer: DigestRenderer::new(),
            delivery,
            recipients,
        }
    }

    pub fn with_renderer(mut self, renderer: DigestRenderer) -> Self {
        self.renderer = renderer;
        self
    }
}

#[async_trait]
impl Notifier for DigestNotifier {
    fn render(&self, template: DigestTemplate, articles: &[Article]) -> String {
        self.renderer.render(template, articles)
    }

    /// Each recipient is attempted independently; failures are logged and
    /// reflected in the returned status.
    async fn deliver(
        &self,
        subject: &str,
        digest: &RenderedDigest,
        recipients: &[String],
    ) -> Result<DeliveryStatus> {
        let mut delivered = 0;
        for recipient in recipients {
            match self.delivery.send(recipient, subject, digest).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(recipient = %recipient, error = %e, "Delivery failed"),
            }
        }
        let status = DeliveryStatus::from_counts(delivered, recipients.len());
        tracing::info!(delivered, attempted = recipients.len(), status = %status, "Digest delivered");
        Ok(status)
    }

    fn recipients(&self) -> &[String] {
        &self.recipients
    }

    fn subject(&self) -> String {
        format!("Legal news digest for {}", self.renderer.today())
    }
}

/// One address per line; blank lines and `#` comments are ignored.
pub async fn load_recipients(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        NewsdeskError::Config(format!("subscriptions file {}: {e}", path.display()))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}
