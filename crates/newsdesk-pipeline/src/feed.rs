//! Source feed: paged retrieval of court opinions newer than the cursor.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use newsdesk_types::{NewsdeskError, Result, SourceItem};

// ---------------------------------------------------------------------------
// SourceFeed trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Items with identifiers strictly greater than `cursor`, oldest first.
    async fn fetch_since(&self, cursor: u64) -> Result<Vec<SourceItem>>;
}

// ---------------------------------------------------------------------------
// ResponseCache
// ---------------------------------------------------------------------------

/// Memoized page bodies keyed by URL. `None` records a page that could not
/// be retrieved so it is not requested again.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Option<serde_json::Value>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, url: &str) -> Option<Option<serde_json::Value>> {
        self.entries.read().await.get(url).cloned()
    }

    pub async fn insert(&self, url: impl Into<String>, body: Option<serde_json::Value>) {
        self.entries.write().await.insert(url.into(), body);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

// ---------------------------------------------------------------------------
// CourtListenerFeed
// ---------------------------------------------------------------------------

pub const DEFAULT_FEED_URL: &str = "https://www.courtlistener.com/api/rest/v3/opinions/";
pub const DEFAULT_PAGE_DEPTH: u32 = 100;

const USER_AGENT: &str = concat!("newsdesk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<SourceItem>,
}

/// Opinions listing ordered newest first. Pages are walked from the deepest
/// configured page up to page 1, and each page is reversed, so items come
/// out oldest first.
pub struct CourtListenerFeed {
    client: reqwest::Client,
    base_url: String,
    pages: u32,
    cache: ResponseCache,
}

impl CourtListenerFeed {
    pub fn new(base_url: impl Into<String>, pages: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NewsdeskError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            pages,
            cache: ResponseCache::new(),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn page_url(&self, page: u32) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}order_by=-date_created&page={page}", self.base_url)
    }

    async fn get_page(&self, url: &str) -> Result<Option<serde_json::Value>> {
        if let Some(hit) = self.cache.get(url).await {
            tracing::debug!(url, "Feed cache hit");
            return Ok(hit);
        }

        let response = self
            .client
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| NewsdeskError::FeedError {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let body = if response.status().is_success() {
            match response.json::<serde_json::Value>().await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(url, error = %e, "Feed page is not JSON, skipping");
                    None
                }
            }
        } else {
            tracing::debug!(url, status = %response.status(), "Feed page unavailable, skipping");
            None
        };

        self.cache.insert(url, body.clone()).await;
        Ok(body)
    }
}

#[async_trait]
impl SourceFeed for CourtListenerFeed {
    async fn fetch_since(&self, cursor: u64) -> Result<Vec<SourceItem>> {
        tracing::info!(url = %self.base_url, cursor, "Fetching latest opinions");
        let mut last = cursor;
        let mut items = Vec::new();

        for page in (1..=self.pages).rev() {
            let url = self.page_url(page);
            let Some(body) = self.get_page(&url).await? else {
                continue;
            };
            let parsed: Page = match serde_json::from_value(body) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Unexpected page shape, skipping");
                    continue;
                }
            };
            for item in parsed.results.into_iter().rev() {
                if item.id.0 > last {
                    last = item.id.0;
                    items.push(item);
                }
            }
        }

        tracing::info!(count = items.len(), "Opinions fetched");
        Ok(items)
    }
}
