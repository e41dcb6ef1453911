//! Stage handlers for the standard graph.
//!
//! The I/O-only stages (`init`, `fetch`, `finalize`, `notify`) live here;
//! the generation stages each have their own module.

pub mod assess;
pub mod draft;
pub mod enrich;
pub mod headline;
pub mod leads;

pub use assess::AssessHandler;
pub use draft::{DraftHandler, ReviseHandler};
pub use enrich::EnrichHandler;
pub use headline::HeadlineHandler;
pub use leads::FilterLeadsHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use newsdesk_llm::{is_schema_echo, GenerationGateway, Prompt};
use newsdesk_types::{
    DeliveryStatus, EnrichedLead, Identified, ItemId, NewsdeskError, PipelineState, Result, Stage,
    StatePatch,
};

use crate::cursor::CursorStore;
use crate::feed::SourceFeed;
use crate::handler::{RunContext, StageHandler};
use crate::notifier::Notifier;
use crate::sink::PersistenceSink;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Call the gateway and decode its answer as `T`. A schema echo or an answer
/// of the wrong shape is a malformed-output failure for the item.
pub(crate) async fn generate_as<T: DeserializeOwned>(
    gateway: &dyn GenerationGateway,
    prompt: &Prompt,
) -> Result<T> {
    let value = gateway.generate(prompt).await?;
    if is_schema_echo(&value) {
        return Err(NewsdeskError::MalformedOutput(
            "answer echoed the schema instead of data".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| NewsdeskError::MalformedOutput(e.to_string()))
}

/// User content identifying a source document to the model.
pub(crate) fn opinion_content(id: ItemId, text: &str) -> String {
    format!("Here is a court opinion id#{id}:\n{text}")
}

pub(crate) fn enriched_index(state: &PipelineState) -> HashMap<ItemId, &EnrichedLead> {
    state
        .enriched_items
        .iter()
        .map(|e| (e.identity(), e))
        .collect()
}

// ---------------------------------------------------------------------------
// InitHandler
// ---------------------------------------------------------------------------

/// Seeds the cursor from persistent storage.
pub struct InitHandler {
    store: Arc<dyn CursorStore>,
}

impl InitHandler {
    pub fn new(store: Arc<dyn CursorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for InitHandler {
    fn stage(&self) -> Stage {
        Stage::Init
    }

    async fn execute(&self, _state: &PipelineState, _ctx: &RunContext) -> Result<StatePatch> {
        let cursor = self.store.load().await?;
        tracing::info!(cursor, "Cursor loaded");
        Ok(StatePatch {
            cursor: Some(cursor),
            ..StatePatch::new()
        })
    }
}

// ---------------------------------------------------------------------------
// FetchHandler
// ---------------------------------------------------------------------------

pub struct FetchHandler {
    feed: Arc<dyn SourceFeed>,
}

impl FetchHandler {
    pub fn new(feed: Arc<dyn SourceFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl StageHandler for FetchHandler {
    fn stage(&self) -> Stage {
        Stage::Fetch
    }

    async fn execute(&self, state: &PipelineState, _ctx: &RunContext) -> Result<StatePatch> {
        let fetched = self.feed.fetch_since(state.cursor).await?;
        let total = fetched.len();
        let items: Vec<_> = fetched
            .into_iter()
            .filter(|item| item.id.0 > state.cursor)
            .collect();
        if items.len() < total {
            tracing::warn!(
                dropped = total - items.len(),
                cursor = state.cursor,
                "Feed returned items at or below the cursor"
            );
        }
        let cursor = items
            .iter()
            .map(|item| item.id.0)
            .max()
            .unwrap_or(state.cursor);
        tracing::info!(count = items.len(), cursor, "Candidates fetched");
        Ok(StatePatch {
            cursor: Some(cursor),
            candidate_items: Some(items),
            ..StatePatch::new()
        })
    }
}

// ---------------------------------------------------------------------------
// FinalizeHandler
// ---------------------------------------------------------------------------

pub struct FinalizeHandler {
    sink: Arc<dyn PersistenceSink>,
}

impl FinalizeHandler {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl StageHandler for FinalizeHandler {
    fn stage(&self) -> Stage {
        Stage::Finalize
    }

    async fn execute(&self, state: &PipelineState, _ctx: &RunContext) -> Result<StatePatch> {
        let (location, count) = self.sink.write_batch(&state.finalized_items).await?;
        Ok(StatePatch {
            output_location: Some(location),
            output_count: Some(count),
            ..StatePatch::new()
        })
    }
}

// ---------------------------------------------------------------------------
// NotifyHandler
// ---------------------------------------------------------------------------

/// Always runs. A notifier error is reported as a failed delivery rather
/// than aborting a run whose output is already persisted.
pub struct NotifyHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotifyHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl StageHandler for NotifyHandler {
    fn stage(&self) -> Stage {
        Stage::Notify
    }

    async fn execute(&self, state: &PipelineState, _ctx: &RunContext) -> Result<StatePatch> {
        let status = match self.notifier.notify(&state.finalized_items).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Notification failed");
                DeliveryStatus::Failed
            }
        };
        Ok(StatePatch {
            delivery_status: Some(status),
            ..StatePatch::new()
        })
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
