//! Stage handler trait, handler registry, and collaborator wiring.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use newsdesk_llm::GenerationGateway;
use newsdesk_types::{PipelineState, Result, Stage, StatePatch};

use crate::cursor::CursorStore;
use crate::engine::PipelineConfig;
use crate::events::EventEmitter;
use crate::feed::SourceFeed;
use crate::handlers::{
    AssessHandler, DraftHandler, EnrichHandler, FetchHandler, FilterLeadsHandler,
    FinalizeHandler, HeadlineHandler, InitHandler, NotifyHandler, ReviseHandler,
};
use crate::notifier::Notifier;
use crate::sink::PersistenceSink;

// ---------------------------------------------------------------------------
// StageHandler trait
// ---------------------------------------------------------------------------

/// Per-run values handed to every stage.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    pub events: EventEmitter,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, events: EventEmitter) -> Self {
        Self {
            run_id: run_id.into(),
            events,
        }
    }
}

/// One stage of the pipeline. Reads the current state and returns the
/// fields it changed; the executor validates and merges the patch.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch>;
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

pub struct HandlerRegistry {
    handlers: HashMap<Stage, Box<dyn StageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under the stage it reports. Replaces any earlier one.
    pub fn register(&mut self, handler: impl StageHandler + 'static) {
        self.handlers.insert(handler.stage(), Box::new(handler));
    }

    pub fn get(&self, stage: Stage) -> Option<&dyn StageHandler> {
        self.handlers.get(&stage).map(|h| h.as_ref())
    }

    pub fn has(&self, stage: Stage) -> bool {
        self.handlers.contains_key(&stage)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Handles to everything outside the process that a run touches.
#[derive(Clone)]
pub struct Collaborators {
    pub cursor_store: Arc<dyn CursorStore>,
    pub feed: Arc<dyn SourceFeed>,
    pub gateway: Arc<dyn GenerationGateway>,
    pub sink: Arc<dyn PersistenceSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// A registry with a handler for every non-terminal stage of
/// [`StageGraph::standard`](crate::graph::StageGraph::standard).
pub fn standard_registry(collab: &Collaborators, config: &PipelineConfig) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(InitHandler::new(collab.cursor_store.clone()));
    registry.register(FetchHandler::new(collab.feed.clone()));
    registry.register(FilterLeadsHandler::new(
        collab.gateway.clone(),
        config.court_marker.clone(),
    ));
    registry.register(EnrichHandler::new(collab.gateway.clone()));
    registry.register(DraftHandler::new(collab.gateway.clone()));
    registry.register(AssessHandler::new(collab.gateway.clone()));
    registry.register(ReviseHandler::new(collab.gateway.clone()));
    registry.register(HeadlineHandler::new(collab.gateway.clone()));
    registry.register(FinalizeHandler::new(collab.sink.clone()));
    registry.register(NotifyHandler::new(collab.notifier.clone()));
    registry
}
