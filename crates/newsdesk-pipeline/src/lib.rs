//! Stage graph, revision loop, stage handlers, and collaborators for the Newsdesk pipeline.
//!
//! This crate implements the core Newsdesk runner: stage graph traversal,
//! handler dispatch, the bounded `assess -> revise -> assess` loop, per-item
//! failure isolation, and best-candidate bookkeeping. Fetching, generation,
//! persistence, and notification go through the collaborator traits in
//! [`feed`], [`cursor`], [`sink`], and [`notifier`].

pub mod batch;
pub mod cursor;
pub mod engine;
pub mod events;
pub mod feed;
pub mod gate;
pub mod graph;
pub mod handler;
pub mod handlers;
pub mod notifier;
pub mod prompts;
pub mod score;
pub mod sink;
pub mod validation;

pub use batch::{process_batch, BatchOutput, ItemFailure};
pub use cursor::{CursorStore, FileCursorStore};
pub use engine::{PipelineConfig, PipelineExecutor, PipelineResult};
pub use events::{EventEmitter, PipelineEvent};
pub use feed::{CourtListenerFeed, ResponseCache, SourceFeed};
pub use gate::{should_continue, GateDecision};
pub use graph::{Edge, StageGraph};
pub use handler::{standard_registry, Collaborators, HandlerRegistry, RunContext, StageHandler};
pub use notifier::{
    load_recipients, DigestNotifier, DigestRenderer, DigestTemplate, Notifier, OutboxDelivery,
    Delivery, RenderedDigest,
};
pub use score::{aggregate_score, is_below_threshold, CUTOFF};
pub use sink::{JsonlSink, PersistenceSink};
pub use validation::{validate, validate_or_raise, Diagnostic, Severity};
