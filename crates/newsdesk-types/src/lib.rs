//! Shared types, errors, pipeline state, and candidate tracking for the Newsdesk engine.
//!
//! This crate provides the foundational types used across all other Newsdesk crates:
//! - `NewsdeskError`: unified error taxonomy
//! - `ItemId` / `Stage`: identity keys and stage names
//! - `PipelineState` / `StatePatch`: the typed record threaded through every stage
//! - `BestCandidateTracker`: best-scoring draft per identity across revisions

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod records;
pub mod state;
pub mod tracker;

pub use records::{
    Article, Criterion, Draft, EnrichedLead, Lead, LeadVerdict, Rubric, SourceItem,
};
pub use state::{PipelineState, StatePatch};
pub use tracker::{BestCandidateTracker, BestDraft, Candidate};

/// Unified error type for all Newsdesk subsystems.
#[derive(Debug, thiserror::Error)]
pub enum NewsdeskError {
    // === Generation Provider Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),

    // === Collaborator Errors ===
    #[error("Feed request to {url} failed: {message}")]
    FeedError { url: String, message: String },

    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    // === Pipeline Errors ===
    #[error("Stage graph validation failed: {0}")]
    GraphValidation(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageError { stage: Stage, message: String },

    #[error("Rejected state patch from stage '{stage}': {message}")]
    InvalidPatch { stage: Stage, message: String },

    #[error("Step limit reached after {steps} stage executions")]
    StepLimitReached { steps: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl NewsdeskError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NewsdeskError::RateLimited { .. }
                | NewsdeskError::RequestTimeout { .. }
                | NewsdeskError::ProviderError { retryable: true, .. }
        )
    }

    /// Returns `true` if the error should abort the whole run rather than a
    /// single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NewsdeskError::AuthError { .. }
                | NewsdeskError::Config(_)
                | NewsdeskError::FeedError { .. }
                | NewsdeskError::GraphValidation(_)
                | NewsdeskError::InvalidPatch { .. }
                | NewsdeskError::StepLimitReached { .. }
        )
    }
}

/// A convenience alias for `Result<T, NewsdeskError>`.
pub type Result<T> = std::result::Result<T, NewsdeskError>;

// ---------------------------------------------------------------------------
// ItemId: identity key threaded through every stage
// ---------------------------------------------------------------------------

/// Stable per-item identifier, taken from the source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId(id)
    }
}

/// Anything that carries an identity key.
pub trait Identified {
    fn identity(&self) -> ItemId;
}

// ---------------------------------------------------------------------------
// Stage: named stages of the graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Init,
    Fetch,
    FilterLeads,
    Enrich,
    Draft,
    Assess,
    Revise,
    Headline,
    Finalize,
    Notify,
    End,
}

impl Stage {
    /// Every stage, in nominal run order.
    pub const ALL: [Stage; 11] = [
        Stage::Init,
        Stage::Fetch,
        Stage::FilterLeads,
        Stage::Enrich,
        Stage::Draft,
        Stage::Assess,
        Stage::Revise,
        Stage::Headline,
        Stage::Finalize,
        Stage::Notify,
        Stage::End,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Fetch => "fetch",
            Stage::FilterLeads => "filter-leads",
            Stage::Enrich => "enrich",
            Stage::Draft => "draft",
            Stage::Assess => "assess",
            Stage::Revise => "revise",
            Stage::Headline => "headline",
            Stage::Finalize => "finalize",
            Stage::Notify => "notify",
            Stage::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DeliveryStatus: outcome of the notify stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Done,
    Partial,
    Failed,
    Skipped,
}

impl DeliveryStatus {
    /// Classify a delivery attempt from the number of recipients reached.
    pub fn from_counts(delivered: usize, attempted: usize) -> Self {
        match (delivered, attempted) {
            (_, 0) => DeliveryStatus::Skipped,
            (d, a) if d == a => DeliveryStatus::Done,
            (0, _) => DeliveryStatus::Failed,
            _ => DeliveryStatus::Partial,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Done => "done",
            DeliveryStatus::Partial => "partial",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}
