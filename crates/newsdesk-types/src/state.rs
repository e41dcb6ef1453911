//! The typed record threaded through every stage, and the partial patches
//! stages return.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::records::{Article, Draft, EnrichedLead, Lead, SourceItem};
use crate::tracker::{BestCandidateTracker, Candidate};
use crate::{DeliveryStatus, Identified, NewsdeskError, Result, Stage};

/// Mutable state for a single run. Owned by the executor; stages only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub cursor: u64,
    pub candidate_items: Vec<SourceItem>,
    pub accepted_items: Vec<Lead>,
    pub enriched_items: Vec<EnrichedLead>,
    pub drafts: Vec<Draft>,
    pub best_drafts: BestCandidateTracker,
    pub revision_count: u32,
    pub finalized_items: Vec<Article>,
    pub output_location: Option<String>,
    pub output_count: Option<usize>,
    pub delivery_status: Option<DeliveryStatus>,
}

/// Partial update produced by one stage. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub cursor: Option<u64>,
    pub candidate_items: Option<Vec<SourceItem>>,
    pub accepted_items: Option<Vec<Lead>>,
    pub enriched_items: Option<Vec<EnrichedLead>>,
    pub drafts: Option<Vec<Draft>>,
    /// Scored drafts offered to the best-candidate tracker.
    pub best_candidates: Vec<Candidate>,
    pub revision_count: Option<u32>,
    pub finalized_items: Option<Vec<Article>>,
    pub output_location: Option<String>,
    pub output_count: Option<usize>,
    pub delivery_status: Option<DeliveryStatus>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl PipelineState {
    /// Fresh state seeded from a persisted cursor.
    pub fn with_cursor(cursor: u64) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Validate `patch` against the current state and merge it.
    ///
    /// Returns the names of the fields that were written, or an
    /// `InvalidPatch` error (with the state untouched) when the patch would
    /// move the cursor or revision count backwards, or introduce a draft
    /// whose identity has no enriched lead.
    pub fn apply(&mut self, stage: Stage, patch: StatePatch) -> Result<Vec<&'static str>> {
        self.check(stage, &patch)?;

        let mut touched = Vec::new();
        if let Some(cursor) = patch.cursor {
            self.cursor = cursor;
            touched.push("cursor");
        }
        if let Some(items) = patch.candidate_items {
            self.candidate_items = items;
            touched.push("candidate_items");
        }
        if let Some(items) = patch.accepted_items {
            self.accepted_items = items;
            touched.push("accepted_items");
        }
        if let Some(items) = patch.enriched_items {
            self.enriched_items = items;
            touched.push("enriched_items");
        }
        if let Some(drafts) = patch.drafts {
            self.drafts = drafts;
            touched.push("drafts");
        }
        if !patch.best_candidates.is_empty() {
            for candidate in patch.best_candidates {
                let id = candidate.id;
                let score = candidate.score;
                if self.best_drafts.offer(candidate) {
                    tracing::debug!(item = %id, score, "Best candidate updated");
                }
            }
            touched.push("best_drafts");
        }
        if let Some(count) = patch.revision_count {
            self.revision_count = count;
            touched.push("revision_count");
        }
        if let Some(items) = patch.finalized_items {
            self.finalized_items = items;
            touched.push("finalized_items");
        }
        if let Some(location) = patch.output_location {
            self.output_location = Some(location);
            touched.push("output_location");
        }
        if let Some(count) = patch.output_count {
            self.output_count = Some(count);
            touched.push("output_count");
        }
        if let Some(status) = patch.delivery_status {
            self.delivery_status = Some(status);
            touched.push("delivery_status");
        }
        Ok(touched)
    }

    fn check(&self, stage: Stage, patch: &StatePatch) -> Result<()> {
        let reject = |message: String| NewsdeskError::InvalidPatch { stage, message };

        if let Some(cursor) = patch.cursor {
            if cursor < self.cursor && stage != Stage::Init {
                return Err(reject(format!(
                    "cursor moved backwards from {} to {}",
                    self.cursor, cursor
                )));
            }
        }
        if let Some(count) = patch.revision_count {
            if count < self.revision_count {
                return Err(reject(format!(
                    "revision_count moved backwards from {} to {}",
                    self.revision_count, count
                )));
            }
        }
        if let Some(ref drafts) = patch.drafts {
            let enriched = patch.enriched_items.as_ref().unwrap_or(&self.enriched_items);
            let known: HashSet<_> = enriched.iter().map(|e| e.identity()).collect();
            if let Some(stray) = drafts.iter().find(|d| !known.contains(&d.id)) {
                return Err(reject(format!(
                    "draft {} has no matching enriched item",
                    stray.id
                )));
            }
        }
        Ok(())
    }
}
