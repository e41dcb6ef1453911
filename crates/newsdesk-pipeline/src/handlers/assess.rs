//! `assess`: score every current draft and offer it to the best-candidate
//! tracker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use newsdesk_llm::{GenerationGateway, Prompt};
use newsdesk_types::{
    Candidate, NewsdeskError, PipelineState, Result, Rubric, Stage, StatePatch,
};

use super::{enriched_index, generate_as};
use crate::batch::{item_error, process_batch};
use crate::handler::{RunContext, StageHandler};
use crate::prompts;
use crate::score::aggregate_score;

#[derive(Debug, Deserialize)]
struct Assessment {
    criteria: Rubric,
}

pub struct AssessHandler {
    gateway: Arc<dyn GenerationGateway>,
}

impl AssessHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StageHandler for AssessHandler {
    fn stage(&self) -> Stage {
        Stage::Assess
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::ASSESS.system_message();
        let gateway = self.gateway.as_ref();
        let index = enriched_index(state);
        let index = &index;

        let batch = process_batch(Stage::Assess, &state.drafts, &ctx.events, |draft| {
            let system = system.clone();
            async move {
                let lead = index
                    .get(&draft.id)
                    .ok_or_else(|| item_error(Stage::Assess, "no enriched lead for draft"))?;
                let user = format!(
                    "Key points:\n{}\n\nDraft article:\n{}",
                    lead.key_facts, draft.body
                );
                let Assessment { criteria } =
                    generate_as(gateway, &Prompt::new(system, user)).await?;
                if criteria.is_empty() {
                    return Err(NewsdeskError::MalformedOutput(
                        "assessment has no criteria".into(),
                    ));
                }

                let score = aggregate_score(&criteria);
                tracing::debug!(item = %draft.id, score, criteria = criteria.len(), "Draft scored");
                let candidate = Candidate {
                    id: draft.id,
                    body: draft.body.clone(),
                    tags: draft.tags.clone(),
                    score,
                };
                let mut scored = draft.clone();
                scored.rubric = Some(criteria);
                Ok(Some((scored, candidate)))
            }
        })
        .await?;

        let (drafts, best_candidates): (Vec<_>, Vec<_>) = batch.outputs.into_iter().unzip();
        Ok(StatePatch {
            drafts: Some(drafts),
            best_candidates,
            // The first assessment pass counts as attempt one.
            revision_count: Some(state.revision_count.max(1)),
            ..StatePatch::new()
        })
    }
}
