//! `draft` and `revise`: produce article bodies from enriched leads.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use newsdesk_llm::{GenerationGateway, Prompt};
use newsdesk_types::{Draft, Identified, PipelineState, Result, Stage, StatePatch};

use super::{enriched_index, generate_as, opinion_content};
use crate::batch::{item_error, process_batch};
use crate::handler::{RunContext, StageHandler};
use crate::prompts;

/// Answer shape shared by drafting and revision.
#[derive(Debug, Deserialize)]
struct DraftAnswer {
    news_article: serde_json::Value,
    #[serde(default)]
    keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Keyword {
    Plain(String),
    Tagged { keyword: String },
}

impl DraftAnswer {
    fn into_draft(self, id: newsdesk_types::ItemId) -> Draft {
        let tags = self
            .keywords
            .into_iter()
            .map(|k| match k {
                Keyword::Plain(s) | Keyword::Tagged { keyword: s } => s,
            })
            .collect();
        Draft::new(id, self.news_article, tags)
    }
}

// ---------------------------------------------------------------------------
// DraftHandler
// ---------------------------------------------------------------------------

pub struct DraftHandler {
    gateway: Arc<dyn GenerationGateway>,
}

impl DraftHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StageHandler for DraftHandler {
    fn stage(&self) -> Stage {
        Stage::Draft
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::DRAFT.system_message();
        let gateway = self.gateway.as_ref();

        let batch = process_batch(Stage::Draft, &state.enriched_items, &ctx.events, |lead| {
            let system = system.clone();
            async move {
                let id = lead.identity();
                let user = opinion_content(id, &serde_json::to_string(lead)?);
                let answer: DraftAnswer = generate_as(gateway, &Prompt::new(system, user)).await?;
                Ok(Some(answer.into_draft(id)))
            }
        })
        .await?;

        Ok(StatePatch {
            drafts: Some(batch.outputs),
            ..StatePatch::new()
        })
    }
}

// ---------------------------------------------------------------------------
// ReviseHandler
// ---------------------------------------------------------------------------

/// Regenerates every current draft with the reviewer's feedback. Rubrics are
/// cleared; a draft whose revision fails leaves the run.
pub struct ReviseHandler {
    gateway: Arc<dyn GenerationGateway>,
}

impl ReviseHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StageHandler for ReviseHandler {
    fn stage(&self) -> Stage {
        Stage::Revise
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::REVISE.system_message();
        let gateway = self.gateway.as_ref();
        let index = enriched_index(state);
        let index = &index;

        let batch = process_batch(Stage::Revise, &state.drafts, &ctx.events, |draft| {
            let system = system.clone();
            async move {
                let lead = index
                    .get(&draft.id)
                    .ok_or_else(|| item_error(Stage::Revise, "no enriched lead for draft"))?;
                let feedback = draft
                    .rubric
                    .as_ref()
                    .map(|r| r.feedback_lines())
                    .unwrap_or_default();
                let user = format!(
                    "Key points:\n{}\n\nDraft article:\n{}\n\nReviewer feedback:\n- {}",
                    lead.key_facts,
                    draft.body,
                    feedback.join("\n- ")
                );
                let answer: DraftAnswer = generate_as(gateway, &Prompt::new(system, user)).await?;
                Ok(Some(answer.into_draft(draft.id)))
            }
        })
        .await?;

        Ok(StatePatch {
            drafts: Some(batch.outputs),
            revision_count: Some(state.revision_count + 1),
            ..StatePatch::new()
        })
    }
}
