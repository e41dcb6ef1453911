//! `enrich`: attach key facts to every accepted lead.

use std::sync::Arc;

use async_trait::async_trait;

use newsdesk_llm::{GenerationGateway, Prompt};
use newsdesk_types::{EnrichedLead, PipelineState, Result, Stage, StatePatch};

use super::{generate_as, opinion_content};
use crate::batch::process_batch;
use crate::handler::{RunContext, StageHandler};
use crate::prompts;

pub struct EnrichHandler {
    gateway: Arc<dyn GenerationGateway>,
}

impl EnrichHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StageHandler for EnrichHandler {
    fn stage(&self) -> Stage {
        Stage::Enrich
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::KEYPOINTS.system_message();
        let gateway = self.gateway.as_ref();

        let batch = process_batch(Stage::Enrich, &state.accepted_items, &ctx.events, |lead| {
            let prompt = Prompt::new(
                system.clone(),
                opinion_content(lead.item.id, &lead.item.plain_text),
            );
            async move {
                let key_facts: serde_json::Value = generate_as(gateway, &prompt).await?;
                Ok(Some(EnrichedLead {
                    lead: lead.clone(),
                    key_facts,
                }))
            }
        })
        .await?;

        Ok(StatePatch {
            enriched_items: Some(batch.outputs),
            ..StatePatch::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::*;
    use newsdesk_types::NewsdeskError;
    use serde_json::json;

    #[tokio::test]
    async fn key_facts_attach_to_leads() {
        let gw = ScriptedGateway::new(|p| {
            if p.user.contains("id#2:") {
                return Ok(json!({"properties": {"holding": {"type": "string"}}}));
            }
            Ok(json!({"holding": "affirmed"}))
        });
        let leads = (1..=3).map(|i| enriched(i).lead).collect();
        let state = PipelineState {
            accepted_items: leads,
            ..PipelineState::default()
        };
        let patch = EnrichHandler::new(gw).execute(&state, &ctx()).await.unwrap();
        let enriched = patch.enriched_items.unwrap();
        let ids: Vec<u64> = enriched.iter().map(|e| e.lead.item.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(enriched[0].key_facts, json!({"holding": "affirmed"}));
    }

    #[tokio::test]
    async fn fatal_gateway_error_aborts_the_stage() {
        let gw = ScriptedGateway::new(|_| {
            Err(NewsdeskError::AuthError {
                provider: "openai".into(),
            })
        });
        let state = PipelineState {
            accepted_items: vec![enriched(1).lead],
            ..PipelineState::default()
        };
        let err = EnrichHandler::new(gw).execute(&state, &ctx()).await.unwrap_err();
        assert!(matches!(err, NewsdeskError::AuthError { .. }));
    }
}
