//! `filter-leads`: keep only the opinions worth writing about.

use std::sync::Arc;

use async_trait::async_trait;

use newsdesk_llm::GenerationGateway;
use newsdesk_types::{Lead, LeadVerdict, PipelineState, Result, Stage, StatePatch};

use super::{generate_as, opinion_content};
use crate::batch::process_batch;
use crate::handler::{RunContext, StageHandler};
use crate::prompts;

pub struct FilterLeadsHandler {
    gateway: Arc<dyn GenerationGateway>,
    court_marker: Option<String>,
}

impl FilterLeadsHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>, court_marker: Option<String>) -> Self {
        Self {
            gateway,
            court_marker,
        }
    }
}

#[async_trait]
impl StageHandler for FilterLeadsHandler {
    fn stage(&self) -> Stage {
        Stage::FilterLeads
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::NEWSWORTHINESS.system_message();
        let gateway = self.gateway.as_ref();
        let marker = self.court_marker.as_deref();

        let batch = process_batch(Stage::FilterLeads, &state.candidate_items, &ctx.events, |item| {
            let system = system.clone();
            async move {
                let user = opinion_content(item.id, &item.plain_text);
                // Cheap pre-check: only opinions from the marked court are sent out.
                if marker.is_some_and(|m| !user.contains(m)) {
                    return Ok(None);
                }
                let verdict: LeadVerdict =
                    generate_as(gateway, &newsdesk_llm::Prompt::new(system, user)).await?;
                tracing::debug!(
                    item = %item.id,
                    newsworthy = verdict.newsworthy,
                    influence = %verdict.influence,
                    "Lead verdict"
                );
                Ok(verdict.accepts().then(|| Lead {
                    item: item.clone(),
                    verdict,
                }))
            }
        })
        .await?;

        Ok(StatePatch {
            accepted_items: Some(batch.outputs),
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state(items: Vec<newsdesk_types::SourceItem>) -> PipelineState {
        PipelineState {
            candidate_items: items,
            ..PipelineState::default()
        }
    }

    #[tokio::test]
    async fn items_without_marker_skip_the_gateway() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let gw = ScriptedGateway::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"newsworthy": "True", "influence": "Global", "reason": "r"}))
        });
        let handler = FilterLeadsHandler::new(gw, Some("SUPREME COURT".into()));
        let patch = handler
            .execute(
                &state(vec![item(1, "district court order"), item(2, "SUPREME COURT OF TEXAS")]),
                &ctx(),
            )
            .await
            .unwrap();
        let accepted = patch.accepted_items.unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].item.id.0, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn only_global_newsworthy_verdicts_pass() {
        let gw = ScriptedGateway::new(|p| {
            Ok(if p.user.contains("id#1:") {
                json!({"newsworthy": "True", "influence": "Global", "reason": "precedent"})
            } else if p.user.contains("id#2:") {
                json!({"newsworthy": "True", "influence": "Local", "reason": "narrow"})
            } else {
                json!({"newsworthy": "False", "influence": "Global", "reason": "routine"})
            })
        });
        let handler = FilterLeadsHandler::new(gw, Some("SUPREME COURT".into()));
        let items = (1..=3).map(|i| item(i, "SUPREME COURT")).collect();
        let patch = handler.execute(&state(items), &ctx()).await.unwrap();
        let accepted = patch.accepted_items.unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].verdict.reason, "precedent");
    }

    #[tokio::test]
    async fn failing_item_is_dropped_and_rest_continue() {
        let gw = ScriptedGateway::new(|p| {
            if p.user.contains("id#2:") {
                Err(NewsdeskError::MalformedOutput("garbled".into()))
            } else {
                Ok(json!({"newsworthy": true, "influence": "Global", "reason": "r"}))
            }
        });
        let handler = FilterLeadsHandler::new(gw, None);
        let items = (1..=3).map(|i| item(i, "any court")).collect();
        let patch = handler.execute(&state(items), &ctx()).await.unwrap();
        let ids: Vec<u64> = patch
            .accepted_items
            .unwrap()
            .iter()
            .map(|l| l.item.id.0)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn prompt_carries_identity_and_text() {
        let gw = ScriptedGateway::new(|p| {
            assert!(p.user.starts_with("Here is a court opinion id#5:\nSUPREME COURT"));
            assert!(p.system.starts_with("User Requirement:"));
            Ok(json!({"newsworthy": "False", "influence": "Local", "reason": ""}))
        });
        let handler = FilterLeadsHandler::new(gw, Some("SUPREME COURT".into()));
        let patch = handler
            .execute(&state(vec![item(5, "SUPREME COURT ruling")]), &ctx())
            .await
            .unwrap();
        assert_eq!(patch.accepted_items, Some(vec![]));
    }
}
