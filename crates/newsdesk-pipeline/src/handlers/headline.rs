//! `headline`: title each surviving draft and build the publish-ready record.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use newsdesk_llm::{GenerationGateway, Prompt};
use newsdesk_types::{Article, PipelineState, Result, SourceItem, Stage, StatePatch};

use super::{enriched_index, generate_as};
use crate::batch::{item_error, process_batch};
use crate::handler::{RunContext, StageHandler};
use crate::prompts;

#[derive(Debug, Deserialize)]
struct HeadlineAnswer {
    headline: String,
}

/// Public page of a source item: the scheme and host of its API resource
/// joined with its site-relative URL.
pub fn source_url(item: &SourceItem) -> Result<String> {
    let resource = reqwest::Url::parse(&item.resource_uri).map_err(|e| {
        item_error(
            Stage::Headline,
            format!("bad resource_uri '{}': {e}", item.resource_uri),
        )
    })?;
    let host = resource.host_str().ok_or_else(|| {
        item_error(
            Stage::Headline,
            format!("resource_uri '{}' has no host", item.resource_uri),
        )
    })?;
    Ok(format!("{}://{}{}", resource.scheme(), host, item.absolute_url))
}

pub struct HeadlineHandler {
    gateway: Arc<dyn GenerationGateway>,
}

impl HeadlineHandler {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StageHandler for HeadlineHandler {
    fn stage(&self) -> Stage {
        Stage::Headline
    }

    async fn execute(&self, state: &PipelineState, ctx: &RunContext) -> Result<StatePatch> {
        let system = prompts::HEADLINE.system_message();
        let gateway = self.gateway.as_ref();
        let index = enriched_index(state);
        let index = &index;

        let batch = process_batch(Stage::Headline, &state.drafts, &ctx.events, |draft| {
            let system = system.clone();
            async move {
                let enriched = index
                    .get(&draft.id)
                    .ok_or_else(|| item_error(Stage::Headline, "no enriched lead for draft"))?;
                let item = &enriched.lead.item;
                let source_url = source_url(item)?;

                let user = format!(
                    "Keywords:\n{}\n\nNews article:\n{}",
                    draft.tags.join(","),
                    draft.body
                );
                let HeadlineAnswer { headline } =
                    generate_as(gateway, &Prompt::new(system, user)).await?;
                let headline = headline.trim().to_string();
                if headline.is_empty() {
                    return Err(item_error(Stage::Headline, "empty headline"));
                }

                Ok(Some(Article {
                    id: draft.id,
                    headline,
                    news_article: draft.body.clone(),
                    keywords: draft.tags.clone(),
                    keypoints: enriched.key_facts.clone(),
                    why_newsworthy: enriched.lead.verdict.reason.clone(),
                    source_url,
                    source_date_created: item.date_created.clone(),
                    source_date_modified: item.date_modified.clone(),
                    date_created: Utc::now(),
                }))
            }
        })
        .await?;

        Ok(StatePatch {
            finalized_items: Some(batch.outputs),
            ..StatePatch::new()
        })
    }
}
