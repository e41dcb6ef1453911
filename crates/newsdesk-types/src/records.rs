//! Per-stage record shapes. Every record carries the [`ItemId`] of the source
//! item it was derived from.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Identified, ItemId};

// ---------------------------------------------------------------------------
// SourceItem: raw document from the feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: ItemId,
    #[serde(default)]
    pub resource_uri: String,
    #[serde(default)]
    pub absolute_url: String,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
}

impl Identified for SourceItem {
    fn identity(&self) -> ItemId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Lead: an item that passed the filter gate
// ---------------------------------------------------------------------------

/// Verdict returned by the filter gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadVerdict {
    #[serde(deserialize_with = "flag")]
    pub newsworthy: bool,
    #[serde(default)]
    pub influence: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub opinions_cited: Vec<serde_json::Value>,
}

impl LeadVerdict {
    pub fn accepts(&self) -> bool {
        self.newsworthy && self.influence.eq_ignore_ascii_case("global")
    }
}

/// Accepts `true`, `"True"` and `"true"` alike; generation output is not
/// consistent about boolean encoding.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub item: SourceItem,
    pub verdict: LeadVerdict,
}

impl Identified for Lead {
    fn identity(&self) -> ItemId {
        self.item.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLead {
    pub lead: Lead,
    pub key_facts: serde_json::Value,
}

impl Identified for EnrichedLead {
    fn identity(&self) -> ItemId {
        self.lead.item.id
    }
}

// ---------------------------------------------------------------------------
// Rubric: per-criterion assessment of a draft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CriterionRepr")]
pub struct Criterion {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Criterion {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            feedback: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CriterionRepr {
    Bare(f64),
    Full {
        score: f64,
        #[serde(default)]
        feedback: Option<String>,
    },
}

impl From<CriterionRepr> for Criterion {
    fn from(repr: CriterionRepr) -> Self {
        match repr {
            CriterionRepr::Bare(score) => Criterion::new(score),
            CriterionRepr::Full { score, feedback } => Criterion { score, feedback },
        }
    }
}

/// Criterion name to sub-score, in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rubric(pub BTreeMap<String, Criterion>);

impl Rubric {
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Rubric(
            scores
                .into_iter()
                .map(|(name, score)| (name.to_string(), Criterion::new(score)))
                .collect(),
        )
    }

    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.values().map(|c| c.score)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One line per criterion, used when asking for a revision.
    pub fn feedback_lines(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, c)| match &c.feedback {
                Some(text) => format!("{name} ({}): {text}", c.score),
                None => format!("{name} ({})", c.score),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Draft: generated article body awaiting assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: ItemId,
    pub body: serde_json::Value,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<Rubric>,
}

impl Draft {
    pub fn new(id: ItemId, body: serde_json::Value, tags: Vec<String>) -> Self {
        Self {
            id,
            body,
            tags,
            rubric: None,
        }
    }
}

impl Identified for Draft {
    fn identity(&self) -> ItemId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Article: publish-ready record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ItemId,
    pub headline: String,
    pub news_article: serde_json::Value,
    pub keywords: Vec<String>,
    pub keypoints: serde_json::Value,
    pub why_newsworthy: String,
    pub source_url: String,
    pub source_date_created: Option<String>,
    pub source_date_modified: Option<String>,
    pub date_created: chrono::DateTime<chrono::Utc>,
}

impl Identified for Article {
    fn identity(&self) -> ItemId {
        self.id
    }
}
