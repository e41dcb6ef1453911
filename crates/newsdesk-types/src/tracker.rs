//! Best-candidate bookkeeping across revision iterations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ItemId;

/// The best version of a draft seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestDraft {
    pub body: serde_json::Value,
    pub tags: Vec<String>,
    pub score: f64,
}

/// A scored draft offered to the tracker by the gate stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ItemId,
    pub body: serde_json::Value,
    pub tags: Vec<String>,
    pub score: f64,
}

/// Keyed store retaining, per identity, the highest-scoring draft.
///
/// Entries are never removed and only replaced by a strictly higher score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BestCandidateTracker {
    entries: BTreeMap<ItemId, BestDraft>,
}

impl BestCandidateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert when absent; replace only on strict improvement. Returns `true`
    /// when the stored entry changed.
    pub fn update(
        &mut self,
        id: ItemId,
        body: serde_json::Value,
        tags: Vec<String>,
        score: f64,
    ) -> bool {
        match self.entries.get(&id) {
            Some(existing) if score <= existing.score || score.is_nan() => false,
            _ => {
                self.entries.insert(id, BestDraft { body, tags, score });
                true
            }
        }
    }

    /// Convenience wrapper around [`update`](Self::update).
    pub fn offer(&mut self, candidate: Candidate) -> bool {
        self.update(candidate.id, candidate.body, candidate.tags, candidate.score)
    }

    pub fn get(&self, id: ItemId) -> Option<&BestDraft> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &BestDraft)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inserts_when_absent() {
        let mut t = BestCandidateTracker::new();
        assert!(t.update(ItemId(1), json!("v1"), vec!["a".into()], 5.0));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(ItemId(1)).unwrap().score, 5.0);
    }

    #[test]
    fn replaces_only_on_strict_improvement() {
        let mut t = BestCandidateTracker::new();
        t.update(ItemId(1), json!("first"), vec![], 7.0);

        assert!(!t.update(ItemId(1), json!("equal"), vec![], 7.0));
        assert_eq!(t.get(ItemId(1)).unwrap().body, json!("first"));

        assert!(!t.update(ItemId(1), json!("worse"), vec![], 6.0));
        assert_eq!(t.get(ItemId(1)).unwrap().body, json!("first"));

        assert!(t.update(ItemId(1), json!("better"), vec!["x".into()], 7.5));
        let best = t.get(ItemId(1)).unwrap();
        assert_eq!(best.body, json!("better"));
        assert_eq!(best.tags, vec!["x".to_string()]);
        assert_eq!(best.score, 7.5);
    }

    #[test]
    fn non_increasing_updates_keep_max() {
        for (s1, s2) in [(9.0, 9.0), (9.0, 4.0), (2.5, 2.5), (8.0, 7.99)] {
            let mut t = BestCandidateTracker::new();
            t.update(ItemId(3), json!("a"), vec![], s1);
            t.update(ItemId(3), json!("b"), vec![], s2);
            assert_eq!(t.get(ItemId(3)).unwrap().score, f64::max(s1, s2));
            assert_eq!(t.get(ItemId(3)).unwrap().body, json!("a"));
        }
    }

    #[test]
    fn nan_never_replaces_an_entry() {
        let mut t = BestCandidateTracker::new();
        t.update(ItemId(1), json!("a"), vec![], 1.0);
        assert!(!t.update(ItemId(1), json!("b"), vec![], f64::NAN));
        assert_eq!(t.get(ItemId(1)).unwrap().score, 1.0);
    }

    #[test]
    fn identities_are_independent() {
        let mut t = BestCandidateTracker::new();
        t.offer(Candidate {
            id: ItemId(1),
            body: json!("a"),
            tags: vec![],
            score: 7.0,
        });
        t.offer(Candidate {
            id: ItemId(2),
            body: json!("b"),
            tags: vec![],
            score: 9.0,
        });
        t.update(ItemId(1), json!("a2"), vec![], 6.0);

        let ids: Vec<_> = t.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![ItemId(1), ItemId(2)]);
        assert_eq!(t.get(ItemId(1)).unwrap().score, 7.0);
        assert_eq!(t.get(ItemId(2)).unwrap().score, 9.0);
    }

    #[test]
    fn serializes_as_map_keyed_by_identity() {
        let mut t = BestCandidateTracker::new();
        t.update(ItemId(10), json!("body"), vec!["tag".into()], 8.5);
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["10"]["score"], json!(8.5));
    }
}
