//! Pipeline event system for observability.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (loggers, progress displays, tests) can follow a run
//! without coupling to the engine internals.

use serde::{Deserialize, Serialize};

use newsdesk_types::{DeliveryStatus, ItemId, Stage};

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        stage_count: usize,
    },
    RunCompleted {
        run_id: String,
        output_count: usize,
        delivery_status: Option<DeliveryStatus>,
        duration_ms: u64,
    },
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        duration_ms: u64,
    },
    /// A stage's patch was merged; `fields` names the state fields it set.
    StateUpdated {
        stage: Stage,
        fields: Vec<String>,
    },
    ItemFailed {
        stage: Stage,
        item: ItemId,
        error: String,
    },
    /// The best-candidate tracker stored a new highest score for `item`.
    CandidateImproved {
        item: ItemId,
        score: f64,
    },
    EdgeSelected {
        from: Stage,
        to: Stage,
    },
    RevisionRequested {
        revision_count: u32,
        below_threshold: usize,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(PipelineEvent::ItemFailed {
            stage: Stage::Enrich,
            item: ItemId(7),
            error: "timeout".into(),
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::ItemFailed { stage, item, error } => {
                assert_eq!(stage, Stage::Enrich);
                assert_eq!(item, ItemId(7));
                assert_eq!(error, "timeout");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let emitter = EventEmitter::new(16);
        emitter.emit(PipelineEvent::StageStarted { stage: Stage::Init });
    }

    #[test]
    fn events_serialize_with_stage_names() {
        let json = serde_json::to_value(PipelineEvent::EdgeSelected {
            from: Stage::Assess,
            to: Stage::Revise,
        })
        .unwrap();
        assert_eq!(json["EdgeSelected"]["from"], "assess");
        assert_eq!(json["EdgeSelected"]["to"], "revise");
    }
}
