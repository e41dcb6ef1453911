//! Pipeline execution engine: the stage traversal loop.
//!
//! Validates the graph, then drives it from the entry stage to `end`, one
//! stage at a time. Each handler reads the state and returns a patch; the
//! patch is merged before the next edge is chosen.

use std::time::Instant;

use newsdesk_types::{NewsdeskError, PipelineState, Result, Stage};

use crate::events::{EventEmitter, PipelineEvent};
use crate::gate::{below_threshold_count, should_continue, GateDecision};
use crate::graph::{Edge, StageGraph};
use crate::handler::{HandlerRegistry, RunContext};
use crate::validation::validate_or_raise;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Core knobs for a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on `revision_count`; the revise edge runs at most
    /// `max_attempts - 1` times.
    pub max_attempts: u32,
    /// Stage executions allowed before the run is aborted. Raised as needed
    /// so the revise rounds `max_attempts` allows always fit.
    pub max_steps: usize,
    /// Text an item must contain to be considered for a lead. `None` disables
    /// the pre-check.
    pub court_marker: Option<String>,
}

impl PipelineConfig {
    /// Stage executions allowed on `graph`. Never less than one full pass
    /// plus every revise round `max_attempts` permits.
    pub fn step_ceiling(&self, graph: &StageGraph) -> usize {
        let pass = graph.stages().len();
        let rounds = 2 * self.max_attempts.saturating_sub(1) as usize;
        self.max_steps.max(pass + rounds)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_steps: 64,
            court_marker: Some("SUPREME COURT".into()),
        }
    }
}

/// The core pipeline executor. Owns a handler registry and drives graph traversal.
pub struct PipelineExecutor {
    registry: HandlerRegistry,
    config: PipelineConfig,
    events: EventEmitter,
}

/// The result of a completed run.
#[derive(Debug)]
pub struct PipelineResult {
    pub run_id: String,
    /// Every stage executed, in order, ending with `end`.
    pub stage_trace: Vec<Stage>,
    pub state: PipelineState,
}

impl PipelineResult {
    pub fn revisions(&self) -> usize {
        self.stage_trace.iter().filter(|s| **s == Stage::Revise).count()
    }
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

impl PipelineExecutor {
    pub fn new(registry: HandlerRegistry, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            events: EventEmitter::default(),
        }
    }

    /// Replace the event emitter, e.g. to share one across executors.
    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `graph` from a fresh state.
    pub async fn run(&self, graph: &StageGraph) -> Result<PipelineResult> {
        self.run_with_state(graph, PipelineState::default()).await
    }

    /// Run `graph` starting from `state`.
    pub async fn run_with_state(
        &self,
        graph: &StageGraph,
        mut state: PipelineState,
    ) -> Result<PipelineResult> {
        for diag in validate_or_raise(graph, &self.registry)? {
            tracing::warn!(rule = %diag.rule, "{}", diag.message);
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let ctx = RunContext::new(run_id.clone(), self.events.clone());
        let started = Instant::now();
        tracing::info!(run_id = %run_id, "Pipeline run started");
        self.events.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            stage_count: graph.stages().len(),
        });

        let ceiling = self.config.step_ceiling(graph);
        let mut stage_trace = Vec::new();
        let mut current = graph.entry();

        while current != Stage::End {
            if stage_trace.len() >= ceiling {
                return Err(NewsdeskError::StepLimitReached {
                    steps: stage_trace.len(),
                });
            }

            let handler = self.registry.get(current).ok_or_else(|| {
                NewsdeskError::StageError {
                    stage: current,
                    message: format!("No handler registered for stage '{current}'"),
                }
            })?;

            tracing::info!(stage = %current, "Stage started");
            self.events.emit(PipelineEvent::StageStarted { stage: current });
            let stage_started = Instant::now();

            let patch = handler.execute(&state, &ctx).await?;
            let offered: Vec<_> = patch
                .best_candidates
                .iter()
                .map(|c| (c.id, state.best_drafts.get(c.id).map(|b| b.score)))
                .collect();
            let fields = state.apply(current, patch)?;

            for (id, before) in offered {
                let after = state.best_drafts.get(id).map(|b| b.score);
                if let Some(score) = after.filter(|_| after != before) {
                    self.events
                        .emit(PipelineEvent::CandidateImproved { item: id, score });
                }
            }

            if !fields.is_empty() {
                tracing::debug!(stage = %current, fields = ?fields, "State updated");
                self.events.emit(PipelineEvent::StateUpdated {
                    stage: current,
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                });
            }

            let duration_ms = stage_started.elapsed().as_millis() as u64;
            tracing::info!(stage = %current, duration_ms, "Stage completed");
            self.events.emit(PipelineEvent::StageCompleted {
                stage: current,
                duration_ms,
            });
            stage_trace.push(current);

            let next = self.next_stage(graph, current, &state)?;
            self.events.emit(PipelineEvent::EdgeSelected {
                from: current,
                to: next,
            });
            current = next;
        }
        stage_trace.push(Stage::End);

        let duration_ms = started.elapsed().as_millis() as u64;
        let output_count = state.output_count.unwrap_or(0);
        tracing::info!(
            run_id = %run_id,
            output_count,
            revisions = state.revision_count.saturating_sub(1),
            delivery = ?state.delivery_status,
            duration_ms,
            "Pipeline run completed"
        );
        self.events.emit(PipelineEvent::RunCompleted {
            run_id: run_id.clone(),
            output_count,
            delivery_status: state.delivery_status,
            duration_ms,
        });

        Ok(PipelineResult {
            run_id,
            stage_trace,
            state,
        })
    }

    fn next_stage(&self, graph: &StageGraph, from: Stage, state: &PipelineState) -> Result<Stage> {
        match graph.edge(from) {
            Some(Edge::Direct(to)) => Ok(to),
            Some(Edge::Conditional { on_revise, on_exit }) => {
                match should_continue(state, self.config.max_attempts) {
                    GateDecision::Revise => {
                        let below = below_threshold_count(state);
                        tracing::info!(
                            revision_count = state.revision_count,
                            below_threshold = below,
                            "Drafts below threshold, revising"
                        );
                        self.events.emit(PipelineEvent::RevisionRequested {
                            revision_count: state.revision_count,
                            below_threshold: below,
                        });
                        Ok(on_revise)
                    }
                    GateDecision::Exit => Ok(on_exit),
                }
            }
            None => Err(NewsdeskError::StageError {
                stage: from,
                message: "Stage has no outgoing edge".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
