//! Transition rule out of `assess`.

use newsdesk_types::PipelineState;

use crate::score::is_below_threshold;

/// Which edge to take after an assessment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// At least one draft is below threshold and attempts remain.
    Revise,
    /// Move on to `headline`, whether or not every draft passed.
    Exit,
}

/// Number of current drafts whose rubric fails the threshold.
pub fn below_threshold_count(state: &PipelineState) -> usize {
    state
        .drafts
        .iter()
        .filter(|d| d.rubric.as_ref().is_some_and(is_below_threshold))
        .count()
}

/// Decide the edge out of `assess`. Drafts without a rubric are ignored.
pub fn should_continue(state: &PipelineState, max_attempts: u32) -> GateDecision {
    if state.revision_count < max_attempts && below_threshold_count(state) > 0 {
        GateDecision::Revise
    } else {
        GateDecision::Exit
    }
}
