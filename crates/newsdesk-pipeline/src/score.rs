//! Rubric aggregation and the pass/fail predicate.
//!
//! The mean ranks candidates; the gate decision is driven by the worst
//! criterion, so a draft cannot pass on average while failing one dimension.

use newsdesk_types::Rubric;

/// A criterion scoring at or below this value fails the gate.
pub const CUTOFF: f64 = 8.0;

/// Arithmetic mean of all sub-scores; `0.0` for an empty rubric.
pub fn aggregate_score(rubric: &Rubric) -> f64 {
    if rubric.is_empty() {
        return 0.0;
    }
    rubric.scores().sum::<f64>() / rubric.len() as f64
}

/// `true` iff any single criterion is <= [`CUTOFF`].
pub fn is_below_threshold(rubric: &Rubric) -> bool {
    rubric.scores().any(|s| s <= CUTOFF)
}
