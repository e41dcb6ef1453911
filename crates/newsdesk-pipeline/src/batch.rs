//! Per-item failure isolation for collection stages.
//!
//! Every stage that works over a list of records runs its per-item transform
//! through [`process_batch`]. One item failing never aborts the batch: the
//! failure is logged with the item's identity and the item is dropped from
//! the stage's output. Surviving outputs keep their input order. There are no
//! retries at this layer.

use std::future::Future;

use newsdesk_types::{Identified, ItemId, NewsdeskError, Result, Stage};

use crate::events::{EventEmitter, PipelineEvent};

/// An item dropped from a stage's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub item: ItemId,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchOutput<O> {
    pub outputs: Vec<O>,
    pub failures: Vec<ItemFailure>,
    /// Items the transform deliberately declined (`Ok(None)`).
    pub rejected: usize,
}

/// Run `transform` over `items` sequentially.
///
/// The transform returns `Ok(Some(out))` to keep an output, `Ok(None)` to
/// decline the item, or `Err` for an item-level failure. Errors classified as
/// fatal ([`NewsdeskError::is_fatal`]) concern the whole run, not the item,
/// and are returned immediately.
pub async fn process_batch<'a, I, O, F, Fut>(
    stage: Stage,
    items: &'a [I],
    events: &EventEmitter,
    mut transform: F,
) -> Result<BatchOutput<O>>
where
    I: Identified,
    F: FnMut(&'a I) -> Fut,
    Fut: Future<Output = Result<Option<O>>>,
{
    let mut outputs = Vec::with_capacity(items.len());
    let mut failures = Vec::new();
    let mut rejected = 0;

    for item in items {
        let id = item.identity();
        match transform(item).await {
            Ok(Some(out)) => outputs.push(out),
            Ok(None) => {
                rejected += 1;
                tracing::debug!(stage = %stage, item = %id, "Item declined");
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(stage = %stage, item = %id, error = %e, "Item failed, dropping");
                events.emit(PipelineEvent::ItemFailed {
                    stage,
                    item: id,
                    error: e.to_string(),
                });
                failures.push(ItemFailure {
                    item: id,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        stage = %stage,
        input = items.len(),
        output = outputs.len(),
        failed = failures.len(),
        rejected,
        "Batch processed"
    );

    Ok(BatchOutput {
        outputs,
        failures,
        rejected,
    })
}

/// Shorthand for an item-level failure raised inside a transform.
pub(crate) fn item_error(stage: Stage, message: impl Into<String>) -> NewsdeskError {
    NewsdeskError::StageError {
        stage,
        message: message.into(),
    }
}
