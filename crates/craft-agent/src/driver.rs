//! Drives a planner search on the async runtime.
//!
//! The search itself is synchronous. It runs in slices of `yield_every` iterations and hands
//! control back to the scheduler between slices, which is also where cancellation is seen.

use craft_core::FactTable;
use craft_goap::{Goal, PlanOutcome, Planner, SearchStatus};
use craft_trace::{emit_shared, SharedTraceSink, VecTraceSink};
use tokio_util::sync::CancellationToken;

/// Plan for an absolute `goal` from `state`, yielding every `yield_every` iterations.
///
/// Returns `None` if `cancel` fires before the search finishes. Planner trace events other
/// than per-node expansions are forwarded to `trace`.
pub async fn plan_cooperative(
    planner: &Planner,
    goal: &Goal,
    state: &FactTable,
    cancel: &CancellationToken,
    trace: Option<&SharedTraceSink>,
) -> Option<PlanOutcome> {
    let budget = planner.config().yield_every.max(1);
    let mut local = VecTraceSink::default();

    let outcome = {
        let mut search = planner.search(goal, state, &mut local);
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(goal = %goal, iterations = search.iterations(), "search cancelled");
                return None;
            }
            match search.step(budget) {
                SearchStatus::Done(outcome) => break outcome,
                SearchStatus::Pending => tokio::task::yield_now().await,
            }
        }
    };

    if let Some(sink) = trace {
        for event in local.events.into_iter().filter(|e| e.tag != "plan.expand") {
            emit_shared(sink, event);
        }
    }
    Some(outcome)
}
