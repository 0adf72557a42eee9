//! Recursive goal resolution.
//!
//! One level runs plan -> execute. When planning fails, the level tries the goal for a single
//! unit first, then reads the diagnosis, picks exactly one blocking requirement, resolves
//! it one level deeper, and retries its own goal. Failures deeper down propagate up with the
//! chain of goals that led there.

use std::sync::Arc;

use craft_core::{is_environmental, Condition, FactTable, PreconditionStatus};
use craft_goap::{Diagnosis, Goal, Planner, Suggestion};
use craft_trace::{emit_shared, SharedTraceSink, TraceEvent};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::driver::plan_cooperative;
use crate::{Executor, ExecutorError, ResolveError, ResolverConfig, World};

/// Totals across every level of one `resolve_goal` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Planning attempts, summed over levels.
    pub attempts: usize,
    /// Subgoals handed to a deeper level, reduce-to-one retries excluded.
    pub subgoals: usize,
    pub steps_executed: usize,
    pub replans: u32,
}

/// Outcome of reading a diagnosis for the next thing to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Extraction {
    Subgoal(String),
    Environmental(String),
    Nothing,
}

pub struct GoalResolver<W: World> {
    executor: Arc<Executor<W>>,
    config: ResolverConfig,
    trace: Option<SharedTraceSink>,
}

impl<W: World> GoalResolver<W> {
    pub fn new(executor: Arc<Executor<W>>, config: ResolverConfig) -> Self {
        Self {
            executor,
            config,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SharedTraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn planner(&self) -> &Planner {
        self.executor.planner()
    }

    fn emit(&self, event: TraceEvent) {
        if let Some(trace) = self.trace.as_ref() {
            emit_shared(trace, event);
        }
    }

    /// Bring the world to a state satisfying `input`, decomposing into subgoals as needed.
    pub async fn resolve_goal(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolveReport, ResolveError> {
        let mut report = ResolveReport::default();
        self.resolve_at(input.to_string(), 0, cancel, &mut report)
            .await?;
        tracing::info!(
            goal = input,
            attempts = report.attempts,
            subgoals = report.subgoals,
            steps = report.steps_executed,
            "goal resolved"
        );
        Ok(report)
    }

    /// One level of decomposition. The goal is made absolute once on entry; every retry at
    /// this level, including the one after a single-unit subgoal succeeds, keeps that
    /// original target.
    fn resolve_at<'a>(
        &'a self,
        input: String,
        depth: usize,
        cancel: &'a CancellationToken,
        report: &'a mut ResolveReport,
    ) -> BoxFuture<'a, Result<(), ResolveError>> {
        async move {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled { goal: input });
            }

            let state = self.observe(&input).await?;

            if depth > self.config.max_depth {
                tracing::warn!(goal = %input, depth, max_depth = self.config.max_depth, "depth limit exceeded");
                let diagnosis = self.diagnose_input(&input, &state);
                return Err(ResolveError::DepthExceeded {
                    max_depth: self.config.max_depth,
                    diagnosis,
                    goal_chain: vec![input.clone()],
                    goal: input,
                });
            }

            self.emit(TraceEvent::new(depth as u64, "resolve.start").with_subject(input.clone()));
            tracing::debug!(goal = %input, depth, "resolving");

            let requested = match self.planner().parse_goal(&input) {
                Ok(goal) => goal,
                Err(err) => {
                    return Err(ResolveError::InvalidGoal {
                        message: err.to_string(),
                        diagnosis: Diagnosis::from_error(&err),
                        goal_chain: vec![input.clone()],
                        goal: input,
                    });
                }
            };
            // Retries after a partial unlock still aim at this target instead of asking for more.
            let goal = requested.adjusted(&state);

            let mut attempts = 0usize;
            let mut reduced = false;
            loop {
                if cancel.is_cancelled() {
                    return Err(ResolveError::Cancelled { goal: input });
                }

                let state = self.observe(&input).await?;
                if goal.is_satisfied(&state) {
                    self.emit(
                        TraceEvent::new(depth as u64, "resolve.done")
                            .with_subject(input.clone())
                            .with_a(attempts as u64),
                    );
                    return Ok(());
                }

                if attempts >= self.config.max_attempts_per_level {
                    tracing::warn!(goal = %input, depth, attempts, "attempt limit reached");
                    return Err(ResolveError::SearchExhausted {
                        attempts,
                        diagnosis: self.planner().diagnose(&goal, &state),
                        goal_chain: vec![input.clone()],
                        goal: input,
                    });
                }
                attempts += 1;
                report.attempts += 1;

                let diagnosis = match self.plan_and_execute(&goal, &state, cancel, report).await {
                    Ok(()) => continue, // re-checked against a fresh sample above
                    Err(Attempt::Failed(diagnosis)) => diagnosis,
                    Err(Attempt::Fatal(err)) => return Err(err.with_goal(&input)),
                };

                if self.config.reduce_to_one && !reduced {
                    if let Some((key, n)) = requested.single_quantity() {
                        if n > 1 {
                            reduced = true;
                            let single = format!("{key}:1");
                            self.emit(
                                TraceEvent::new(depth as u64, "resolve.reduce_to_one")
                                    .with_subject(single.clone()),
                            );
                            match self.resolve_at(single, depth + 1, cancel, &mut *report).await {
                                Ok(()) => continue,
                                Err(err) if err.is_cancelled() => return Err(err),
                                Err(err) => {
                                    tracing::debug!(goal = %input, error = %err, "reduce-to-one failed, diagnosing");
                                }
                            }
                        }
                    }
                }

                let state = self.observe(&input).await?;
                let subgoal = match self.extract_subgoal(&diagnosis, &state) {
                    Extraction::Subgoal(subgoal) => subgoal,
                    Extraction::Environmental(key) => {
                        tracing::info!(goal = %input, missing = %key, "environmental blocker");
                        return Err(ResolveError::EnvironmentalBlocker {
                            missing_environment: key,
                            diagnosis,
                            goal_chain: vec![input.clone()],
                            goal: input,
                        });
                    }
                    Extraction::Nothing => {
                        return Err(ResolveError::NoSubgoal {
                            diagnosis,
                            goal_chain: vec![input.clone()],
                            goal: input,
                        });
                    }
                };

                report.subgoals += 1;
                self.emit(
                    TraceEvent::new(depth as u64, "resolve.subgoal")
                        .with_subject(subgoal.clone())
                        .with_a(depth as u64 + 1),
                );
                tracing::info!(goal = %input, subgoal = %subgoal, depth = depth + 1, "descending");

                if let Err(err) = self.resolve_at(subgoal, depth + 1, cancel, &mut *report).await {
                    return Err(err.with_parent_goal(&input));
                }
            }
        }
        .boxed()
    }

    async fn observe(&self, input: &str) -> Result<FactTable, ResolveError> {
        self.executor.sample().await.map_err(|err| match err {
            ExecutorError::Observation(message) => ResolveError::Observation {
                goal: input.to_string(),
                message,
                goal_chain: vec![input.to_string()],
            },
            other => ResolveError::Execution(other),
        })
    }

    async fn plan_and_execute(
        &self,
        goal: &Goal,
        state: &FactTable,
        cancel: &CancellationToken,
        report: &mut ResolveReport,
    ) -> Result<(), Attempt> {
        let outcome = plan_cooperative(self.planner(), goal, state, cancel, self.trace.as_ref())
            .await
            .ok_or(Attempt::Fatal(ExecutorError::Cancelled))?;

        let Some(plan) = outcome.plan else {
            return Err(Attempt::Failed(outcome.diagnosis.unwrap_or_default()));
        };

        match self.executor.execute(plan, goal, cancel).await {
            Ok(exec) => {
                report.steps_executed += exec.steps_executed;
                report.replans += exec.replans;
                Ok(())
            }
            Err(ExecutorError::ReplanFailed { diagnosis, .. }) => Err(Attempt::Failed(diagnosis)),
            Err(ExecutorError::ReplanLimit { replans, .. }) => {
                report.replans += replans;
                let state = self
                    .executor
                    .sample()
                    .await
                    .map_err(Attempt::Fatal)?;
                Err(Attempt::Failed(self.planner().diagnose(goal, &state)))
            }
            Err(err) => Err(Attempt::Fatal(err)),
        }
    }

    fn diagnose_input(&self, input: &str, state: &FactTable) -> Diagnosis {
        match self.planner().parse_goal(input) {
            Ok(goal) => self.planner().diagnose(&goal.adjusted(state), state),
            Err(err) => Diagnosis::from_error(err),
        }
    }

    /// Pick the single next thing to resolve from a failed plan's diagnosis.
    ///
    /// Action suggestions are read cheapest first. A suggestion blocked by an environment
    /// fact is skipped; otherwise its first unsatisfied precondition becomes the subgoal,
    /// with composite facts replaced by their cheapest dependency. With no usable action,
    /// a composite goal key falls back to its cheapest dependency. Environment facts are
    /// never turned into subgoals.
    pub(crate) fn extract_subgoal(&self, diagnosis: &Diagnosis, state: &FactTable) -> Extraction {
        let mut blocker: Option<String> = None;

        for suggestion in diagnosis.action_suggestions() {
            let Suggestion::Action { preconditions, .. } = suggestion else {
                continue;
            };
            if let Some(env) = preconditions
                .iter()
                .find(|p| !p.satisfied && is_environmental(&p.key))
            {
                blocker.get_or_insert_with(|| env.key.clone());
                continue;
            }
            if let Some(subgoal) = suggestion
                .first_unsatisfied()
                .and_then(|p| self.subgoal_for(p, state))
            {
                return Extraction::Subgoal(subgoal);
            }
        }

        for suggestion in diagnosis.computed_suggestions() {
            let Suggestion::ComputedState { key, .. } = suggestion else {
                continue;
            };
            if let Some(dep) = self.planner().cheapest_dependency(key, state) {
                return Extraction::Subgoal(self.dependency_goal(&dep));
            }
        }

        if let Some(key) = blocker {
            return Extraction::Environmental(key);
        }
        diagnosis
            .missing_requirements
            .iter()
            .find(|m| is_environmental(&m.key))
            .map_or(Extraction::Nothing, |m| Extraction::Environmental(m.key.clone()))
    }

    fn subgoal_for(&self, status: &PreconditionStatus, state: &FactTable) -> Option<String> {
        if self.planner().schema().is_composite(&status.key) {
            let dep = self.planner().cheapest_dependency(&status.key, state)?;
            return Some(self.dependency_goal(&dep));
        }
        match &status.required {
            Condition::Bool(b) => Some(format!("{}:{b}", status.key)),
            Condition::Compare { .. } => status
                .shortage()
                .map(|shortage| format!("{}:{shortage}", status.key)),
            Condition::Text(_) => None,
        }
    }

    fn dependency_goal(&self, dep: &str) -> String {
        if self.planner().schema().is_composite(dep) {
            dep.to_string()
        } else {
            format!("{dep}:1")
        }
    }
}

/// Why one plan-and-execute attempt did not finish the level.
enum Attempt {
    /// Recoverable: decompose using this diagnosis.
    Failed(Diagnosis),
    Fatal(ExecutorError),
}

impl ExecutorError {
    fn with_goal(self, goal: &str) -> ResolveError {
        match self {
            ExecutorError::Cancelled => ResolveError::Cancelled {
                goal: goal.to_string(),
            },
            ExecutorError::Observation(message) => ResolveError::Observation {
                goal: goal.to_string(),
                message,
                goal_chain: vec![goal.to_string()],
            },
            other => ResolveError::Execution(other),
        }
    }
}
