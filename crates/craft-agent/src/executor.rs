use std::sync::Arc;

use craft_core::{FactTable, PlanSpec};
use craft_goap::{Goal, Planner};
use craft_trace::{emit_shared, SharedTraceSink, TraceEvent};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::driver::plan_cooperative;
use crate::{ExecutorConfig, ExecutorError, SkillRegistry, World};

/// What one `execute` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Skill invocations that returned successfully.
    pub steps_executed: usize,
    pub replans: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplanCause {
    PreconditionDrift,
    SkillFailed,
    GoalUnmet,
}

impl ReplanCause {
    fn as_str(self) -> &'static str {
        match self {
            ReplanCause::PreconditionDrift => "precondition_drift",
            ReplanCause::SkillFailed => "skill_failed",
            ReplanCause::GoalUnmet => "goal_unmet",
        }
    }
}

/// Walks a plan step by step against the live world, replanning whenever reality diverges
/// from what the plan assumed.
pub struct Executor<W: World> {
    planner: Arc<Planner>,
    skills: Arc<SkillRegistry<W>>,
    world: Arc<W>,
    config: ExecutorConfig,
    trace: Option<SharedTraceSink>,
}

impl<W: World> Executor<W> {
    /// Fails if any action in the planner's domain names a skill the registry lacks.
    pub fn new(
        planner: Arc<Planner>,
        skills: Arc<SkillRegistry<W>>,
        world: Arc<W>,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutorError> {
        for action in planner.domain().actions() {
            if let Some(skill) = action.skill.as_deref() {
                if !skills.contains(skill) {
                    return Err(ExecutorError::UnknownSkill {
                        action: action.name.clone(),
                        skill: skill.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            planner,
            skills,
            world,
            config,
            trace: None,
        })
    }

    pub fn with_trace(mut self, trace: SharedTraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Sample the world and build a fact table from it.
    pub async fn sample(&self) -> Result<FactTable, ExecutorError> {
        let observation = self
            .world
            .observe()
            .await
            .map_err(|err| ExecutorError::Observation(format!("{err:#}")))?;
        Ok(self.planner.schema().build_state(&observation))
    }

    fn emit(&self, event: TraceEvent) {
        if let Some(trace) = self.trace.as_ref() {
            emit_shared(trace, event);
        }
    }

    /// Run `plan` until `goal` holds in the live world.
    ///
    /// `goal` must be absolute (already adjusted). Each step's preconditions are checked
    /// against a fresh sample before its skill runs; drift, a failing skill, or an unmet goal
    /// after the last step all replace the remaining plan with a new one from live state.
    pub async fn execute(
        &self,
        plan: PlanSpec,
        goal: &Goal,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ExecutorError> {
        let mut plan = plan;
        let mut index = 0usize;
        let mut report = ExecutionReport::default();

        loop {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }

            let Some(step) = plan.steps.get(index).cloned() else {
                let state = self.sample().await?;
                if goal.is_satisfied(&state) {
                    tracing::info!(
                        goal = %goal,
                        steps = report.steps_executed,
                        replans = report.replans,
                        "goal reached"
                    );
                    return Ok(report);
                }
                plan = self
                    .replan(goal, &state, ReplanCause::GoalUnmet, &mut report, cancel)
                    .await?;
                index = 0;
                continue;
            };

            let Some(skill_name) = step.skill.as_deref() else {
                index += 1; // goal marker
                continue;
            };

            let state = self.sample().await?;
            if !self.planner.check_step_preconditions(&step, &state) {
                let analysis = self.planner.analyse_step_preconditions(&step, &state);
                tracing::info!(
                    action = %step.action,
                    missing = ?analysis.missing.iter().map(|m| m.key.as_str()).collect::<Vec<_>>(),
                    "step preconditions no longer hold"
                );
                plan = self
                    .replan(goal, &state, ReplanCause::PreconditionDrift, &mut report, cancel)
                    .await?;
                index = 0;
                continue;
            }

            let skill = self
                .skills
                .get(skill_name)
                .ok_or_else(|| ExecutorError::UnknownSkill {
                    action: step.action.clone(),
                    skill: skill_name.to_string(),
                })?;

            self.emit(TraceEvent::new(index as u64, "exec.step").with_subject(step.action.clone()));
            tracing::debug!(step = index, action = %step.action, skill = skill_name, "invoking skill");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                result = skill.invoke(self.world(), &step.params) => result,
            };

            match result {
                Ok(()) => {
                    report.steps_executed += 1;
                    index += 1;
                }
                Err(err) => {
                    tracing::warn!(action = %step.action, error = %format!("{err:#}"), "skill failed");
                    self.emit(
                        TraceEvent::new(index as u64, "exec.skill_failed")
                            .with_subject(step.action.clone()),
                    );
                    let state = self.sample().await?;
                    plan = self
                        .replan(goal, &state, ReplanCause::SkillFailed, &mut report, cancel)
                        .await?;
                    index = 0;
                }
            }
        }
    }

    async fn replan(
        &self,
        goal: &Goal,
        state: &FactTable,
        cause: ReplanCause,
        report: &mut ExecutionReport,
        cancel: &CancellationToken,
    ) -> Result<PlanSpec, ExecutorError> {
        if let Some(limit) = self.config.max_replans {
            if report.replans >= limit {
                return Err(ExecutorError::ReplanLimit {
                    goal: goal.to_string(),
                    replans: report.replans,
                });
            }
        }
        report.replans += 1;

        self.emit(
            TraceEvent::new(u64::from(report.replans), "exec.replan")
                .with_subject(cause.as_str())
                .with_a(report.steps_executed as u64),
        );
        tracing::info!(goal = %goal, cause = cause.as_str(), replans = report.replans, "replanning");

        // A skill that fails without awaiting would otherwise spin here and starve whoever
        // holds the other end of `cancel` on a current-thread runtime.
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        let outcome = plan_cooperative(&self.planner, goal, state, cancel, self.trace.as_ref())
            .await
            .ok_or(ExecutorError::Cancelled)?;

        match outcome.plan {
            Some(plan) => Ok(plan),
            None => Err(ExecutorError::ReplanFailed {
                goal: goal.to_string(),
                diagnosis: outcome.diagnosis.unwrap_or_default(),
            }),
        }
    }
}
