use std::sync::Arc;

use craft_core::{ActionDomain, PlanStep, StateSchema};
use craft_goap::{PlanOutcome, Planner, StepAnalysis};
use craft_trace::SharedTraceSink;
use tokio_util::sync::CancellationToken;

use crate::{
    AgentConfig, ExecutionReport, Executor, ExecutorError, GoalResolver, ResolveError,
    ResolveReport, SkillRegistry, World,
};

/// One planner, executor, and resolver bound to one world.
///
/// Agents share nothing mutable with each other; run one per controlled entity.
pub struct Agent<W: World> {
    executor: Arc<Executor<W>>,
    resolver: GoalResolver<W>,
}

impl<W: World> Agent<W> {
    pub fn new(
        domain: Arc<ActionDomain>,
        schema: Arc<StateSchema>,
        skills: SkillRegistry<W>,
        world: Arc<W>,
        config: &AgentConfig,
        trace: Option<SharedTraceSink>,
    ) -> Result<Self, ExecutorError> {
        let planner = Planner::new(domain, schema).with_config(config.planner.clone());
        let mut executor = Executor::new(
            Arc::new(planner),
            Arc::new(skills),
            world,
            config.executor.clone(),
        )?;
        if let Some(trace) = trace.clone() {
            executor = executor.with_trace(trace);
        }

        let executor = Arc::new(executor);
        let mut resolver = GoalResolver::new(executor.clone(), config.resolver.clone());
        if let Some(trace) = trace {
            resolver = resolver.with_trace(trace);
        }

        tracing::debug!(
            actions = executor.planner().domain().len(),
            max_depth = config.resolver.max_depth,
            "agent ready"
        );
        Ok(Self { executor, resolver })
    }

    pub fn planner(&self) -> &Planner {
        self.executor.planner()
    }

    pub fn executor(&self) -> &Executor<W> {
        &self.executor
    }

    pub fn resolver(&self) -> &GoalResolver<W> {
        &self.resolver
    }

    /// Plan `input` from a fresh sample without executing anything.
    pub async fn plan(&self, input: &str) -> Result<PlanOutcome, ExecutorError> {
        let state = self.executor.sample().await?;
        Ok(self.planner().plan(input, &state))
    }

    pub async fn resolve_goal(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolveReport, ResolveError> {
        self.resolver.resolve_goal(input, cancel).await
    }

    /// Plan `input` once and execute it, without subgoal decomposition.
    pub async fn execute_goal(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ResolveError> {
        let state = self
            .executor
            .sample()
            .await
            .map_err(ResolveError::Execution)?;
        let goal = self
            .planner()
            .parse_goal(input)
            .map_err(|err| ResolveError::InvalidGoal {
                goal: input.to_string(),
                message: err.to_string(),
                diagnosis: craft_goap::Diagnosis::from_error(&err),
                goal_chain: vec![input.to_string()],
            })?
            .adjusted(&state);

        let outcome = self.planner().plan_for(&goal, &state);
        let Some(plan) = outcome.plan else {
            return Err(ResolveError::SearchExhausted {
                goal: input.to_string(),
                attempts: 1,
                diagnosis: outcome.diagnosis.unwrap_or_default(),
                goal_chain: vec![input.to_string()],
            });
        };
        self.executor.execute(plan, &goal, cancel).await.map_err(|err| match err {
            ExecutorError::Cancelled => ResolveError::Cancelled {
                goal: input.to_string(),
            },
            other => ResolveError::Execution(other),
        })
    }

    /// Whether `step` may run against the live world right now.
    pub async fn check_step_preconditions(&self, step: &PlanStep) -> Result<bool, ExecutorError> {
        let state = self.executor.sample().await?;
        Ok(self.planner().check_step_preconditions(step, &state))
    }

    pub async fn analyse_step_preconditions(
        &self,
        step: &PlanStep,
    ) -> Result<StepAnalysis, ExecutorError> {
        let state = self.executor.sample().await?;
        Ok(self.planner().analyse_step_preconditions(step, &state))
    }
}
