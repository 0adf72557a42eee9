use core::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

use craft_core::{
    analyse_preconditions, apply_effects, ActionDomain, Condition, FactTable, PlanSpec,
    PlanStep, PreconditionStatus, StateSchema,
};
use craft_trace::{NullTraceSink, TraceEvent, TraceSink};
use serde::{Deserialize, Serialize};

use crate::diagnosis::{diagnose, Diagnosis, SearchFailure};
use crate::heuristic::{presence_condition, Estimator};
use crate::relevance::relevant_actions;
use crate::Goal;

/// Upper bounds on accumulated counts during search.
///
/// A successor is rejected when an action pushes a capped count above its bound. The
/// effective bound for a key is never below the goal's own target or the starting count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceCaps {
    /// Applies to every `inventory.*` key without an explicit entry.
    pub inventory_cap: Option<i64>,
    pub per_key: BTreeMap<String, i64>,
}

impl Default for ResourceCaps {
    fn default() -> Self {
        Self {
            inventory_cap: Some(512),
            per_key: BTreeMap::new(),
        }
    }
}

impl ResourceCaps {
    pub fn unbounded() -> Self {
        Self {
            inventory_cap: None,
            per_key: BTreeMap::new(),
        }
    }

    pub fn cap_for(&self, key: &str) -> Option<i64> {
        self.per_key.get(key).copied().or_else(|| {
            key.starts_with("inventory.")
                .then_some(self.inventory_cap)
                .flatten()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Nodes popped before the search gives up.
    pub max_iterations: usize,
    /// Drop actions that cannot contribute to the goal before searching.
    pub prune_irrelevant: bool,
    /// Iterations between cooperative yields when driven asynchronously.
    pub yield_every: usize,
    pub resource_caps: ResourceCaps,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            prune_irrelevant: true,
            yield_every: 256,
            resource_caps: ResourceCaps::default(),
        }
    }
}

/// Result of one planning call. Exactly one of `plan` and `diagnosis` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: Option<PlanSpec>,
    pub diagnosis: Option<Diagnosis>,
    pub iterations: usize,
}

impl PlanOutcome {
    pub fn found(plan: PlanSpec, iterations: usize) -> Self {
        Self {
            plan: Some(plan),
            diagnosis: None,
            iterations,
        }
    }

    pub fn failed(diagnosis: Diagnosis, iterations: usize) -> Self {
        Self {
            plan: None,
            diagnosis: Some(diagnosis),
            iterations,
        }
    }

    pub fn is_found(&self) -> bool {
        self.plan.is_some()
    }
}

/// Precondition report for one plan step against live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAnalysis {
    pub action: String,
    pub satisfied: bool,
    /// The step names an action the domain does not define.
    pub unknown_action: bool,
    pub checked: Vec<PreconditionStatus>,
    pub missing: Vec<PreconditionStatus>,
}

/// Forward A* planner over fact tables.
#[derive(Debug, Clone)]
pub struct Planner {
    domain: Arc<ActionDomain>,
    schema: Arc<StateSchema>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(domain: Arc<ActionDomain>, schema: Arc<StateSchema>) -> Self {
        Self {
            domain,
            schema,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn domain(&self) -> &ActionDomain {
        &self.domain
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn parse_goal(&self, input: &str) -> Result<Goal, crate::GoalError> {
        Goal::parse(input, &self.domain, &self.schema)
    }

    /// Parse `input`, adjust it against `state`, and search.
    ///
    /// Malformed or unknown goals come back as a diagnosis carrying only `error`.
    pub fn plan(&self, input: &str, state: &FactTable) -> PlanOutcome {
        match self.parse_goal(input) {
            Ok(goal) => self.plan_for(&goal.adjusted(state), state),
            Err(err) => {
                tracing::debug!(goal = input, error = %err, "rejected goal");
                PlanOutcome::failed(Diagnosis::from_error(err), 0)
            }
        }
    }

    /// Search for an absolute goal (already adjusted).
    pub fn plan_for(&self, goal: &Goal, state: &FactTable) -> PlanOutcome {
        let mut sink = NullTraceSink;
        self.plan_traced(goal, state, &mut sink)
    }

    pub fn plan_traced(
        &self,
        goal: &Goal,
        state: &FactTable,
        sink: &mut dyn TraceSink,
    ) -> PlanOutcome {
        let mut search = self.search(goal, state, sink);
        loop {
            if let SearchStatus::Done(outcome) = search.step(usize::MAX) {
                return outcome;
            }
        }
    }

    /// Start a resumable search. Drive it with [`Search::step`].
    pub fn search<'p, 's>(
        &'p self,
        goal: &Goal,
        state: &FactTable,
        sink: &'s mut dyn TraceSink,
    ) -> Search<'p, 's> {
        Search::new(self, goal.clone(), state.clone(), sink)
    }

    /// Heuristic cost of making `key` satisfy `condition` from `state`, using every action.
    pub fn estimate(&self, key: &str, condition: &Condition, state: &FactTable) -> f64 {
        let mut estimator = Estimator::new(self.domain.actions().iter().collect(), &self.schema);
        estimator.estimate(key, condition, state)
    }

    /// Heuristic value of `state` for `goal`, using every action.
    pub fn heuristic(&self, goal: &Goal, state: &FactTable) -> f64 {
        let mut estimator = Estimator::new(self.domain.actions().iter().collect(), &self.schema);
        estimator.goal_cost(goal, state)
    }

    /// Cheapest dependency of a composite fact by heuristic estimate; ties keep declaration
    /// order.
    pub fn cheapest_dependency(&self, key: &str, state: &FactTable) -> Option<String> {
        let deps = self.schema.dependencies(key)?;
        let mut best: Option<(&String, f64)> = None;
        for dep in deps {
            let cost = self.estimate(dep, &presence_condition(&self.schema, dep), state);
            if best.is_none_or(|(_, b)| cost < b) {
                best = Some((dep, cost));
            }
        }
        best.map(|(dep, _)| dep.clone())
    }

    pub fn diagnose(&self, goal: &Goal, state: &FactTable) -> Diagnosis {
        diagnose(goal, state, &self.domain, &self.schema)
    }

    /// Whether a step may run against live state. Goal markers always may.
    pub fn check_step_preconditions(&self, step: &PlanStep, state: &FactTable) -> bool {
        if step.is_goal_marker() {
            return true;
        }
        self.domain
            .get(&step.action)
            .is_some_and(|action| action.is_applicable(state))
    }

    pub fn analyse_step_preconditions(&self, step: &PlanStep, state: &FactTable) -> StepAnalysis {
        let Some(action) = self.domain.get(&step.action) else {
            return StepAnalysis {
                action: step.action.clone(),
                satisfied: step.is_goal_marker(),
                unknown_action: true,
                checked: Vec::new(),
                missing: Vec::new(),
            };
        };

        let analysis = analyse_preconditions(&action.preconditions, state);
        let missing = analysis.missing().cloned().collect();
        StepAnalysis {
            action: step.action.clone(),
            satisfied: step.is_goal_marker() || analysis.satisfied,
            unknown_action: false,
            checked: analysis.checked,
            missing,
        }
    }
}

#[derive(Debug)]
pub enum SearchStatus {
    /// Budget spent; call `step` again.
    Pending,
    Done(PlanOutcome),
}

struct SearchNode {
    state: FactTable,
    g: f64,
    parent: Option<usize>,
    action: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    g: f64,
    tie: u64,
    node: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap on (f, insertion order).
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.tie.cmp(&self.tie))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One planning call in progress. Owns its frontier and visited map; nothing is shared
/// between calls.
pub struct Search<'p, 's> {
    planner: &'p Planner,
    goal: Goal,
    start: FactTable,
    sink: &'s mut dyn TraceSink,
    relevant: Vec<usize>,
    caps: HashMap<String, i64>,
    open: BinaryHeap<OpenNode>,
    nodes: Vec<SearchNode>,
    best_g: HashMap<FactTable, f64>,
    iterations: usize,
    tie: u64,
    outcome: Option<PlanOutcome>,
}

impl<'p, 's> Search<'p, 's> {
    fn new(planner: &'p Planner, goal: Goal, start: FactTable, sink: &'s mut dyn TraceSink) -> Self {
        let domain = planner.domain();
        let relevant = if planner.config.prune_irrelevant {
            relevant_actions(goal.keys(), domain, planner.schema())
        } else {
            (0..domain.len()).collect()
        };

        let caps = Self::effective_caps(planner, &goal, &start, &relevant);

        let mut search = Self {
            planner,
            goal,
            start,
            sink,
            relevant,
            caps,
            open: BinaryHeap::new(),
            nodes: Vec::new(),
            best_g: HashMap::new(),
            iterations: 0,
            tie: 0,
            outcome: None,
        };

        search.sink.emit(
            TraceEvent::new(0, "plan.start")
                .with_subject(search.goal.to_string())
                .with_a(search.relevant.len() as u64)
                .with_b(domain.len() as u64),
        );

        if search.goal.is_satisfied(&search.start) {
            search.outcome = Some(PlanOutcome::found(PlanSpec::default(), 0));
        } else {
            let h = search.h(&search.start);
            search.best_g.insert(search.start.clone(), 0.0);
            search.nodes.push(SearchNode {
                state: search.start.clone(),
                g: 0.0,
                parent: None,
                action: None,
            });
            search.push(0, 0.0, h);
        }
        search
    }

    fn effective_caps(
        planner: &Planner,
        goal: &Goal,
        start: &FactTable,
        relevant: &[usize],
    ) -> HashMap<String, i64> {
        let caps = &planner.config.resource_caps;
        let actions = planner.domain().actions();
        let mut out = HashMap::new();
        for &idx in relevant {
            for (key, effect) in &actions[idx].effects {
                if !effect.is_positive() || out.contains_key(key) {
                    continue;
                }
                let Some(cap) = caps.cap_for(key) else {
                    continue;
                };
                let goal_target = goal.target(key).and_then(|t| t.as_number()).unwrap_or(0);
                out.insert(key.clone(), cap.max(goal_target).max(start.count(key)));
            }
        }
        out
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    fn h(&self, state: &FactTable) -> f64 {
        let domain = self.planner.domain();
        let actions = self.relevant.iter().map(|&i| &domain.actions()[i]).collect();
        Estimator::new(actions, self.planner.schema()).goal_cost(&self.goal, state)
    }

    fn push(&mut self, node: usize, g: f64, h: f64) {
        self.open.push(OpenNode {
            f: g + h,
            g,
            tie: self.tie,
            node,
        });
        self.tie += 1;
    }

    fn exceeds_caps(&self, action: usize, state: &FactTable) -> bool {
        self.planner.domain().actions()[action]
            .effects
            .iter()
            .filter(|(_, effect)| effect.is_positive())
            .any(|(key, _)| {
                self.caps
                    .get(key)
                    .is_some_and(|&cap| state.count(key) > cap)
            })
    }

    fn reconstruct(&self, mut idx: usize) -> PlanSpec {
        let actions = self.planner.domain().actions();
        let mut steps = Vec::new();
        while let Some(node) = self.nodes.get(idx) {
            let (Some(parent), Some(action)) = (node.parent, node.action) else {
                break;
            };
            steps.push(actions[action].to_step());
            idx = parent;
        }
        steps.reverse();
        PlanSpec::new(steps)
    }

    fn fail(&mut self, failure: SearchFailure) -> PlanOutcome {
        let mut diagnosis = self.planner.diagnose(&self.goal, &self.start);
        diagnosis.failure = Some(failure);
        diagnosis.iterations = self.iterations;
        self.sink.emit(
            TraceEvent::new(self.iterations as u64, "plan.failed")
                .with_subject(self.goal.to_string())
                .with_a(self.iterations as u64)
                .with_b(self.nodes.len() as u64),
        );
        tracing::debug!(
            goal = %self.goal,
            iterations = self.iterations,
            ?failure,
            "no plan found"
        );
        PlanOutcome::failed(diagnosis, self.iterations)
    }

    /// Run at most `budget` iterations.
    pub fn step(&mut self, budget: usize) -> SearchStatus {
        if let Some(outcome) = self.outcome.as_ref() {
            return SearchStatus::Done(outcome.clone());
        }

        let max_iterations = self.planner.config.max_iterations;
        let mut spent = 0usize;
        while spent < budget {
            spent += 1;

            let Some(open) = self.open.pop() else {
                let outcome = self.fail(SearchFailure::FrontierEmpty);
                self.outcome = Some(outcome.clone());
                return SearchStatus::Done(outcome);
            };

            if self.iterations >= max_iterations {
                let outcome = self.fail(SearchFailure::IterationLimit);
                self.outcome = Some(outcome.clone());
                return SearchStatus::Done(outcome);
            }
            self.iterations += 1;

            let best = self
                .best_g
                .get(&self.nodes[open.node].state)
                .copied()
                .unwrap_or(f64::INFINITY);
            if open.g > best {
                continue; // stale heap entry
            }

            if self.goal.is_satisfied(&self.nodes[open.node].state) {
                let plan = self.reconstruct(open.node);
                self.sink.emit(
                    TraceEvent::new(self.iterations as u64, "plan.found")
                        .with_subject(self.goal.to_string())
                        .with_a(plan.len() as u64)
                        .with_b(self.iterations as u64),
                );
                tracing::debug!(
                    goal = %self.goal,
                    steps = plan.len(),
                    iterations = self.iterations,
                    "plan found"
                );
                let outcome = PlanOutcome::found(plan, self.iterations);
                self.outcome = Some(outcome.clone());
                return SearchStatus::Done(outcome);
            }

            self.expand(open.node);
        }

        SearchStatus::Pending
    }

    fn expand(&mut self, idx: usize) {
        let state = self.nodes[idx].state.clone();
        let g = self.nodes[idx].g;
        let planner: &'p Planner = self.planner;
        let domain = planner.domain();
        let schema = planner.schema();
        let mut pushed = 0u64;

        for i in 0..self.relevant.len() {
            let action_idx = self.relevant[i];
            let action = &domain.actions()[action_idx];
            if !action.is_applicable(&state) {
                continue;
            }

            let next = apply_effects(&action.effects, &state, schema);
            if next == state {
                continue;
            }
            if self.exceeds_caps(action_idx, &next) {
                continue;
            }

            let next_g = g + action.cost;
            if let Some(&prev) = self.best_g.get(&next) {
                if next_g >= prev {
                    continue;
                }
            }

            let h = self.h(&next);
            self.best_g.insert(next.clone(), next_g);
            self.nodes.push(SearchNode {
                state: next,
                g: next_g,
                parent: Some(idx),
                action: Some(action_idx),
            });
            let node = self.nodes.len() - 1;
            self.push(node, next_g, h);
            pushed += 1;
        }

        self.sink.emit(
            TraceEvent::new(self.iterations as u64, "plan.expand")
                .with_subject(self.goal.input.clone())
                .with_a(pushed)
                .with_b(self.open.len() as u64),
        );
    }
}

/// Why replaying a plan against a model state failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("step {index} names unknown action `{action}`")]
    UnknownAction { index: usize, action: String },

    #[error("step {index} (`{action}`) is not applicable: {missing:?}")]
    NotApplicable {
        index: usize,
        action: String,
        missing: Vec<String>,
    },
}

/// Replay a plan's effects in order from `state`, checking every precondition on the way.
pub fn simulate_plan(
    plan: &PlanSpec,
    state: &FactTable,
    domain: &ActionDomain,
    schema: &StateSchema,
) -> Result<FactTable, SimulationError> {
    let mut current = state.clone();
    for (index, step) in plan.steps.iter().enumerate() {
        let action = domain
            .get(&step.action)
            .ok_or_else(|| SimulationError::UnknownAction {
                index,
                action: step.action.clone(),
            })?;
        let analysis = analyse_preconditions(&action.preconditions, &current);
        if !analysis.satisfied {
            return Err(SimulationError::NotApplicable {
                index,
                action: step.action.clone(),
                missing: analysis.missing().map(|s| s.key.clone()).collect(),
            });
        }
        current = apply_effects(&action.effects, &current, schema);
    }
    Ok(current)
}
