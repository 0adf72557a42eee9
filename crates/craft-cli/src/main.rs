//! Craft CLI - offline planning against recorded observations.
//!
//! - `craft plan <goal>` - search for a plan, or explain why there is none
//! - `craft diagnose <goal>` - explain what blocks a goal without searching
//! - `craft check <action>` - check one action's preconditions against a state
//! - `craft validate` - load the domain and schema and summarise them

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use craft_agent::AgentConfig;
use craft_core::{ActionDomain, FactTable, Observation, PlanSpec, PreconditionStatus, StateSchema};
use craft_goap::{simulate_plan, Diagnosis, PlanOutcome, Planner, Suggestion};
use craft_trace::{TraceLog, TracingSink, VecTraceSink};

#[derive(Parser)]
#[command(name = "craft")]
#[command(about = "Goal-oriented planning over declarative action domains", version)]
struct Cli {
    /// Action domain (JSON array, or an object with an `actions` array)
    #[arg(short, long, global = true, default_value = "domain.json")]
    domain: PathBuf,

    /// State schema (JSON object keyed by fact)
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    /// Agent configuration (YAML); defaults apply when absent
    #[arg(short, long, global = true, default_value = "craft.yaml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a goal from an observed state
    Plan {
        /// `key:N`, `key:true|false`, a fact name, or an action name
        goal: String,

        /// Observation JSON; an empty world when omitted
        #[arg(long)]
        state: Option<PathBuf>,

        /// Replay the plan's effects and confirm the goal holds afterwards
        #[arg(long)]
        verify: bool,

        /// Print planner trace events
        #[arg(long)]
        trace: bool,
    },

    /// Explain what blocks a goal from an observed state
    Diagnose {
        goal: String,

        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Check one action's preconditions against an observed state
    Check {
        action: String,

        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Load the domain and schema and report what they declare
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let planner = load_planner(&cli)?;

    match cli.command {
        Commands::Plan {
            goal,
            state,
            verify,
            trace,
        } => plan(&planner, &goal, state.as_deref(), verify, trace, cli.json),
        Commands::Diagnose { goal, state } => diagnose(&planner, &goal, state.as_deref(), cli.json),
        Commands::Check { action, state } => check(&planner, &action, state.as_deref(), cli.json),
        Commands::Validate => validate(&planner, cli.json),
    }
}

fn load_planner(cli: &Cli) -> Result<Planner> {
    let config = AgentConfig::load_or_default(&cli.config)?;
    let domain = ActionDomain::from_path(&cli.domain)
        .with_context(|| format!("Failed to load action domain {}", cli.domain.display()))?;
    let schema = match cli.schema.as_deref() {
        Some(path) => StateSchema::from_path(path)
            .with_context(|| format!("Failed to load state schema {}", path.display()))?,
        None => StateSchema::new(),
    };

    tracing::debug!(
        actions = domain.len(),
        max_iterations = config.planner.max_iterations,
        "loaded domain"
    );
    Ok(Planner::new(domain.into(), schema.into()).with_config(config.planner))
}

fn load_state(planner: &Planner, path: Option<&Path>) -> Result<FactTable> {
    let observation = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read observation from {}", path.display()))?;
            serde_json::from_str::<Observation>(&content)
                .with_context(|| format!("Failed to parse observation from {}", path.display()))?
        }
        None => Observation::default(),
    };
    Ok(planner.schema().build_state(&observation))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plan(
    planner: &Planner,
    input: &str,
    state_path: Option<&Path>,
    verify: bool,
    trace: bool,
    json: bool,
) -> Result<()> {
    let state = load_state(planner, state_path)?;
    let goal = match planner.parse_goal(input) {
        Ok(goal) => goal.adjusted(&state),
        Err(err) => {
            let diagnosis = Diagnosis::from_error(&err);
            if json {
                print_json(&diagnosis)?;
            }
            bail!("{err}");
        }
    };

    let (outcome, log) = if trace {
        let mut sink = VecTraceSink::default();
        let outcome = planner.plan_traced(&goal, &state, &mut sink);
        (outcome, Some(sink.into_log()))
    } else {
        (planner.plan_traced(&goal, &state, &mut TracingSink), None)
    };

    if json {
        print_json(&PlanReport {
            outcome: &outcome,
            trace: log.as_ref(),
        })?;
    } else {
        for event in log.iter().flat_map(|log| &log.events) {
            println!(
                "  [{:>5}] {:<12} {} ({}, {})",
                event.seq, event.tag, event.subject, event.a, event.b
            );
        }
        match (&outcome.plan, &outcome.diagnosis) {
            (Some(plan), _) => print_plan(plan, outcome.iterations),
            (None, Some(diagnosis)) => print_diagnosis(diagnosis),
            (None, None) => {}
        }
    }

    let Some(plan) = outcome.plan else {
        bail!("no plan for `{input}`");
    };

    if verify {
        let end = simulate_plan(&plan, &state, planner.domain(), planner.schema())
            .context("Plan replay failed")?;
        if !goal.is_satisfied(&end) {
            bail!("plan replay does not reach `{goal}`");
        }
        tracing::info!(goal = %goal, "plan verified by replay");
    }
    Ok(())
}

fn diagnose(planner: &Planner, input: &str, state_path: Option<&Path>, json: bool) -> Result<()> {
    let state = load_state(planner, state_path)?;
    let diagnosis = match planner.parse_goal(input) {
        Ok(goal) => planner.diagnose(&goal.adjusted(&state), &state),
        Err(err) => Diagnosis::from_error(err),
    };

    if json {
        print_json(&diagnosis)
    } else {
        print_diagnosis(&diagnosis);
        Ok(())
    }
}

fn check(planner: &Planner, action: &str, state_path: Option<&Path>, json: bool) -> Result<()> {
    let state = load_state(planner, state_path)?;
    let Some(def) = planner.domain().get(action) else {
        bail!("unknown action `{action}`");
    };
    let analysis = planner.analyse_step_preconditions(&def.to_step(), &state);

    if json {
        return print_json(&analysis);
    }

    let verdict = if analysis.satisfied { "ready" } else { "blocked" };
    println!("{action}: {verdict}");
    for status in &analysis.checked {
        print_precondition(status);
    }
    Ok(())
}

#[derive(Serialize)]
struct PlanReport<'a> {
    #[serde(flatten)]
    outcome: &'a PlanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a TraceLog>,
}

#[derive(Serialize)]
struct DomainSummary<'a> {
    actions: Vec<&'a str>,
    skills: Vec<&'a str>,
    composites: Vec<(&'a str, &'a [String])>,
}

fn validate(planner: &Planner, json: bool) -> Result<()> {
    let domain = planner.domain();
    let summary = DomainSummary {
        actions: domain.actions().iter().map(|a| a.name.as_str()).collect(),
        skills: domain.skills(),
        composites: planner.schema().composites().collect(),
    };

    if json {
        return print_json(&summary);
    }

    println!("{} actions, {} skills", summary.actions.len(), summary.skills.len());
    println!("skills: {}", summary.skills.join(", "));
    for (key, deps) in &summary.composites {
        println!("composite {key} <- any of [{}]", deps.join(", "));
    }
    Ok(())
}

fn print_plan(plan: &PlanSpec, iterations: usize) {
    println!(
        "plan: {} steps, cost {:.1} ({} iterations)",
        plan.len(),
        plan.total_cost(),
        iterations
    );
    for (i, step) in plan.steps.iter().enumerate() {
        let skill = step.skill.as_deref().unwrap_or("-");
        println!("  {:>2}. {:<28} skill={skill} params={}", i + 1, step.action, step.params);
    }
}

fn print_diagnosis(diagnosis: &Diagnosis) {
    if let Some(error) = diagnosis.error.as_deref() {
        println!("error: {error}");
        return;
    }
    if let Some(failure) = diagnosis.failure {
        println!("no plan: {failure:?} after {} iterations", diagnosis.iterations);
    }
    for missing in &diagnosis.missing_requirements {
        let current = missing
            .current
            .as_ref()
            .map_or_else(|| "absent".to_string(), ToString::to_string);
        println!("missing {}: have {current}, need {}", missing.key, missing.target);
    }
    for suggestion in &diagnosis.suggestions {
        match suggestion {
            Suggestion::Action {
                for_key,
                action,
                cost,
                preconditions,
            } => {
                println!("  {action} (cost {cost:.1}) -> {for_key}");
                for status in preconditions {
                    print_precondition(status);
                }
            }
            Suggestion::ComputedState { key, alternatives } => {
                println!("  {key} holds once any of [{}] does", alternatives.join(", "));
            }
        }
    }
}

fn print_precondition(status: &PreconditionStatus) {
    let mark = if status.satisfied { "ok" } else { "--" };
    let current = status
        .current
        .as_ref()
        .map_or_else(|| "absent".to_string(), ToString::to_string);
    println!("      [{mark}] {} {} (have {current})", status.key, status.required);
}
