mod common;

use std::sync::Arc;

use craft_agent::{AgentConfig, ExecutorError};
use craft_goap::Goal;
use tokio_util::sync::CancellationToken;

use common::{agent, recorder, subjects, SimWorld};

async fn goal_for(agent: &craft_agent::Agent<SimWorld>, input: &str) -> Goal {
    let state = agent.executor().sample().await.unwrap();
    agent.planner().parse_goal(input).unwrap().adjusted(&state)
}

#[tokio::test]
async fn executes_a_plan_without_replanning() {
    let world = Arc::new(SimWorld::forest());
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &AgentConfig::default(), Some(trace));

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    let goal = goal_for(&agent, "inventory.stick:4").await;
    let report = agent
        .executor()
        .execute(plan, &goal, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.steps_executed, 3);
    assert_eq!(report.replans, 0);
    assert_eq!(world.count("stick"), 4);
    assert_eq!(
        subjects(&events, "exec.step"),
        vec!["gather_oak_log", "craft_oak_planks", "craft_sticks"]
    );
}

#[tokio::test]
async fn precondition_drift_triggers_one_replan() {
    let world = Arc::new(SimWorld::forest());
    // The log disappears before the planks step gets to use it.
    world.after("gather_oak_log", |obs| {
        obs.inventory.insert("oak_log".into(), 0);
    });
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &AgentConfig::default(), Some(trace));

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    assert_eq!(
        plan.action_names(),
        vec!["gather_oak_log", "craft_oak_planks", "craft_sticks"]
    );

    let goal = goal_for(&agent, "inventory.stick:4").await;
    let report = agent
        .executor()
        .execute(plan, &goal, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.replans, 1);
    assert_eq!(subjects(&events, "exec.replan"), vec!["precondition_drift"]);
    assert!(world.count("stick") >= 4);
    assert_eq!(
        world.performed(),
        vec!["gather_oak_log", "gather_oak_log", "craft_oak_planks", "craft_sticks"]
    );
}

#[tokio::test]
async fn failing_skill_is_absorbed_by_replanning() {
    let world = Arc::new(SimWorld::forest());
    world.fail("craft_oak_planks", 1);
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &AgentConfig::default(), Some(trace));

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    let goal = goal_for(&agent, "inventory.stick:4").await;
    let report = agent
        .executor()
        .execute(plan, &goal, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.replans, 1);
    assert_eq!(subjects(&events, "exec.skill_failed"), vec!["craft_oak_planks"]);
    assert_eq!(subjects(&events, "exec.replan"), vec!["skill_failed"]);
    assert_eq!(world.count("stick"), 4);
}

#[tokio::test]
async fn unmet_goal_after_the_last_step_replans() {
    let world = Arc::new(SimWorld::forest());
    world.after("craft_sticks", |obs| {
        obs.inventory.insert("stick".into(), 0);
    });
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &AgentConfig::default(), Some(trace));

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    let goal = goal_for(&agent, "inventory.stick:4").await;
    let report = agent
        .executor()
        .execute(plan, &goal, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(subjects(&events, "exec.replan"), vec!["goal_unmet"]);
    assert_eq!(report.steps_executed, 4);
    assert_eq!(world.count("stick"), 4);
}

#[tokio::test]
async fn replan_limit_stops_a_skill_that_keeps_failing() {
    let world = Arc::new(SimWorld::forest());
    world.fail("craft_oak_planks", 100);
    let mut config = AgentConfig::default();
    config.executor.max_replans = Some(2);
    let agent = agent(world.clone(), &config, None);

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    let goal = goal_for(&agent, "inventory.stick:4").await;
    let err = agent
        .executor()
        .execute(plan, &goal, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::ReplanLimit { replans: 2, .. }));
    assert_eq!(world.performed(), vec!["gather_oak_log"]);
}

#[tokio::test]
async fn unregistered_skills_are_rejected_up_front() {
    let world = Arc::new(SimWorld::forest());
    let result = craft_agent::Agent::new(
        common::domain(),
        common::schema(),
        craft_agent::SkillRegistry::new(),
        world,
        &AgentConfig::default(),
        None,
    );
    match result {
        Err(ExecutorError::UnknownSkill { action, skill }) => {
            assert_eq!(action, "gather_oak_log");
            assert_eq!(skill, "act");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("agent built without skills"),
    }
}

#[tokio::test]
async fn live_step_checks_sample_the_world() {
    let world = Arc::new(SimWorld::forest());
    let agent = agent(world, &AgentConfig::default(), None);

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    assert!(agent.check_step_preconditions(&plan.steps[0]).await.unwrap());
    assert!(!agent.check_step_preconditions(&plan.steps[1]).await.unwrap());

    let analysis = agent.analyse_step_preconditions(&plan.steps[1]).await.unwrap();
    assert!(!analysis.satisfied);
    assert_eq!(analysis.missing[0].key, "inventory.oak_log");
}

#[tokio::test]
async fn cancellation_breaks_an_endless_replan_loop() {
    let world = Arc::new(SimWorld::forest());
    world.fail("craft_oak_planks", usize::MAX);
    let agent = agent(world.clone(), &AgentConfig::default(), None);

    let plan = agent.plan("inventory.stick:4").await.unwrap().plan.unwrap();
    let goal = goal_for(&agent, "inventory.stick:4").await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = agent.executor().execute(plan, &goal, &cancel).await.unwrap_err();

    assert!(matches!(err, ExecutorError::Cancelled));
    assert_eq!(world.performed(), vec!["gather_oak_log"]);
}
