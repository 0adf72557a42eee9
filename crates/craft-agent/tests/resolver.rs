mod common;

use std::sync::Arc;
use std::time::Duration;

use craft_agent::{AgentConfig, ResolveError};
use craft_core::Observation;
use tokio_util::sync::CancellationToken;

use common::{agent, recorder, subjects, tight_config, SimWorld};

#[tokio::test]
async fn composite_unlock_goes_through_the_crafting_table() {
    let world = Arc::new(SimWorld::forest());
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &tight_config(), Some(trace));

    let report = agent
        .resolve_goal("inventory.wooden_pickaxe:1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(world.count("wooden_pickaxe"), 1);
    assert_eq!(world.count("crafting_table"), 1);
    let subgoals = subjects(&events, "resolve.subgoal");
    assert_eq!(subgoals.first().map(String::as_str), Some("inventory.crafting_table:1"));
    assert_eq!(report.subgoals, subgoals.len());
    assert!(report.attempts > report.subgoals);
    assert_eq!(subjects(&events, "resolve.done").last().map(String::as_str), Some("inventory.wooden_pickaxe:1"));
}

#[tokio::test]
async fn single_unit_retry_unblocks_a_large_request() {
    let world = Arc::new(SimWorld::forest());
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &tight_config(), Some(trace));

    let report = agent
        .resolve_goal("inventory.stick:8", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(subjects(&events, "resolve.reduce_to_one"), vec!["inventory.stick:1"]);
    assert_eq!(report.subgoals, 0);
    assert!(world.count("stick") >= 8);
}

#[tokio::test]
async fn environmental_goal_needs_external_judgment() {
    let world = Arc::new(SimWorld::forest());
    let agent = agent(world.clone(), &AgentConfig::default(), None);

    let err = agent
        .resolve_goal("nearby_workbench:true", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.needs_external_judgment());
    assert_eq!(err.missing_environment(), Some("nearby_workbench"));
    assert_eq!(err.goal_chain(), ["nearby_workbench:true"]);
    let diagnosis = err.diagnosis().unwrap();
    assert_eq!(diagnosis.missing_requirements[0].key, "nearby_workbench");
    assert!(world.performed().is_empty());
}

#[tokio::test]
async fn environmental_precondition_is_never_recursed_into() {
    let world = Arc::new(SimWorld::new(
        Observation::default()
            .with_item("raw_iron", 1)
            .with_environment("nearby_furnace", false),
    ));
    let (trace, events) = recorder();
    let agent = agent(world.clone(), &AgentConfig::default(), Some(trace));

    let err = agent
        .resolve_goal("inventory.iron_ingot:1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::EnvironmentalBlocker { .. }));
    assert_eq!(err.missing_environment(), Some("nearby_furnace"));
    assert!(subjects(&events, "resolve.subgoal").is_empty());
}

#[tokio::test]
async fn depth_bound_is_terminal_and_carries_the_chain() {
    let world = Arc::new(SimWorld::forest());
    let mut config = tight_config();
    config.resolver.max_depth = 0;
    let agent = agent(world.clone(), &config, None);

    let err = agent
        .resolve_goal("inventory.wooden_pickaxe:1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::DepthExceeded { max_depth: 0, .. }));
    assert!(err.needs_external_judgment());
    assert_eq!(
        err.goal_chain(),
        ["inventory.wooden_pickaxe:1", "inventory.crafting_table:1"]
    );
    assert!(world.performed().is_empty());
}

#[tokio::test]
async fn attempts_per_level_are_bounded() {
    let world = Arc::new(SimWorld::forest());
    let mut config = tight_config();
    config.resolver.max_attempts_per_level = 1;
    let agent = agent(world.clone(), &config, None);

    let err = agent
        .resolve_goal("inventory.wooden_pickaxe:1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::SearchExhausted { attempts: 1, .. }));
    assert!(!err.needs_external_judgment());
    assert_eq!(err.goal_chain(), ["inventory.wooden_pickaxe:1"]);
    // The subgoal itself went through before the level gave up.
    assert_eq!(world.count("crafting_table"), 1);
}

#[tokio::test]
async fn invalid_goal_is_reported_without_planning() {
    let world = Arc::new(SimWorld::forest());
    let (trace, events) = recorder();
    let agent = agent(world, &AgentConfig::default(), Some(trace));

    let err = agent
        .resolve_goal("inventory.stick:lots", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidGoal { .. }));
    assert!(err.diagnosis().unwrap().is_error());
    assert!(subjects(&events, "plan.start").is_empty());
}

#[tokio::test]
async fn cancellation_stops_a_running_skill() {
    let world = Arc::new(SimWorld::forest());
    world.stall("craft_oak_planks");
    let agent = agent(world.clone(), &AgentConfig::default(), None);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = agent
        .resolve_goal("inventory.stick:4", &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.needs_external_judgment());
    assert!(err.diagnosis().is_none());
    assert_eq!(world.performed(), vec!["gather_oak_log"]);
}

#[tokio::test]
async fn cancelled_token_does_nothing() {
    let world = Arc::new(SimWorld::forest());
    let agent = agent(world.clone(), &AgentConfig::default(), None);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = agent.resolve_goal("inventory.stick:4", &cancel).await.unwrap_err();

    assert!(matches!(err, ResolveError::Cancelled { .. }));
    assert!(world.performed().is_empty());
}

#[tokio::test]
async fn satisfied_goal_resolves_immediately() {
    let world = Arc::new(SimWorld::new(Observation::default().with_item("stick", 4)));
    let agent = agent(world.clone(), &AgentConfig::default(), None);

    // Requests are relative to current stock; asking for zero more is already met.
    let report = agent
        .resolve_goal("inventory.stick:0", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.attempts, 0);
    assert!(world.performed().is_empty());
}
