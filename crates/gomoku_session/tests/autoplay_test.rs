//! Tests for the auto-play scheduler on a paused clock.

mod common;

use std::time::Duration;

use common::{engines, settle, setup_session, wait_for_calls};
use gomoku_session::{
    AutoPlayScheduler, AutoPlaySpeed, EngineCommand, GameMode, Player, RuleSetKind, StepOutcome,
};

async fn tick(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_outside_engine_vs_engine() {
    let (gateway, _hooks, session) = setup_session();
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    scheduler.start();
    assert!(!scheduler.state().is_playing);

    session
        .new_game(
            RuleSetKind::Standard,
            GameMode::HumanVsAi {
                human_color: Player::B,
            },
        )
        .await;
    scheduler.start();
    assert!(!scheduler.state().is_playing);

    tick(5_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 0);
}

#[tokio::test(start_paused = true)]
async fn test_steps_immediately_then_once_per_interval() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);
    let mut states = scheduler.subscribe();

    scheduler.start();
    assert!(scheduler.state().is_playing);
    assert!(states.has_changed().expect("scheduler alive"));
    assert!(states.borrow_and_update().is_playing);

    settle().await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);

    tick(500).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 2);
    tick(500).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 3);

    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_step_after_stop() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    scheduler.start();
    settle().await;
    tick(499).await;
    scheduler.stop();
    assert!(!scheduler.state().is_playing);

    tick(5_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_tick_boundary_allows_at_most_one_step() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    scheduler.start();
    settle().await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);

    // The tick is due but nothing has been polled yet.
    tokio::time::advance(Duration::from_millis(500)).await;
    scheduler.stop();
    assert!(!scheduler.state().is_playing);

    tick(5_000).await;
    let steps = gateway.count(EngineCommand::AiMove);
    assert!((1..=2).contains(&steps), "{} engine steps", steps);
    assert!(!session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_step_finish() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    gateway.hold(EngineCommand::AiMove);
    scheduler.start();
    wait_for_calls(&gateway, EngineCommand::AiMove, 1).await;
    scheduler.stop();

    gateway.release(EngineCommand::AiMove);
    settle().await;
    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 1);
    assert!(!session.is_busy());

    tick(5_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_result_stops_without_explicit_stop() {
    let (gateway, _hooks, session) = setup_session();
    gateway.finish_after(2);
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    scheduler.start();
    settle().await;
    tick(500).await;

    assert!(session.snapshot().expect("snapshot").is_terminal());
    assert!(!scheduler.state().is_playing);

    tick(5_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 2);
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_rearms_without_extra_step() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    scheduler.start();
    settle().await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);

    scheduler.set_speed(AutoPlaySpeed::Slow);
    assert_eq!(scheduler.state().speed, AutoPlaySpeed::Slow);
    assert!(scheduler.state().is_playing);
    settle().await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);

    tick(1_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
    tick(1_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 2);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_tick_is_skipped_not_queued() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Fast);

    gateway.hold(EngineCommand::AiMove);
    scheduler.start();
    wait_for_calls(&gateway, EngineCommand::AiMove, 1).await;

    tick(500).await;
    tick(500).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
    assert_eq!(session.request_engine_step(false).await, StepOutcome::Skipped);

    gateway.release(EngineCommand::AiMove);
    settle().await;
    assert_eq!(session.snapshot().expect("snapshot").moves.len(), 1);

    gateway.unhold(EngineCommand::AiMove);
    tick(500).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 2);
    assert_eq!(session.snapshot().expect("snapshot").moves.len(), 2);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_new_human_game_stops_auto_play() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, engines()).await;
    let scheduler = AutoPlayScheduler::new(session.clone(), AutoPlaySpeed::Medium);

    scheduler.start();
    settle().await;
    session
        .new_game(RuleSetKind::Standard, GameMode::HumanVsHuman)
        .await;
    settle().await;

    assert!(!scheduler.state().is_playing);
    tick(5_000).await;
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}
