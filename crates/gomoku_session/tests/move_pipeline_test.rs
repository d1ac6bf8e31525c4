//! Tests for the move pipeline: latching, error surfacing and engine replies.

mod common;

use common::{setup_session, wait_for_calls};
use gomoku_session::{
    ENGINE_UNAVAILABLE_MESSAGE, EngineCommand, ErrorSource, GameMode, GatewayError, Player,
    RuleSetKind, StepOutcome,
};

fn human_as(color: Player) -> GameMode {
    GameMode::HumanVsAi { human_color: color }
}

#[tokio::test]
async fn test_concurrent_submits_dispatch_once() {
    let (gateway, _hooks, session) = setup_session();
    session
        .new_game(RuleSetKind::Standard, GameMode::HumanVsHuman)
        .await;

    gateway.hold(EngineCommand::MakeMove);
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.submit_move(7, 7).await }
    });
    wait_for_calls(&gateway, EngineCommand::MakeMove, 1).await;
    assert!(session.is_busy());

    assert_eq!(session.submit_move(8, 8).await, StepOutcome::Skipped);
    assert_eq!(session.submit_move(7, 7).await, StepOutcome::Skipped);
    assert_eq!(gateway.count(EngineCommand::MakeMove), 1);

    gateway.release(EngineCommand::MakeMove);
    let outcome = first.await.expect("submit task panicked");
    assert_eq!(outcome, StepOutcome::Applied);
    assert!(!session.is_busy());

    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 1);
    assert_eq!(snapshot.cell(7, 7), Some(Player::B));
}

#[tokio::test]
async fn test_rejected_move_leaves_snapshot_unchanged() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;
    let before = session.snapshot();

    gateway.fail_next(EngineCommand::MakeMove, GatewayError::rejected("Illegal move"));
    assert_eq!(session.submit_move(3, 4).await, StepOutcome::Failed);

    assert_eq!(session.snapshot(), before);
    let error = session.error().expect("error surfaced");
    assert_eq!(error.source(), ErrorSource::Move);
    assert_eq!(error.message(), "Illegal move");
    assert!(!error.is_retryable());
    assert_eq!(gateway.count(EngineCommand::AiMove), 0);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_failed_reply_keeps_human_move_and_is_retryable() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    gateway.fail_next(EngineCommand::AiMove, GatewayError::rejected("engine crashed"));
    assert_eq!(session.submit_move(7, 7).await, StepOutcome::Failed);

    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 1);
    assert_eq!(snapshot.moves[0].player, Player::B);
    assert!(snapshot.reply_owed());
    let error = session.error().expect("error surfaced");
    assert_eq!(error.source(), ErrorSource::AutoReply);
    assert!(error.is_retryable());

    assert_eq!(session.retry().await, StepOutcome::Applied);
    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 2);
    assert_eq!(snapshot.moves[1].player, Player::W);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_retry_ignored_for_non_retryable_error() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    gateway.fail_next(EngineCommand::MakeMove, GatewayError::rejected("Cell occupied"));
    session.submit_move(0, 0).await;

    assert_eq!(session.retry().await, StepOutcome::Skipped);
    assert_eq!(gateway.count(EngineCommand::AiMove), 0);
    assert!(session.error().is_some());
}

#[tokio::test]
async fn test_unreachable_engine_surfaces_fixed_message() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    gateway.fail_next(
        EngineCommand::AiMove,
        GatewayError::unavailable("connection refused"),
    );
    assert_eq!(session.submit_move(2, 2).await, StepOutcome::Failed);

    let error = session.error().expect("error surfaced");
    assert_eq!(error.source(), ErrorSource::Transport);
    assert_eq!(error.message(), ENGINE_UNAVAILABLE_MESSAGE);
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_new_game_with_human_second_gets_one_engine_move() {
    let (gateway, _hooks, session) = setup_session();

    let outcome = session.new_game(RuleSetKind::Standard, human_as(Player::W)).await;
    assert_eq!(outcome, StepOutcome::Applied);

    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.moves.len(), 1);
    assert_eq!(snapshot.moves[0].player, Player::B);
    assert!(snapshot.can_human_move);
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}

#[tokio::test]
async fn test_local_preconditions_skip_without_calling_engine() {
    let (gateway, _hooks, session) = setup_session();
    assert_eq!(session.submit_move(0, 0).await, StepOutcome::Skipped);

    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;
    session.submit_move(0, 0).await;
    let calls = gateway.count(EngineCommand::MakeMove);

    assert_eq!(session.submit_move(0, 0).await, StepOutcome::Skipped);
    assert_eq!(gateway.count(EngineCommand::MakeMove), calls);

    // The human is to move again, so a manual engine step is refused.
    assert_eq!(session.request_engine_step(false).await, StepOutcome::Skipped);
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}

#[tokio::test]
async fn test_finished_game_notifies_collaborators() {
    let (gateway, hooks, session) = setup_session();
    gateway.finish_after(2);
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    assert_eq!(session.submit_move(0, 0).await, StepOutcome::Applied);

    let snapshot = session.snapshot().expect("snapshot");
    assert!(snapshot.is_terminal());
    assert_eq!(hooks.accepted(), 2);
    assert_eq!(hooks.ratings(), 1);

    assert_eq!(session.submit_move(5, 5).await, StepOutcome::Skipped);
    assert_eq!(session.request_engine_step(false).await, StepOutcome::Skipped);
    assert_eq!(gateway.count(EngineCommand::MakeMove), 1);
}

#[tokio::test]
async fn test_successful_call_supersedes_visible_error() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    gateway.fail_next(EngineCommand::SaveGame, GatewayError::rejected("disk full"));
    assert!(!session.save_game("/tmp/game.json").await);
    let error = session.error().expect("error surfaced");
    assert_eq!(error.source(), ErrorSource::Game);

    assert_eq!(session.refresh().await, StepOutcome::Applied);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_dismiss_clears_error() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;

    gateway.fail_next(
        EngineCommand::ExportTraining,
        GatewayError::rejected("no samples"),
    );
    assert!(!session.export_training("/tmp/train.jsonl").await);
    assert!(session.error().is_some());

    session.dismiss_error();
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_refresh_exposes_owed_reply_without_issuing_it() {
    let (gateway, _hooks, session) = setup_session();
    session.new_game(RuleSetKind::Standard, human_as(Player::B)).await;
    gateway.fail_next(EngineCommand::AiMove, GatewayError::rejected("engine crashed"));
    session.submit_move(7, 7).await;

    assert_eq!(session.refresh().await, StepOutcome::Applied);
    let snapshot = session.snapshot().expect("snapshot");
    assert!(snapshot.reply_owed());
    assert_eq!(gateway.count(EngineCommand::AiMove), 1);
}
