//! Gomoku - terminal client
//!
//! Drives the session core against a running engine host.

#![warn(missing_docs)]

mod cli;
mod console;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Color, Command};
use console::{ConsoleHooks, render_board, render_error, render_progress, render_ratings, render_users};
use gomoku_session::{
    AutoPlayScheduler, AutoPlaySpeed, ClientConfig, EngineClient, ErrorSlot, GameMode, Navigation,
    RpcGateway, RuleSetKind, SelfPlayTracker, SessionController, SettingsPage, StepOutcome, View,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

/// Everything a subcommand needs to talk to the engine.
struct App {
    config: ClientConfig,
    engine: EngineClient,
    errors: ErrorSlot,
    hooks: Arc<ConsoleHooks>,
}

impl App {
    fn session(&self) -> SessionController {
        SessionController::new(self.engine.clone(), self.errors.clone(), self.hooks.clone())
    }

    fn tracker(&self) -> SelfPlayTracker {
        SelfPlayTracker::new(self.engine.clone(), self.errors.clone(), self.hooks.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    }
    .with_env_overrides();
    if let Some(url) = cli.engine_url.clone() {
        config = config.with_engine_url(url);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    info!(engine_url = %config.engine_url(), "Connecting to engine host");
    let gateway = RpcGateway::new(config.engine_url(), config.request_timeout())
        .context("Failed to create engine gateway")?;
    let app = App {
        engine: EngineClient::new(Arc::new(gateway)),
        errors: ErrorSlot::new(),
        hooks: Arc::new(ConsoleHooks),
        config,
    };

    match cli.command {
        Command::Play { color, hot_seat } => run_play(&app, color, hot_seat).await,
        Command::Watch {
            black,
            white,
            speed,
        } => run_watch(&app, black, white, speed).await,
        Command::SelfPlay {
            games_per_pair,
            parallelism,
            min_level,
            max_level,
            include_llm,
        } => {
            let mut request = app.config.self_play_request();
            request.games_per_pair = games_per_pair.unwrap_or(request.games_per_pair);
            request.parallelism = parallelism.unwrap_or(request.parallelism);
            request.min_level = min_level.unwrap_or(request.min_level);
            request.max_level = max_level.unwrap_or(request.max_level);
            run_self_play(&app, request, include_llm).await
        }
        Command::Ratings { activate, json } => run_ratings(&app, activate, json).await,
        Command::Users { create, switch } => run_users(&app, create, switch).await,
    }
}

const PLAY_HELP: &str = "commands: <x> <y> | step | retry | dismiss | refresh | save <path> | \
load <path> | export <path> | settings [page] | play | back | quit";

/// Interactive game on stdin.
#[instrument(skip(app))]
async fn run_play(app: &App, color: Color, hot_seat: bool) -> Result<()> {
    let session = app.session();
    let mut nav = Navigation::new();

    let mode = if hot_seat {
        GameMode::HumanVsHuman
    } else {
        GameMode::HumanVsAi {
            human_color: color.into(),
        }
    };
    if session.new_game(RuleSetKind::Standard, mode).await == StepOutcome::Failed {
        let error = session.error().map(|e| e.to_string()).unwrap_or_default();
        bail!("Failed to start a game: {}", error);
    }
    nav.go_to_play();
    println!("{}", PLAY_HELP);
    show(app, &session, &nav).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["quit"] => break,
            ["back"] => nav.go_back(),
            ["play"] => nav.go_to_play(),
            ["settings"] => nav.go_to_settings(),
            ["settings", page] => match page.parse::<SettingsPage>() {
                Ok(page) => nav.go_to_settings_page(page),
                Err(_) => println!("unknown settings page: {}", page),
            },
            ["dismiss"] => session.dismiss_error(),
            ["retry"] => {
                session.retry().await;
            }
            ["step"] => {
                session.request_engine_step(false).await;
            }
            ["refresh"] => {
                session.refresh().await;
            }
            ["save", path] => {
                if session.save_game(path).await {
                    println!("saved to {}", path);
                }
            }
            ["load", path] => {
                session.load_game(path).await;
            }
            ["export", path] => {
                if session.export_training(path).await {
                    println!("training samples written to {}", path);
                }
            }
            [x, y] if nav.view() == View::Play => match (x.parse::<usize>(), y.parse::<usize>()) {
                (Ok(x), Ok(y)) => {
                    if session.submit_move(x, y).await == StepOutcome::Skipped {
                        println!("move not possible right now");
                    }
                }
                _ => println!("{}", PLAY_HELP),
            },
            _ => println!("{}", PLAY_HELP),
        }
        show(app, &session, &nav).await;
    }
    Ok(())
}

/// Prints whatever the current view shows.
async fn show(app: &App, session: &SessionController, nav: &Navigation) {
    match nav.view() {
        View::Welcome => println!("welcome: `play` to return to the board, `quit` to exit"),
        View::Play => {
            if let Some(snapshot) = session.snapshot() {
                println!("{}", render_board(&snapshot));
            }
        }
        View::Settings(SettingsPage::Ai) => match app.engine.get_ratings().await {
            Ok(ratings) => println!("{}", render_ratings(&ratings)),
            Err(e) => warn!(error = %e, "Failed to read ratings"),
        },
        View::Settings(SettingsPage::Users) => match app.engine.get_users().await {
            Ok(users) => println!("{}", render_users(&users)),
            Err(e) => warn!(error = %e, "Failed to read users"),
        },
        View::Settings(page) => println!("settings.{}: `settings <page>` or `back`", page),
    }
    if let Some(error) = session.error() {
        println!("{}", render_error(&error));
    }
}

/// Engine-vs-engine game driven by the auto-play scheduler.
#[instrument(skip(app))]
async fn run_watch(
    app: &App,
    black: String,
    white: String,
    speed: Option<AutoPlaySpeed>,
) -> Result<()> {
    let session = app.session();
    let scheduler =
        AutoPlayScheduler::new(session.clone(), speed.unwrap_or(*app.config.autoplay_speed()));

    let mode = GameMode::AiVsAi {
        black_id: black,
        white_id: white,
    };
    if session.new_game(RuleSetKind::Standard, mode).await == StepOutcome::Failed {
        let error = session.error().map(|e| e.to_string()).unwrap_or_default();
        bail!("Failed to start a game: {}", error);
    }

    let mut snapshots = session.subscribe();
    let mut states = scheduler.subscribe();
    let mut errors = app.errors.subscribe();
    scheduler.start();
    if !scheduler.state().is_playing {
        bail!("Auto-play refused to start");
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = snapshots.borrow_and_update().clone() {
                    println!("{}\n", render_board(&snapshot));
                }
            }
            changed = states.changed() => {
                if changed.is_err() || !states.borrow_and_update().is_playing {
                    break;
                }
            }
            changed = errors.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(error) = errors.borrow_and_update().clone() {
                    println!("{}", render_error(&error));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                scheduler.stop();
                break;
            }
        }
    }
    info!("Watch finished");
    Ok(())
}

/// Starts a calibration run and follows it until it reports.
#[instrument(skip(app))]
async fn run_self_play(
    app: &App,
    mut request: gomoku_session::SelfPlayRequest,
    include_llm: bool,
) -> Result<()> {
    if include_llm {
        let ratings = app
            .engine
            .get_ratings()
            .await
            .context("Failed to read profiles")?;
        request.set_include_llm(true, &ratings.profiles);
    }

    let tracker = app.tracker();
    let mut view = tracker.subscribe();
    if !tracker.start(request).await {
        match app.errors.current() {
            Some(error) => bail!("Self-play did not start: {}", error),
            None => bail!("Self-play did not start: the engine declined or failed; see the log"),
        }
    }

    let mut stopping = false;
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if let Some(line) = render_progress(&current) {
                    println!("{}", line);
                }
                if !current.busy {
                    if let Some(report) = current.report {
                        println!(
                            "{} {}/{} games",
                            if report.stopped { "Stopped after" } else { "Finished" },
                            report.completed_games,
                            report.total_games
                        );
                    }
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                println!("stopping; waiting for the engine to wind down");
                tracker.stop().await;
            }
        }
    }

    if let Some(error) = app.errors.current() {
        bail!("Self-play failed: {}", error);
    }
    Ok(())
}

/// Prints the ratings table, optionally switching the active opponent first.
#[instrument(skip(app))]
async fn run_ratings(app: &App, activate: Option<String>, json: bool) -> Result<()> {
    let ratings = match activate {
        Some(id) => app
            .engine
            .set_active_profile(&id)
            .await
            .with_context(|| format!("Failed to activate profile {}", id))?,
        None => app
            .engine
            .get_ratings()
            .await
            .context("Failed to read ratings")?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&ratings)?);
    } else {
        println!("{}", render_ratings(&ratings));
    }
    Ok(())
}

/// Lists users, optionally creating or switching one first.
#[instrument(skip(app))]
async fn run_users(app: &App, create: Option<String>, switch: Option<String>) -> Result<()> {
    let mut users = None;
    if let Some(name) = create {
        users = Some(
            app.engine
                .create_user(&name)
                .await
                .with_context(|| format!("Failed to create user {}", name))?,
        );
    }
    if let Some(id) = switch {
        users = Some(
            app.engine
                .set_active_user(&id)
                .await
                .with_context(|| format!("Failed to switch to user {}", id))?,
        );
    }
    let users = match users {
        Some(users) => users,
        None => app.engine.get_users().await.context("Failed to read users")?,
    };
    println!("{}", render_users(&users));
    Ok(())
}
