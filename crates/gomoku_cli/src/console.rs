//! Plain-text rendering and console hooks.

use std::fmt::Write;

use gomoku_session::{
    GameSnapshot, Player, RatingsSnapshot, SelfPlayView, SessionError, SessionHooks, UsersSnapshot,
};
use tracing::{debug, info};

/// Logs collaborator notifications instead of playing sounds.
#[derive(Debug, Default)]
pub struct ConsoleHooks;

impl SessionHooks for ConsoleHooks {
    fn move_accepted(&self, snapshot: &GameSnapshot) {
        if let Some(last) = snapshot.moves.last() {
            debug!(x = last.x, y = last.y, player = %last.player, "Move accepted");
        }
    }

    fn ratings_changed(&self) {
        info!("Ratings changed; run `gomoku ratings` to see them");
    }
}

fn stone(cell: Option<Player>) -> char {
    match cell {
        Some(Player::B) => 'X',
        Some(Player::W) => 'O',
        None => '.',
    }
}

/// Renders the board with column and row indices plus a status line.
pub fn render_board(snapshot: &GameSnapshot) -> String {
    let mut out = String::from("   ");
    for x in 0..snapshot.board_size {
        let _ = write!(out, "{:>3}", x);
    }
    out.push('\n');
    for y in 0..snapshot.board_size {
        let _ = write!(out, "{:>3}", y);
        for x in 0..snapshot.board_size {
            let _ = write!(out, "  {}", stone(snapshot.cell(x, y)));
        }
        out.push('\n');
    }
    match snapshot.result {
        Some(result) => {
            let _ = write!(out, "Game over: {}", result);
        }
        None => {
            let _ = write!(
                out,
                "{} to move ({})",
                stone(Some(snapshot.to_move)),
                if snapshot.can_human_move {
                    "your turn"
                } else {
                    "engine"
                }
            );
        }
    }
    out
}

/// Renders the visible error with a retry hint when one applies.
pub fn render_error(error: &SessionError) -> String {
    if error.is_retryable() {
        format!("error: {} (type `retry` to try again)", error)
    } else {
        format!("error: {}", error)
    }
}

/// Renders one line of self-play progress.
pub fn render_progress(view: &SelfPlayView) -> Option<String> {
    let progress = view.progress?;
    let eta = view.eta_text().unwrap_or_else(|| "--".to_string());
    Some(format!(
        "{}/{} games ({:.1}%), eta {}",
        progress.completed, progress.total, progress.percent, eta
    ))
}

/// Renders the ratings table; the active opponent is starred.
pub fn render_ratings(ratings: &RatingsSnapshot) -> String {
    let mut out = format!(
        "You: {:.0} over {} games ({}W {}D {}L)\n",
        ratings.player.rating,
        ratings.player.games,
        ratings.player.wins,
        ratings.player.draws,
        ratings.player.losses
    );
    for profile in &ratings.profiles {
        let marker = if profile.id == ratings.active_profile {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{} {:<20} {:>6.0} {:>5} games",
            marker, profile.name, profile.rating, profile.games
        );
    }
    if ratings.auto_match {
        let _ = write!(out, "Auto-match on (offset {:+})", ratings.match_offset);
    }
    out
}

/// Renders the user list; the active user is starred.
pub fn render_users(users: &UsersSnapshot) -> String {
    users
        .users
        .iter()
        .map(|user| {
            let marker = if user.id == users.active_user { '*' } else { ' ' };
            format!("{} {:<12} {}", marker, user.id, user.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
