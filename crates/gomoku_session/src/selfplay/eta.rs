//! Linear-throughput ETA for self-play runs.

use std::time::Duration;

/// Remaining time if throughput so far holds.
///
/// `remaining = (total - completed) * (elapsed / completed)`. Undefined
/// (`None`, never zero) until at least one game has completed or when the
/// total is unknown.
pub fn estimate_remaining(completed: u32, total: u32, elapsed: Duration) -> Option<Duration> {
    if completed == 0 || total == 0 {
        return None;
    }
    let per_game = elapsed.as_secs_f64() / f64::from(completed);
    let left = f64::from(total.saturating_sub(completed));
    Some(Duration::from_secs_f64(left * per_game))
}

/// Coarse human-readable rendering of an ETA.
///
/// Under a minute shows seconds, under an hour minutes and seconds,
/// otherwise hours and minutes.
pub fn format_eta(remaining: Duration) -> String {
    let secs = remaining.as_secs_f64().round() as u64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
