use std::{
    env,
    time::{Duration, Instant},
};

use tokio::time;
use tracing::{debug, info};

use crate::{
    logic::Games,
    rate_limit::{RateLimiter, prune_idle_buckets},
};

fn env_secs(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

pub async fn start_cleanup_task(games: Games, rate_limiter: RateLimiter) {
    let cleanup_interval_secs = env_secs("CLEANUP_INTERVAL_SECONDS", 60).max(1);
    let inactive_timeout_secs = env_secs("INACTIVE_GAME_TIMEOUT_SECONDS", 600);
    let active_timeout_secs = env_secs("ACTIVE_GAME_TIMEOUT_SECONDS", 86400);

    let mut interval = time::interval(Duration::from_secs(cleanup_interval_secs));

    info!(
        "Started game cleanup task: checking every {}s, inactive timeout: {}s, active timeout: {}s",
        cleanup_interval_secs, inactive_timeout_secs, active_timeout_secs
    );

    loop {
        interval.tick().await;
        cleanup_games(&games, inactive_timeout_secs, active_timeout_secs).await;
        prune_idle_buckets(&rate_limiter, Instant::now());
    }
}

/// Drops expired games. Dropping a game also cancels its clock task.
pub async fn cleanup_games(games: &Games, inactive_timeout_secs: u64, active_timeout_secs: u64) {
    let mut expired = Vec::new();

    for entry in games.iter() {
        // games that are locked are in use, look again next round
        if let Ok(game) = entry.value().try_lock()
            && game.should_cleanup(inactive_timeout_secs, active_timeout_secs)
        {
            expired.push(entry.key().clone());
        }
    }

    let removed_count = expired.len();
    for game_id in expired {
        games.remove(&game_id);
        debug!("Cleaned up game: {}", game_id);
    }

    if removed_count > 0 {
        info!(
            "Cleaned up {} expired games, {} remaining",
            removed_count,
            games.len()
        );
    }
}
