use std::sync::Arc;

use bestsweep_server::{
    cleanup::start_cleanup_task,
    cors::create_cors,
    leaderboard::{MemoryLeaderboard, SharedLeaderboard},
    logic::Games,
    rate_limit::{RateLimiter, create_rate_limiter},
    routes::{create_game, top_scores, websocket_handler},
};
use dashmap::DashMap;
use rocket::{
    Build, Rocket,
    fairing::{Fairing, Info, Kind},
    routes,
};
use tracing::{info, warn};

struct CleanupFairing;

#[rocket::async_trait]
impl Fairing for CleanupFairing {
    fn info(&self) -> Info {
        Info {
            name: "Cleanup Task",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        match (rocket.state::<Games>(), rocket.state::<RateLimiter>()) {
            (Some(games), Some(rate_limiter)) => {
                info!("Starting cleanup task for games and rate limits");
                let games_for_cleanup = games.clone();
                let rate_limiter_for_cleanup = rate_limiter.clone();
                tokio::spawn(async move {
                    start_cleanup_task(games_for_cleanup, rate_limiter_for_cleanup).await;
                });
            }
            _ => warn!("Failed to get managed state for cleanup task"),
        }
        Ok(rocket)
    }
}

#[rocket::launch]
fn rocket() -> Rocket<Build> {
    tracing_subscriber::fmt::init();
    info!("💣 Starting bestsweep server");

    let games: Games = Arc::new(DashMap::new());
    let leaderboard: SharedLeaderboard = MemoryLeaderboard::shared();
    let rate_limiter = create_rate_limiter();
    let cors = create_cors().expect("Failed to create CORS configuration");

    info!("📊 Initialized game storage, leaderboard and rate limiter");

    let rocket = rocket::build()
        .attach(cors)
        .attach(CleanupFairing)
        .manage(games)
        .manage(leaderboard)
        .manage(rate_limiter)
        .mount("/", routes![create_game, top_scores, websocket_handler]);

    info!("📡 Endpoints: POST /create, GET /ws, GET /scores/<difficulty>");

    rocket
}
