use std::sync::Arc;

use dashmap::Entry;
use nanoid::nanoid;
use rocket::{State, futures::StreamExt, get, http::Status, post, serde::json::Json};
use rocket_ws::{Channel, Message, WebSocket};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use bestsweep_common::{
    error::LeaderboardError,
    models::{CreateRequest, CreateResponse, Difficulty, ScoreEntry},
    protocol::ClientMessage,
};

use crate::{
    leaderboard::SharedLeaderboard,
    logic::{Game, Games},
    rate_limit::{ClientIp, RateLimiter, check_rate_limit},
};

#[instrument(level = "trace", skip(games, game))]
fn add_game(games: &Games, game: Game) -> String {
    let mut id_length = 5;
    let max_attempts_per_length = 10;
    let game = Arc::new(Mutex::new(game));

    loop {
        for _ in 0..max_attempts_per_length {
            let id = nanoid!(id_length);
            match games.entry(id.clone()) {
                Entry::Occupied(_) => {
                    debug!("Game ID collision, trying another: {}", id);
                    continue;
                }
                Entry::Vacant(entry) => {
                    entry.insert(game);
                    info!("Created new game with ID: {}", id);
                    return id;
                }
            }
        }

        warn!(
            "Exhausted ID attempts at length {}, increasing to {}",
            id_length,
            id_length + 1
        );
        id_length += 1;
    }
}

#[post("/create", data = "<request>")]
#[instrument(level = "trace", skip(games, leaderboard, rate_limiter, request, client_ip), fields(client_ip = %client_ip.0))]
pub fn create_game(
    request: Json<CreateRequest>,
    games: &State<Games>,
    leaderboard: &State<SharedLeaderboard>,
    rate_limiter: &State<RateLimiter>,
    client_ip: ClientIp,
) -> Result<Json<CreateResponse>, Status> {
    let CreateRequest { params, player } = request.into_inner();
    info!(
        "Game creation request from {}: {}x{} ({})",
        client_ip.0, params.rows, params.cols, params.difficulty
    );

    check_rate_limit(rate_limiter, &client_ip.0)?;

    let config = params.resolve().map_err(|e| {
        warn!("Rejecting game parameters from {}: {}", client_ip.0, e);
        Status::UnprocessableEntity
    })?;

    let game = Game::new(
        config,
        params.difficulty,
        player,
        leaderboard.inner().clone(),
    );
    let id = add_game(games, game);

    info!(
        "Successfully created game {} for client {}",
        id, client_ip.0
    );
    Ok(Json(CreateResponse { id }))
}

#[get("/scores/<difficulty>")]
#[instrument(level = "trace", skip(leaderboard))]
pub async fn top_scores(
    difficulty: &str,
    leaderboard: &State<SharedLeaderboard>,
) -> Result<Json<Vec<ScoreEntry>>, Status> {
    let difficulty: Difficulty = difficulty.parse().map_err(|e| {
        debug!("{}", e);
        Status::NotFound
    })?;

    match leaderboard.fetch_top_scores(difficulty).await {
        Ok(scores) => Ok(Json(scores)),
        Err(LeaderboardError::Unranked) => Err(Status::NotFound),
        Err(e) => {
            error!("Failed to fetch {} leaderboard: {}", difficulty, e);
            Err(Status::ServiceUnavailable)
        }
    }
}

#[get("/ws?<id>")]
#[instrument(level = "trace", skip(ws, games), fields(game_id = %id))]
pub fn websocket_handler(
    ws: WebSocket,
    games: &State<Games>,
    id: String,
) -> Result<Channel<'static>, Status> {
    let game = match games.get(&id) {
        None => {
            warn!("WebSocket connection attempt for non-existent game: {}", id);
            return Err(Status::NotFound);
        }
        Some(value) => {
            info!("WebSocket connection established for game: {}", id);
            value.value().clone()
        }
    };

    Ok(ws.channel(move |stream| {
        let game_id = id.clone();
        Box::pin(async move {
            let (write, mut read) = stream.split();

            let (stream_id, mut ticks) = {
                let mut game = game.lock().await;
                (game.add_stream(write).await, game.subscribe_ticks())
            };

            info!(
                "Client connected to game {} (stream: {})",
                game_id, stream_id
            );

            loop {
                tokio::select! {
                    message = read.next() => match message {
                        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                debug!("Received message from game {}: {:?}", game_id, message);
                                let mut game = game.lock().await;
                                match message {
                                    ClientMessage::Reveal { pos } => game.reveal(pos).await,
                                    ClientMessage::Chord { pos } => game.chord(pos).await,
                                    ClientMessage::Flag { pos } => game.flag(pos).await,
                                    ClientMessage::Restart { params } => game.restart(params).await,
                                }
                            }
                            Err(e) => {
                                warn!(
                                    "Invalid message format in game {}: {} - Error: {}",
                                    game_id, text, e
                                );
                            }
                        },
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            info!(
                                "WebSocket connection closed for game {} (stream: {})",
                                game_id, stream_id
                            );
                            break;
                        }
                        Some(Err(e)) => {
                            error!(
                                "WebSocket error in game {} (stream: {}): {}",
                                game_id, stream_id, e
                            );
                            break;
                        }
                        Some(Ok(_)) => {
                            debug!("Received non-text message in game {}, ignoring", game_id);
                        }
                    },
                    changed = ticks.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let elapsed_seconds = *ticks.borrow_and_update();
                        game.lock().await.send_tick(&stream_id, elapsed_seconds).await;
                    }
                }
            }

            {
                let mut game = game.lock().await;
                game.remove_stream(&stream_id).await;
            }

            info!(
                "Client disconnected from game {} (stream: {})",
                game_id, stream_id
            );
            Ok(())
        })
    }))
}
