use std::{collections::HashMap, sync::Arc, time::Instant};

use dashmap::DashMap;
use rand::{SeedableRng, rngs::StdRng};
use rocket::futures::{SinkExt, future::join_all, stream::SplitSink};
use rocket_ws::{Message, stream::DuplexStream};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use bestsweep_common::{
    models::{BoardConfig, CellView, Difficulty, GameParams, PlayerIdentity, Pos, ScoreSubmission},
    protocol::{CellUpdate, ServerMessage},
    session::{Outcome, Session, Update},
};

use crate::{clock::IntervalClock, leaderboard::SharedLeaderboard};

pub type Games = Arc<DashMap<String, Arc<Mutex<Game>>>>;

type Streams = HashMap<Uuid, SplitSink<DuplexStream, Message>>;

/// A hosted session plus the sockets watching it.
pub struct Game {
    session: Session<IntervalClock, StdRng>,
    player: Option<PlayerIdentity>,
    leaderboard: SharedLeaderboard,
    streams: Streams,
    ticks: Arc<watch::Sender<u64>>,
    created_at: Instant,
    last_activity: Instant,
}

async fn send(stream: &mut SplitSink<DuplexStream, Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => {
            if let Err(e) = stream.send(Message::Text(text)).await {
                debug!("Failed to deliver message: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize server message: {}", e),
    }
}

async fn broadcast(streams: &mut Streams, message: &ServerMessage) {
    let futures: Vec<_> = streams
        .values_mut()
        .map(|stream| send(stream, message))
        .collect();

    join_all(futures).await;
}

impl Game {
    #[instrument(level = "trace", skip(leaderboard, player))]
    pub fn new(
        config: BoardConfig,
        difficulty: Difficulty,
        player: Option<PlayerIdentity>,
        leaderboard: SharedLeaderboard,
    ) -> Self {
        Self::with_rng(
            config,
            difficulty,
            player,
            leaderboard,
            StdRng::from_os_rng(),
        )
    }

    pub fn with_rng(
        config: BoardConfig,
        difficulty: Difficulty,
        player: Option<PlayerIdentity>,
        leaderboard: SharedLeaderboard,
        rng: StdRng,
    ) -> Self {
        info!(
            "Creating new game: {}x{} with {} mines ({})",
            config.rows, config.cols, config.mines, difficulty
        );
        let (ticks, _) = watch::channel(0);
        let ticks = Arc::new(ticks);
        let now = Instant::now();
        Self {
            session: Session::new(config, difficulty, IntervalClock::new(ticks.clone()), rng),
            player,
            leaderboard,
            streams: HashMap::new(),
            ticks,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn session(&self) -> &Session<IntervalClock, StdRng> {
        &self.session
    }

    /// Receives the elapsed seconds every time the session clock ticks.
    pub fn subscribe_ticks(&self) -> watch::Receiver<u64> {
        self.ticks.subscribe()
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn restart(&mut self, params: GameParams) {
        let config = match params.resolve() {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring restart with invalid parameters: {}", e);
                return;
            }
        };

        self.session.on_reset(config, params.difficulty);
        self.last_activity = Instant::now();
        let message = ServerMessage::Init {
            snapshot: self.session.snapshot(),
        };
        broadcast(&mut self.streams, &message).await;
        info!(
            "Game restarted and broadcasted to {} connections",
            self.streams.len()
        );
    }

    #[instrument(level = "trace", skip(self, stream))]
    pub async fn add_stream(&mut self, mut stream: SplitSink<DuplexStream, Message>) -> Uuid {
        let id = Uuid::new_v4();
        debug!("Adding stream {} to game", id);
        let message = ServerMessage::Init {
            snapshot: self.session.snapshot(),
        };
        send(&mut stream, &message).await;
        self.streams.insert(id, stream);
        self.last_activity = Instant::now();
        info!(
            "Stream {} added, total connections: {}",
            id,
            self.streams.len()
        );
        id
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn remove_stream(&mut self, id: &Uuid) {
        if self.streams.remove(id).is_some() {
            info!(
                "Stream {} removed, remaining connections: {}",
                id,
                self.streams.len()
            );
        } else {
            warn!("Attempted to remove non-existent stream: {}", id);
        }
        self.last_activity = Instant::now()
    }

    /// Forwards a clock tick to one connection.
    pub async fn send_tick(&mut self, id: &Uuid, elapsed_seconds: u64) {
        if let Some(stream) = self.streams.get_mut(id) {
            send(stream, &ServerMessage::Tick { elapsed_seconds }).await;
        }
    }

    pub fn has_active_connections(&self) -> bool {
        !self.streams.is_empty()
    }

    /// Idle games go after `inactive_timeout_secs`, watched ones after
    /// `active_timeout_secs` regardless of activity.
    pub fn should_cleanup(&self, inactive_timeout_secs: u64, active_timeout_secs: u64) -> bool {
        if self.has_active_connections() {
            return self.created_at.elapsed().as_secs() > active_timeout_secs;
        }

        self.last_activity.elapsed().as_secs() > inactive_timeout_secs
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub async fn reveal(&mut self, pos: Pos) {
        self.last_activity = Instant::now();
        let update = self.session.on_reveal(pos);
        self.publish(update).await;
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub async fn chord(&mut self, pos: Pos) {
        self.last_activity = Instant::now();
        let update = self.session.on_chord(pos);
        self.publish(update).await;
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub async fn flag(&mut self, pos: Pos) {
        self.last_activity = Instant::now();
        let update = self.session.on_toggle_flag(pos);
        self.publish(update).await;
    }

    async fn publish(&mut self, update: Update) {
        if update.is_empty() {
            return;
        }

        if let Some(outcome) = update.outcome {
            self.report(outcome);
        }

        let board = self.session.board();
        let updates: Vec<CellUpdate> = update
            .changed
            .iter()
            .filter_map(|&pos| {
                board.get(pos).map(|cell| CellUpdate {
                    pos,
                    value: CellView::from(cell),
                })
            })
            .collect();

        debug!("Broadcasting {} cell updates", updates.len());
        let message = ServerMessage::Update {
            updates,
            flags_remaining: self.session.flags_remaining(),
            elapsed_seconds: self.session.elapsed_seconds(),
            state: self.session.state(),
        };
        broadcast(&mut self.streams, &message).await;
    }

    /// Hands a win to the leaderboard without waiting for it.
    fn report(&self, outcome: Outcome) {
        let completion = match outcome {
            Outcome::Won(completion) => completion,
            Outcome::Lost { triggered } => {
                info!("Game lost on mine at {}", triggered);
                return;
            }
        };

        let Some(player) = &self.player else {
            debug!("Anonymous win, nothing to submit");
            return;
        };

        if !completion.ranked {
            debug!(
                "Unranked {} win on a {}x{} board, nothing to submit",
                completion.difficulty,
                self.session.config().rows,
                self.session.config().cols
            );
            return;
        }

        let submission =
            ScoreSubmission::new(player, completion.elapsed_seconds, completion.difficulty);
        let leaderboard = self.leaderboard.clone();
        tokio::spawn(async move {
            let user_id = submission.user_id.clone();
            match leaderboard.submit_score(submission).await {
                Ok(()) => info!("Submitted score for {}", user_id),
                Err(e) => warn!("Score submission for {} failed: {}", user_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::MemoryLeaderboard;
    use bestsweep_common::models::SessionState;
    use std::time::Duration;

    fn player() -> PlayerIdentity {
        PlayerIdentity {
            user_id: "u-1".to_string(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    fn game(difficulty: Difficulty, leaderboard: SharedLeaderboard) -> Game {
        sized_game(BoardConfig::new(9, 9, 10).unwrap(), difficulty, leaderboard)
    }

    fn sized_game(config: BoardConfig, difficulty: Difficulty, leaderboard: SharedLeaderboard) -> Game {
        Game::with_rng(
            config,
            difficulty,
            Some(player()),
            leaderboard,
            StdRng::seed_from_u64(17),
        )
    }

    async fn clear_board(game: &mut Game) {
        let config = game.session().config();
        game.reveal(Pos::new(config.rows / 2, config.cols / 2)).await;
        let safe: Vec<Pos> = game
            .session()
            .board()
            .iter()
            .filter(|(_, cell)| !cell.is_mine())
            .map(|(pos, _)| pos)
            .collect();
        for pos in safe {
            game.reveal(pos).await;
        }
    }

    #[tokio::test]
    async fn ranked_win_reaches_the_leaderboard() {
        let leaderboard = MemoryLeaderboard::shared();
        let mut game = game(Difficulty::Beginner, leaderboard.clone());

        clear_board(&mut game).await;
        game.reveal(Pos::new(0, 0)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(game.session().state(), SessionState::Won);
        let top = leaderboard
            .fetch_top_scores(Difficulty::Beginner)
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].display_name, "Ada");
    }

    #[tokio::test]
    async fn resized_preset_win_is_not_ranked() {
        let leaderboard = MemoryLeaderboard::shared();
        let mut game = sized_game(
            BoardConfig::new(5, 5, 3).unwrap(),
            Difficulty::Beginner,
            leaderboard.clone(),
        );

        clear_board(&mut game).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(game.session().state(), SessionState::Won);
        assert!(
            leaderboard
                .fetch_top_scores(Difficulty::Beginner)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn invalid_restart_keeps_the_current_game() {
        let mut game = game(Difficulty::Beginner, MemoryLeaderboard::shared());
        game.reveal(Pos::new(4, 4)).await;

        game.restart(GameParams {
            rows: 0,
            ..GameParams::default()
        })
        .await;
        assert_eq!(game.session().state(), SessionState::InProgress);

        game.restart(GameParams::default()).await;
        assert_eq!(game.session().state(), SessionState::NotStarted);
        assert_eq!(game.session().elapsed_seconds(), 0);
    }

    #[tokio::test]
    async fn fresh_games_are_not_collected() {
        let game = game(Difficulty::Beginner, MemoryLeaderboard::shared());

        assert!(!game.has_active_connections());
        assert!(!game.should_cleanup(60, 86400));
    }
}
