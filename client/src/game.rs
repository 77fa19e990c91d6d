use std::sync::Arc;

use bestsweep_common::{
    models::{CellView, CreateRequest, Difficulty, GameParams, Pos, ScoreEntry, SessionState, Snapshot},
    protocol::{CellUpdate, ClientMessage, ServerMessage},
};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{BestsweepClient, GameSocket, Result};

/// Events emitted by a connected game
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Game was initialized or restarted
    GameInitialized {
        rows: usize,
        cols: usize,
        difficulty: Difficulty,
    },
    /// Cells changed state
    BoardUpdated { changed_positions: Vec<Pos> },
    /// The session clock advanced
    Tick { elapsed_seconds: u64 },
    /// The session moved to a new state
    GameStatusChanged { state: SessionState },
    /// Connection was lost
    ConnectionLost,
}

/// Tally of cells by what the player can see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCounts {
    pub hidden: usize,
    pub flagged: usize,
    pub revealed: usize,
    pub mines: usize,
}

/// Local mirror of a hosted session
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub rows: usize,
    pub cols: usize,
    pub difficulty: Difficulty,
    pub board: Vec<Vec<CellView>>,
    pub flags_remaining: i64,
    pub elapsed_seconds: u64,
    pub state: SessionState,
}

impl From<Snapshot> for GameState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            rows: snapshot.rows,
            cols: snapshot.cols,
            difficulty: snapshot.difficulty,
            board: snapshot.cells,
            flags_remaining: snapshot.flags_remaining,
            elapsed_seconds: snapshot.elapsed_seconds,
            state: snapshot.state,
        }
    }
}

impl GameState {
    pub fn get_cell(&self, pos: Pos) -> Option<&CellView> {
        self.board.get(pos.row)?.get(pos.col)
    }

    pub fn set_cell(&mut self, pos: Pos, cell: CellView) {
        if let Some(slot) = self
            .board
            .get_mut(pos.row)
            .and_then(|row| row.get_mut(pos.col))
        {
            *slot = cell;
        }
    }

    pub fn count_cells(&self) -> CellCounts {
        let mut counts = CellCounts::default();
        for cell in self.board.iter().flatten() {
            match cell {
                CellView::Hidden => counts.hidden += 1,
                CellView::Flagged => counts.flagged += 1,
                CellView::Revealed { .. } => counts.revealed += 1,
                CellView::Mine => counts.mines += 1,
            }
        }
        counts
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_won(&self) -> bool {
        self.state.is_won()
    }
}

/// Applies one server message to the mirrored state and returns the events
/// it produces.
pub(crate) fn apply_message(state: &mut Option<GameState>, message: ServerMessage) -> Vec<GameEvent> {
    match message {
        ServerMessage::Init { snapshot } => {
            info!(
                "Received game initialization: {}x{} ({})",
                snapshot.rows, snapshot.cols, snapshot.difficulty
            );
            let event = GameEvent::GameInitialized {
                rows: snapshot.rows,
                cols: snapshot.cols,
                difficulty: snapshot.difficulty,
            };
            *state = Some(snapshot.into());
            vec![event]
        }
        ServerMessage::Update {
            updates,
            flags_remaining,
            elapsed_seconds,
            state: session_state,
        } => {
            let Some(game_state) = state.as_mut() else {
                warn!("Update received before initialization, ignoring");
                return Vec::new();
            };

            debug!(
                "Received update: {} cells, state {:?}",
                updates.len(),
                session_state
            );
            let changed_positions: Vec<Pos> = updates.iter().map(|update| update.pos).collect();
            for CellUpdate { pos, value } in updates {
                game_state.set_cell(pos, value);
            }
            game_state.flags_remaining = flags_remaining;
            game_state.elapsed_seconds = elapsed_seconds;

            let mut events = Vec::new();
            if !changed_positions.is_empty() {
                events.push(GameEvent::BoardUpdated { changed_positions });
            }
            if game_state.state != session_state {
                game_state.state = session_state;
                events.push(GameEvent::GameStatusChanged {
                    state: session_state,
                });
            }
            events
        }
        ServerMessage::Tick { elapsed_seconds } => match state.as_mut() {
            Some(game_state) => {
                game_state.elapsed_seconds = elapsed_seconds;
                vec![GameEvent::Tick { elapsed_seconds }]
            }
            None => Vec::new(),
        },
    }
}

/// Connection state - all fields are required when connected
struct ConnectionState {
    sender: mpsc::UnboundedSender<ClientMessage>,
    game_id: String,
    background_task: JoinHandle<()>,
}

impl ConnectionState {
    fn send_message(&self, message: ClientMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| "Game socket writer closed")?;
        Ok(())
    }

    async fn abort_and_wait_background_task(self) {
        self.background_task.abort();
        let _ = self.background_task.await;
    }
}

type EventSender = Arc<RwLock<Option<mpsc::UnboundedSender<GameEvent>>>>;

/// High-level handle on a hosted game that keeps a local copy of its state
pub struct BestsweepGame {
    client: BestsweepClient,
    connection_state: Arc<RwLock<Option<ConnectionState>>>,
    event_sender: EventSender,
    state: Arc<RwLock<Option<GameState>>>,
}

impl BestsweepGame {
    pub fn new(server_url: &str) -> Result<Self> {
        let client = BestsweepClient::new(server_url)?;
        Ok(Self {
            client,
            connection_state: Arc::new(RwLock::new(None)),
            event_sender: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(None)),
        })
    }

    /// Subscribe to game events. Replaces any previous subscriber.
    pub async fn subscribe_to_events(&self) -> mpsc::UnboundedReceiver<GameEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.event_sender.write().await = Some(sender);
        receiver
    }

    /// Create a hosted game and connect to it
    pub async fn start_game(&self, request: CreateRequest) -> Result<()> {
        info!(
            "Starting new game: {}x{} ({})",
            request.params.rows, request.params.cols, request.params.difficulty
        );

        let game_id = self.client.create_game(&request).await?;
        self.join_game(game_id).await
    }

    pub async fn join_game(&self, game_id: String) -> Result<()> {
        info!("Joining game with ID: {}", game_id);

        let mut conn_state = self.connection_state.write().await;
        if let Some(existing_conn) = conn_state.take() {
            existing_conn.abort_and_wait_background_task().await;
        }
        self.state.write().await.take();

        let ws_url = self.client.websocket_url(&game_id)?;
        let socket = GameSocket::connect(&ws_url).await?;
        let sender = socket.get_sender();
        let background_task = self.start_background_listener(socket);

        *conn_state = Some(ConnectionState {
            sender,
            game_id,
            background_task,
        });

        Ok(())
    }

    async fn send_client_message(&self, message: ClientMessage) -> Result<()> {
        match self.connection_state.read().await.as_ref() {
            Some(conn) => conn.send_message(message),
            None => Err("Not connected to a game. Call start_game() first.".into()),
        }
    }

    pub async fn reveal(&self, pos: Pos) -> Result<()> {
        debug!("Revealing cell at {}", pos);
        self.send_client_message(ClientMessage::Reveal { pos }).await
    }

    /// Reveal the neighbors of a satisfied number
    pub async fn chord(&self, pos: Pos) -> Result<()> {
        debug!("Chording cell at {}", pos);
        self.send_client_message(ClientMessage::Chord { pos }).await
    }

    pub async fn flag(&self, pos: Pos) -> Result<()> {
        debug!("Toggling flag at {}", pos);
        self.send_client_message(ClientMessage::Flag { pos }).await
    }

    pub async fn restart(&self, params: GameParams) -> Result<()> {
        info!(
            "Restarting game: {}x{} ({})",
            params.rows, params.cols, params.difficulty
        );
        self.send_client_message(ClientMessage::Restart { params })
            .await
    }

    pub async fn top_scores(&self, difficulty: Difficulty) -> Result<Vec<ScoreEntry>> {
        self.client.top_scores(difficulty).await
    }

    pub async fn get_state(&self) -> Option<GameState> {
        self.state.read().await.clone()
    }

    pub async fn get_game_id(&self) -> Option<String> {
        self.connection_state
            .read()
            .await
            .as_ref()
            .map(|conn| conn.game_id.clone())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state.read().await.is_some()
    }

    /// Close the connection and forget the mirrored state
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(conn) = self.connection_state.write().await.take() {
            conn.abort_and_wait_background_task().await;
        }
        *self.event_sender.write().await = None;
        *self.state.write().await = None;

        info!("Disconnected from game");
        Ok(())
    }

    fn start_background_listener(&self, mut socket: GameSocket) -> JoinHandle<()> {
        let state = self.state.clone();
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            loop {
                let message = match socket.receive_message().await {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error receiving game message: {}", e);
                        break;
                    }
                };

                let events = apply_message(&mut *state.write().await, message);
                if let Some(sender) = event_sender.read().await.as_ref() {
                    for event in events {
                        let _ = sender.send(event);
                    }
                }
            }

            if let Some(sender) = event_sender.read().await.as_ref() {
                let _ = sender.send(GameEvent::ConnectionLost);
            }
        })
    }
}
