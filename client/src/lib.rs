//! bestsweep client library
//!
//! Drives games hosted by the bestsweep server over HTTP and WebSocket and
//! reads the best-time leaderboard.
//!
//! ## Usage
//!
//! [`BestsweepGame`] keeps a local copy of the hosted session and turns
//! server messages into [`GameEvent`]s:
//!
//! ```rust,no_run
//! use bestsweep_client::{BestsweepGame, CreateRequest, Difficulty, GameParams, Pos};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let game = BestsweepGame::new("http://localhost:8000")?;
//!
//!     let params = GameParams { rows: 9, cols: 9, difficulty: Difficulty::Beginner, mines: None };
//!     game.start_game(CreateRequest { params, player: None }).await?;
//!
//!     game.reveal(Pos::new(4, 4)).await?;
//!     game.flag(Pos::new(0, 0)).await?;
//!
//!     if let Some(state) = game.get_state().await {
//!         println!("{:?} after {}s", state.state, state.elapsed_seconds);
//!     }
//!
//!     game.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`BestsweepClient`] and [`GameSocket`] are the lower-level building blocks.

mod client;
mod game;
mod websocket;

pub use client::BestsweepClient;
pub use game::{BestsweepGame, CellCounts, GameEvent, GameState};
pub use websocket::GameSocket;

pub use bestsweep_common::{models::*, protocol::*};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
