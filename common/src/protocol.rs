use serde::{Deserialize, Serialize};

use crate::models::{CellView, GameParams, Pos, SessionState, Snapshot};

/// Intents sent by a front end over the game socket.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    #[serde(rename = "reveal")]
    Reveal { pos: Pos },
    #[serde(rename = "chord")]
    Chord { pos: Pos },
    #[serde(rename = "flag")]
    Flag { pos: Pos },
    #[serde(rename = "restart")]
    Restart { params: GameParams },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub pos: Pos,
    pub value: CellView,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full state, sent on connect and after every restart.
    #[serde(rename = "init")]
    Init { snapshot: Snapshot },
    #[serde(rename = "update")]
    Update {
        updates: Vec<CellUpdate>,
        flags_remaining: i64,
        elapsed_seconds: u64,
        state: SessionState,
    },
    #[serde(rename = "tick")]
    Tick { elapsed_seconds: u64 },
}
