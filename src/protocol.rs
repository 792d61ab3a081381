//! Wire protocol between clients and the server.
//!
//! Messages are JSON objects tagged with `t`. Event and field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Player, PlayerId, Session};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinGame { name: String, game_code: String },
    #[serde(rename_all = "camelCase")]
    SubmitAnswer { game_code: String, answer: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Current prompt plus roster; sent to a joiner on join and broadcast to
    /// the whole session when a new round opens.
    NewPrompt {
        prompt: String,
        players: HashMap<PlayerId, PlayerInfo>,
    },
    /// Roster update: on join, on every accepted answer, and on departure.
    PlayerJoined {
        players: HashMap<PlayerId, PlayerInfo>,
    },
    /// Post-scoring roster (answers cleared) plus the ids that scored.
    #[serde(rename_all = "camelCase")]
    RoundResult {
        players: HashMap<PlayerId, PlayerInfo>,
        round_winners: Vec<PlayerId>,
    },
    GameOver {
        winner: String,
        score: u32,
    },
    Error {
        message: String,
    },
}

/// Public roster entry. Answer texts never cross the wire; clients only see
/// whether a player has answered yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub name: String,
    pub score: u32,
    pub answered: bool,
    pub is_filler: bool,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            name: p.name.clone(),
            score: p.score,
            answered: p.answer.is_some(),
            is_filler: p.is_filler,
        }
    }
}

/// Id-keyed roster snapshot of a session. Clients order it for display.
pub fn roster(session: &Session) -> HashMap<PlayerId, PlayerInfo> {
    session
        .players
        .iter()
        .map(|(id, p)| (id.clone(), PlayerInfo::from(p)))
        .collect()
}
