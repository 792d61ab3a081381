use std::collections::{HashMap, HashSet};
use ulid::Ulid;

/// A player id doubles as the id of the connection it arrived on.
pub type PlayerId = String;
pub type SessionCode = String;

/// Lifecycle of a session. FORMING and RESOLVING are transient within a
/// single locked operation; ENDED doubles as a tombstone until the registry
/// entry is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Forming,
    RoundOpen,
    Resolving,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    /// Trimmed, case preserved. Absent between rounds.
    pub answer: Option<String>,
    pub is_filler: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            answer: None,
            is_filler: false,
        }
    }

    /// Synthetic participant with a generated id and a friendly name.
    pub fn filler() -> Self {
        let name = petname::petname(2, " ").unwrap_or_else(|| "blank bot".to_string());
        Self {
            id: Ulid::new().to_string(),
            name,
            score: 0,
            answer: None,
            is_filler: true,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub code: SessionCode,
    pub phase: SessionPhase,
    pub players: HashMap<PlayerId, Player>,
    pub current_prompt: Option<String>,
    /// Prompts already shown this session; cleared when the bank is exhausted.
    pub used_words: HashSet<String>,
    /// Monotone round counter, used to discard answers from stale rounds.
    pub round: u32,
}

impl Session {
    pub fn new(code: SessionCode) -> Self {
        Self {
            code,
            phase: SessionPhase::Forming,
            players: HashMap::new(),
            current_prompt: None,
            used_words: HashSet::new(),
            round: 0,
        }
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_filler).count()
    }

    pub fn all_answered(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.answer.is_some())
    }

    /// Fillers still owing an answer for the current round.
    pub fn unanswered_fillers(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_filler && p.answer.is_none())
            .map(|p| p.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// First player at or above this score wins the game.
    pub win_threshold: u32,
    /// Fillers top the roster up to this count while humans are few.
    pub min_players: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_threshold: 30,
            min_players: 3,
        }
    }
}

impl GameConfig {
    /// Read overrides from the environment, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            win_threshold: std::env::var("WIN_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.win_threshold),
            min_players: std::env::var("MIN_PLAYERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_players),
        }
    }
}
