mod score;
mod session;

use crate::llm::{LlmConfig, LlmManager};
use crate::protocol::ServerMessage;
use crate::types::*;
use crate::words::WordBank;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

/// A session guarded by its own lock; all mutation happens under it.
pub type SharedSession = Arc<Mutex<Session>>;

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game {0} not found")]
    SessionNotFound(SessionCode),

    #[error("player has not joined this game")]
    PlayerNotFound,

    // User-facing, matching the client language.
    #[error("Vent venligst til næste runde")]
    RoundInProgress,
}

/// Fillers that still owe an answer for a specific round. Produced under the
/// session lock, consumed by `filler::spawn_answer_tasks` after it is
/// released, so generation never holds the lock.
#[derive(Debug, Clone)]
pub struct PendingFillers {
    pub code: SessionCode,
    pub round: u32,
    pub prompt: String,
    pub fillers: Vec<PlayerId>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Session registry, keyed by join code.
    pub sessions: Arc<RwLock<HashMap<SessionCode, SharedSession>>>,
    /// Outbound channel per connected participant.
    pub connections: Arc<RwLock<HashMap<PlayerId, mpsc::UnboundedSender<ServerMessage>>>>,
    pub word_bank: Arc<WordBank>,
    pub llm: Option<Arc<LlmManager>>,
    pub llm_config: LlmConfig,
    pub config: GameConfig,
}

impl AppState {
    pub fn new(word_bank: WordBank, config: GameConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            word_bank: Arc::new(word_bank),
            llm: None,
            llm_config: LlmConfig::default(),
            config,
        }
    }

    pub fn new_with_llm(
        word_bank: WordBank,
        config: GameConfig,
        llm: Option<LlmManager>,
        llm_config: LlmConfig,
    ) -> Self {
        Self {
            llm: llm.map(Arc::new),
            llm_config,
            ..Self::new(word_bank, config)
        }
    }

    /// Register the outbound channel for a new connection.
    pub async fn register_connection(
        &self,
        id: PlayerId,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.connections.write().await.insert(id, tx);
    }

    pub async fn remove_connection(&self, id: &str) {
        self.connections.write().await.remove(id);
    }

    /// Send a message to one participant. Unknown ids (fillers, closed
    /// connections) are silently skipped.
    pub async fn send_to(&self, id: &str, msg: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some(tx) = connections.get(id) {
            let _ = tx.send(msg);
        }
    }

    /// Send a message to every connected member of a session.
    pub async fn broadcast_session(&self, session: &Session, msg: ServerMessage) {
        let connections = self.connections.read().await;
        for id in session.players.keys() {
            if let Some(tx) = connections.get(id) {
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub async fn session(&self, code: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(code).cloned()
    }

    /// Fetch the session for `code`, creating it on first join.
    pub(crate) async fn session_or_create(&self, code: &str) -> SharedSession {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(code.to_string())
            .or_insert_with(|| {
                tracing::info!("Creating game {}", code);
                Arc::new(Mutex::new(Session::new(code.to_string())))
            })
            .clone()
    }

    /// Remove a session entry, but only if it still holds the same session.
    /// A join racing the removal may already have re-created the code.
    pub(crate) async fn remove_session(&self, code: &str, session: &SharedSession) {
        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(code) {
            if Arc::ptr_eq(current, session) {
                sessions.remove(code);
                tracing::info!("Removed game {}", code);
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let bank = WordBank::new(vec![
            "hund".to_string(),
            "kat".to_string(),
            "fisk".to_string(),
            "fugl".to_string(),
            "hest".to_string(),
        ])
        .unwrap();
        AppState::new(
            bank,
            GameConfig {
                win_threshold: 30,
                min_players: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_session_created_on_demand() {
        let state = test_state();
        assert_eq!(state.session_count().await, 0);
        assert!(state.session("FEST").await.is_none());

        let session = state.session_or_create("FEST").await;
        assert_eq!(state.session_count().await, 1);
        assert_eq!(session.lock().await.code, "FEST");

        // a second fetch returns the same session
        let again = state.session_or_create("FEST").await;
        assert!(Arc::ptr_eq(&session, &again));
    }

    #[tokio::test]
    async fn test_remove_session_checks_identity() {
        let state = test_state();
        let original = state.session_or_create("FEST").await;

        // simulate a racing re-create under the same code
        let replacement = Arc::new(Mutex::new(Session::new("FEST".to_string())));
        state
            .sessions
            .write()
            .await
            .insert("FEST".to_string(), replacement.clone());

        // stale cleanup must not delete the replacement
        state.remove_session("FEST", &original).await;
        assert_eq!(state.session_count().await, 1);

        state.remove_session("FEST", &replacement).await;
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_id_is_silent() {
        let state = test_state();
        state
            .send_to(
                "nobody",
                ServerMessage::Error {
                    message: "ignored".to_string(),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_broadcast_reaches_connected_members_only() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.register_connection("p1".to_string(), tx).await;

        let mut session = Session::new("FEST".to_string());
        session
            .players
            .insert("p1".to_string(), Player::new("p1".to_string(), "Alice".to_string()));
        // a filler has no connection and must not break the broadcast
        let filler = Player::filler();
        session.players.insert(filler.id.clone(), filler);

        state
            .broadcast_session(
                &session,
                ServerMessage::GameOver {
                    winner: "Alice".to_string(),
                    score: 30,
                },
            )
            .await;

        match rx.try_recv() {
            Ok(ServerMessage::GameOver { winner, score }) => {
                assert_eq!(winner, "Alice");
                assert_eq!(score, 30);
            }
            _ => panic!("Expected gameOver message"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.register_connection("p1".to_string(), tx).await;

        state
            .send_to(
                "p1",
                ServerMessage::Error {
                    message: "hej".to_string(),
                },
            )
            .await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Error { .. })));

        state.remove_connection("p1").await;
        state
            .send_to(
                "p1",
                ServerMessage::Error {
                    message: "væk".to_string(),
                },
            )
            .await;
        assert!(rx.try_recv().is_err());
    }
}
