//! Dispatch from parsed client messages into the session operations.
//!
//! Game events (rosters, prompts, results) reach players through their
//! connection queues; the only direct responses are errors the sender
//! needs to see.

use crate::filler;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, GameError};
use crate::types::PlayerId;
use std::sync::Arc;

/// Apply one client message. A `Some` return is an error for the sender.
pub async fn handle_message(
    conn_id: &PlayerId,
    msg: ClientMessage,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::JoinGame { name, game_code } => {
            match state.join_game(conn_id, &name, &game_code).await {
                Ok(pending) => {
                    if let Some(pending) = pending {
                        filler::spawn_answer_tasks(state, pending);
                    }
                    None
                }
                Err(e) => Some(ServerMessage::Error {
                    message: e.to_string(),
                }),
            }
        }

        ClientMessage::SubmitAnswer { game_code, answer } => {
            match state.submit_answer(conn_id, &game_code, &answer).await {
                Ok(pending) => {
                    if let Some(pending) = pending {
                        filler::spawn_answer_tasks(state, pending);
                    }
                    None
                }
                // Stale connection ids are dropped without a reply.
                Err(GameError::PlayerNotFound) => {
                    tracing::debug!("Ignoring answer from unknown player {}", conn_id);
                    None
                }
                Err(e) => Some(ServerMessage::Error {
                    message: e.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameConfig;
    use crate::words::WordBank;
    use tokio::sync::mpsc;

    fn test_state() -> Arc<AppState> {
        let bank = WordBank::new(
            ["hund", "kat", "fisk", "fugl", "hest"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
        )
        .unwrap();
        Arc::new(AppState::new(
            bank,
            GameConfig {
                win_threshold: 30,
                min_players: 0,
            },
        ))
    }

    async fn connect(
        state: &AppState,
        id: &str,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        state.register_connection(id.to_string(), tx).await;
        rx
    }

    fn join(name: &str, code: &str) -> ClientMessage {
        ClientMessage::JoinGame {
            name: name.to_string(),
            game_code: code.to_string(),
        }
    }

    fn submit(code: &str, answer: &str) -> ClientMessage {
        ClientMessage::SubmitAnswer {
            game_code: code.to_string(),
            answer: answer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_replies_through_queue_not_directly() {
        let state = test_state();
        let mut rx = connect(&state, "p1").await;

        let result = handle_message(&"p1".to_string(), join("Alice", "FEST"), &state).await;

        assert!(result.is_none());
        let first = rx.try_recv().unwrap();
        assert!(matches!(first, ServerMessage::PlayerJoined { .. }));
        let second = rx.try_recv().unwrap();
        match second {
            ServerMessage::NewPrompt { prompt, .. } => assert!(!prompt.is_empty()),
            _ => panic!("Expected newPrompt message"),
        }
    }

    #[tokio::test]
    async fn test_mid_round_join_gets_error_response() {
        let state = test_state();
        let _rx1 = connect(&state, "p1").await;
        let _rx2 = connect(&state, "p2").await;
        let _rx3 = connect(&state, "p3").await;

        handle_message(&"p1".to_string(), join("Alice", "FEST"), &state).await;
        handle_message(&"p2".to_string(), join("Bob", "FEST"), &state).await;
        handle_message(&"p1".to_string(), submit("FEST", "hund"), &state).await;

        let result = handle_message(&"p3".to_string(), join("Carol", "FEST"), &state).await;

        match result {
            Some(ServerMessage::Error { message }) => {
                assert_eq!(message, "Vent venligst til næste runde");
            }
            _ => panic!("Expected Error message"),
        }
    }

    #[tokio::test]
    async fn test_submit_to_unknown_game_gets_error_response() {
        let state = test_state();
        let _rx = connect(&state, "p1").await;

        let result = handle_message(&"p1".to_string(), submit("NOPE", "hund"), &state).await;

        match result {
            Some(ServerMessage::Error { message }) => {
                assert!(message.contains("NOPE"));
            }
            _ => panic!("Expected Error message"),
        }
    }

    #[tokio::test]
    async fn test_submit_from_unknown_connection_is_silent() {
        let state = test_state();
        let _rx1 = connect(&state, "p1").await;
        handle_message(&"p1".to_string(), join("Alice", "FEST"), &state).await;

        let result = handle_message(&"ghost".to_string(), submit("FEST", "hund"), &state).await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_submit_records_answer() {
        let state = test_state();
        let _rx1 = connect(&state, "p1").await;
        let _rx2 = connect(&state, "p2").await;

        handle_message(&"p1".to_string(), join("Alice", "FEST"), &state).await;
        handle_message(&"p2".to_string(), join("Bob", "FEST"), &state).await;

        let result = handle_message(&"p1".to_string(), submit("FEST", "hund"), &state).await;
        assert!(result.is_none());

        let session_arc = state.session("FEST").await.unwrap();
        let session = session_arc.lock().await;
        assert_eq!(session.players["p1"].answer.as_deref(), Some("hund"));
    }
}
