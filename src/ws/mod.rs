pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::filler;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade endpoint. Every connection becomes one participant.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and push one server message onto the socket. False when the
/// socket is gone.
async fn push(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Could not serialize outbound message: {}", e);
            true
        }
    }
}

/// Drive one connection: register an outbound queue under a fresh ULID,
/// then pump queued game events out and client messages in until either
/// side closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Ulid::new().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.register_connection(conn_id.clone(), tx).await;
    tracing::info!("Connection {} opened", conn_id);

    loop {
        tokio::select! {
            // Game events addressed to this participant
            event = rx.recv() => {
                let Some(event) = event else { break };
                if !push(&mut sender, &event).await {
                    break;
                }
            }

            // Traffic from the client
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => handlers::handle_message(&conn_id, msg, &state).await,
                            Err(e) => {
                                tracing::debug!("Unparseable message from {}: {}", conn_id, e);
                                Some(ServerMessage::Error {
                                    message: format!("Invalid message format: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if !push(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Socket error on {}: {}", conn_id, e);
                        break;
                    }
                }
            }
        }
    }

    // Drop the outbound entry first so the departure broadcast below skips
    // this socket, then let every session react to the player leaving.
    state.remove_connection(&conn_id).await;
    for pending in state.remove_player(&conn_id).await {
        filler::spawn_answer_tasks(&state, pending);
    }
    tracing::info!("Connection {} closed", conn_id);
}
