//! Session operations: joining, answering, leaving.
//!
//! Every operation locks the target session for its whole duration, so all
//! mutation of one session is serialized and round resolution fires inline,
//! exactly once, in whichever call completes the answer set.

use crate::filler;
use crate::protocol::{roster, ServerMessage};
use crate::types::{Player, Session, SessionPhase};

use super::{AppState, GameError, PendingFillers};

impl AppState {
    /// Join a game, creating the session on first join.
    ///
    /// Rejects with `RoundInProgress` while any player has an outstanding
    /// answer. A trimmed name matching an existing human player is treated
    /// as a reconnect and inherits that player's score.
    pub async fn join_game(
        &self,
        conn_id: &str,
        name: &str,
        code: &str,
    ) -> Result<Option<PendingFillers>, GameError> {
        let name = name.trim();
        let code = code.trim();

        loop {
            let session_arc = self.session_or_create(code).await;
            let mut session = session_arc.lock().await;

            // Tombstoned session racing its removal: clean up and re-create.
            if session.phase == SessionPhase::Ended {
                drop(session);
                self.remove_session(code, &session_arc).await;
                continue;
            }

            if session.players.values().any(|p| p.answer.is_some()) {
                return Err(GameError::RoundInProgress);
            }

            let mut carried_score = 0;
            if !name.is_empty() {
                let rejoin_id = session
                    .players
                    .values()
                    .find(|p| !p.is_filler && p.name == name)
                    .map(|p| p.id.clone());
                if let Some(old_id) = rejoin_id {
                    if let Some(old) = session.players.remove(&old_id) {
                        carried_score = old.score;
                        tracing::info!(
                            "Player {} rejoining game {} with {} points",
                            name,
                            code,
                            carried_score
                        );
                    }
                }
            }
            // Same connection joining again under a new name starts fresh.
            session.players.remove(conn_id);

            let mut player = Player::new(conn_id.to_string(), name.to_string());
            player.score = carried_score;
            session.players.insert(conn_id.to_string(), player);
            tracing::info!("Player {} ({}) joined game {}", name, conn_id, code);

            let added = filler::rebalance(&mut session, self.config.min_players);

            let pending = if session.phase == SessionPhase::Forming {
                self.start_round(&mut session)
            } else if !added.is_empty() {
                Some(PendingFillers {
                    code: session.code.clone(),
                    round: session.round,
                    prompt: session.current_prompt.clone().unwrap_or_default(),
                    fillers: added,
                })
            } else {
                None
            };

            self.broadcast_session(
                &session,
                ServerMessage::PlayerJoined {
                    players: roster(&session),
                },
            )
            .await;
            self.send_to(
                conn_id,
                ServerMessage::NewPrompt {
                    prompt: session.current_prompt.clone().unwrap_or_default(),
                    players: roster(&session),
                },
            )
            .await;

            return Ok(pending);
        }
    }

    /// Record a player's answer. First submission wins; repeats are ignored.
    /// When the answer completes the round, resolution runs inline.
    pub async fn submit_answer(
        &self,
        player_id: &str,
        code: &str,
        answer: &str,
    ) -> Result<Option<PendingFillers>, GameError> {
        self.submit_answer_guarded(player_id, code, answer, None)
            .await
    }

    /// Submit path shared with the filler agent. `expected_round` pins the
    /// answer to the round it was generated for; answers arriving after the
    /// round advanced or the session ended are silently discarded.
    pub(crate) async fn submit_answer_guarded(
        &self,
        player_id: &str,
        code: &str,
        answer: &str,
        expected_round: Option<u32>,
    ) -> Result<Option<PendingFillers>, GameError> {
        let code = code.trim();
        let session_arc = self
            .session(code)
            .await
            .ok_or_else(|| GameError::SessionNotFound(code.to_string()))?;
        let mut session = session_arc.lock().await;

        if session.phase == SessionPhase::Ended {
            return Err(GameError::SessionNotFound(code.to_string()));
        }
        if let Some(round) = expected_round {
            if session.round != round {
                tracing::debug!(
                    "Discarding stale answer for game {} round {} (now {})",
                    code,
                    round,
                    session.round
                );
                return Ok(None);
            }
        }
        if session.phase != SessionPhase::RoundOpen {
            return Ok(None);
        }

        let player = session
            .players
            .get_mut(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if player.answer.is_some() {
            return Ok(None);
        }
        player.answer = Some(answer.trim().to_string());
        tracing::debug!("Player {} answered in game {}", player_id, code);

        self.broadcast_session(
            &session,
            ServerMessage::PlayerJoined {
                players: roster(&session),
            },
        )
        .await;

        let mut pending = None;
        if session.all_answered() {
            pending = self.resolve_round(&mut session).await;
        }

        let ended = session.phase == SessionPhase::Ended;
        drop(session);
        if ended {
            self.remove_session(code, &session_arc).await;
        }
        Ok(pending)
    }

    /// Remove a departing connection from every session containing it.
    ///
    /// A session whose last human leaves is destroyed outright. Otherwise
    /// the roster is broadcast and, when the departure leaves every
    /// remaining player answered, the round resolves; a departure never
    /// stalls a round.
    pub async fn remove_player(&self, conn_id: &str) -> Vec<PendingFillers> {
        let snapshot: Vec<_> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(code, s)| (code.clone(), s.clone()))
                .collect()
        };

        let mut all_pending = Vec::new();
        for (code, session_arc) in snapshot {
            let mut session = session_arc.lock().await;
            let Some(player) = session.players.remove(conn_id) else {
                continue;
            };
            tracing::info!("Player {} left game {}", player.name, code);

            if session.phase == SessionPhase::Ended {
                continue;
            }

            if session.human_count() == 0 {
                tracing::info!("Game {} abandoned, destroying", code);
                session.phase = SessionPhase::Ended;
                drop(session);
                self.remove_session(&code, &session_arc).await;
                continue;
            }

            self.broadcast_session(
                &session,
                ServerMessage::PlayerJoined {
                    players: roster(&session),
                },
            )
            .await;

            let mut pending = None;
            if session.all_answered() {
                pending = self.resolve_round(&mut session).await;
            }
            if session.phase == SessionPhase::Ended {
                drop(session);
                self.remove_session(&code, &session_arc).await;
                continue;
            }

            // Top the roster back up if the departure dropped it below the
            // minimum; freshly added fillers owe an answer too.
            let added = filler::rebalance(&mut session, self.config.min_players);
            if !added.is_empty() {
                match &mut pending {
                    Some(p) => p.fillers.extend(added),
                    None => {
                        pending = Some(PendingFillers {
                            code: session.code.clone(),
                            round: session.round,
                            prompt: session.current_prompt.clone().unwrap_or_default(),
                            fillers: added,
                        })
                    }
                }
            }
            if let Some(p) = pending {
                all_pending.push(p);
            }
        }
        all_pending
    }

    /// Open the next round: draw an unused prompt, mark it used, bump the
    /// round counter. Returns the work order for fillers that owe answers.
    pub(crate) fn start_round(&self, session: &mut Session) -> Option<PendingFillers> {
        let prompt = self
            .word_bank
            .select_prompt(&mut session.used_words)
            .to_string();
        session.used_words.insert(prompt.clone());
        session.current_prompt = Some(prompt.clone());
        session.round += 1;
        session.phase = SessionPhase::RoundOpen;
        tracing::debug!(
            "Game {} round {} open with prompt {}",
            session.code,
            session.round,
            prompt
        );

        let fillers = session.unanswered_fillers();
        if fillers.is_empty() {
            None
        } else {
            Some(PendingFillers {
                code: session.code.clone(),
                round: session.round,
                prompt,
                fillers,
            })
        }
    }
}
