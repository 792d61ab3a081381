//! Round resolution: answer grouping, scoring, winner detection.
//!
//! Thinking alike pays: an answer shared by exactly two players earns each
//! of them 3 points, an answer shared by three or more earns each 1 point,
//! and a unique answer earns nothing.

use std::collections::HashMap;

use crate::protocol::{roster, ServerMessage};
use crate::types::{Player, PlayerId, Session, SessionPhase};

use super::{AppState, PendingFillers};

/// Points for an answer shared by exactly two players.
const PAIR_POINTS: u32 = 3;
/// Points for an answer shared by three or more players.
const GROUP_POINTS: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoundOutcome {
    /// Players who scored this round, sorted by id.
    pub round_winners: Vec<PlayerId>,
    /// Player who reached the win threshold, if any. Ties go to the highest
    /// score, then to the smallest id for stable results.
    pub winner: Option<PlayerId>,
}

/// Group answers case-insensitively and apply the round's points. Empty
/// answers count as answered but never group.
pub(crate) fn score_round(
    players: &mut HashMap<PlayerId, Player>,
    win_threshold: u32,
) -> RoundOutcome {
    let mut groups: HashMap<String, Vec<PlayerId>> = HashMap::new();
    for (id, player) in players.iter() {
        let Some(answer) = &player.answer else {
            continue;
        };
        let normalized = answer.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        groups.entry(normalized).or_default().push(id.clone());
    }

    let mut round_winners = Vec::new();
    for member_ids in groups.into_values() {
        let points = match member_ids.len() {
            0 | 1 => continue,
            2 => PAIR_POINTS,
            _ => GROUP_POINTS,
        };
        for id in member_ids {
            if let Some(player) = players.get_mut(&id) {
                player.score += points;
            }
            round_winners.push(id);
        }
    }
    round_winners.sort();

    let winner = players
        .values()
        .filter(|p| p.score >= win_threshold)
        .max_by(|a, b| a.score.cmp(&b.score).then_with(|| b.id.cmp(&a.id)))
        .map(|p| p.id.clone());

    RoundOutcome {
        round_winners,
        winner,
    }
}

impl AppState {
    /// Resolve the current round of a locked session. Either the game ends
    /// (`gameOver`, session tombstoned for removal by the caller) or the
    /// answers are cleared and the next round opens (`roundResult` followed
    /// by `newPrompt`).
    pub(crate) async fn resolve_round(&self, session: &mut Session) -> Option<PendingFillers> {
        session.phase = SessionPhase::Resolving;
        let outcome = score_round(&mut session.players, self.config.win_threshold);

        if let Some(winner_id) = outcome.winner {
            let (winner, score) = session
                .players
                .get(&winner_id)
                .map(|p| (p.name.clone(), p.score))
                .unwrap_or_default();
            tracing::info!(
                "Game {} over after round {}: {} wins with {} points",
                session.code,
                session.round,
                winner,
                score
            );
            session.phase = SessionPhase::Ended;
            self.broadcast_session(session, ServerMessage::GameOver { winner, score })
                .await;
            return None;
        }

        for player in session.players.values_mut() {
            player.answer = None;
        }
        self.broadcast_session(
            session,
            ServerMessage::RoundResult {
                players: roster(session),
                round_winners: outcome.round_winners,
            },
        )
        .await;

        let pending = self.start_round(session);
        self.broadcast_session(
            session,
            ServerMessage::NewPrompt {
                prompt: session.current_prompt.clone().unwrap_or_default(),
                players: roster(session),
            },
        )
        .await;
        pending
    }
}
