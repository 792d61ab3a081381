//! Synthetic players that keep small sessions playable.
//!
//! Fillers top a session up to the configured minimum player count and
//! answer each round through the same submit path as humans. Answers come
//! from a text-generation provider when one is configured; any failure falls
//! back to a uniformly random word from the bank.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::llm::GenerateRequest;
use crate::state::{AppState, PendingFillers};
use crate::types::{Player, PlayerId, Session};

/// Pause before a filler answers, in milliseconds. Joining is rejected while
/// any answer is outstanding, so instant filler answers would leave no window
/// for a second human to get into the game.
const ANSWER_DELAY_MS: std::ops::Range<u64> = 1_000..3_000;

/// Adjust the filler count of a locked session so that the roster reaches
/// `min_players` while humans are few, and sheds fillers once humans alone
/// satisfy the minimum. Humans are never removed. Returns the ids of fillers
/// added, which owe an answer for the current round.
pub(crate) fn rebalance(session: &mut Session, min_players: usize) -> Vec<PlayerId> {
    let humans = session.human_count();
    let desired = min_players.saturating_sub(humans);
    let current: Vec<PlayerId> = session
        .players
        .values()
        .filter(|p| p.is_filler)
        .map(|p| p.id.clone())
        .collect();

    let mut added = Vec::new();
    if current.len() < desired {
        for _ in current.len()..desired {
            let filler = Player::filler();
            tracing::info!(
                "Adding filler {} ({}) to game {}",
                filler.name,
                filler.id,
                session.code
            );
            added.push(filler.id.clone());
            session.players.insert(filler.id.clone(), filler);
        }
    } else {
        for id in current.iter().take(current.len() - desired) {
            if let Some(filler) = session.players.remove(id) {
                tracing::info!("Removing filler {} from game {}", filler.name, session.code);
            }
        }
    }
    added
}

/// Spawn one answer task per filler in the work order. Each task waits out
/// its answer delay, then generates an answer without holding any lock and
/// applies it through the guarded submit path; answers for rounds that
/// already closed are discarded there.
pub fn spawn_answer_tasks(state: &Arc<AppState>, pending: PendingFillers) {
    for filler_id in pending.fillers {
        let state = Arc::clone(state);
        let code = pending.code.clone();
        let prompt = pending.prompt.clone();
        let round = pending.round;
        let delay = Duration::from_millis(rand::rng().random_range(ANSWER_DELAY_MS));

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let answer = generate_answer(&state, &prompt).await;
            match state
                .submit_answer_guarded(&filler_id, &code, &answer, Some(round))
                .await
            {
                Ok(Some(next)) => spawn_answer_tasks(&state, next),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        "Filler answer for game {} round {} dropped: {}",
                        code,
                        round,
                        e
                    );
                }
            }
        });
    }
}

/// One word for the given prompt, from the provider when available, from
/// the word bank otherwise.
async fn generate_answer(state: &AppState, prompt: &str) -> String {
    let Some(llm) = &state.llm else {
        return state.word_bank.random_word().to_string();
    };

    let request = GenerateRequest {
        prompt: prompt.to_string(),
        max_tokens: Some(state.llm_config.default_max_tokens),
        timeout: state.llm_config.default_timeout,
    };

    match llm.generate_one(request).await {
        Ok(response) => {
            let word = first_word(&response.text);
            if word.is_empty() {
                tracing::warn!(
                    "Filler generation returned no usable word for prompt {}, using random word",
                    prompt
                );
                state.word_bank.random_word().to_string()
            } else {
                word.to_string()
            }
        }
        Err(e) => {
            tracing::warn!(
                "Filler generation failed for prompt {}: {}, using random word",
                prompt,
                e
            );
            state.word_bank.random_word().to_string()
        }
    }
}

/// First whitespace-delimited token, shorn of surrounding punctuation, so
/// `"Kat." ` groups with `kat`.
fn first_word(text: &str) -> &str {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameConfig;
    use crate::words::WordBank;

    fn session_with_humans(count: usize) -> Session {
        let mut session = Session::new("FEST".to_string());
        for i in 0..count {
            let id = format!("p{}", i + 1);
            session
                .players
                .insert(id.clone(), Player::new(id, format!("Human {}", i + 1)));
        }
        session
    }

    #[test]
    fn test_one_human_gets_topped_up_to_minimum() {
        let mut session = session_with_humans(1);
        let added = rebalance(&mut session, 3);

        assert_eq!(added.len(), 2);
        assert_eq!(session.players.len(), 3);
        assert_eq!(session.human_count(), 1);
    }

    #[test]
    fn test_enough_humans_sheds_all_fillers() {
        let mut session = session_with_humans(1);
        rebalance(&mut session, 3);
        assert_eq!(session.players.len(), 3);

        // two more humans arrive
        session
            .players
            .insert("p2".to_string(), Player::new("p2".to_string(), "B".to_string()));
        session
            .players
            .insert("p3".to_string(), Player::new("p3".to_string(), "C".to_string()));

        let added = rebalance(&mut session, 3);
        assert!(added.is_empty());
        assert_eq!(session.players.len(), 3);
        assert_eq!(session.human_count(), 3);
    }

    #[test]
    fn test_partial_shed_keeps_roster_at_minimum() {
        let mut session = session_with_humans(1);
        rebalance(&mut session, 3);

        session
            .players
            .insert("p2".to_string(), Player::new("p2".to_string(), "B".to_string()));
        rebalance(&mut session, 3);

        assert_eq!(session.players.len(), 3);
        assert_eq!(session.human_count(), 2);
        assert_eq!(session.players.values().filter(|p| p.is_filler).count(), 1);
    }

    #[test]
    fn test_zero_minimum_never_adds_fillers() {
        let mut session = session_with_humans(1);
        let added = rebalance(&mut session, 0);
        assert!(added.is_empty());
        assert_eq!(session.players.len(), 1);
    }

    #[test]
    fn test_rebalance_never_removes_humans() {
        let mut session = session_with_humans(5);
        rebalance(&mut session, 3);
        assert_eq!(session.human_count(), 5);
        assert_eq!(session.players.len(), 5);
    }

    #[test]
    fn test_first_word_truncation() {
        assert_eq!(first_word("kat"), "kat");
        assert_eq!(first_word("  kat hund  "), "kat");
        assert_eq!(first_word("Kat."), "Kat");
        assert_eq!(first_word("\"hund\""), "hund");
        assert_eq!(first_word("én-to"), "én-to");
        assert_eq!(first_word(""), "");
        assert_eq!(first_word("..."), "");
    }

    #[tokio::test]
    async fn test_generation_without_provider_falls_back_to_bank() {
        let bank = WordBank::new(vec!["hund".to_string(), "kat".to_string()]).unwrap();
        let state = AppState::new(bank, GameConfig::default());

        let answer = generate_answer(&state, "sol").await;
        assert!(answer == "hund" || answer == "kat");
    }
}
