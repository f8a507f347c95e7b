//! Players seated in a duel session.
//!
//! A player owns exactly one secret and an append-only log of the guesses
//! they made. Only the session mutates players; everything outside the
//! authoritative process sees them through [`PlayerView`](super::snapshot::PlayerView).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::GameError;
use super::scoring::{GuessValue, Score, Secret};

/// Stable user identity, unique within a session.
pub type UserId = String;

/// One scored guess. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub value: GuessValue,
    pub dead: u8,
    pub wounded: u8,
    pub timestamp: DateTime<Utc>,
}

impl Guess {
    pub fn score(&self) -> Score {
        Score {
            dead: self.dead,
            wounded: self.wounded,
        }
    }
}

/// A seat in a session.
#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: UserId,

    /// Never leaves the authoritative process except to its owner
    secret: Option<Secret>,

    /// Opponent this player guesses against
    pub target_id: Option<UserId>,

    guess_log: Vec<Guess>,

    /// Highest dead count reached so far; never decreases
    pub best_dead_score: u8,

    /// Position in the elimination order (0 = first out), 3-player only
    pub eliminated_at: Option<u8>,

    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            secret: None,
            target_id: None,
            guess_log: Vec::new(),
            best_dead_score: 0,
            eliminated_at: None,
            joined_at: Utc::now(),
        }
    }

    /// True once the secret is set.
    pub fn is_ready(&self) -> bool {
        self.secret.is_some()
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated_at.is_some()
    }

    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    pub fn guesses(&self) -> &[Guess] {
        &self.guess_log
    }

    pub(crate) fn set_secret(&mut self, secret: Secret) -> Result<(), GameError> {
        if self.secret.is_some() {
            return Err(GameError::SecretAlreadySet);
        }
        self.secret = Some(secret);
        Ok(())
    }

    /// Append a scored guess.
    ///
    /// Timestamps are kept strictly increasing within this log even if the
    /// wall clock stalls or steps back.
    pub(crate) fn record_guess(
        &mut self,
        value: GuessValue,
        score: Score,
        now: DateTime<Utc>,
    ) -> &Guess {
        let timestamp = match self.guess_log.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        };
        self.best_dead_score = self.best_dead_score.max(score.dead);
        self.guess_log.push(Guess {
            value,
            dead: score.dead,
            wounded: score.wounded,
            timestamp,
        });
        &self.guess_log[self.guess_log.len() - 1]
    }

    pub(crate) fn eliminate(&mut self, order: u8) {
        if self.eliminated_at.is_none() {
            self.eliminated_at = Some(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(raw: &str) -> GuessValue {
        GuessValue::parse(raw).unwrap()
    }

    #[test]
    fn test_new_player() {
        let player = Player::new("alice".to_string());
        assert!(!player.is_ready());
        assert!(!player.is_eliminated());
        assert!(player.guesses().is_empty());
        assert_eq!(player.best_dead_score, 0);
    }

    #[test]
    fn test_secret_set_once() {
        let mut player = Player::new("alice".to_string());
        player.set_secret(Secret::parse("1234").unwrap()).unwrap();
        assert!(player.is_ready());

        let again = player.set_secret(Secret::parse("5678").unwrap());
        assert_eq!(again, Err(GameError::SecretAlreadySet));
        assert_eq!(player.secret().unwrap().as_str(), "1234");
    }

    #[test]
    fn test_best_dead_score_never_decreases() {
        let mut player = Player::new("alice".to_string());
        let now = Utc::now();

        player.record_guess(guess("1200"), Score { dead: 2, wounded: 0 }, now);
        player.record_guess(guess("5678"), Score { dead: 0, wounded: 0 }, now);
        assert_eq!(player.best_dead_score, 2);

        player.record_guess(guess("1230"), Score { dead: 3, wounded: 0 }, now);
        assert_eq!(player.best_dead_score, 3);
        assert_eq!(player.guesses().len(), 3);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut player = Player::new("alice".to_string());
        let now = Utc::now();
        let earlier = now - Duration::seconds(5);

        player.record_guess(guess("1111"), Score::default(), now);
        player.record_guess(guess("2222"), Score::default(), now);
        player.record_guess(guess("3333"), Score::default(), earlier);

        let stamps: Vec<_> = player.guesses().iter().map(|g| g.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_guess_wire_shape() {
        let mut player = Player::new("alice".to_string());
        let recorded = player
            .record_guess(guess("0123"), Score { dead: 1, wounded: 2 }, Utc::now())
            .clone();

        let json = serde_json::to_value(&recorded).unwrap();
        assert_eq!(json["value"], "0123");
        assert_eq!(json["dead"], 1);
        assert_eq!(json["wounded"], 2);
        assert!(json["timestamp"].is_string());
    }
}
