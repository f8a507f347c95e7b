//! Authoritative session state machine.
//!
//! ```text
//! ┌─────────┐  all seats filled   ┌────────┐  last secret    ┌──────────┐
//! │ Waiting │──and every secret──▶│ Active │──guessed───────▶│ Finished │
//! └─────────┘       set           └────────┘                 └──────────┘
//!   join / set_secret             guess (turn holder only)     terminal
//! ```
//!
//! Every method either applies a complete transition and bumps the version,
//! or returns a [`GameError`] and leaves the session untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GameError;
use super::player::{Player, UserId};
use super::scoring::{GuessValue, Score, Secret};
use super::snapshot::{PlayerView, SessionSnapshot, SessionSummary};
use super::turn;

/// Opaque session identifier.
pub type SessionId = String;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Seats filling up and secrets being set
    #[default]
    Waiting,
    /// Guessing in progress
    Active,
    /// Winner decided
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    /// Position in the lifecycle; later states rank higher.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Active => 1,
            Self::Finished => 2,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of seats, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Capacity {
    Two,
    Three,
}

impl Capacity {
    pub fn seats(&self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for Capacity {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            requested => Err(GameError::InvalidCapacity { requested }),
        }
    }
}

impl From<Capacity> for u8 {
    fn from(capacity: Capacity) -> Self {
        capacity.seats() as u8
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seats())
    }
}

/// What a single accepted guess did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    pub guesser: UserId,
    pub target: UserId,
    pub score: Score,
    /// Set when the guess knocked the target out of a 3-player game
    pub eliminated: Option<UserId>,
    pub finished: bool,
}

/// One duel session, owned by the authoritative process.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// Creator, shown in the lobby; no extra powers
    pub host_id: UserId,

    pub capacity: Capacity,

    status: SessionStatus,

    /// Seats in join order
    players: Vec<Player>,

    turn_holder: Option<UserId>,

    winner: Option<UserId>,

    runner_up: Option<UserId>,

    /// Accepted transitions so far
    version: u64,

    pub created_at: DateTime<Utc>,

    /// When the session went Active
    pub started_at: Option<DateTime<Utc>>,

    /// When the session finished
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session with the host already seated.
    pub fn create(id: SessionId, host_id: UserId, capacity: Capacity) -> Self {
        Self {
            id,
            players: vec![Player::new(host_id.clone())],
            host_id,
            capacity,
            status: SessionStatus::Waiting,
            turn_holder: None,
            winner: None,
            runner_up: None,
            version: 1,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn has_player(&self, user_id: &str) -> bool {
        self.player(user_id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity.seats()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn turn_holder(&self) -> Option<&str> {
        self.turn_holder.as_deref()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn runner_up(&self) -> Option<&str> {
        self.runner_up.as_deref()
    }

    /// Take the next free seat.
    pub fn join(&mut self, user_id: UserId) -> Result<(), GameError> {
        if self.has_player(&user_id) {
            return Err(GameError::AlreadyJoined);
        }
        if self.status != SessionStatus::Waiting {
            return Err(GameError::SessionNotJoinable);
        }
        if self.is_full() {
            return Err(GameError::SessionFull);
        }

        self.players.push(Player::new(user_id));
        self.version += 1;
        Ok(())
    }

    /// Give up a seat before the game starts.
    ///
    /// Returns `false` when the player was not seated. Seats are never
    /// released once the session is active.
    pub fn release_seat(&mut self, user_id: &str) -> Result<bool, GameError> {
        if self.status != SessionStatus::Waiting {
            return Err(GameError::NotWaiting);
        }
        let before = self.players.len();
        self.players.retain(|p| p.user_id != user_id);
        if self.players.len() == before {
            return Ok(false);
        }
        self.version += 1;
        Ok(true)
    }

    /// Set a player's secret, starting the game once everyone is ready.
    pub fn set_secret(&mut self, user_id: &str, raw: &str) -> Result<(), GameError> {
        if self.status != SessionStatus::Waiting {
            return Err(GameError::NotWaiting);
        }
        let secret = Secret::parse(raw)?;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(GameError::NotAPlayer)?;
        player.set_secret(secret)?;
        self.version += 1;

        if self.is_full() && self.players.iter().all(Player::is_ready) {
            self.start();
        }
        Ok(())
    }

    fn start(&mut self) {
        turn::assign_targets(&mut self.players);
        self.turn_holder = turn::first_turn(&self.players);
        self.status = SessionStatus::Active;
        self.started_at = Some(Utc::now());
    }

    /// Score a guess from the turn holder against their target.
    pub fn guess(&mut self, user_id: &str, raw: &str) -> Result<GuessOutcome, GameError> {
        if self.status != SessionStatus::Active {
            return Err(GameError::NotActive);
        }
        if !self.has_player(user_id) {
            return Err(GameError::NotAPlayer);
        }
        if self.turn_holder.as_deref() != Some(user_id) {
            return Err(GameError::NotYourTurn);
        }
        let value = GuessValue::parse(raw)?;

        let target_id = self
            .player(user_id)
            .and_then(|p| p.target_id.clone())
            .ok_or(GameError::NotActive)?;
        let score = self
            .player(&target_id)
            .and_then(Player::secret)
            .map(|secret| secret.score(&value))
            .ok_or(GameError::NotActive)?;

        let now = Utc::now();
        if let Some(guesser) = self.players.iter_mut().find(|p| p.user_id == user_id) {
            guesser.record_guess(value, score, now);
        }
        self.version += 1;

        let mut outcome = GuessOutcome {
            guesser: user_id.to_string(),
            target: target_id.clone(),
            score,
            eliminated: None,
            finished: false,
        };

        if score.is_win() {
            if self.capacity == Capacity::Three {
                let order = (self.players.len() - turn::remaining(&self.players)) as u8;
                turn::eliminate(&mut self.players, &target_id, order);
                outcome.eliminated = Some(target_id.clone());
            }
            if self.capacity == Capacity::Two || turn::remaining(&self.players) <= 1 {
                self.finish(user_id.to_string(), target_id);
                outcome.finished = true;
                return Ok(outcome);
            }
        }

        self.turn_holder = turn::next_turn(&self.players, user_id);
        Ok(outcome)
    }

    fn finish(&mut self, winner: UserId, runner_up: UserId) {
        self.status = SessionStatus::Finished;
        self.turn_holder = None;
        self.winner = Some(winner);
        self.runner_up = Some(runner_up);
        self.ended_at = Some(now_after(self.started_at));
    }

    /// Project the session for one viewer, withholding everyone else's secret.
    pub fn snapshot_for(&self, viewer: &str) -> SessionSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                user_id: p.user_id.clone(),
                secret: (p.user_id == viewer)
                    .then(|| p.secret().map(|s| s.as_str().to_string()))
                    .flatten(),
                target_id: p.target_id.clone(),
                guess_log: p.guesses().to_vec(),
                best_dead_score: p.best_dead_score,
                ready: p.is_ready(),
                eliminated: p.is_eliminated(),
                eliminated_at: p.eliminated_at,
            })
            .collect();

        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            capacity: self.capacity,
            players,
            turn_holder: self.turn_holder.clone(),
            winner: self.winner.clone(),
            runner_up: self.runner_up.clone(),
            host_id: self.host_id.clone(),
            version: Some(self.version),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            capacity: self.capacity,
            status: self.status,
            players: self.players.iter().map(|p| p.user_id.clone()).collect(),
            created_at: self.created_at,
        }
    }
}

fn now_after(start: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    start.map_or(now, |s| now.max(s))
}
