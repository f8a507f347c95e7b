//! Immutable, serializable views of a session.
//!
//! Snapshots are what crosses the wire, both as responses to actions and as
//! pushed updates. They are always complete: a client replaces its cached
//! snapshot wholesale and never patches one.
//!
//! Every snapshot is projected for one viewer. Only the viewer's own secret
//! is filled in; everybody else's is `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::player::{Guess, UserId};
use super::session::{Capacity, SessionId, SessionStatus};

/// One player as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    /// Present only in the owner's own snapshot
    pub secret: Option<String>,
    pub target_id: Option<UserId>,
    pub guess_log: Vec<Guess>,
    pub best_dead_score: u8,
    pub ready: bool,
    pub eliminated: bool,
    #[serde(default)]
    pub eliminated_at: Option<u8>,
}

/// Complete point-in-time state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: SessionStatus,
    pub capacity: Capacity,
    pub players: Vec<PlayerView>,
    pub turn_holder: Option<UserId>,
    pub winner: Option<UserId>,
    pub runner_up: Option<UserId>,
    pub host_id: UserId,
    /// Bumped on every accepted transition; older payloads may omit it
    #[serde(default)]
    pub version: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Ordering key for snapshots that carry no explicit version.
///
/// Every component only grows over a session's life, so comparing the tuple
/// lexicographically orders snapshots of the same session. The turn holder
/// changes only together with the guess count and adds nothing to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DerivedVersion {
    pub status: u8,
    pub seated: usize,
    pub ready: usize,
    pub guesses: usize,
    pub eliminated: usize,
}

impl SessionSnapshot {
    pub fn player(&self, user_id: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn has_player(&self, user_id: &str) -> bool {
        self.player(user_id).is_some()
    }

    pub fn is_turn_of(&self, user_id: &str) -> bool {
        self.status == SessionStatus::Active && self.turn_holder.as_deref() == Some(user_id)
    }

    /// The opponent `user_id` is currently guessing against.
    pub fn target_of(&self, user_id: &str) -> Option<&PlayerView> {
        let target = self.player(user_id)?.target_id.as_deref()?;
        self.player(target)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity.seats()
    }

    pub fn is_joinable(&self) -> bool {
        self.status == SessionStatus::Waiting && !self.is_full()
    }

    pub fn total_guesses(&self) -> usize {
        self.players.iter().map(|p| p.guess_log.len()).sum()
    }

    pub fn derived_version(&self) -> DerivedVersion {
        DerivedVersion {
            status: self.status.rank(),
            seated: self.players.len(),
            ready: self.players.iter().filter(|p| p.ready).count(),
            guesses: self.total_guesses(),
            eliminated: self.players.iter().filter(|p| p.eliminated).count(),
        }
    }

    /// Whether this snapshot supersedes `other`.
    ///
    /// Uses the explicit version when both sides have one, otherwise the
    /// derived key.
    pub fn is_newer_than(&self, other: &SessionSnapshot) -> bool {
        match (self.version, other.version) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => self.derived_version() > other.derived_version(),
        }
    }

    /// Finishing order: winner first, then runner-up, then the rest by how
    /// long they survived. Empty until the session is finished.
    pub fn standings(&self) -> Vec<UserId> {
        if self.status != SessionStatus::Finished {
            return Vec::new();
        }

        let mut order: Vec<UserId> = self
            .winner
            .iter()
            .chain(self.runner_up.iter())
            .cloned()
            .collect();

        let mut rest: Vec<&PlayerView> = self
            .players
            .iter()
            .filter(|p| !order.contains(&p.user_id))
            .collect();
        rest.sort_by(|a, b| b.eliminated_at.cmp(&a.eliminated_at));
        order.extend(rest.into_iter().map(|p| p.user_id.clone()));
        order
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

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Lobby listing entry for an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub host_id: UserId,
    pub capacity: Capacity,
    pub status: SessionStatus,
    pub players: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn seats_left(&self) -> usize {
        self.capacity.seats().saturating_sub(self.players.len())
    }

    pub fn is_full(&self) -> bool {
        self.seats_left() == 0
    }
}
