//! Lobby listing as seen by one user.
//!
//! The lobby is just the set of sessions still waiting for players. Each
//! entry says what the user can do with it: take a seat, go back to a seat
//! they already hold, or nothing because the table is full.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::api::Result;
use super::client::DuelClient;
use crate::state::{Capacity, SessionSnapshot, SessionStatus, SessionSummary};

/// What the user can do with a listed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyAction {
    Join,
    /// Already seated here
    Resume,
    Full,
}

impl LobbyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Resume => "resume",
            Self::Full => "full",
        }
    }
}

/// One listed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyEntry {
    pub summary: SessionSummary,
    pub action: LobbyAction,
}

impl LobbyEntry {
    fn for_user(summary: SessionSummary, user_id: &str) -> Self {
        let action = if summary.players.iter().any(|p| p == user_id) {
            LobbyAction::Resume
        } else if summary.is_full() {
            LobbyAction::Full
        } else {
            LobbyAction::Join
        };
        Self { summary, action }
    }

    /// Convert to JSON for a lobby screen.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sessionId": self.summary.id,
            "hostId": self.summary.host_id,
            "capacity": self.summary.capacity,
            "players": self.summary.players,
            "seatsLeft": self.summary.seats_left(),
            "action": self.action.as_str(),
        })
    }
}

/// Lobby listing for one user.
#[derive(Debug, Clone)]
pub struct LobbyView {
    client: DuelClient,
    entries: Vec<LobbyEntry>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl LobbyView {
    pub fn new(client: DuelClient) -> Self {
        Self {
            client,
            entries: Vec::new(),
            refreshed_at: None,
        }
    }

    /// Reload the listing. Newest sessions first.
    pub async fn refresh(&mut self) -> Result<&[LobbyEntry]> {
        let user_id = self.client.user_id().to_string();
        let mut summaries: Vec<SessionSummary> = self
            .client
            .open_sessions()
            .await?
            .into_iter()
            .filter(|s| s.status == SessionStatus::Waiting)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        self.entries = summaries
            .into_iter()
            .map(|s| LobbyEntry::for_user(s, &user_id))
            .collect();
        self.refreshed_at = Some(Utc::now());
        debug!(user_id = %user_id, sessions = self.entries.len(), "Lobby refreshed");
        Ok(&self.entries)
    }

    pub fn entries(&self) -> &[LobbyEntry] {
        &self.entries
    }

    pub fn entry(&self, session_id: &str) -> Option<&LobbyEntry> {
        self.entries.iter().find(|e| e.summary.id == session_id)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Create a session with 2 or 3 seats.
    pub async fn create(&mut self, seats: u8) -> Result<SessionSnapshot> {
        let capacity = Capacity::try_from(seats)?;
        self.client.create(capacity).await
    }

    /// Take a seat, or go back to one already held.
    pub async fn join(&mut self, session_id: &str) -> Result<SessionSnapshot> {
        match self.entry(session_id).map(|e| e.action) {
            Some(LobbyAction::Resume) => self.client.resume(session_id).await,
            _ => self.client.join(session_id).await,
        }
    }
}
