//! Collaborator interfaces the client talks to.
//!
//! [`GameApi`] is the request/response side (create, join, list, set a
//! secret, guess, fetch). [`PushTransport`] is the push side: one
//! subscription per session yielding full snapshots until it closes.
//!
//! Every call carries the caller's identity explicitly.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::state::{Capacity, GameError, SessionSnapshot, SessionSummary};

/// Client-side failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The authoritative side refused the action
    #[error(transparent)]
    Rejected(#[from] GameError),

    /// Transport dropped; the sync loop resubscribes on its own
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Resubscription kept failing
    #[error("Session {session_id} unavailable after {attempts} attempts")]
    Unavailable { session_id: String, attempts: u32 },

    #[error("Sync channel closed")]
    Closed,
}

impl SyncError {
    /// Worth retrying by resubscribing rather than reporting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    pub fn rejection(&self) -> Option<&GameError> {
        match self {
            Self::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Request/response operations on sessions.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Create a session with the caller seated as host.
    async fn create_session(&self, user_id: &str, capacity: Capacity) -> Result<SessionSnapshot>;

    async fn join_session(&self, user_id: &str, session_id: &str) -> Result<SessionSnapshot>;

    /// Sessions still waiting for players.
    async fn list_open_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>>;

    async fn set_secret(
        &self,
        user_id: &str,
        session_id: &str,
        secret: &str,
    ) -> Result<SessionSnapshot>;

    async fn submit_guess(
        &self,
        user_id: &str,
        session_id: &str,
        guess: &str,
    ) -> Result<SessionSnapshot>;

    /// Current authoritative snapshot, used as the sync baseline.
    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<SessionSnapshot>;
}

/// Push subscriptions scoped to one session.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Start receiving this session's snapshots.
    ///
    /// The receiver yields full snapshots in the order the authoritative side
    /// produced them. `None` from the receiver means the connection dropped.
    async fn join_updates(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<mpsc::Receiver<SessionSnapshot>>;

    /// Stop receiving this session's snapshots.
    async fn leave_updates(&self, user_id: &str, session_id: &str) -> Result<()>;
}
