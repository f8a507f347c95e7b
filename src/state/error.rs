//! Errors raised by the authoritative session rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a player action is rejected.
///
/// A rejected action never mutates the session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameError {
    #[error("Secret must be 4 distinct digits")]
    InvalidSecretFormat,

    #[error("Guess must be exactly 4 digits")]
    InvalidGuessFormat,

    #[error("It's not your turn")]
    NotYourTurn,

    #[error("Session is full")]
    SessionFull,

    #[error("Session is no longer accepting players")]
    SessionNotJoinable,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Not a player in this session")]
    NotAPlayer,

    #[error("Already a player in this session")]
    AlreadyJoined,

    #[error("Secret has already been set")]
    SecretAlreadySet,

    #[error("Session is not waiting for players")]
    NotWaiting,

    #[error("Session is not active")]
    NotActive,

    #[error("Sessions hold 2 or 3 players, got {requested}")]
    InvalidCapacity { requested: u8 },
}

impl GameError {
    /// Whether the caller can fix the input and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidSecretFormat | Self::InvalidGuessFormat | Self::NotYourTurn
        )
    }
}
