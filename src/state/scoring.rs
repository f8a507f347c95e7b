//! Dead/wounded scoring.
//!
//! A guess is scored position by position against a secret:
//!
//! - **dead**: the guessed digit matches the secret at the same position.
//! - **wounded**: the guessed digit occurs somewhere else in the secret.
//!
//! Secrets never repeat a digit, so each guessed digit maps to at most one
//! secret position. A wounded count is only taken against a secret digit
//! that is not already dead. Guesses may repeat digits and every repetition
//! that hits a live (non-dead) secret digit counts as wounded on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::GameError;

/// Number of digits in a secret or a guess.
pub const CODE_LENGTH: usize = 4;

/// Result of scoring one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub dead: u8,
    pub wounded: u8,
}

impl Score {
    /// All four digits in place.
    pub fn is_win(&self) -> bool {
        self.dead as usize == CODE_LENGTH
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dead, {} wounded", self.dead, self.wounded)
    }
}

/// A validated secret: exactly 4 ASCII digits, all distinct.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret([u8; CODE_LENGTH]);

impl Secret {
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let digits = four_digits(raw).ok_or(GameError::InvalidSecretFormat)?;
        for (i, d) in digits.iter().enumerate() {
            if digits[i + 1..].contains(d) {
                return Err(GameError::InvalidSecretFormat);
            }
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        // Built only from ASCII digits.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Score a guess against this secret.
    pub fn score(&self, guess: &GuessValue) -> Score {
        score_digits(&self.0, &guess.0)
    }
}

// Secrets show up in logs through session debug output; keep them out.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl TryFrom<String> for Secret {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.as_str().to_string()
    }
}

/// A validated guess: exactly 4 ASCII digits, repeats allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuessValue([u8; CODE_LENGTH]);

impl GuessValue {
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        four_digits(raw)
            .map(Self)
            .ok_or(GameError::InvalidGuessFormat)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for GuessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for GuessValue {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GuessValue> for String {
    fn from(guess: GuessValue) -> Self {
        guess.as_str().to_string()
    }
}

fn four_digits(raw: &str) -> Option<[u8; CODE_LENGTH]> {
    let bytes: [u8; CODE_LENGTH] = raw.as_bytes().try_into().ok()?;
    bytes.iter().all(u8::is_ascii_digit).then_some(bytes)
}

fn score_digits(secret: &[u8; CODE_LENGTH], guess: &[u8; CODE_LENGTH]) -> Score {
    let mut score = Score::default();
    for (i, g) in guess.iter().enumerate() {
        if *g == secret[i] {
            score.dead += 1;
            continue;
        }
        if let Some(j) = secret.iter().position(|s| s == g) {
            // That secret digit is already consumed by a dead hit.
            if guess[j] != secret[j] {
                score.wounded += 1;
            }
        }
    }
    score
}

/// Score a raw guess against a raw secret.
///
/// Validates both sides first; use [`Secret::score`] when the values are
/// already parsed.
pub fn score(secret: &str, guess: &str) -> Result<Score, GameError> {
    let secret = Secret::parse(secret)?;
    let guess = GuessValue::parse(guess)?;
    Ok(secret.score(&guess))
}
