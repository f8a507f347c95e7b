//! Authoritative game rules for duel sessions.
//!
//! - `scoring` - dead/wounded scoring and secret/guess validation
//! - `turn` - turn rotation, targeting and elimination
//! - `player` - a seat: secret, target, guess log
//! - `session` - the session state machine
//! - `snapshot` - immutable per-viewer views that go over the wire
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │                                                               │
//! │   Waiting ──────────▶ Active ──────────▶ Finished             │
//! │      │                  │                                     │
//! │   join/set_secret     guess ──▶ scoring::score                │
//! │                         │                                     │
//! │                         └──────▶ turn::next_turn / eliminate  │
//! │                                                               │
//! │   snapshot_for(viewer) ──▶ SessionSnapshot (secrets withheld) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use duel_session::state::{Capacity, Session, SessionStatus};
//!
//! let mut session = Session::create("s-1".into(), "alice".into(), Capacity::Two);
//! session.join("bob".into()).unwrap();
//! session.set_secret("alice", "1234").unwrap();
//! session.set_secret("bob", "5678").unwrap();
//! assert_eq!(session.status(), SessionStatus::Active);
//!
//! let outcome = session.guess("alice", "5678").unwrap();
//! assert!(outcome.finished);
//! assert_eq!(session.winner(), Some("alice"));
//! ```

pub mod error;
pub mod player;
pub mod scoring;
pub mod session;
pub mod snapshot;
pub mod turn;

pub use error::GameError;
pub use player::{Guess, Player, UserId};
pub use scoring::{score, GuessValue, Score, Secret, CODE_LENGTH};
pub use session::{Capacity, GuessOutcome, Session, SessionId, SessionStatus};
pub use snapshot::{DerivedVersion, PlayerView, SessionSnapshot, SessionSummary};
