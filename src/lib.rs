//! Duel Session Library
//!
//! Real-time "Dead or Wounded" duels for 2 or 3 players: every player hides
//! a 4-digit secret with no repeated digits, then players take turns
//! guessing their target's secret and are told how many digits are in the
//! right place (dead) and how many are right but misplaced (wounded).
//!
//! # Overview
//!
//! - **Game rules** (`state`) - scoring, turn rotation, the session state
//!   machine and per-viewer snapshots. Pure and synchronous.
//!
//! - **Host** (`host`) - the authoritative process: owns sessions,
//!   serializes actions per session and pushes snapshots to subscribers.
//!
//! - **Sync** (`sync`) - the client side: a snapshot cache that never goes
//!   backwards, a per-session sync loop that resubscribes after connection
//!   loss, a lobby view and the [`DuelClient`] facade.
//!
//! - **Config** (`config`) - tunables with defaults and `from_env` loaders.
//!
//! # Design Principles
//!
//! 1. **The host decides** - clients validate input early but every rule is
//!    enforced by the authoritative session; rejections leave it untouched.
//!
//! 2. **Snapshots are whole** - updates carry the full state and replace the
//!    cached copy, ordered by a monotonic version.
//!
//! 3. **Secrets stay private** - each snapshot is projected for its viewer.
//!
//! 4. **Identity is explicit** - every action names its caller.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use duel_session::{DuelClient, SessionHost};
//! use duel_session::state::{Capacity, SessionStatus};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let host = Arc::new(SessionHost::new());
//! let alice = DuelClient::new("alice", host.clone(), host.clone());
//! let bob = DuelClient::new("bob", host.clone(), host.clone());
//!
//! let session = alice.create(Capacity::Two).await.unwrap();
//! bob.join(&session.id).await.unwrap();
//! alice.set_secret(&session.id, "1234").await.unwrap();
//! bob.set_secret(&session.id, "5678").await.unwrap();
//!
//! let done = alice.guess(&session.id, "5678").await.unwrap();
//! assert_eq!(done.status, SessionStatus::Finished);
//! assert_eq!(done.winner.as_deref(), Some("alice"));
//! # });
//! ```

pub mod config;
pub mod host;
pub mod state;
pub mod sync;

pub use config::{HostConfig, SeatReleasePolicy, SyncConfig};
pub use host::SessionHost;
pub use sync::{DuelClient, SyncChannel, SyncError, SyncEvent};
