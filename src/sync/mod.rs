//! Client-side synchronization.
//!
//! - `api` - collaborator traits and [`SyncError`]
//! - `connection` - push link status for a cached session
//! - `store` - process-wide snapshot cache with monotonic reconciliation
//! - `channel` - per-session sync loop (baseline, pushes, resync)
//! - `client` - [`DuelClient`], the surface a UI talks to
//! - `lobby` - open-session listing with per-user actions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────── DuelClient ────────────┐
//! │ create / join / set_secret / guess │──── GameApi ─────┐
//! │            │ absorb                │                  │
//! │            ▼                       │                  ▼
//! │      SessionStore ◀── reconcile ───┼── SyncChannel ◀── PushTransport
//! │            │                       │   (tokio task)
//! │            ▼                       │
//! │   current(id) / SyncEvent stream   │
//! └────────────────────────────────────┘
//! ```
//!
//! The cache only moves forward: a snapshot replaces the cached one only if
//! it is strictly newer, whether it came from an action result, a baseline
//! or a push.

pub mod api;
pub mod channel;
pub mod client;
pub mod connection;
pub mod lobby;
pub mod store;

pub use api::{GameApi, PushTransport, SyncError};
pub use channel::{SyncChannel, SyncEvent};
pub use client::DuelClient;
pub use connection::{Link, LinkStatus};
pub use lobby::{LobbyAction, LobbyEntry, LobbyView};
pub use store::{CachedSession, ForeignStore, SessionStore, StaleSnapshotIgnored};
