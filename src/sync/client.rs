//! Client facade for one signed-in user.
//!
//! [`DuelClient`] wraps the two collaborators with the caller's identity,
//! validates input locally before a round trip, and folds every action
//! result into the shared [`SessionStore`] so the cache moves forward even
//! before the matching push arrives.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::api::{GameApi, PushTransport, Result};
use super::channel::{SyncChannel, SyncEvent};
use super::lobby::LobbyView;
use super::store::{ForeignStore, SessionStore};
use crate::config::SyncConfig;
use crate::state::{Capacity, GuessValue, Secret, SessionSnapshot, SessionSummary, UserId};

/// One user's handle on the game.
///
/// Cheap to clone; clones share the store and collaborators.
#[derive(Clone)]
pub struct DuelClient {
    user_id: UserId,
    api: Arc<dyn GameApi>,
    transport: Arc<dyn PushTransport>,
    store: SessionStore,
    config: SyncConfig,
}

impl DuelClient {
    pub fn new(
        user_id: impl Into<UserId>,
        api: Arc<dyn GameApi>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            store: SessionStore::for_user(user_id.clone()),
            user_id,
            api,
            transport,
            config: SyncConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a store with other handles for the same user.
    ///
    /// Cached snapshots are projected for their viewer, so a store that
    /// already belongs to a different user is refused.
    pub fn with_store(mut self, store: SessionStore) -> std::result::Result<Self, ForeignStore> {
        self.store = store.claim(&self.user_id)?;
        Ok(self)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create a session and take the first seat.
    pub async fn create(&self, capacity: Capacity) -> Result<SessionSnapshot> {
        let snapshot = self.api.create_session(&self.user_id, capacity).await?;
        info!(
            user_id = %self.user_id,
            session_id = %snapshot.id,
            capacity = %capacity,
            "Created session"
        );
        self.absorb(snapshot).await
    }

    pub async fn join(&self, session_id: &str) -> Result<SessionSnapshot> {
        let snapshot = self.api.join_session(&self.user_id, session_id).await?;
        info!(user_id = %self.user_id, session_id, "Joined session");
        self.absorb(snapshot).await
    }

    /// Re-fetch a session the user already sits in.
    pub async fn resume(&self, session_id: &str) -> Result<SessionSnapshot> {
        let snapshot = self.api.get_session(&self.user_id, session_id).await?;
        self.absorb(snapshot).await
    }

    /// Set this user's secret. Malformed secrets never leave the client.
    pub async fn set_secret(&self, session_id: &str, secret: &str) -> Result<SessionSnapshot> {
        let secret = Secret::parse(secret)?;
        let snapshot = self
            .api
            .set_secret(&self.user_id, session_id, secret.as_str())
            .await?;
        self.absorb(snapshot).await
    }

    /// Submit a guess. Malformed guesses never leave the client.
    pub async fn guess(&self, session_id: &str, guess: &str) -> Result<SessionSnapshot> {
        let guess = GuessValue::parse(guess)?;
        let snapshot = self
            .api
            .submit_guess(&self.user_id, session_id, guess.as_str())
            .await?;
        self.absorb(snapshot).await
    }

    pub async fn open_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.api.list_open_sessions(&self.user_id).await
    }

    /// Start a sync loop for a session.
    pub fn subscribe(&self, session_id: &str) -> (SyncChannel, mpsc::Receiver<SyncEvent>) {
        SyncChannel::open(
            self.api.clone(),
            self.transport.clone(),
            self.store.clone(),
            self.user_id.clone(),
            session_id,
            &self.config,
        )
    }

    /// Last known snapshot of a session.
    pub async fn current(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.store.get(session_id).await
    }

    pub fn lobby(&self) -> LobbyView {
        LobbyView::new(self.clone())
    }

    /// Cache the result and return the freshest snapshot known.
    ///
    /// If a push already moved the cache past the result, the cached one wins.
    async fn absorb(&self, snapshot: SessionSnapshot) -> Result<SessionSnapshot> {
        let session_id = snapshot.id.clone();
        if let Err(stale) = self.store.reconcile(snapshot.clone()).await {
            debug!("{stale}");
            if let Some(cached) = self.store.get(&session_id).await {
                return Ok(cached);
            }
        }
        Ok(snapshot)
    }
}

impl std::fmt::Debug for DuelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelClient")
            .field("user_id", &self.user_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SessionHost;
    use crate::state::{GameError, SessionStatus};
    use crate::sync::SyncError;
    use pretty_assertions::assert_eq;

    fn clients() -> (Arc<SessionHost>, DuelClient, DuelClient) {
        let host = Arc::new(SessionHost::new());
        let alice = DuelClient::new("alice", host.clone(), host.clone());
        let bob = DuelClient::new("bob", host.clone(), host.clone());
        (host, alice, bob)
    }

    #[tokio::test]
    async fn test_actions_update_store() {
        let (_host, alice, bob) = clients();

        let created = alice.create(Capacity::Two).await.unwrap();
        assert_eq!(alice.current(&created.id).await, Some(created.clone()));

        bob.join(&created.id).await.unwrap();
        alice.set_secret(&created.id, "1234").await.unwrap();
        let active = bob.set_secret(&created.id, "5678").await.unwrap();
        assert_eq!(active.status, SessionStatus::Active);

        // alice's cache is still at her own last action until she syncs
        let cached = alice.current(&created.id).await.unwrap();
        assert_eq!(cached.status, SessionStatus::Waiting);

        let resumed = alice.resume(&created.id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
        assert_eq!(alice.current(&created.id).await, Some(resumed));
    }

    #[tokio::test]
    async fn test_local_validation() {
        let (host, alice, _bob) = clients();
        let created = alice.create(Capacity::Two).await.unwrap();
        let version = created.version;

        assert_eq!(
            alice.set_secret(&created.id, "1123").await,
            Err(SyncError::Rejected(GameError::InvalidSecretFormat))
        );
        assert_eq!(
            alice.guess(&created.id, "12a4").await,
            Err(SyncError::Rejected(GameError::InvalidGuessFormat))
        );

        // nothing reached the host
        let fetched = host.get_session("alice", &created.id).await.unwrap();
        assert_eq!(fetched.version, version);
    }

    #[tokio::test]
    async fn test_rejections_leave_cache_alone() {
        let (_host, alice, bob) = clients();
        let created = alice.create(Capacity::Two).await.unwrap();
        bob.join(&created.id).await.unwrap();
        alice.set_secret(&created.id, "1234").await.unwrap();
        bob.set_secret(&created.id, "5678").await.unwrap();
        let before = bob.current(&created.id).await;

        assert_eq!(
            bob.guess(&created.id, "1234").await,
            Err(SyncError::Rejected(GameError::NotYourTurn))
        );
        assert_eq!(bob.current(&created.id).await, before);
    }

    #[tokio::test]
    async fn test_stale_result_returns_cached() {
        let (_host, alice, bob) = clients();
        let created = alice.create(Capacity::Two).await.unwrap();
        let joined = bob.join(&created.id).await.unwrap();

        // a newer snapshot lands in alice's cache first
        alice.store().reconcile(joined.clone()).await.unwrap();
        let out = alice.absorb(created).await.unwrap();
        assert_eq!(out, joined);
    }

    #[tokio::test]
    async fn test_store_shared_only_by_same_user() {
        let (host, alice, _bob) = clients();
        let created = alice.create(Capacity::Two).await.unwrap();

        // a second handle for alice sees what the first one cached
        let again = DuelClient::new("alice", host.clone(), host.clone())
            .with_store(alice.store().clone())
            .unwrap();
        assert_eq!(again.current(&created.id).await, Some(created));

        let err = DuelClient::new("bob", host.clone(), host.clone())
            .with_store(alice.store().clone())
            .unwrap_err();
        assert_eq!(err.owner, "alice");
        assert_eq!(err.user, "bob");

        // an unbound store is taken by its first user
        let fresh = SessionStore::new();
        let carol = DuelClient::new("carol", host.clone(), host.clone())
            .with_store(fresh.clone())
            .unwrap();
        assert_eq!(carol.store().owner(), Some("carol"));
        assert!(DuelClient::new("dave", host.clone(), host)
            .with_store(fresh)
            .is_err());
    }
}
