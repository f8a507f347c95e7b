//! Process-wide cache of session snapshots.
//!
//! One entry per session the client takes part in. Entries appear when a
//! create/join result or a sync baseline is first seen, and disappear when
//! the client leaves. Cached snapshots are only ever replaced whole, and only
//! by something strictly newer.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::{Link, LinkStatus};
use crate::state::{SessionId, SessionSnapshot, UserId};

/// A pushed or returned snapshot was not newer than the cached one.
///
/// Informational: callers drop the snapshot and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ignored snapshot of {session_id} (version {incoming:?}): cached is {cached:?}")]
pub struct StaleSnapshotIgnored {
    pub session_id: SessionId,
    pub incoming: Option<u64>,
    pub cached: Option<u64>,
}

/// A cached snapshot and the state of its push link.
#[derive(Debug, Clone)]
pub struct CachedSession {
    pub snapshot: SessionSnapshot,
    pub link: Link,
}

impl CachedSession {
    fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot,
            link: Link::new(),
        }
    }
}

/// A store already holding one user's projections was handed to another.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Store belongs to {owner}, not {user}")]
pub struct ForeignStore {
    pub owner: UserId,
    pub user: UserId,
}

/// Shared snapshot table keyed by session id.
///
/// Snapshots are projected for one viewer, so a store is bound to the user
/// whose projections it caches. Cheap to clone; clones share the same table
/// and owner.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    owner: Arc<OnceLock<UserId>>,
    entries: Arc<RwLock<HashMap<SessionId, CachedSession>>>,
}

impl SessionStore {
    /// A store not yet bound to any user.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            owner: Arc::new(OnceLock::from(user_id.into())),
            entries: Arc::default(),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.get().map(String::as_str)
    }

    /// Bind to `user_id`, or fail if the store holds someone else's view.
    ///
    /// An unbound store is bound by the first claim; every clone sees it.
    pub fn claim(self, user_id: &str) -> Result<Self, ForeignStore> {
        let owner = self.owner.get_or_init(|| user_id.to_string());
        if owner != user_id {
            return Err(ForeignStore {
                owner: owner.clone(),
                user: user_id.to_string(),
            });
        }
        Ok(self)
    }

    /// Cached snapshot for a session.
    pub async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|e| e.snapshot.clone())
    }

    /// Cached snapshot together with its link state.
    pub async fn entry(&self, session_id: &str) -> Option<CachedSession> {
        self.entries.read().await.get(session_id).cloned()
    }

    pub async fn link_status(&self, session_id: &str) -> Option<LinkStatus> {
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|e| e.link.status.clone())
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.read().await.contains_key(session_id)
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Replace the cached snapshot if `snapshot` is strictly newer.
    ///
    /// This is the only way a cached snapshot changes after its baseline.
    /// Unknown sessions get a fresh entry.
    pub async fn reconcile(&self, snapshot: SessionSnapshot) -> Result<(), StaleSnapshotIgnored> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&snapshot.id) {
            None => {
                entries.insert(snapshot.id.clone(), CachedSession::new(snapshot));
                Ok(())
            }
            Some(entry) if snapshot.is_newer_than(&entry.snapshot) => {
                entry.snapshot = snapshot;
                entry.link.record_push(true);
                Ok(())
            }
            Some(entry) => {
                entry.link.record_push(false);
                Err(StaleSnapshotIgnored {
                    session_id: snapshot.id,
                    incoming: snapshot.version,
                    cached: entry.snapshot.version,
                })
            }
        }
    }

    /// Install a freshly fetched baseline and mark the link live.
    ///
    /// The baseline is authoritative, but a snapshot already cached that is
    /// strictly newer is kept so the applied history never goes backwards.
    /// Returns whether the cached snapshot changed.
    pub async fn install_baseline(&self, snapshot: SessionSnapshot) -> bool {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(snapshot.id.clone())
            .or_insert_with(|| CachedSession::new(snapshot.clone()));

        let replaced = if entry.snapshot.is_newer_than(&snapshot) {
            debug!(
                session_id = %snapshot.id,
                cached = ?entry.snapshot.version,
                baseline = ?snapshot.version,
                "Baseline older than cache, keeping cached snapshot"
            );
            false
        } else {
            let changed = entry.snapshot != snapshot;
            entry.snapshot = snapshot;
            changed
        };
        entry.link.establish();
        replaced
    }

    /// Flag the cached snapshot as possibly out of date.
    pub async fn mark_stale(&self, session_id: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(session_id) {
            entry.link.lose();
        }
    }

    /// Flag the session as unreachable.
    pub async fn mark_unavailable(&self, session_id: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(session_id) {
            entry.link.give_up();
        }
    }

    /// Drop the entry for a session the client left.
    pub async fn remove(&self, session_id: &str) -> Option<CachedSession> {
        self.entries.write().await.remove(session_id)
    }
}
