//! Authoritative session host.
//!
//! Owns every [`Session`], serializes actions per session and pushes a fresh
//! snapshot to every subscriber after each accepted transition.
//!
//! ```text
//! ┌──────────────────────────── SessionHost ─────────────────────────────┐
//! │  sessions: id ──▶ Arc<SessionSlot>                                   │
//! │                     └─ Mutex<SlotState>                              │
//! │                          ├─ session      (state machine)             │
//! │                          └─ subscribers  (user, mpsc::Sender)        │
//! │                                                                      │
//! │  action ──▶ lock slot ──▶ Session::* ──▶ publish snapshot_for(each)  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Publishing happens while the slot is still locked, so every subscriber
//! receives snapshots in the order the transitions were applied. Different
//! sessions never contend with each other.
//!
//! The host implements [`GameApi`] and [`PushTransport`], so clients can be
//! pointed straight at it in-process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{HostConfig, SeatReleasePolicy};
use crate::state::{
    Capacity, GameError, Session, SessionId, SessionSnapshot, SessionStatus, SessionSummary,
    UserId,
};
use crate::sync::api::{GameApi, PushTransport, Result};

struct Subscriber {
    user_id: UserId,
    tx: mpsc::Sender<SessionSnapshot>,
}

struct SlotState {
    session: Session,
    subscribers: Vec<Subscriber>,
    /// Set once the slot has been removed from the host
    closed: bool,
}

impl SlotState {
    /// Push the current state to every subscriber, projected per viewer.
    ///
    /// Subscribers that are gone or too far behind are dropped; their sync
    /// loop sees the channel close and resyncs from a fresh baseline.
    fn publish(&mut self) {
        let session = &self.session;
        self.subscribers.retain(|sub| {
            match sub.tx.try_send(session.snapshot_for(&sub.user_id)) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        session_id = %session.id,
                        user_id = %sub.user_id,
                        "Subscriber too slow, dropping"
                    );
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session_id = %session.id, user_id = %sub.user_id, "Subscriber gone");
                    false
                }
            }
        });
    }
}

struct SessionSlot {
    inner: Mutex<SlotState>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(SlotState {
                session,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }
}

/// The authoritative side of every duel.
pub struct SessionHost {
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
    config: HostConfig,
}

impl Default for SessionHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHost {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    async fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>, GameError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(GameError::SessionNotFound)
    }

    /// Run one action against a session under its lock.
    ///
    /// Publishes if the action changed the session and returns the caller's
    /// view of the result.
    async fn act<T>(
        &self,
        session_id: &str,
        viewer: &str,
        action: impl FnOnce(&mut Session) -> Result<T, GameError>,
    ) -> Result<(T, SessionSnapshot), GameError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.inner.lock().await;
        if state.closed {
            return Err(GameError::SessionNotFound);
        }

        let before = state.session.version();
        let out = action(&mut state.session)?;
        if state.session.version() != before {
            state.publish();
        }
        Ok((out, state.session.snapshot_for(viewer)))
    }

    /// Register a push subscriber for a session.
    pub async fn subscribe(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<mpsc::Receiver<SessionSnapshot>, GameError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.inner.lock().await;
        if state.closed {
            return Err(GameError::SessionNotFound);
        }

        let (tx, rx) = mpsc::channel(self.config.push_buffer.max(1));
        state.subscribers.push(Subscriber {
            user_id: user_id.to_string(),
            tx,
        });
        debug!(
            session_id,
            user_id,
            subscribers = state.subscribers.len(),
            "Subscribed to session"
        );
        Ok(rx)
    }

    /// Drop a user's push subscriptions for a session.
    ///
    /// Under [`SeatReleasePolicy::ReleaseWhileWaiting`] the user's seat in a
    /// waiting session is freed too, and a session left empty is removed.
    pub async fn unsubscribe(&self, user_id: &str, session_id: &str) -> Result<(), GameError> {
        let slot = self.slot(session_id).await?;
        let now_empty = {
            let mut state = slot.inner.lock().await;
            state.subscribers.retain(|s| s.user_id != user_id);

            let release = self.config.seat_release == SeatReleasePolicy::ReleaseWhileWaiting
                && state.session.status() == SessionStatus::Waiting;
            if release && state.session.release_seat(user_id)? {
                info!(session_id, user_id, "Seat released");
                state.publish();
            }
            state.session.is_empty()
        };

        if now_empty {
            let mut sessions = self.sessions.write().await;
            let mut state = slot.inner.lock().await;
            // someone may have joined in between
            if state.session.is_empty() {
                state.closed = true;
                sessions.remove(session_id);
                info!(session_id, "Removed empty session");
            }
        }
        Ok(())
    }

    /// Drop every push subscription of a session, as a lost connection would.
    ///
    /// Returns how many subscriptions were closed.
    pub async fn close_subscriptions(&self, session_id: &str) -> Result<usize, GameError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.inner.lock().await;
        let closed = state.subscribers.len();
        state.subscribers.clear();
        warn!(session_id, closed, "Closed all subscriptions");
        Ok(closed)
    }

    /// Remove finished sessions. Returns the removed ids.
    pub async fn cleanup_finished(&self) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().await;
        let mut removed = Vec::new();
        for (id, slot) in sessions.iter() {
            let mut state = slot.inner.lock().await;
            if state.session.status().is_terminal() {
                state.closed = true;
                state.subscribers.clear();
                removed.push(id.clone());
            }
        }
        for id in &removed {
            sessions.remove(id);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Cleaned up finished sessions");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sessions currently being played.
    pub async fn active_count(&self) -> usize {
        let slots: Vec<Arc<SessionSlot>> = self.sessions.read().await.values().cloned().collect();
        let mut active = 0;
        for slot in slots {
            if slot.inner.lock().await.session.status().is_active() {
                active += 1;
            }
        }
        active
    }

    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        match self.slot(session_id).await {
            Ok(slot) => slot.inner.lock().await.subscribers.len(),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl GameApi for SessionHost {
    async fn create_session(&self, user_id: &str, capacity: Capacity) -> Result<SessionSnapshot> {
        let id = Uuid::new_v4().to_string();
        let session = Session::create(id.clone(), user_id.to_string(), capacity);
        let snapshot = session.snapshot_for(user_id);

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(SessionSlot::new(session)));
        info!(session_id = %id, user_id, capacity = %capacity, "Session created");
        Ok(snapshot)
    }

    async fn join_session(&self, user_id: &str, session_id: &str) -> Result<SessionSnapshot> {
        let ((), snapshot) = self
            .act(session_id, user_id, |s| s.join(user_id.to_string()))
            .await?;
        info!(
            session_id,
            user_id,
            seated = snapshot.players.len(),
            "Player joined"
        );
        Ok(snapshot)
    }

    async fn list_open_sessions(&self, _user_id: &str) -> Result<Vec<SessionSummary>> {
        let slots: Vec<Arc<SessionSlot>> = self.sessions.read().await.values().cloned().collect();
        let mut open = Vec::new();
        for slot in slots {
            let state = slot.inner.lock().await;
            if !state.closed && state.session.status() == SessionStatus::Waiting {
                open.push(state.session.summary());
            }
        }
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn set_secret(
        &self,
        user_id: &str,
        session_id: &str,
        secret: &str,
    ) -> Result<SessionSnapshot> {
        let ((), snapshot) = self
            .act(session_id, user_id, |s| s.set_secret(user_id, secret))
            .await?;
        if snapshot.status == SessionStatus::Active {
            info!(
                session_id,
                turn_holder = ?snapshot.turn_holder,
                "Session started"
            );
        } else {
            debug!(session_id, user_id, "Secret set");
        }
        Ok(snapshot)
    }

    async fn submit_guess(
        &self,
        user_id: &str,
        session_id: &str,
        guess: &str,
    ) -> Result<SessionSnapshot> {
        let (outcome, snapshot) = self
            .act(session_id, user_id, |s| s.guess(user_id, guess))
            .await?;
        debug!(
            session_id,
            guesser = %outcome.guesser,
            target = %outcome.target,
            score = %outcome.score,
            "Guess scored"
        );
        if let Some(victim) = &outcome.eliminated {
            info!(session_id, eliminated = %victim, "Player eliminated");
        }
        if outcome.finished {
            info!(session_id, winner = ?snapshot.winner, "Session finished");
        }
        Ok(snapshot)
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<SessionSnapshot> {
        let slot = self.slot(session_id).await?;
        let state = slot.inner.lock().await;
        if state.closed {
            return Err(GameError::SessionNotFound.into());
        }
        Ok(state.session.snapshot_for(user_id))
    }
}

#[async_trait]
impl PushTransport for SessionHost {
    async fn join_updates(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<mpsc::Receiver<SessionSnapshot>> {
        self.subscribe(user_id, session_id)
            .await
            .map_err(Into::into)
    }

    async fn leave_updates(&self, user_id: &str, session_id: &str) -> Result<()> {
        match self.unsubscribe(user_id, session_id).await {
            // already gone, nothing to leave
            Err(GameError::SessionNotFound) => Ok(()),
            other => other.map_err(Into::into),
        }
    }
}
