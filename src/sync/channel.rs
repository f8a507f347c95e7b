//! Per-session sync loop.
//!
//! [`SyncChannel`] keeps one session's cached snapshot in step with the
//! authoritative copy. It runs as a background task:
//!
//! 1. join the session's push updates,
//! 2. fetch the current snapshot and install it as the baseline,
//! 3. apply pushed snapshots in arrival order, dropping anything that is not
//!    strictly newer than the cache,
//! 4. when the push channel closes, mark the cache stale and start over from
//!    step 1; a link that closed before carrying a push or staying up for
//!    [`SyncConfig::stable_link_after`] counts as a failed attempt and is
//!    retried with backoff,
//! 5. after too many consecutive failures, mark the session unavailable and
//!    wait for the handle to go away.
//!
//! Subscribing before fetching means no update can fall between the two:
//! anything pushed while the baseline is in flight is already queued and is
//! filtered against the baseline once it is installed.
//!
//! Leaving (or dropping the handle) stops the loop, leaves the push updates
//! and discards the cache entry.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::{GameApi, PushTransport, Result, SyncError};
use super::connection::LinkStatus;
use super::store::SessionStore;
use crate::config::SyncConfig;
use crate::state::{SessionId, SessionSnapshot, UserId};

/// What the UI hears from a sync channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The cached snapshot changed (or was re-confirmed by a baseline)
    Snapshot(SessionSnapshot),

    /// The link dropped; the last snapshot is still shown
    Reconnecting { attempt: u32 },

    /// Resubscription failed too often; no more snapshots will follow
    Unavailable { attempts: u32 },
}

/// Handle to a running sync loop for one session.
pub struct SyncChannel {
    session_id: SessionId,
    user_id: UserId,
    store: SessionStore,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl SyncChannel {
    /// Start syncing `session_id` for `user_id`.
    ///
    /// Returns the handle and the event receiver. Snapshot and unavailable
    /// events are never dropped: a reader that falls behind holds the loop
    /// back instead. Reconnecting notices are best effort.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn open(
        api: Arc<dyn GameApi>,
        transport: Arc<dyn PushTransport>,
        store: SessionStore,
        user_id: impl Into<UserId>,
        session_id: impl Into<SessionId>,
        config: &SyncConfig,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let user_id = user_id.into();
        let session_id = session_id.into();
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let sync_loop = SyncLoop {
            api,
            transport,
            store: store.clone(),
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            config: config.clone(),
            events: event_tx,
        };
        let task = tokio::spawn(sync_loop.run(shutdown_rx));

        let channel = Self {
            session_id,
            user_id,
            store,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
        };
        (channel, event_rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Last applied snapshot.
    pub async fn current(&self) -> Option<SessionSnapshot> {
        self.store.get(&self.session_id).await
    }

    pub async fn link_status(&self) -> Option<LinkStatus> {
        self.store.link_status(&self.session_id).await
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop syncing, leave the push updates and discard the cache entry.
    ///
    /// Does not touch the authoritative session.
    pub async fn leave(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(session_id = %self.session_id, error = %e, "Sync task ended abnormally");
                // It never reached its own cleanup.
                self.store.remove(&self.session_id).await;
            }
        }
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        // Dropping the sender wakes the loop, which leaves and cleans up.
        self.shutdown_tx.take();
    }
}

enum Step {
    /// Link dropped or could not be established; go round again
    Retry,
    /// Stop resubscribing and keep the unavailable entry until shutdown
    GiveUp,
}

struct SyncLoop {
    api: Arc<dyn GameApi>,
    transport: Arc<dyn PushTransport>,
    store: SessionStore,
    user_id: UserId,
    session_id: SessionId,
    config: SyncConfig,
    events: mpsc::Sender<SyncEvent>,
}

impl SyncLoop {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut failures: u32 = 0;
        loop {
            let step = tokio::select! {
                _ = &mut shutdown => break,
                step = self.cycle(&mut failures) => step,
            };
            if let Step::GiveUp = step {
                // Either a leave or a dropped handle ends the wait.
                let _ = (&mut shutdown).await;
                break;
            }
        }
        self.teardown().await;
    }

    /// One subscribe/baseline/pump round.
    async fn cycle(&self, failures: &mut u32) -> Step {
        match self.establish().await {
            Ok(mut updates) => {
                let live_since = Instant::now();
                let mut pushes: u64 = 0;
                while let Some(snapshot) = updates.recv().await {
                    pushes += 1;
                    self.apply(snapshot).await;
                }
                self.store.mark_stale(&self.session_id).await;

                if pushes > 0 || live_since.elapsed() >= self.config.stable_link_after {
                    *failures = 0;
                    warn!(
                        session_id = %self.session_id,
                        user_id = %self.user_id,
                        pushes,
                        "Push updates closed, resyncing"
                    );
                    self.emit(SyncEvent::Reconnecting { attempt: 1 }).await;
                    return Step::Retry;
                }

                warn!(
                    session_id = %self.session_id,
                    user_id = %self.user_id,
                    "Push updates closed before the link settled"
                );
                self.retry_later(failures).await
            }
            Err(SyncError::Rejected(e)) => {
                // The session itself is gone or off limits; retrying won't help.
                warn!(session_id = %self.session_id, error = %e, "Subscription rejected");
                self.give_up(*failures + 1).await;
                Step::GiveUp
            }
            Err(e) => {
                debug!(session_id = %self.session_id, error = %e, "Resubscribe failed");
                self.retry_later(failures).await
            }
        }
    }

    /// Count a failed attempt and back off, or give up after too many.
    async fn retry_later(&self, failures: &mut u32) -> Step {
        *failures += 1;
        if *failures >= self.config.max_resubscribe_attempts {
            self.give_up(*failures).await;
            return Step::GiveUp;
        }

        let delay = self.config.backoff_for(*failures);
        debug!(
            session_id = %self.session_id,
            attempt = *failures,
            delay_ms = delay.as_millis() as u64,
            "Backing off before resubscribing"
        );
        self.store.mark_stale(&self.session_id).await;
        self.emit(SyncEvent::Reconnecting {
            attempt: *failures + 1,
        })
        .await;
        tokio::time::sleep(delay).await;
        Step::Retry
    }

    /// Subscribe first, then fetch and install the baseline.
    async fn establish(&self) -> Result<mpsc::Receiver<SessionSnapshot>> {
        let updates = self
            .transport
            .join_updates(&self.user_id, &self.session_id)
            .await?;
        let baseline = self.api.get_session(&self.user_id, &self.session_id).await?;
        if baseline.id != self.session_id {
            return Err(SyncError::ConnectionLost(format!(
                "baseline for {} answered with {}",
                self.session_id, baseline.id
            )));
        }

        self.store.install_baseline(baseline).await;
        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            "Sync baseline installed"
        );
        if let Some(current) = self.store.get(&self.session_id).await {
            self.emit(SyncEvent::Snapshot(current)).await;
        }
        Ok(updates)
    }

    async fn apply(&self, snapshot: SessionSnapshot) {
        if snapshot.id != self.session_id {
            warn!(
                session_id = %self.session_id,
                other = %snapshot.id,
                "Dropping push for another session"
            );
            return;
        }
        match self.store.reconcile(snapshot.clone()).await {
            Ok(()) => {
                debug!(
                    session_id = %self.session_id,
                    version = ?snapshot.version,
                    status = %snapshot.status,
                    "Applied pushed snapshot"
                );
                self.emit(SyncEvent::Snapshot(snapshot)).await;
            }
            Err(stale) => debug!("{stale}"),
        }
    }

    async fn give_up(&self, attempts: u32) {
        warn!(
            session_id = %self.session_id,
            attempts,
            "Giving up on session updates"
        );
        self.store.mark_unavailable(&self.session_id).await;
        self.emit(SyncEvent::Unavailable { attempts }).await;
    }

    /// Hand an event to the UI.
    ///
    /// Snapshots and the unavailable notice wait for room in the channel.
    /// Reconnecting notices are dropped if the reader is behind, since the
    /// snapshot that follows them supersedes them anyway.
    async fn emit(&self, event: SyncEvent) {
        let result = match event {
            SyncEvent::Reconnecting { .. } => match self.events.try_send(event) {
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session_id = %self.session_id, "Event channel full, dropping notice");
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
                Ok(()) => Ok(()),
            },
            event => self.events.send(event).await.map_err(|_| ()),
        };
        if result.is_err() {
            debug!(session_id = %self.session_id, "Event receiver gone");
        }
    }

    async fn teardown(&self) {
        if let Err(e) = self
            .transport
            .leave_updates(&self.user_id, &self.session_id)
            .await
        {
            debug!(session_id = %self.session_id, error = %e, "Leave updates failed");
        }
        self.store.remove(&self.session_id).await;
        info!(session_id = %self.session_id, user_id = %self.user_id, "Left session updates");
    }
}
