//! Push link state for one cached session.
//!
//! Tracks whether the cached snapshot is backed by a live subscription, was
//! cut off and is being resynced, or has been given up on.
//!
//! ```text
//! ┌────────────┐ baseline ┌──────┐  push channel  ┌───────┐
//! │ Connecting │─────────▶│ Live │───closed──────▶│ Stale │◀─┐ retry
//! └────────────┘          └──────┘                └───┬───┘──┘ failed
//!                             ▲      baseline         │
//!                             └───────────────────────┤
//!                                                     │ too many failures
//!                                                     ▼
//!                                              ┌─────────────┐
//!                                              │ Unavailable │
//!                                              └─────────────┘
//! ```

use std::time::{Duration, Instant};

/// Push link status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Subscribed, waiting for the first baseline
    Connecting,

    /// Baseline installed and pushes flowing
    Live,

    /// Link dropped; the cached snapshot is kept but may be behind
    Stale { since: Instant, attempts: u32 },

    /// Resubscription kept failing
    Unavailable { since: Instant, attempts: u32 },
}

impl LinkStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Cached data may be out of date.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Failed resubscriptions since the link was last live.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Stale { attempts, .. } | Self::Unavailable { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Stale { .. } => "reconnecting",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Link bookkeeping for a cached session.
#[derive(Debug, Clone)]
pub struct Link {
    pub status: LinkStatus,

    /// When the current baseline was installed
    pub live_since: Option<Instant>,

    /// Last time a push was received, applied or not
    pub last_push: Option<Instant>,

    /// Baselines installed after the first one
    pub resyncs: u64,

    /// Pushes that replaced the cached snapshot
    pub applied: u64,

    /// Pushes dropped as not newer
    pub dropped: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        Self {
            status: LinkStatus::Connecting,
            live_since: None,
            last_push: None,
            resyncs: 0,
            applied: 0,
            dropped: 0,
        }
    }

    /// A baseline was installed.
    pub fn establish(&mut self) {
        if self.live_since.is_some() {
            self.resyncs += 1;
        }
        self.status = LinkStatus::Live;
        self.live_since = Some(Instant::now());
    }

    /// The push channel closed or a resubscription failed.
    pub fn lose(&mut self) {
        let now = Instant::now();
        self.status = match &self.status {
            LinkStatus::Stale { since, attempts } => LinkStatus::Stale {
                since: *since,
                attempts: attempts + 1,
            },
            LinkStatus::Unavailable { since, attempts } => LinkStatus::Unavailable {
                since: *since,
                attempts: *attempts,
            },
            LinkStatus::Connecting | LinkStatus::Live => LinkStatus::Stale {
                since: now,
                attempts: 0,
            },
        };
    }

    /// Resubscription has been given up on.
    pub fn give_up(&mut self) {
        let (since, attempts) = match &self.status {
            LinkStatus::Stale { since, attempts } => (*since, *attempts),
            _ => (Instant::now(), 0),
        };
        self.status = LinkStatus::Unavailable { since, attempts };
    }

    pub fn record_push(&mut self, applied: bool) {
        self.last_push = Some(Instant::now());
        if applied {
            self.applied += 1;
        } else {
            self.dropped += 1;
        }
    }

    /// How long the link has been down, if it is.
    pub fn downtime(&self) -> Option<Duration> {
        match &self.status {
            LinkStatus::Stale { since, .. } | LinkStatus::Unavailable { since, .. } => {
                Some(since.elapsed())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_new() {
        let link = Link::new();
        assert_eq!(link.status, LinkStatus::Connecting);
        assert!(!link.status.is_live());
        assert_eq!(link.downtime(), None);
    }

    #[test]
    fn test_lose_and_reestablish() {
        let mut link = Link::new();
        link.establish();
        assert!(link.status.is_live());
        assert_eq!(link.resyncs, 0);

        link.lose();
        assert!(link.status.is_stale());
        assert_eq!(link.status.attempts(), 0);
        assert!(link.downtime().is_some());

        link.lose();
        assert_eq!(link.status.attempts(), 1);

        link.establish();
        assert!(link.status.is_live());
        assert_eq!(link.resyncs, 1);
        assert_eq!(link.status.attempts(), 0);
    }

    #[test]
    fn test_give_up_keeps_attempts() {
        let mut link = Link::new();
        link.establish();
        link.lose();
        link.lose();
        link.lose();
        link.give_up();

        assert!(link.status.is_unavailable());
        assert_eq!(link.status.attempts(), 2);
        assert_eq!(link.status.as_str(), "unavailable");
    }

    #[test]
    fn test_push_counters() {
        let mut link = Link::new();
        link.record_push(true);
        link.record_push(false);
        link.record_push(false);
        assert_eq!(link.applied, 1);
        assert_eq!(link.dropped, 2);
        assert!(link.last_push.is_some());
    }
}
