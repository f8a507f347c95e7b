//! Tunables for the host and the client sync loop.
//!
//! Both configs have sensible defaults, `with_*` builders for code, and a
//! `from_env` loader for deployments. Bad or missing environment values fall
//! back to the default and are logged.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

/// Default number of consecutive failed resubscriptions before a session is
/// reported unavailable.
pub const DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS: u32 = 5;

/// Default delay before the first resubscription attempt.
pub const DEFAULT_RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound for the doubling backoff.
pub const MAX_RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(10);

/// Default time a link must stay up before a drop no longer counts as a
/// failed resubscription.
pub const DEFAULT_STABLE_LINK_AFTER: Duration = Duration::from_secs(5);

/// Default capacity of the event channel handed to the UI.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default number of snapshots buffered per push subscription.
pub const DEFAULT_PUSH_BUFFER: usize = 32;

/// What happens to a seat when its player leaves a session's updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatReleasePolicy {
    /// Seats are never freed; a silent player just stops responding
    #[default]
    Keep,
    /// Leaving a session that has not started frees the seat
    ReleaseWhileWaiting,
}

impl FromStr for SeatReleasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "release_while_waiting" => Ok(Self::ReleaseWhileWaiting),
            other => Err(format!("unknown seat release policy '{other}'")),
        }
    }
}

/// Client-side sync loop settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Consecutive failed resubscriptions before giving up.
    ///
    /// Values below 1 are clamped to 1.
    pub max_resubscribe_attempts: u32,
    /// First retry delay; doubles per failure up to [`MAX_RESUBSCRIBE_BACKOFF`].
    pub resubscribe_backoff: Duration,
    /// A link that closes before carrying a push or staying up this long
    /// counts as a failed attempt.
    pub stable_link_after: Duration,
    /// Capacity of the event channel returned to the UI.
    pub event_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_resubscribe_attempts: DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS,
            resubscribe_backoff: DEFAULT_RESUBSCRIBE_BACKOFF,
            stable_link_after: DEFAULT_STABLE_LINK_AFTER,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `DUEL_MAX_RESUBSCRIBE_ATTEMPTS`, `DUEL_RESUBSCRIBE_BACKOFF_MS`,
    /// `DUEL_STABLE_LINK_AFTER_MS` and `DUEL_EVENT_CHANNEL_CAPACITY`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::new()
            .with_max_resubscribe_attempts(try_load(
                "DUEL_MAX_RESUBSCRIBE_ATTEMPTS",
                defaults.max_resubscribe_attempts,
            ))
            .with_resubscribe_backoff(Duration::from_millis(try_load(
                "DUEL_RESUBSCRIBE_BACKOFF_MS",
                defaults.resubscribe_backoff.as_millis() as u64,
            )))
            .with_stable_link_after(Duration::from_millis(try_load(
                "DUEL_STABLE_LINK_AFTER_MS",
                defaults.stable_link_after.as_millis() as u64,
            )))
            .with_event_channel_capacity(try_load(
                "DUEL_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            ))
    }

    #[must_use]
    pub fn with_max_resubscribe_attempts(mut self, attempts: u32) -> Self {
        self.max_resubscribe_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_resubscribe_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_stable_link_after(mut self, after: Duration) -> Self {
        self.stable_link_after = after;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.resubscribe_backoff
            .saturating_mul(factor)
            .min(MAX_RESUBSCRIBE_BACKOFF)
    }
}

/// Authoritative host settings.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub seat_release: SeatReleasePolicy,
    /// Snapshots buffered per subscriber before the subscriber is dropped.
    ///
    /// Values below 1 are clamped to 1.
    pub push_buffer: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            seat_release: SeatReleasePolicy::default(),
            push_buffer: DEFAULT_PUSH_BUFFER,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `DUEL_SEAT_RELEASE` and `DUEL_PUSH_BUFFER`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::new()
            .with_seat_release(try_load("DUEL_SEAT_RELEASE", defaults.seat_release))
            .with_push_buffer(try_load("DUEL_PUSH_BUFFER", defaults.push_buffer))
    }

    #[must_use]
    pub fn with_seat_release(mut self, policy: SeatReleasePolicy) -> Self {
        self.seat_release = policy;
        self
    }

    #[must_use]
    pub fn with_push_buffer(mut self, buffer: usize) -> Self {
        self.push_buffer = buffer.max(1);
        self
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default {default:?}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default:?}");
            default
        }
    }
}
