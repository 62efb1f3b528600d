//! Trigger de-duplication registry.
//!
//! The OS-notification path and the background checker run in different
//! execution contexts and can both decide that the same alarm is due within
//! the same minute. This registry is the concurrency-control primitive that
//! lets exactly one of them win: the first `try_claim` for a given
//! `(alarm_id, hour, minute)` succeeds, later claims within the entry
//! lifetime are rejected.
//!
//! Entries self-expire (default 60 s) so a snoozed or next-day firing of the
//! same minute is a fresh claim. The registry is an injectable service, not
//! ambient global state, so tests can construct and reset their own.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Default lifetime of a claim entry.
pub const DEFAULT_TRIGGER_TTL: Duration = Duration::from_secs(60);

// ============================================================================
// TriggerKey
// ============================================================================

/// Identity of one firing opportunity: an alarm at a specific minute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TriggerKey {
    alarm_id: String,
    hour: u32,
    minute: u32,
}

// ============================================================================
// TriggerRegistry
// ============================================================================

/// Process-wide registry of recently claimed `(alarm, minute)` triggers.
#[derive(Debug)]
pub struct TriggerRegistry {
    ttl: Duration,
    claimed: Mutex<HashMap<TriggerKey, Instant>>,
}

impl TriggerRegistry {
    /// Creates a registry with the default entry lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TRIGGER_TTL)
    }

    /// Creates a registry with a custom entry lifetime.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            claimed: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to claim the `(alarm_id, hour, minute)` trigger.
    ///
    /// Returns true for the first caller within the entry lifetime; false
    /// for every later caller, which must then skip firing.
    pub fn try_claim(&self, alarm_id: &str, hour: u32, minute: u32) -> bool {
        let key = TriggerKey {
            alarm_id: alarm_id.to_string(),
            hour,
            minute,
        };

        let now = Instant::now();
        let mut claimed = self.claimed.lock().unwrap();
        claimed.retain(|_, at| now.duration_since(*at) < self.ttl);

        if claimed.contains_key(&key) {
            debug!(
                "Trigger already claimed: {} at {:02}:{:02}",
                alarm_id, hour, minute
            );
            return false;
        }

        claimed.insert(key, now);
        true
    }

    /// Number of live (unexpired) claim entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut claimed = self.claimed.lock().unwrap();
        claimed.retain(|_, at| now.duration_since(*at) < self.ttl);
        claimed.len()
    }

    /// Returns true if no live claim entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all claim entries. Intended for tests.
    pub fn clear(&self) {
        self.claimed.lock().unwrap().clear();
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
