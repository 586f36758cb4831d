//! Per-email login lockout tracking.
//!
//! Consecutive failed logins are counted per email; once the limit is hit the
//! email is blocked for a fixed window, and the block applies even to correct
//! credentials. State is process-local (DashMap) and resets on restart; this
//! is a single-instance deployment and the tracker is not safe across
//! replicas.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::LockoutConfig;

#[derive(Debug, Clone)]
struct AttemptEntry {
    failures: u32,
    blocked_until: Option<Instant>,
    last_failure: Instant,
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempts left before the email is blocked
    Remaining(u32),
    /// Email just got blocked for this many seconds
    Blocked(u64),
}

#[derive(Debug)]
pub struct LoginLockout {
    entries: DashMap<String, AttemptEntry>,
    config: LockoutConfig,
}

impl LoginLockout {
    pub fn new(config: LockoutConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Check whether an email may attempt a login right now.
    /// Returns Err(seconds_remaining) while the email is blocked.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        if let Some(entry) = self.entries.get(email) {
            if let Some(blocked_until) = entry.blocked_until {
                let now = Instant::now();
                if now < blocked_until {
                    return Err((blocked_until - now).as_secs().max(1));
                }
            }
        }
        Ok(())
    }

    /// Record a failed attempt; blocks the email once the limit is reached.
    pub fn record_failure(&self, email: &str) -> FailureOutcome {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(email.to_string())
            .or_insert_with(|| AttemptEntry {
                failures: 0,
                blocked_until: None,
                last_failure: now,
            });

        // An expired block starts a fresh count
        if let Some(blocked_until) = entry.blocked_until {
            if now >= blocked_until {
                entry.blocked_until = None;
                entry.failures = 0;
            }
        }

        entry.failures += 1;
        entry.last_failure = now;

        if entry.failures >= self.config.max_attempts {
            let block = Duration::from_secs(self.config.block_seconds);
            entry.blocked_until = Some(now + block);
            entry.failures = 0;
            FailureOutcome::Blocked(block.as_secs())
        } else {
            FailureOutcome::Remaining(self.config.max_attempts - entry.failures)
        }
    }

    /// A successful login clears the counter for that email.
    pub fn record_success(&self, email: &str) {
        self.entries.remove(email);
    }

    /// Drop entries whose block expired and whose last failure is stale.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let idle = Duration::from_secs(self.config.block_seconds * 2);

        self.entries.retain(|_, entry| {
            if let Some(blocked_until) = entry.blocked_until {
                if now < blocked_until {
                    return true;
                }
            }
            now.duration_since(entry.last_failure) < idle
        });
    }

    /// Number of tracked emails (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Spawn a background task that periodically prunes stale lockout entries
pub fn spawn_cleanup_task(lockout: std::sync::Arc<LoginLockout>, interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            lockout.cleanup_expired();
            tracing::debug!(
                "Lockout cleanup complete, {} entries remaining",
                lockout.entry_count()
            );
        }
    });
}
