//! Notification retry scheduling.
//!
//! Failed assignment pings land in a bounded queue with a computed
//! `next_retry_at`; the engine drains due entries on each
//! `process_retries` call. Backoff is exponential with a cap and optional
//! ±10% jitter:
//!
//! `next_retry_at = now + min(base_delay * multiplier^(attempt-1), max_delay)`
//!
//! Exhausting `max_retries` logs and drops the entry — delivery is
//! best-effort and never fails the underlying transition. All scheduling
//! takes `now` explicitly so tests step time instead of sleeping.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::notify::AssignmentNotification;

// ──────────────────────────────────────────────
// Policy
// ──────────────────────────────────────────────

/// Backoff policy for notification retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_secs: u64,
    pub backoff_multiplier: f64,
    pub max_delay_secs: u64,
    pub max_retries: u32,
    /// Apply ±10% jitter to computed delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base_delay_secs: 30,
            backoff_multiplier: 2.0,
            max_delay_secs: 3600,
            max_retries: 5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before the given attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = self.backoff_multiplier.powi((attempt - 1) as i32);
        let secs = (self.base_delay_secs as f64 * factor).min(self.max_delay_secs as f64);
        Duration::seconds_f64(secs)
    }

    /// When the given attempt (1-based) should run, counted from `now`.
    pub fn next_retry_at(&self, now: OffsetDateTime, attempt: u32) -> OffsetDateTime {
        let mut secs = self.delay_for_attempt(attempt).as_seconds_f64();
        if self.jitter {
            secs *= 0.9 + 0.2 * rand::thread_rng().gen::<f64>();
        }
        now + Duration::seconds_f64(secs)
    }
}

// ──────────────────────────────────────────────
// Queue
// ──────────────────────────────────────────────

/// A notification awaiting redelivery.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub notification: AssignmentNotification,
    /// Completed retry attempts (0 when first queued).
    pub retry_count: u32,
    pub next_retry_at: OffsetDateTime,
    pub last_error: Option<String>,
}

/// Bounded FIFO of pending notifications with observable state.
#[derive(Debug)]
pub struct RetryQueue {
    entries: VecDeque<PendingNotification>,
    capacity: usize,
    dropped_overflow: u64,
}

impl RetryQueue {
    pub fn new(capacity: usize) -> Self {
        RetryQueue {
            entries: VecDeque::new(),
            capacity,
            dropped_overflow: 0,
        }
    }

    /// Add an entry. Returns `false` (and counts the drop) when full.
    pub fn enqueue(&mut self, entry: PendingNotification) -> bool {
        if self.entries.len() >= self.capacity {
            self.dropped_overflow += 1;
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Remove and return every entry due at or before `now`.
    pub fn take_due(&mut self, now: OffsetDateTime) -> Vec<PendingNotification> {
        let mut due = Vec::new();
        let mut rest = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.next_retry_at <= now {
                due.push(entry);
            } else {
                rest.push_back(entry);
            }
        }
        self.entries = rest;
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Notifications dropped because the queue was full.
    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingNotification> {
        self.entries.iter()
    }
}

/// Summary of one `process_retries` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub rescheduled: usize,
    pub exhausted: usize,
}
