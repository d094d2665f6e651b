//! Recording notification adapter — captures pings for tests.
//!
//! Can be armed with a number of upcoming failures so retry behavior can be
//! exercised deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AssignmentNotification, NotificationSender, NotifyError};

/// Adapter that records every successful delivery.
///
/// While `failures_remaining` is positive, each send consumes one failure
/// and returns `Ok(false)` without recording.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AssignmentNotification>>,
    failures_remaining: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    /// A notifier whose next `failures` sends fail.
    pub fn with_failures(failures: usize) -> Self {
        RecordingNotifier {
            sent: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(failures),
        }
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<AssignmentNotification> {
        self.sent.lock().expect("recording notifier poisoned").clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.sent.lock().expect("recording notifier poisoned").len()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send_assignment(
        &self,
        notification: &AssignmentNotification,
    ) -> Result<bool, NotifyError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Ok(false);
        }
        self.sent
            .lock()
            .expect("recording notifier poisoned")
            .push(notification.clone());
        Ok(true)
    }
}
