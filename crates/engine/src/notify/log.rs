//! Log notification adapter — structured events instead of a transport.
//!
//! Useful as a default in development and as the delivery record when the
//! real messenger integration lives out of process.

use async_trait::async_trait;

use super::{AssignmentNotification, NotificationSender, NotifyError};

/// Adapter that logs each assignment ping and reports success.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier
    }
}

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_assignment(
        &self,
        notification: &AssignmentNotification,
    ) -> Result<bool, NotifyError> {
        tracing::info!(
            role = %notification.role,
            request_id = %notification.request_id,
            workflow = %notification.workflow,
            "assignment notification"
        );
        Ok(true)
    }
}
