//! HTTP notification adapter — posts assignment pings to a webhook.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. A non-2xx response counts as an ordinary
//! delivery failure (`Ok(false)`), leaving the retry decision to the
//! engine; transport-level errors are reported as `Err`.

use async_trait::async_trait;

use super::{AssignmentNotification, NotificationSender, NotifyError};

/// Adapter that delivers notifications via HTTP POST.
///
/// - `endpoint` is the webhook URL
/// - `auth_token` comes from the constructor or the
///   `DISPATCH_NOTIFY_AUTH_TOKEN` env var
pub struct HttpNotifier {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpNotifier {
    /// Create a notifier for the given endpoint, picking up the auth token
    /// from `DISPATCH_NOTIFY_AUTH_TOKEN` when set.
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpNotifier {
            endpoint: endpoint.into(),
            auth_token: std::env::var("DISPATCH_NOTIFY_AUTH_TOKEN").ok(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl NotificationSender for HttpNotifier {
    async fn send_assignment(
        &self,
        notification: &AssignmentNotification,
    ) -> Result<bool, NotifyError> {
        if self.endpoint.is_empty() {
            return Err(NotifyError::Config {
                message: "empty webhook endpoint".to_string(),
            });
        }

        let url = self.endpoint.clone();
        let auth_token = self.auth_token.clone();
        let payload = serde_json::json!({
            "role": notification.role,
            "request_id": notification.request_id,
            "workflow": notification.workflow,
        });

        let result = tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url);
            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            match request.send_json(&payload) {
                Ok(response) => Ok(response.status().is_success()),
                // The server answered; a bad status is a retryable refusal.
                Err(ureq::Error::StatusCode(_)) => Ok(false),
                Err(e) => Err(NotifyError::Delivery {
                    message: e.to_string(),
                }),
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(join_error) => Err(NotifyError::Delivery {
                message: join_error.to_string(),
            }),
        }
    }
}
