//! Outbound notification delivery.
//!
//! The scheduler and the /test-email route only ever see the [`Notifier`]
//! trait; the production implementation posts JSON to an HTTP mail API.
//! Delivery may fail transiently; callers decide whether to surface the
//! error (/test-email) or log and move on (scheduled reports).

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail endpoint answered {0}")]
    Rejected(reqwest::StatusCode),
}

/// Sends a formatted message to a recipient address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str)
    -> Result<(), NotifyError>;
}

/// [`Notifier`] that delivers through an HTTP mail API endpoint with an
/// app-level bearer credential.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    sender: String,
    token: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, sender: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            sender: sender.to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({
                "from": self.sender,
                "to": recipient,
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}
