//! HTTP JSON mail relay client.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{EmailMessage, EmailSink};
use crate::error::{CoreError, EmailError};
use crate::storage::{credentials, EmailConfig};

/// Posts messages to a relay endpoint as JSON.
///
/// Owns a single-threaded runtime, so `send` must not be called from
/// inside another tokio runtime.
pub struct HttpEmailSink {
    endpoint: url::Url,
    api_key: Option<String>,
    from: String,
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpEmailSink {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmailError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| EmailError::Transport(format!("invalid relay endpoint '{endpoint}': {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EmailError::Transport(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            endpoint,
            api_key,
            from: from.into(),
            client,
            runtime,
        })
    }

    /// Build from the `[email]` config section and the keyring API key.
    ///
    /// # Errors
    /// Fails when no endpoint is configured or the keyring is unreadable.
    pub fn from_config(config: &EmailConfig) -> Result<Self, CoreError> {
        let endpoint = config.endpoint.as_deref().ok_or(EmailError::MissingEndpoint)?;
        let api_key = credentials::email_api_key()?;
        if api_key.is_none() {
            tracing::warn!("no email API key stored; sending without authorization");
        }
        Ok(Self::new(
            endpoint,
            api_key,
            config.from.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)
    }

    /// Stable key for one message per recipient, subject and UTC day.
    pub fn idempotency_key(message: &EmailMessage, day: chrono::NaiveDate) -> String {
        let mut hasher = Sha256::new();
        hasher.update(message.to.as_bytes());
        hasher.update(b"\n");
        hasher.update(message.subject.as_bytes());
        hasher.update(b"\n");
        hasher.update(day.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl EmailSink for HttpEmailSink {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let body = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });
        let key = Self::idempotency_key(message, Utc::now().date_naive());

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Idempotency-Key", key)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        self.runtime.block_on(async {
            let resp = request.send().await?;
            let status = resp.status();
            if status.is_success() {
                tracing::debug!(to = %message.to, %status, "email accepted by relay");
                Ok::<(), EmailError>(())
            } else {
                let text = resp.text().await.unwrap_or_default();
                Err(EmailError::Rejected {
                    status: status.as_u16(),
                    body: text,
                })
            }
        })
    }
}
