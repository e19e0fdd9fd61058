//! Outbound email.
//!
//! Jobs render an [`EmailMessage`] from [`templates`] and hand it to an
//! [`EmailSink`]. Sinks are constructed by the caller and passed in; there
//! is no process-wide client.

mod http;
mod invitation;
pub mod templates;

pub use http::HttpEmailSink;
pub use invitation::{is_valid_email, InvitationRequest};

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::EmailError;

/// A rendered message ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers messages. Implementations may fail per message; callers
/// decide whether a failure aborts anything.
pub trait EmailSink {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Sink that logs and records messages instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunEmailSink {
    sent: Mutex<Vec<EmailMessage>>,
    failing: BTreeSet<String>,
}

impl DryRunEmailSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every message addressed to one of `addresses`.
    pub fn failing_for<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::default(),
            failing: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EmailSink for DryRunEmailSink {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if self.failing.contains(&message.to) {
            return Err(EmailError::Transport(format!(
                "dry run configured to fail for {}",
                message.to
            )));
        }
        tracing::info!(to = %message.to, subject = %message.subject, "dry run: email not sent");
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        Ok(())
    }
}
