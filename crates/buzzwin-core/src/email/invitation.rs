//! Ad-hoc invitation email requests.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::EmailMessage;
use crate::error::ValidationError;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// Loose shape check: something@something.tld with no whitespace.
pub fn is_valid_email(address: &str) -> bool {
    email_pattern().is_match(address)
}

/// An invitation as submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationRequest {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl InvitationRequest {
    /// Reject empty fields and malformed recipients.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.to.trim().is_empty() {
            return Err(ValidationError::EmptyField("to"));
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptyField("subject"));
        }
        if self.html.trim().is_empty() {
            return Err(ValidationError::EmptyField("html"));
        }
        if !is_valid_email(self.to.trim()) {
            return Err(ValidationError::InvalidEmail(self.to.clone()));
        }
        Ok(())
    }

    /// Validate and convert into a sendable message. A missing text part
    /// falls back to the subject line.
    pub fn into_message(self) -> Result<EmailMessage, ValidationError> {
        self.validate()?;
        let text = self
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.subject.clone());
        Ok(EmailMessage {
            to: self.to.trim().to_string(),
            subject: self.subject,
            html: self.html,
            text,
        })
    }
}
