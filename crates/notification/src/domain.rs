//! SMS payload and error types.

use resilience::Classify;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sms {
    /// Recipient in international format, e.g. `+989123456789`.
    pub to: String,
    pub message: String,
}

impl Sms {
    pub fn new(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            message: message.into(),
        }
    }

    /// Checks that the recipient is a `+` followed by one or more digits.
    pub fn validate(&self) -> Result<(), SmsError> {
        let digits = self
            .to
            .strip_prefix('+')
            .ok_or_else(|| SmsError::InvalidRecipient(self.to.clone()))?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SmsError::InvalidRecipient(self.to.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmsError {
    /// The provider failed to accept the message. Transient.
    #[error("external service failure")]
    ExternalServiceFailure,

    #[error("invalid recipient: {0:?}")]
    InvalidRecipient(String),

    /// The caller's context was done before the provider was reached.
    #[error("sms service timeout")]
    ServiceTimeout,
}

impl Classify for SmsError {
    fn is_retryable(&self) -> bool {
        matches!(self, SmsError::ExternalServiceFailure)
    }
}
