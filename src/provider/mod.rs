//! Outbound provider adapters.
//!
//! One adapter per gateway family:
//! - `email`: SendGrid v3 mail send
//! - `sms`: Twilio programmable messaging
//! - `push`: ntfy topics (no auth, no delivery callbacks)
//!
//! Every adapter overwrites `Message::kind` with its own kind and validates
//! the message before any network call.

mod email;
mod push;
mod registry;
mod sms;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Message, MessageKind};

pub use email::{EmailAdapter, OutboundEmail};
pub use push::PushAdapter;
pub use registry::{AdapterRegistry, RegistryError};
pub use sms::{SmsAdapter, MAX_SMS_LENGTH};

/// Closed set of supported gateways, keyed by integration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    SendGrid,
    Twilio,
    Ntfy,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::SendGrid, ProviderKind::Twilio, ProviderKind::Ntfy];

    /// Case-insensitive lookup by integration name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::SendGrid => "sendgrid",
            ProviderKind::Twilio => "twilio",
            ProviderKind::Ntfy => "ntfy",
        }
    }

    /// Kind assigned to every message sent through this provider
    pub fn message_kind(self) -> MessageKind {
        match self {
            ProviderKind::SendGrid => MessageKind::Email,
            ProviderKind::Twilio => MessageKind::Sms,
            ProviderKind::Ntfy => MessageKind::Push,
        }
    }

    /// Whether the gateway reports delivery status through a webhook
    pub fn has_status_callbacks(self) -> bool {
        !matches!(self, ProviderKind::Ntfy)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while validating or transmitting a message.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Message fails the provider's constraints
    #[error("{0}")]
    InvalidMessage(String),

    #[error("message content exceeds maximum length of {max} characters (got {length})")]
    ContentTooLong { length: usize, max: usize },

    #[error("destination cannot be the same as the sender number")]
    SelfSend,

    /// Gateway answered with a non-success status
    #[error("{provider} error: status={status} body={body}")]
    Gateway {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// Configured gateway URL cannot carry a path
    #[error("{provider} endpoint is not a valid base URL: {url}")]
    Endpoint { provider: ProviderKind, url: String },

    /// Request never completed or the response was unreadable
    #[error("{provider} transport error: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ProviderError::InvalidMessage(message.into())
    }

    /// True for caller-side problems, false for gateway/transport failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProviderError::InvalidMessage(_)
                | ProviderError::ContentTooLong { .. }
                | ProviderError::SelfSend
        )
    }
}

/// Validate-then-send contract shared by all adapters.
#[async_trait]
pub trait MessageAdapter: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Check provider-specific constraints without sending
    fn validate(&self, message: &Message) -> Result<(), ProviderError>;

    /// Overwrite `message.kind`, validate, then transmit.
    ///
    /// Returns the gateway's external identifier (empty when the gateway
    /// assigns none).
    async fn send(&self, message: &mut Message) -> Result<String, ProviderError>;
}

pub(crate) fn require(value: &str, what: &str) -> Result<(), ProviderError> {
    if value.trim().is_empty() {
        return Err(ProviderError::invalid(format!("{} is required", what)));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_name() {
        assert_eq!(ProviderKind::from_name("SendGrid"), Some(ProviderKind::SendGrid));
        assert_eq!(ProviderKind::from_name(" twilio "), Some(ProviderKind::Twilio));
        assert_eq!(ProviderKind::from_name("NTFY"), Some(ProviderKind::Ntfy));
        assert_eq!(ProviderKind::from_name("mailgun"), None);
    }

    #[test]
    fn test_provider_kind_properties() {
        assert_eq!(ProviderKind::SendGrid.message_kind(), MessageKind::Email);
        assert_eq!(ProviderKind::Twilio.message_kind(), MessageKind::Sms);
        assert_eq!(ProviderKind::Ntfy.message_kind(), MessageKind::Push);
        assert!(ProviderKind::Twilio.has_status_callbacks());
        assert!(!ProviderKind::Ntfy.has_status_callbacks());
    }

    #[test]
    fn test_validation_classification() {
        assert!(ProviderError::SelfSend.is_validation());
        assert!(ProviderError::invalid("x").is_validation());
        let gateway = ProviderError::Gateway {
            provider: ProviderKind::SendGrid,
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert!(!gateway.is_validation());
        assert_eq!(gateway.to_string(), "sendgrid error: status=401 body=unauthorized");
    }
}
