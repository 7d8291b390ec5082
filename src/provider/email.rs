//! SendGrid email adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::SendGridConfig;
use crate::domain::{Message, MessageKind};

use super::{require, MessageAdapter, ProviderError, ProviderKind};

const MESSAGE_ID_HEADER: &str = "x-message-id";

/// A fully specified outbound email.
#[derive(Debug, Clone)]
pub struct OutboundEmail<'a> {
    pub to_email: &'a str,
    pub to_name: Option<&'a str>,
    pub subject: &'a str,
    pub plain_text: &'a str,
    /// Falls back to `plain_text` when absent
    pub html: Option<&'a str>,
}

/// Sends email through the SendGrid v3 mail API.
pub struct EmailAdapter {
    http: Client,
    api_key: String,
    from_email: String,
    from_name: String,
    base_url: String,
}

impl EmailAdapter {
    /// Returns `None` unless both the API key and sender address are set.
    pub fn from_config(config: &SendGridConfig, http: Client) -> Option<Self> {
        let api_key = non_blank(config.api_key.as_deref())?;
        let from_email = non_blank(config.from_email.as_deref())?;

        Some(Self {
            http,
            api_key,
            from_email,
            from_name: config.from_name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send one email and return SendGrid's message id.
    #[tracing::instrument(name = "sendgrid.send", skip(self, email), fields(to = %email.to_email))]
    pub async fn send_email(&self, email: OutboundEmail<'_>) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&email))
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: ProviderKind::SendGrid,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Gateway {
                provider: ProviderKind::SendGrid,
                status: status.as_u16(),
                body,
            });
        }

        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if message_id.is_empty() {
            tracing::warn!("SendGrid accepted the email without a message id header");
        }

        Ok(message_id)
    }

    fn request_body(&self, email: &OutboundEmail<'_>) -> Value {
        let mut recipient = json!({ "email": email.to_email });
        if let Some(name) = email.to_name.filter(|n| !n.trim().is_empty()) {
            recipient["name"] = json!(name);
        }

        json!({
            "personalizations": [{ "to": [recipient] }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.plain_text },
                { "type": "text/html", "value": email.html.unwrap_or(email.plain_text) },
            ],
        })
    }
}

#[async_trait]
impl MessageAdapter for EmailAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::SendGrid
    }

    fn validate(&self, message: &Message) -> Result<(), ProviderError> {
        require(&message.destination, "destination (email)")?;
        if !message.destination.contains('@') {
            return Err(ProviderError::invalid("invalid email format for destination"));
        }
        require(
            message.subject.as_deref().unwrap_or_default(),
            "subject for email messages",
        )?;
        require(&message.content, "content")
    }

    async fn send(&self, message: &mut Message) -> Result<String, ProviderError> {
        message.kind = Some(MessageKind::Email);
        self.validate(message)?;

        self.send_email(OutboundEmail {
            to_email: &message.destination,
            to_name: None,
            subject: message.subject.as_deref().unwrap_or_default(),
            plain_text: &message.content,
            html: None,
        })
        .await
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
