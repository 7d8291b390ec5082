//! Twilio SMS adapter.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{DeploymentMode, TwilioConfig, WebhookConfig};
use crate::domain::{Message, MessageKind};

use super::{require, MessageAdapter, ProviderError, ProviderKind};

/// Longest SMS body Twilio accepts, in characters
pub const MAX_SMS_LENGTH: usize = 1600;

lazy_static! {
    /// E.164: leading `+`, no leading zero, 7-15 digits in total
    static ref E164: Regex = Regex::new(r"^\+[1-9]\d{6,14}$").unwrap();
}

#[derive(Debug, Deserialize)]
struct CreateMessageResponse {
    sid: String,
}

/// Sends SMS through the Twilio Messages API.
pub struct SmsAdapter {
    http: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    virtual_number: Option<String>,
    status_callback: Option<String>,
    base_url: String,
    mode: DeploymentMode,
}

impl SmsAdapter {
    /// Returns `None` unless account SID, auth token and sender number are set.
    pub fn from_config(
        config: &TwilioConfig,
        webhook: &WebhookConfig,
        mode: DeploymentMode,
        http: Client,
    ) -> Option<Self> {
        let account_sid = non_blank(config.account_sid.as_deref())?;
        let auth_token = non_blank(config.auth_token.as_deref())?;
        let from_number = non_blank(config.from_number.as_deref())?;

        let status_callback = non_blank(webhook.base_url.as_deref())
            .map(|base| format!("{}/api/v1/webhooks/twilio", base.trim_end_matches('/')));

        Some(Self {
            http,
            account_sid,
            auth_token,
            from_number,
            virtual_number: non_blank(config.virtual_number.as_deref()),
            status_callback,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mode,
        })
    }

    /// Address the gateway will actually receive.
    ///
    /// Outside production every destination is replaced by the configured
    /// virtual test number, if any.
    pub fn effective_destination<'a>(&'a self, destination: &'a str) -> &'a str {
        match (&self.virtual_number, self.mode) {
            (Some(virtual_number), DeploymentMode::Development) => virtual_number.as_str(),
            _ => destination,
        }
    }

    async fn create_message(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        let mut form = vec![("To", to), ("From", self.from_number.as_str()), ("Body", body)];
        if let Some(callback) = &self.status_callback {
            form.push(("StatusCallback", callback.as_str()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Gateway {
                provider: ProviderKind::Twilio,
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateMessageResponse = response.json().await.map_err(transport)?;
        Ok(created.sid)
    }
}

#[async_trait]
impl MessageAdapter for SmsAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Twilio
    }

    fn validate(&self, message: &Message) -> Result<(), ProviderError> {
        require(&message.destination, "recipient phone number")?;
        require(&message.content, "message content")?;

        let length = message.content.chars().count();
        if length > MAX_SMS_LENGTH {
            return Err(ProviderError::ContentTooLong {
                length,
                max: MAX_SMS_LENGTH,
            });
        }

        if !E164.is_match(&message.destination) {
            return Err(ProviderError::invalid(format!(
                "invalid phone number format: {}. Must be E.164 (e.g., +14155552671)",
                message.destination
            )));
        }

        if message.destination == self.from_number {
            return Err(ProviderError::SelfSend);
        }

        Ok(())
    }

    #[tracing::instrument(name = "twilio.send", skip(self, message))]
    async fn send(&self, message: &mut Message) -> Result<String, ProviderError> {
        message.kind = Some(MessageKind::Sms);

        // Validation and sending run against the substituted address; the
        // caller's message keeps its own destination.
        let mut effective = message.clone();
        effective.destination = self.effective_destination(&message.destination).to_string();
        self.validate(&effective)?;

        if effective.destination != message.destination {
            tracing::debug!(
                destination = %effective.destination,
                "Non-production mode, routing SMS to virtual number"
            );
        }

        self.create_message(&effective.destination, &effective.content)
            .await
    }
}

fn transport(source: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        provider: ProviderKind::Twilio,
        source,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
