//! Provider callback payloads mapped onto one canonical status tuple.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{DeliveryStatus, MessageStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Canonical `(external_id, status, gateway_response, sent_at)` tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Identifier exactly as the provider reported it
    pub external_id: String,
    pub status: DeliveryStatus,
    pub gateway_response: String,
    pub sent_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Build the status row recorded against `message_id`.
    pub fn to_status(&self, message_id: &str) -> MessageStatus {
        let mut row = MessageStatus::new(message_id, self.status);
        row.external_id = self.external_id.clone();
        row.gateway_response = self.gateway_response.clone();
        row.stamp(self.sent_at.unwrap_or_else(Utc::now));
        if self.sent_at.is_some() {
            row.date_sent = self.sent_at;
        }
        row
    }
}

/// One element of a SendGrid event webhook batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendGridEvent {
    pub event: String,
    pub email: String,
    pub timestamp: i64,
    #[serde(rename = "smtp-id")]
    pub smtp_id: String,
    pub sg_message_id: String,
    pub reason: String,
    pub status: String,
    pub response: String,
}

impl SendGridEvent {
    /// `smtp-id`, or `sg_message_id` when that is empty
    pub fn external_id(&self) -> Option<&str> {
        [self.smtp_id.as_str(), self.sg_message_id.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }
}

/// JSON body accepted on the SMS callback when it is not form-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenericWebhook {
    pub external_id: String,
    pub status: String,
    pub gateway_response: String,
    pub timestamp: Option<i64>,
}

/// Map a SendGrid event name; events we do not track yield `None`.
pub fn sendgrid_status(event: &str) -> Option<DeliveryStatus> {
    match event {
        "processed" => Some(DeliveryStatus::Sent),
        "delivered" => Some(DeliveryStatus::Delivered),
        "open" => Some(DeliveryStatus::Read),
        "bounce" | "dropped" | "spamreport" => Some(DeliveryStatus::Error),
        "deferred" => Some(DeliveryStatus::Deferred),
        _ => None,
    }
}

/// Map a Twilio message status onto the canonical set.
pub fn sms_status(status: &str) -> Option<DeliveryStatus> {
    match status.trim().to_ascii_lowercase().as_str() {
        "queued" | "accepted" | "scheduled" | "sending" | "sent" => Some(DeliveryStatus::Sent),
        "delivered" => Some(DeliveryStatus::Delivered),
        "read" => Some(DeliveryStatus::Read),
        "failed" | "undelivered" => Some(DeliveryStatus::Error),
        "canceled" => Some(DeliveryStatus::Canceled),
        _ => None,
    }
}

/// Normalize one SendGrid event.
///
/// `Ok(None)` means the event type is not tracked and should be ignored.
pub fn normalize_sendgrid(event: &SendGridEvent) -> Result<Option<StatusUpdate>, NormalizeError> {
    let external_id = event
        .external_id()
        .ok_or(NormalizeError::MissingField("smtp-id"))?
        .to_string();

    let Some(status) = sendgrid_status(&event.event) else {
        return Ok(None);
    };

    let gateway_response = format!(
        "Event={}, Email={}, SMTPId={}, SGMessageID={}, Reason={}, Response={}, Status={}",
        event.event,
        event.email,
        event.smtp_id,
        event.sg_message_id,
        event.reason,
        event.response,
        event.status,
    );

    Ok(Some(StatusUpdate {
        external_id,
        status,
        gateway_response,
        sent_at: unix_time(event.timestamp),
    }))
}

/// Normalize a form-encoded Twilio status callback.
///
/// Every field is kept, sorted by name, in `gateway_response`. A status
/// outside the canonical mapping yields `Ok(None)`.
pub fn normalize_twilio_form(fields: &HashMap<String, String>) -> Result<Option<StatusUpdate>, NormalizeError> {
    let external_id = required(fields.get("MessageSid"), "MessageSid")?;
    let raw_status = required(fields.get("MessageStatus"), "MessageStatus")?;
    let Some(status) = sms_status(&raw_status) else {
        return Ok(None);
    };

    let mut pairs: Vec<(&String, &String)> = fields.iter().collect();
    pairs.sort();
    let gateway_response = pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Some(StatusUpdate {
        external_id,
        status,
        gateway_response,
        sent_at: None,
    }))
}

/// Normalize the JSON fallback body; canonical status names are accepted as-is.
/// Like the form callback, an unmapped status yields `Ok(None)`.
pub fn normalize_generic(body: &GenericWebhook) -> Result<Option<StatusUpdate>, NormalizeError> {
    let external_id = required(Some(&body.external_id), "external_id")?;
    let raw_status = required(Some(&body.status), "status")?;
    let Some(status) = sms_status(&raw_status).or_else(|| DeliveryStatus::parse(&raw_status)) else {
        return Ok(None);
    };

    Ok(Some(StatusUpdate {
        external_id,
        status,
        gateway_response: body.gateway_response.clone(),
        sent_at: body.timestamp.and_then(unix_time),
    }))
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, NormalizeError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(NormalizeError::MissingField(field))
}

/// Non-positive timestamps mean "not provided".
fn unix_time(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return None;
    }
    Utc.timestamp_opt(seconds, 0).single()
}
