//! Persistent entities of the messaging service.
//!
//! Every entity carries an opaque string id and a [`Timestamps`] block.
//! Deletion is soft: `deleted_at` is set and the row stays readable, so
//! queries that must ignore deleted rows filter with [`Entity::is_deleted`].

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Creation, update and soft-delete instants shared by all entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Common behaviour the store relies on.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name used in error messages and as the storage discriminator.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn timestamps(&self) -> &Timestamps;
    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn is_deleted(&self) -> bool {
        self.timestamps().deleted_at.is_some()
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:literal) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn timestamps(&self) -> &Timestamps {
                &self.timestamps
            }

            fn timestamps_mut(&mut self) -> &mut Timestamps {
                &mut self.timestamps
            }
        }
    };
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Named plan level. Pro contains Free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

impl PlanTier {
    /// Case-insensitive tier lookup; unknown names have no tier.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("free") {
            Some(PlanTier::Free)
        } else if name.eq_ignore_ascii_case("pro") {
            Some(PlanTier::Pro)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub name: String,
    /// Price in cents; 0 is the free tier
    #[serde(default)]
    pub price_cents: i64,
    /// Product reference in the billing system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl Plan {
    pub fn tier(&self) -> Option<PlanTier> {
        PlanTier::from_name(&self.name)
    }

    pub fn is_free(&self) -> bool {
        self.tier() == Some(PlanTier::Free)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPlan {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub plan_id: String,
    /// Cleared when the subscription lapses
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    /// Provider key: "sendgrid", "twilio" or "ntfy" (any case)
    #[serde(default)]
    pub name: String,
    /// Plan granting access to this integration
    #[serde(default)]
    pub plan_id: String,
}

/// Channel a message travels on. Always set by the adapter that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Email,
    Sms,
    #[serde(alias = "ntfy")]
    Push,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Email => "email",
            MessageKind::Sms => "sms",
            MessageKind::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub integration_id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Email address, E.164 number or push topic
    #[serde(default)]
    pub destination: String,
    /// Gateway-assigned id, empty until sent
    #[serde(default)]
    pub external_id: String,
}

/// Canonical delivery state shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Error,
    Deferred,
    Canceled,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Error => "error",
            DeliveryStatus::Deferred => "deferred",
            DeliveryStatus::Canceled => "canceled",
        }
    }

    /// Parses one of the canonical names (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        let status = match value.trim().to_ascii_lowercase().as_str() {
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "read" => DeliveryStatus::Read,
            "error" => DeliveryStatus::Error,
            "deferred" => DeliveryStatus::Deferred,
            "canceled" | "cancelled" => DeliveryStatus::Canceled,
            _ => return None,
        };
        Some(status)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a message's append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStatus {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub message_id: String,
    /// Gateway identifier exactly as reported on the callback
    #[serde(default)]
    pub external_id: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sent: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_opened: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_error: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_canceled: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_deferred: Option<DateTime<Utc>>,
}

impl MessageStatus {
    pub fn new(message_id: impl Into<String>, status: DeliveryStatus) -> Self {
        Self {
            id: String::new(),
            timestamps: Timestamps::default(),
            message_id: message_id.into(),
            external_id: String::new(),
            status,
            gateway_response: String::new(),
            date_sent: None,
            date_opened: None,
            date_error: None,
            date_canceled: None,
            date_deferred: None,
        }
    }

    /// Stamps the event date matching `status`.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        match self.status {
            DeliveryStatus::Sent | DeliveryStatus::Delivered => self.date_sent = Some(at),
            DeliveryStatus::Read => self.date_opened = Some(at),
            DeliveryStatus::Error => self.date_error = Some(at),
            DeliveryStatus::Canceled => self.date_canceled = Some(at),
            DeliveryStatus::Deferred => self.date_deferred = Some(at),
        }
    }
}

impl_entity!(User, "user");
impl_entity!(Plan, "plan");
impl_entity!(UserPlan, "user_plan");
impl_entity!(Integration, "integration");
impl_entity!(Message, "message");
impl_entity!(MessageStatus, "message_status");

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_tier_is_case_insensitive() {
        assert_eq!(PlanTier::from_name("FREE"), Some(PlanTier::Free));
        assert_eq!(PlanTier::from_name("Pro"), Some(PlanTier::Pro));
        assert_eq!(PlanTier::from_name("enterprise"), None);
    }

    #[test]
    fn test_message_accepts_legacy_ntfy_kind() {
        let message: Message = serde_json::from_value(json!({
            "user_id": "u1",
            "integration_id": "i1",
            "type": "ntfy",
            "content": "hi",
            "destination": "alerts"
        }))
        .unwrap();

        assert_eq!(message.kind, Some(MessageKind::Push));
        assert!(message.external_id.is_empty());
        assert!(!message.is_deleted());
    }

    #[test]
    fn test_stamp_sets_matching_date() {
        let now = Utc::now();

        let mut status = MessageStatus::new("m1", DeliveryStatus::Read);
        status.stamp(now);
        assert_eq!(status.date_opened, Some(now));
        assert!(status.date_sent.is_none());

        let mut status = MessageStatus::new("m1", DeliveryStatus::Deferred);
        status.stamp(now);
        assert_eq!(status.date_deferred, Some(now));
    }

    #[test]
    fn test_delivery_status_parse() {
        assert_eq!(DeliveryStatus::parse("Delivered"), Some(DeliveryStatus::Delivered));
        assert_eq!(DeliveryStatus::parse("cancelled"), Some(DeliveryStatus::Canceled));
        assert_eq!(DeliveryStatus::parse("queued"), None);
    }
}
