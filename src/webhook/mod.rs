//! Inbound delivery-status callbacks.
//!
//! Flow: provider payload -> canonical [`StatusUpdate`] -> stored message
//! via [`MessageMatcher`] -> status row.
//! ntfy has no callbacks; its status is synthesized at dispatch time.

mod matcher;
mod normalizer;
mod processor;

pub use matcher::{match_message, normalize_external_id, MessageMatcher};
pub use normalizer::{
    normalize_generic, normalize_sendgrid, normalize_twilio_form, sendgrid_status, sms_status,
    GenericWebhook, NormalizeError, SendGridEvent, StatusUpdate,
};
pub use processor::{BatchSummary, WebhookProcessor};
