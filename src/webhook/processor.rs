use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{Entity, MessageStatus};
use crate::error::Result;
use crate::metrics::{StoreMetrics, WebhookMetrics};
use crate::provider::ProviderKind;
use crate::store::{Store, StoreResult};

use super::normalizer::{normalize_generic, normalize_sendgrid, normalize_twilio_form};
use super::{GenericWebhook, MessageMatcher, SendGridEvent, StatusUpdate};

/// Outcome of one SendGrid batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub total: usize,
}

/// Turns provider callbacks into status rows.
#[derive(Clone)]
pub struct WebhookProcessor {
    store: Store,
    matcher: MessageMatcher,
}

impl WebhookProcessor {
    pub fn new(store: Store) -> Self {
        Self {
            matcher: MessageMatcher::new(store.clone()),
            store,
        }
    }

    /// Apply every event independently. Unmapped events, unknown messages
    /// and store failures are skipped and do not count as processed.
    #[tracing::instrument(name = "webhook.sendgrid", skip(self, events), fields(total = events.len()))]
    pub async fn process_sendgrid(&self, events: &[SendGridEvent]) -> BatchSummary {
        let provider = ProviderKind::SendGrid.name();
        WebhookMetrics::record_received(provider);

        let mut processed = 0;
        for event in events {
            let update = match normalize_sendgrid(event) {
                Ok(Some(update)) => update,
                Ok(None) => {
                    tracing::debug!(event = %event.event, "Ignoring untracked SendGrid event");
                    WebhookMetrics::record_skipped(provider, "unmapped");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(event = %event.event, error = %e, "SendGrid event without message id");
                    WebhookMetrics::record_skipped(provider, "missing_id");
                    continue;
                }
            };

            match self.apply(&update).await {
                Ok(_) => processed += 1,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(external_id = %update.external_id, "No message for SendGrid event");
                    WebhookMetrics::record_skipped(provider, "not_found");
                }
                Err(e) => {
                    tracing::error!(external_id = %update.external_id, error = %e, "Failed to record SendGrid event");
                    WebhookMetrics::record_skipped(provider, "store_error");
                }
            }
        }

        tracing::info!(processed, total = events.len(), "SendGrid batch processed");
        BatchSummary {
            processed,
            total: events.len(),
        }
    }

    /// Form-encoded Twilio status callback.
    ///
    /// `Ok(None)` when the gateway status has no canonical counterpart; the
    /// callback is acknowledged without recording anything.
    #[tracing::instrument(name = "webhook.twilio", skip(self, fields))]
    pub async fn process_twilio_form(&self, fields: &HashMap<String, String>) -> Result<Option<MessageStatus>> {
        WebhookMetrics::record_received(ProviderKind::Twilio.name());
        match normalize_twilio_form(fields)? {
            Some(update) => Ok(Some(self.apply(&update).await?)),
            None => {
                skip_unmapped(fields.get("MessageStatus").map(String::as_str).unwrap_or_default());
                Ok(None)
            }
        }
    }

    /// JSON status callback. Unmapped statuses are skipped as for the form.
    #[tracing::instrument(name = "webhook.generic", skip(self, body))]
    pub async fn process_generic(&self, body: &GenericWebhook) -> Result<Option<MessageStatus>> {
        WebhookMetrics::record_received(ProviderKind::Twilio.name());
        match normalize_generic(body)? {
            Some(update) => Ok(Some(self.apply(&update).await?)),
            None => {
                skip_unmapped(&body.status);
                Ok(None)
            }
        }
    }

    /// Match the update to its message and append a status row.
    async fn apply(&self, update: &StatusUpdate) -> StoreResult<MessageStatus> {
        let message = self.matcher.find(&update.external_id).await?;

        let row = self
            .store
            .message_statuses
            .create(update.to_status(&message.id))
            .await
            .inspect_err(|_| StoreMetrics::record_error(MessageStatus::KIND))?;

        WebhookMetrics::record_status(row.status.as_str());
        tracing::info!(
            message_id = %message.id,
            status = %row.status,
            external_id = %update.external_id,
            "Delivery status recorded"
        );
        Ok(row)
    }
}

fn skip_unmapped(raw_status: &str) {
    tracing::info!(status = %raw_status, "Ignoring untracked Twilio status");
    WebhookMetrics::record_skipped(ProviderKind::Twilio.name(), "unmapped");
}
