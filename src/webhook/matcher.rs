//! Resolves a provider-reported identifier to the stored message.
//!
//! SendGrid reports ids like `<abc123.filter0001.12345@mail.example.com>`
//! while the send response carried only `abc123`. The normalized form cuts
//! at the first `@`, then at the first `.`, then trims angle brackets. On
//! ids without those characters it is a no-op.

use crate::domain::{Entity, Message};
use crate::store::{Store, StoreError, StoreResult};

pub fn normalize_external_id(raw: &str) -> &str {
    let id = raw.split('@').next().unwrap_or(raw);
    let id = id.split('.').next().unwrap_or(id);
    id.trim_matches(&['<', '>'][..])
}

/// First message (in list order) whose `external_id` equals the normalized
/// or the raw identifier. Empty ids never match.
pub fn match_message<'a>(messages: &'a [Message], reported: &str) -> Option<&'a Message> {
    let normalized = normalize_external_id(reported);
    messages.iter().find(|m| {
        !m.external_id.is_empty() && (m.external_id == normalized || m.external_id == reported)
    })
}

#[derive(Clone)]
pub struct MessageMatcher {
    store: Store,
}

impl MessageMatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Soft-deleted messages are not candidates.
    pub async fn find(&self, reported: &str) -> StoreResult<Message> {
        let messages: Vec<Message> = self
            .store
            .messages
            .list()
            .await?
            .into_iter()
            .filter(|m| !m.is_deleted())
            .collect();

        match match_message(&messages, reported) {
            Some(message) => {
                tracing::debug!(
                    message_id = %message.id,
                    reported = %reported,
                    "Matched callback to message"
                );
                Ok(message.clone())
            }
            None => Err(StoreError::not_found::<Message>(reported)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, external_id: &str) -> Message {
        Message {
            id: id.to_string(),
            external_id: external_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_external_id() {
        assert_eq!(
            normalize_external_id("<abc123.filter0001.12345@mail.example.com>"),
            "abc123"
        );
        assert_eq!(normalize_external_id("<abc123@smtp.sendgrid.net>"), "abc123");
        assert_eq!(normalize_external_id("abc123"), "abc123");
        assert_eq!(normalize_external_id("SM0123"), "SM0123");
    }

    #[test]
    fn test_wrapped_and_raw_ids_resolve_to_same_message() {
        let messages = vec![stored("m0", "zzz"), stored("m1", "abc123")];

        let wrapped = match_message(&messages, "<abc123.filter0001.12345@mail.example.com>");
        let raw = match_message(&messages, "abc123");

        assert_eq!(wrapped.map(|m| m.id.as_str()), Some("m1"));
        assert_eq!(raw.map(|m| m.id.as_str()), Some("m1"));
    }

    #[test]
    fn test_raw_fallback_when_stored_id_has_dots() {
        let messages = vec![stored("m1", "sg.42.x")];
        assert_eq!(
            match_message(&messages, "sg.42.x").map(|m| m.id.as_str()),
            Some("m1")
        );
    }

    #[test]
    fn test_first_match_wins_and_empty_ids_ignored() {
        let messages = vec![stored("push", ""), stored("a", "dup"), stored("b", "dup")];

        assert_eq!(match_message(&messages, "dup").map(|m| m.id.as_str()), Some("a"));
        assert!(match_message(&messages, "<@x>").is_none());
    }

    #[tokio::test]
    async fn test_find_skips_deleted_messages() {
        let store = Store::memory();
        let gone = store.messages.create(stored("m1", "abc123")).await.unwrap();
        store.messages.delete(&gone.id).await.unwrap();
        let matcher = MessageMatcher::new(store);

        let err = matcher.find("abc123").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
