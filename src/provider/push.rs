//! ntfy push adapter.
//!
//! Topics are public and unauthenticated. The gateway offers no delivery
//! callbacks, so sends are best effort and carry no external id.

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::config::NtfyConfig;
use crate::domain::{Message, MessageKind};

use super::{require, MessageAdapter, ProviderError, ProviderKind};

pub struct PushAdapter {
    http: Client,
    base_url: String,
}

impl PushAdapter {
    pub fn from_config(config: &NtfyConfig, http: Client) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base_url}/{topic}` with the topic encoded as a single path segment.
    fn topic_url(&self, topic: &str) -> Result<Url, ProviderError> {
        let endpoint = || ProviderError::Endpoint {
            provider: ProviderKind::Ntfy,
            url: self.base_url.clone(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| endpoint())?;
        url.path_segments_mut()
            .map_err(|_| endpoint())?
            .pop_if_empty()
            .push(topic);
        Ok(url)
    }
}

#[async_trait]
impl MessageAdapter for PushAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ntfy
    }

    fn validate(&self, message: &Message) -> Result<(), ProviderError> {
        require(&message.destination, "destination")?;
        require(&message.content, "content")
    }

    #[tracing::instrument(name = "ntfy.send", skip(self, message), fields(topic = %message.destination))]
    async fn send(&self, message: &mut Message) -> Result<String, ProviderError> {
        message.kind = Some(MessageKind::Push);
        self.validate(message)?;
        let url = self.topic_url(&message.destination)?;

        let response = self
            .http
            .post(url)
            .body(message.content.clone())
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: ProviderKind::Ntfy,
                source,
            })?;

        // Any answer from the gateway counts as sent
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "ntfy answered with a non-success status");
        }

        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::spawn_stub;
    use axum::{extract::Path, http::StatusCode, routing::post, Router};

    fn push(topic: &str, content: &str) -> Message {
        Message {
            destination: topic.to_string(),
            content: content.to_string(),
            kind: Some(MessageKind::Email),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate() {
        let adapter = PushAdapter::from_config(&NtfyConfig::default(), Client::new());
        assert!(adapter.validate(&push("alerts", "disk full")).is_ok());
        assert!(adapter.validate(&push("", "disk full")).is_err());
        assert!(adapter.validate(&push("alerts", "  ")).is_err());
    }

    #[tokio::test]
    async fn test_send_returns_empty_id() {
        let app = Router::new().route(
            "/{topic}",
            post(|Path(topic): Path<String>, body: String| async move {
                assert_eq!(topic, "alerts");
                assert_eq!(body, "disk full");
                StatusCode::OK
            }),
        );
        let base_url = spawn_stub(app).await;
        let adapter = PushAdapter::from_config(&NtfyConfig { base_url }, Client::new());

        let mut message = push("alerts", "disk full");
        let external_id = adapter.send(&mut message).await.unwrap();

        assert!(external_id.is_empty());
        assert_eq!(message.kind, Some(MessageKind::Push));
    }

    #[test]
    fn test_topic_stays_one_path_segment() {
        let adapter = PushAdapter::from_config(
            &NtfyConfig {
                base_url: "https://ntfy.example.com/relay/".to_string(),
            },
            Client::new(),
        );

        let url = adapter.topic_url("ops/alerts?x=1#top").unwrap();
        assert_eq!(url.as_str(), "https://ntfy.example.com/relay/ops%2Falerts%3Fx=1%23top");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let bare = PushAdapter::from_config(
            &NtfyConfig {
                base_url: "not a url".to_string(),
            },
            Client::new(),
        );
        assert!(matches!(
            bare.topic_url("alerts"),
            Err(ProviderError::Endpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_encodes_topic() {
        let app = Router::new().route(
            "/{topic}",
            post(|Path(topic): Path<String>| async move {
                assert_eq!(topic, "ops/alerts?x=1#top");
                StatusCode::OK
            }),
        );
        let base_url = spawn_stub(app).await;
        let adapter = PushAdapter::from_config(&NtfyConfig { base_url }, Client::new());

        assert!(adapter.send(&mut push("ops/alerts?x=1#top", "hi")).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_ignores_gateway_status() {
        let app = Router::new().route(
            "/{topic}",
            post(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let base_url = spawn_stub(app).await;
        let adapter = PushAdapter::from_config(&NtfyConfig { base_url }, Client::new());

        assert!(adapter.send(&mut push("alerts", "hi")).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_surfaces_transport_error() {
        // Nothing listens on port 9 locally
        let adapter = PushAdapter::from_config(
            &NtfyConfig {
                base_url: "http://127.0.0.1:9".to_string(),
            },
            Client::new(),
        );

        let err = adapter.send(&mut push("alerts", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
    }
}
