use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::domain::{DeliveryStatus, Entity, Integration, Message, MessageStatus, Plan, User};
use crate::error::{AppError, Result};
use crate::metrics::{DispatchMetrics, StoreMetrics};
use crate::provider::{AdapterRegistry, ProviderKind};
use crate::store::{Store, Stored};

use super::EntitlementChecker;

/// Statistics for the dispatch engine
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Send requests received
    pub total_requests: AtomicU64,
    /// Messages accepted by a provider and stored
    pub total_sent: AtomicU64,
    /// Provider or store failures after validation passed
    pub total_failed: AtomicU64,
    /// Requests refused before reaching a provider
    pub total_rejected: AtomicU64,
    /// Status rows synthesized for providers without callbacks
    pub synthetic_statuses: AtomicU64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            synthetic_statuses: self.synthetic_statuses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatsSnapshot {
    pub total_requests: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_rejected: u64,
    pub synthetic_statuses: u64,
}

/// Runs one send: entitlement, provider selection, transmission, persistence.
pub struct DispatchEngine {
    store: Store,
    registry: Arc<AdapterRegistry>,
    entitlement: EntitlementChecker,
    stats: DispatchStats,
}

impl DispatchEngine {
    pub fn new(store: Store, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            entitlement: EntitlementChecker::new(store.clone()),
            store,
            registry,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Send `message` through its integration's provider and store it.
    ///
    /// Every precondition failure aborts before the provider is contacted.
    /// Sends are single-attempt and not idempotent.
    #[tracing::instrument(
        name = "dispatch.send",
        skip(self, message),
        fields(user_id = %message.user_id, integration_id = %message.integration_id)
    )]
    pub async fn send(&self, mut message: Message) -> Result<Message> {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);

        let provider = match self.preflight(&message).await {
            Ok(provider) => provider,
            Err(e) => {
                self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_rejected(rejection_reason(&e));
                return Err(e);
            }
        };

        let adapter = self.registry.resolve_kind(provider).map_err(|e| {
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            DispatchMetrics::record_rejected("not_configured");
            AppError::from(e)
        })?;

        let started = Instant::now();
        let result = adapter.send(&mut message).await;
        DispatchMetrics::observe_latency(provider.name(), started.elapsed());

        let external_id = match result {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Provider send failed");
                if e.is_validation() {
                    self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
                    DispatchMetrics::record_rejected("invalid_message");
                } else {
                    self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                    DispatchMetrics::record_failed(provider.name());
                }
                return Err(e.into());
            }
        };
        message.external_id = external_id;

        // The provider has the message at this point; a failed write here
        // leaves no local record of it.
        let stored = self.store.messages.create(message).await.map_err(|e| {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            StoreMetrics::record_error(Message::KIND);
            tracing::error!(provider = %provider, error = %e, "Message sent but not stored");
            AppError::from(e)
        })?;

        self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
        DispatchMetrics::record_sent(provider.name());
        tracing::info!(
            message_id = %stored.id,
            provider = %provider,
            external_id = %stored.external_id,
            "Message dispatched"
        );

        if !provider.has_status_callbacks() {
            self.record_synthetic_status(&stored).await;
        }

        Ok(stored)
    }

    /// Steps that must all pass before any adapter is touched.
    async fn preflight(&self, message: &Message) -> Result<ProviderKind> {
        for (value, field) in [
            (&message.content, "content"),
            (&message.destination, "destination"),
            (&message.user_id, "user_id"),
            (&message.integration_id, "integration_id"),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
        }

        let user = self.find::<User>(&message.user_id).await?;
        let integration = self.find::<Integration>(&message.integration_id).await?;

        if integration.plan_id.trim().is_empty() {
            return Err(AppError::Misconfigured(format!(
                "integration {} has no associated plan",
                integration.id
            )));
        }
        let plan = self.find::<Plan>(&integration.plan_id).await?;

        if !self.entitlement.allows(&user.id, &plan).await? {
            return Err(AppError::Forbidden(format!(
                "user does not have access to {} plan features",
                plan.name
            )));
        }

        let provider = ProviderKind::from_name(&integration.name)
            .ok_or_else(|| AppError::UnknownIntegration(integration.name.clone()))?;

        if plan.is_free() && provider != ProviderKind::Ntfy {
            return Err(AppError::Forbidden(format!(
                "free plan only allows the {} integration",
                ProviderKind::Ntfy
            )));
        }

        Ok(provider)
    }

    /// Fetch a live row; soft-deleted rows count as missing.
    async fn find<T: Stored>(&self, id: &str) -> Result<T> {
        let row = self.store.repository::<T>().get(id).await?;
        if row.is_deleted() {
            return Err(AppError::NotFound(format!("{} not found: {}", T::KIND, id)));
        }
        Ok(row)
    }

    /// Best effort: the message is already sent and stored.
    async fn record_synthetic_status(&self, message: &Message) {
        let mut status = MessageStatus::new(&message.id, DeliveryStatus::Sent);
        status.external_id = message.external_id.clone();
        status.stamp(Utc::now());

        match self.store.message_statuses.create(status).await {
            Ok(_) => {
                self.stats.synthetic_statuses.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                StoreMetrics::record_error(MessageStatus::KIND);
                tracing::warn!(
                    message_id = %message.id,
                    error = %e,
                    "Failed to record synthetic sent status"
                );
            }
        }
    }
}

fn rejection_reason(err: &AppError) -> &'static str {
    match err {
        AppError::Validation(_) => "invalid_request",
        AppError::NotFound(_) => "not_found",
        AppError::Forbidden(_) => "forbidden",
        AppError::Misconfigured(_) => "misconfigured",
        AppError::UnknownIntegration(_) => "unknown_integration",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NtfyConfig, SendGridConfig};
    use crate::domain::{MessageKind, UserPlan};
    use crate::provider::test_support::spawn_stub;
    use crate::provider::{EmailAdapter, PushAdapter};
    use axum::{http::StatusCode, routing::post, Router};
    use reqwest::Client;
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        store: Store,
        registry: Arc<AdapterRegistry>,
        engine: DispatchEngine,
        calls: Arc<AtomicUsize>,
    }

    /// Store with one user subscribed to `tier`, plus free/pro plans and
    /// sendgrid (pro) and ntfy (free) integrations.
    async fn fixture(tier: &str) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new()
            .route(
                "/v3/mail/send",
                post({
                    let counter = counter.clone();
                    move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::ACCEPTED, [("x-message-id", "sg-1")])
                    }
                }),
            )
            .route(
                "/{topic}",
                post(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }),
            );
        let base_url = spawn_stub(app).await;

        let sendgrid = SendGridConfig {
            api_key: Some("SG.test".to_string()),
            from_email: Some("noreply@example.com".to_string()),
            base_url: base_url.clone(),
            ..SendGridConfig::default()
        };
        let registry = AdapterRegistry::new(
            EmailAdapter::from_config(&sendgrid, Client::new()),
            None,
            Some(PushAdapter::from_config(&NtfyConfig { base_url }, Client::new())),
        );

        let store = Store::memory();
        for (id, name) in [("plan-free", "free"), ("plan-pro", "pro")] {
            store
                .plans
                .create(Plan {
                    id: id.to_string(),
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        for (id, name, plan_id) in [
            ("int-email", "SendGrid", "plan-pro"),
            ("int-push", "ntfy", "plan-free"),
            ("int-sms", "twilio", "plan-pro"),
            ("int-free-email", "sendgrid", "plan-free"),
            ("int-orphan", "ntfy", ""),
        ] {
            store
                .integrations
                .create(Integration {
                    id: id.to_string(),
                    name: name.to_string(),
                    plan_id: plan_id.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        store
            .users
            .create(User {
                id: "u1".to_string(),
                name: "alice".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .user_plans
            .create(UserPlan {
                user_id: "u1".to_string(),
                plan_id: format!("plan-{}", tier),
                active: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let registry = Arc::new(registry);
        Fixture {
            engine: DispatchEngine::new(store.clone(), registry.clone()),
            registry,
            store,
            calls,
        }
    }

    fn message(integration_id: &str, destination: &str) -> Message {
        Message {
            user_id: "u1".to_string(),
            integration_id: integration_id.to_string(),
            subject: Some("Hello".to_string()),
            content: "hi".to_string(),
            destination: destination.to_string(),
            kind: Some(MessageKind::Sms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_email_send_stores_message() {
        let f = fixture("pro").await;

        let stored = f
            .engine
            .send(message("int-email", "bob@example.com"))
            .await
            .unwrap();

        assert_eq!(stored.kind, Some(MessageKind::Email));
        assert_eq!(stored.external_id, "sg-1");
        assert_eq!(f.store.messages.get(&stored.id).await.unwrap().external_id, "sg-1");
        // Email has callbacks, so no synthetic status
        assert!(f.store.message_statuses.list().await.unwrap().is_empty());
        assert_eq!(f.engine.stats().total_sent, 1);
    }

    #[tokio::test]
    async fn test_push_send_synthesizes_one_sent_status() {
        let f = fixture("free").await;

        let stored = f.engine.send(message("int-push", "alerts")).await.unwrap();

        assert_eq!(stored.kind, Some(MessageKind::Push));
        assert!(stored.external_id.is_empty());

        let statuses = f.store.message_statuses.list().await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].message_id, stored.id);
        assert_eq!(statuses[0].status, DeliveryStatus::Sent);
        assert!(statuses[0].date_sent.is_some());
    }

    #[tokio::test]
    async fn test_free_plan_non_push_forbidden_before_adapter() {
        let f = fixture("free").await;

        let err = f
            .engine
            .send(message("int-free-email", "bob@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert!(f.store.messages.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entitlement_denied() {
        let f = fixture("free").await;

        let err = f
            .engine
            .send(message("int-email", "bob@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(ref msg) if msg.contains("pro")));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preconditions() {
        let f = fixture("pro").await;

        let mut missing_content = message("int-email", "bob@example.com");
        missing_content.content.clear();
        assert!(matches!(
            f.engine.send(missing_content).await,
            Err(AppError::Validation(_))
        ));

        let mut unknown_user = message("int-email", "bob@example.com");
        unknown_user.user_id = "nobody".to_string();
        assert!(matches!(
            f.engine.send(unknown_user).await,
            Err(AppError::NotFound(ref msg)) if msg.starts_with("user")
        ));

        assert!(matches!(
            f.engine.send(message("int-missing", "bob@example.com")).await,
            Err(AppError::NotFound(ref msg)) if msg.starts_with("integration")
        ));

        assert!(matches!(
            f.engine.send(message("int-orphan", "alerts")).await,
            Err(AppError::Misconfigured(_))
        ));

        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.engine.stats().total_rejected, 4);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let f = fixture("pro").await;

        let err = f
            .engine
            .send(message("int-sms", "+14155552671"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_adapter_validation_failure_is_not_stored() {
        let f = fixture("pro").await;

        let err = f
            .engine
            .send(message("int-email", "not-an-address"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Provider(ref e) if e.is_validation()));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert!(f.store.messages.list().await.unwrap().is_empty());
    }

    /// Status repository whose every call fails.
    struct BrokenStatuses;

    fn broken() -> crate::store::StoreError {
        crate::store::StoreError::Serialization(
            serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        )
    }

    #[async_trait::async_trait]
    impl crate::store::Repository<MessageStatus> for BrokenStatuses {
        async fn create(&self, _item: MessageStatus) -> crate::store::StoreResult<MessageStatus> {
            Err(broken())
        }
        async fn get(&self, _id: &str) -> crate::store::StoreResult<MessageStatus> {
            Err(broken())
        }
        async fn list(&self) -> crate::store::StoreResult<Vec<MessageStatus>> {
            Err(broken())
        }
        async fn update(&self, _id: &str, _item: MessageStatus) -> crate::store::StoreResult<MessageStatus> {
            Err(broken())
        }
        async fn delete(&self, _id: &str) -> crate::store::StoreResult<()> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_push_send_survives_status_write_failure() {
        let f = fixture("free").await;
        let mut store = f.store.clone();
        store.message_statuses = Arc::new(BrokenStatuses);
        let engine = DispatchEngine::new(store, f.registry.clone());

        let stored = engine.send(message("int-push", "alerts")).await.unwrap();

        assert_eq!(stored.kind, Some(MessageKind::Push));
        assert!(!f.store.messages.get(&stored.id).await.unwrap().is_deleted());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        let stats = engine.stats();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(stats.synthetic_statuses, 0);
    }
}
