//! Adapter registry built once at startup.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::config::Settings;
use crate::domain::Plan;

use super::{EmailAdapter, MessageAdapter, ProviderKind, PushAdapter, SmsAdapter};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Provider is known but its credentials were not configured
    #[error("{0} handler not configured")]
    NotConfigured(ProviderKind),

    #[error("unknown integration name: {0}")]
    UnknownIntegration(String),
}

/// Holds the adapters whose configuration succeeded.
pub struct AdapterRegistry {
    email: Option<EmailAdapter>,
    sms: Option<SmsAdapter>,
    push: Option<PushAdapter>,
}

impl AdapterRegistry {
    pub fn new(
        email: Option<EmailAdapter>,
        sms: Option<SmsAdapter>,
        push: Option<PushAdapter>,
    ) -> Self {
        Self { email, sms, push }
    }

    /// Probe provider configuration and build every adapter that is usable.
    pub fn from_settings(settings: &Settings) -> Self {
        let providers = &settings.providers;
        let http = Client::builder()
            .timeout(Duration::from_secs(providers.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build provider HTTP client, using defaults");
                Client::new()
            });

        let email = EmailAdapter::from_config(&providers.sendgrid, http.clone());
        let sms = SmsAdapter::from_config(
            &providers.twilio,
            &settings.webhook,
            settings.deployment_mode(),
            http.clone(),
        );
        let push = Some(PushAdapter::from_config(&providers.ntfy, http));

        let registry = Self::new(email, sms, push);
        for kind in ProviderKind::ALL {
            if registry.is_kind_available(kind) {
                tracing::info!(provider = %kind, "Provider adapter enabled");
            } else {
                tracing::warn!(provider = %kind, "Provider adapter disabled: missing configuration");
            }
        }
        registry
    }

    /// Resolve an integration name (case-insensitive) to its adapter.
    pub fn resolve(&self, integration_name: &str) -> Result<&dyn MessageAdapter, RegistryError> {
        let kind = ProviderKind::from_name(integration_name)
            .ok_or_else(|| RegistryError::UnknownIntegration(integration_name.to_string()))?;
        self.resolve_kind(kind)
    }

    pub fn resolve_kind(&self, kind: ProviderKind) -> Result<&dyn MessageAdapter, RegistryError> {
        let adapter: Option<&dyn MessageAdapter> = match kind {
            ProviderKind::SendGrid => self.email.as_ref().map(|a| a as &dyn MessageAdapter),
            ProviderKind::Twilio => self.sms.as_ref().map(|a| a as &dyn MessageAdapter),
            ProviderKind::Ntfy => self.push.as_ref().map(|a| a as &dyn MessageAdapter),
        };
        adapter.ok_or(RegistryError::NotConfigured(kind))
    }

    /// The email adapter, for direct sends outside the dispatch flow
    pub fn email(&self) -> Option<&EmailAdapter> {
        self.email.as_ref()
    }

    pub fn is_available(&self, integration_name: &str) -> bool {
        ProviderKind::from_name(integration_name)
            .map(|kind| self.is_kind_available(kind))
            .unwrap_or(false)
    }

    fn is_kind_available(&self, kind: ProviderKind) -> bool {
        self.resolve_kind(kind).is_ok()
    }

    /// Configured providers, in a fixed order
    pub fn list_available(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_kind_available(*kind))
            .collect()
    }

    /// Providers usable under `plan`: free plans only get push.
    pub fn list_available_for_plan(&self, plan: &Plan) -> Vec<ProviderKind> {
        if plan.is_free() {
            return self
                .list_available()
                .into_iter()
                .filter(|kind| *kind == ProviderKind::Ntfy)
                .collect();
        }
        self.list_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NtfyConfig, SendGridConfig};

    fn push_only() -> AdapterRegistry {
        AdapterRegistry::new(
            None,
            None,
            Some(PushAdapter::from_config(&NtfyConfig::default(), Client::new())),
        )
    }

    fn with_email() -> AdapterRegistry {
        let sendgrid = SendGridConfig {
            api_key: Some("SG.test".to_string()),
            from_email: Some("noreply@example.com".to_string()),
            ..SendGridConfig::default()
        };
        AdapterRegistry::new(
            EmailAdapter::from_config(&sendgrid, Client::new()),
            None,
            Some(PushAdapter::from_config(&NtfyConfig::default(), Client::new())),
        )
    }

    fn plan(name: &str) -> Plan {
        Plan {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = with_email();
        assert_eq!(registry.resolve("SendGrid").unwrap().provider(), ProviderKind::SendGrid);
        assert_eq!(registry.resolve("NTFY").unwrap().provider(), ProviderKind::Ntfy);
    }

    #[test]
    fn test_resolve_errors() {
        let registry = push_only();
        assert_eq!(
            registry.resolve("twilio").err(),
            Some(RegistryError::NotConfigured(ProviderKind::Twilio))
        );
        assert_eq!(
            registry.resolve("pigeon").err(),
            Some(RegistryError::UnknownIntegration("pigeon".to_string()))
        );
    }

    #[test]
    fn test_availability() {
        let registry = with_email();
        assert!(registry.is_available("sendgrid"));
        assert!(!registry.is_available("twilio"));
        assert!(!registry.is_available("pigeon"));
        assert_eq!(
            registry.list_available(),
            vec![ProviderKind::SendGrid, ProviderKind::Ntfy]
        );
    }

    #[test]
    fn test_free_plan_sees_only_push() {
        let registry = with_email();
        assert_eq!(registry.list_available_for_plan(&plan("Free")), vec![ProviderKind::Ntfy]);
        assert_eq!(
            registry.list_available_for_plan(&plan("pro")),
            vec![ProviderKind::SendGrid, ProviderKind::Ntfy]
        );
    }

    #[test]
    fn test_from_default_settings_has_push_only() {
        let registry = AdapterRegistry::from_settings(&Settings::default());
        assert_eq!(registry.list_available(), vec![ProviderKind::Ntfy]);
        assert!(registry.email().is_none());
    }
}
