use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::dispatch::DispatchEngine;
use crate::provider::AdapterRegistry;
use crate::store::Store;
use crate::webhook::WebhookProcessor;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Store,
    pub registry: Arc<AdapterRegistry>,
    pub engine: Arc<DispatchEngine>,
    pub webhooks: WebhookProcessor,
    pub started_at: Instant,
}

impl AppState {
    /// Build every component from settings around an already opened store.
    pub fn new(settings: Settings, store: Store) -> Self {
        let registry = Arc::new(AdapterRegistry::from_settings(&settings));
        let engine = Arc::new(DispatchEngine::new(store.clone(), registry.clone()));
        let webhooks = WebhookProcessor::new(store.clone());

        Self {
            settings: Arc::new(settings),
            store,
            registry,
            engine,
            webhooks,
            started_at: Instant::now(),
        }
    }
}
