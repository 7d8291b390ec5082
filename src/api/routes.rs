use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::domain::{Integration, Message, MessageStatus, Plan, User, UserPlan};
use crate::server::{api_key_auth, AppState};

use super::health::{health, stats};
use super::integrations::available_integrations;
use super::messages::{create_message, send_email};
use super::metrics::prometheus_metrics;
use super::resources::{
    create_resource, delete_resource, get_resource, list_resources, update_resource, Resource,
};
use super::webhooks::{sendgrid_webhook, twilio_webhook};

/// List/create plus get/update/delete routes for one entity
fn resource_routes<T: Resource>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(list_resources::<T>).post(create_resource::<T>))
        .route(
            &format!("{}/{{id}}", path),
            get(get_resource::<T>)
                .put(update_resource::<T>)
                .delete(delete_resource::<T>),
        )
}

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Management API, guarded by the optional API key
    let management = Router::new()
        .merge(resource_routes::<User>("/users"))
        .merge(resource_routes::<Plan>("/plans"))
        .merge(resource_routes::<UserPlan>("/user-plans"))
        .merge(resource_routes::<Integration>("/integrations"))
        .merge(resource_routes::<MessageStatus>("/message-statuses"))
        .route("/integrations/available", get(available_integrations))
        // Creating a message sends it
        .route("/messages", get(list_resources::<Message>).post(create_message))
        .route(
            "/messages/{id}",
            get(get_resource::<Message>)
                .put(update_resource::<Message>)
                .delete(delete_resource::<Message>),
        )
        .route("/emails/send", post(send_email))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    // Gateway callbacks
    let webhooks = Router::new()
        .route("/sendgrid", post(sendgrid_webhook))
        .route("/twilio", post(twilio_webhook));

    Router::new()
        // Health, Stats & Metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api/v1", management.nest("/webhooks", webhooks))
}
