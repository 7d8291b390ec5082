//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod integrations;
mod messages;
mod metrics;
mod resources;
mod routes;
mod webhooks;

// Re-export all handlers for use in server/app.rs
pub use health::{health, stats};
pub use integrations::available_integrations;
pub use messages::{create_message, send_email};
pub use metrics::prometheus_metrics;
pub use resources::{
    create_resource, delete_resource, get_resource, list_resources, update_resource, ListResponse,
    Resource,
};
pub use routes::api_routes;
pub use webhooks::{sendgrid_webhook, twilio_webhook};
