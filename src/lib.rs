// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::telemetry;

// Domain layer (business logic)
pub mod dispatch;
pub mod domain;
pub mod provider;
pub mod store;
pub mod webhook;

// Application layer
pub mod api;
pub mod server;
