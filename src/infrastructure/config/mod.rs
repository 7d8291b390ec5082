mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, DeploymentMode, LoggingConfig, NtfyConfig, ProvidersConfig,
    SendGridConfig, ServerConfig, Settings, TwilioConfig, WebhookConfig,
};
