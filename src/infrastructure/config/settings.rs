use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Deployment mode derived from `RUN_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    pub fn from_run_mode(run_mode: &str) -> Self {
        match run_mode.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Admin key expected in `X-API-Key`; unset disables the check
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `memory` or `postgres`
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub sendgrid: SendGridConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub ntfy: NtfyConfig,
    /// Timeout applied to every outbound provider request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridConfig {
    pub api_key: Option<String>,
    pub from_email: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_sendgrid_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    /// Test number substituted for every destination outside production
    pub virtual_number: Option<String>,
    #[serde(default = "default_twilio_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NtfyConfig {
    #[serde(default = "default_ntfy_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Public base URL of this service, used for SMS status callbacks
    pub base_url: Option<String>,
}

fn default_run_mode() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_request_timeout() -> u64 {
    15
}

fn default_from_name() -> String {
    "Default Sender".to_string()
}

fn default_sendgrid_url() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_twilio_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_ntfy_url() -> String {
    "https://ntfy.sh".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| default_run_mode());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("database.backend", default_store_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, DATABASE__URL, PROVIDERS__TWILIO__FROM_NUMBER, ...
            // No try_parsing: it would turn E.164 numbers into integers.
            .add_source(Environment::default().separator("__"))
            .set_override("run_mode", run_mode)?;

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn deployment_mode(&self) -> DeploymentMode {
        DeploymentMode::from_run_mode(&self.run_mode)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_mode: default_run_mode(),
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sendgrid: SendGridConfig::default(),
            twilio: TwilioConfig::default(),
            ntfy: NtfyConfig::default(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_email: None,
            from_name: default_from_name(),
            base_url: default_sendgrid_url(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            virtual_number: None,
            base_url: default_twilio_url(),
        }
    }
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            base_url: default_ntfy_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.database.backend, "memory");
        assert_eq!(settings.providers.ntfy.base_url, "https://ntfy.sh");
        assert!(settings.providers.sendgrid.api_key.is_none());
    }

    #[test]
    fn test_deployment_mode() {
        assert_eq!(
            DeploymentMode::from_run_mode("production"),
            DeploymentMode::Production
        );
        assert_eq!(DeploymentMode::from_run_mode("PROD"), DeploymentMode::Production);
        assert_eq!(
            DeploymentMode::from_run_mode("development"),
            DeploymentMode::Development
        );
        assert_eq!(DeploymentMode::from_run_mode("staging"), DeploymentMode::Development);
        assert!(!Settings::default().deployment_mode().is_production());
    }
}
