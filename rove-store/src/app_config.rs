use serde::Deserialize;
use std::env;

use rove_catalog::FeeSchedule;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// When unset the engine runs on the in-memory store.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Shared secret for webhook HMAC signatures.
    pub webhook_secret: String,
    #[serde(default = "default_gateway_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_gateway_timeout() -> u64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub platform_fee: i64,
    pub processing_fee: i64,
    #[serde(default = "default_retry_attempts")]
    pub webhook_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub webhook_retry_backoff_ms: u64,
}

fn default_retry_attempts() -> u32 { 5 }
fn default_retry_backoff_ms() -> u64 { 500 }

impl BusinessRules {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            platform_fee: self.platform_fee,
            processing_fee: self.processing_fee,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables with a ROVE prefix, e.g. ROVE__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("ROVE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
