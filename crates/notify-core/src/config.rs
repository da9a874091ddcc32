//! Configuration for the notification pipeline, layered from a TOML file
//! with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level application configuration, shared by notify-server,
/// notify-worker, and notify-dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub grpc: GrpcConfig,
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub cipher: CipherConfig,
    pub limits: LimitsConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
    pub job_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grpc: GrpcConfig::default(),
            database: DatabaseConfig::default(),
            broker: BrokerConfig::default(),
            cipher: CipherConfig::default(),
            limits: LimitsConfig::default(),
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
            job_name: "dispatch_scheduled_messages".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            shutdown_timeout_secs: 30,
        }
    }
}

impl GrpcConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/notify".to_string(),
            max_open_conns: 10,
            max_idle_conns: 2,
            connect_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub brokers: String,
    pub kafka_version: String,
    pub consumer_group: String,
    pub consumer_group_instance_num: usize,
    pub sms_topic: String,
    pub mail_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            kafka_version: "3.6.0".to_string(),
            consumer_group: "notify".to_string(),
            consumer_group_instance_num: 3,
            sms_topic: "notify-sms".to_string(),
            mail_topic: "notify-mail".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherConfig {
    /// AES key, 16/24/32 bytes when decoded. Accepts a raw or hex-encoded
    /// string; startup rejects any other length.
    pub aes_key: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            aes_key: "0123456789abcdef".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub schedule_limit_days: i64,
    pub sms_batch_limit: usize,
    pub mail_batch_limit: usize,
    pub enqueue_concurrency: usize,
    pub publish_max_attempts: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            schedule_limit_days: 30,
            sms_batch_limit: 100,
            mail_batch_limit: 500,
            enqueue_concurrency: 10,
            publish_max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub sms_provider: String,
    pub mail_provider: String,
    pub mitake_username: String,
    pub mitake_password: String,
    pub sendgrid_token: String,
    pub mail_sender_name: String,
    pub mail_sender_address: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sms_provider: "mitake".to_string(),
            mail_provider: "sendgrid".to_string(),
            mitake_username: String::new(),
            mitake_password: String::new(),
            sendgrid_token: String::new(),
            mail_sender_name: "Notify".to_string(),
            mail_sender_address: "notify@notify.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub otlp_service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            otlp_endpoint: None,
            otlp_service_name: "notify".to_string(),
        }
    }
}

/// Environment variable names recognized as overrides.
mod env_vars {
    pub const CONFIG_PATH: &str = "NOTIFY_CONFIG";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const GRPC_HOST: &str = "NOTIFY_GRPC_HOST";
    pub const GRPC_PORT: &str = "NOTIFY_GRPC_PORT";
    pub const KAFKA_BROKERS: &str = "NOTIFY_KAFKA_BROKERS";
    pub const AES_KEY: &str = "NOTIFY_AES_KEY";
    pub const MITAKE_USERNAME: &str = "NOTIFY_MITAKE_USERNAME";
    pub const MITAKE_PASSWORD: &str = "NOTIFY_MITAKE_PASSWORD";
    pub const SENDGRID_TOKEN: &str = "NOTIFY_SENDGRID_TOKEN";
    pub const JOB_NAME: &str = "NOTIFY_JOB_NAME";
    pub const LOG_LEVEL: &str = "RUST_LOG";
}

fn config_path() -> PathBuf {
    env::var(env_vars::CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./config/notify.toml"))
}

/// Load configuration from the config file (if present) overlaid with
/// environment variables. Never fails on a missing file; fails on a
/// malformed one.
pub fn load_config() -> Result<AppConfig> {
    let mut config = AppConfig::default();

    let path = config_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Configuration { message: format!("reading {}: {}", path.display(), e) })?;
        config = toml::from_str(&content)
            .map_err(|e| Error::Configuration { message: format!("parsing {}: {}", path.display(), e) })?;
    }

    if let Ok(url) = env::var(env_vars::DATABASE_URL) {
        config.database.url = url;
    }
    if let Ok(host) = env::var(env_vars::GRPC_HOST) {
        config.grpc.host = host;
    }
    if let Ok(port) = env::var(env_vars::GRPC_PORT) {
        config.grpc.port = port
            .parse()
            .map_err(|_| Error::Configuration { message: format!("{} is not a valid port", env_vars::GRPC_PORT) })?;
    }
    if let Ok(brokers) = env::var(env_vars::KAFKA_BROKERS) {
        config.broker.brokers = brokers;
    }
    if let Ok(key) = env::var(env_vars::AES_KEY) {
        config.cipher.aes_key = key;
    }
    if let Ok(user) = env::var(env_vars::MITAKE_USERNAME) {
        config.providers.mitake_username = user;
    }
    if let Ok(pass) = env::var(env_vars::MITAKE_PASSWORD) {
        config.providers.mitake_password = pass;
    }
    if let Ok(token) = env::var(env_vars::SENDGRID_TOKEN) {
        config.providers.sendgrid_token = token;
    }
    if let Ok(job) = env::var(env_vars::JOB_NAME) {
        config.job_name = job;
    }
    if let Ok(level) = env::var(env_vars::LOG_LEVEL) {
        config.logging.level = level;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    let key_len = config.cipher.aes_key.as_bytes().len();
    if !matches!(key_len, 16 | 24 | 32) {
        return Err(Error::Configuration {
            message: format!(
                "aes_key must be 16, 24, or 32 bytes, got {}",
                key_len
            ),
        });
    }
    if config.limits.sms_batch_limit == 0 || config.limits.mail_batch_limit == 0 {
        return Err(Error::Configuration {
            message: "batch limits must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.grpc.address(), "0.0.0.0:50051");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_bad_key_length() {
        let mut config = AppConfig::default();
        config.cipher.aes_key = "tooshort".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn serializes_round_trip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let back: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.grpc.port, back.grpc.port);
    }
}
