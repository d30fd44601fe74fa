use serde::Deserialize;
use std::env;
use std::time::Duration;
use wayfare_core::repository::DEFAULT_TICKET_TTL;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default)]
    pub enabled: bool,
}

fn default_group_id() -> String {
    "wayfare-booking".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CarrierCredential {
    Bearer { token: String },
    Basic { username: String, password: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct CarrierConfig {
    pub base_url: String,
    pub tenant_id: String,
    pub credential: CarrierCredential,
    #[serde(default = "default_carrier_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_carrier_timeout() -> u64 { 30 }
fn default_payment_method() -> String { "CREDIT_CARD".to_string() }

impl CarrierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_ttl_seconds")]
    pub ticket_ttl_seconds: u64,
    /// The TTL the admin listing assumes every record was written with.
    #[serde(default = "default_ttl_seconds")]
    pub max_ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 { DEFAULT_TICKET_TTL.as_secs() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            ticket_ttl_seconds: default_ttl_seconds(),
            max_ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl StoreConfig {
    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.ticket_ttl_seconds)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

fn default_smtp_port() -> u16 { 587 }

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub gateway_url: String,
    pub api_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    pub email: Option<EmailConfig>,
    pub chat: Option<ChatConfig>,
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 500 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            email: None,
            chat: None,
        }
    }
}

impl NotificationConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, uncommitted overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `WAYFARE_CARRIER__TENANT_ID=acme` sets `carrier.tenant_id`
            .add_source(config::Environment::with_prefix("WAYFARE").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Redis refuses a zero expiry, so both TTLs must be at least one second.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.store.ticket_ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "store.ticket_ttl_seconds must be at least 1".to_string(),
            ));
        }
        if self.store.max_ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "store.max_ttl_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TOML: &str = include_str!("../../config/default.toml");

    fn from_toml(extra: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_TOML, config::FileFormat::Toml))
            .add_source(config::File::from_str(extra, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_file_parses() {
        let config = from_toml("");

        assert_eq!(config.store.ticket_ttl(), DEFAULT_TICKET_TTL);
        assert_eq!(config.store.max_ttl(), config.store.ticket_ttl());
        assert_eq!(config.notifications.max_attempts, 3);
        assert!(matches!(config.carrier.credential, CarrierCredential::Bearer { .. }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ticket_ttl_is_rejected() {
        let config = from_toml(
            r#"
            [store]
            ticket_ttl_seconds = 0
            "#,
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ticket_ttl_seconds"));
    }

    #[test]
    fn test_overrides_apply() {
        let config = from_toml(
            r#"
            [store]
            backend = "memory"
            ticket_ttl_seconds = 60

            [carrier.credential]
            kind = "basic"
            username = "agency"
            password = "secret"
            "#,
        );

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.ticket_ttl(), Duration::from_secs(60));
        assert_eq!(
            config.carrier.credential,
            CarrierCredential::Basic {
                username: "agency".to_string(),
                password: "secret".to_string(),
            }
        );
    }
}
