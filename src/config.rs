use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. When absent the in-memory store is used.
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub mpesa: MpesaConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Shared secret for operator endpoints (`X-Internal-Secret`)
    pub internal_secret: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("internal_secret", &"<redacted>")
            .finish()
    }
}

/// Daraja (M-Pesa) provider settings
#[derive(Serialize, Deserialize, Clone)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Paybill / till used for STK push
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_safety_margin_secs")]
    pub token_safety_margin_secs: u64,
    pub b2c: B2cConfig,
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token_safety_margin_secs", &self.token_safety_margin_secs)
            .field("b2c", &self.b2c)
            .finish()
    }
}

/// B2C payout credentials, distinct from the STK push pair
#[derive(Serialize, Deserialize, Clone)]
pub struct B2cConfig {
    pub shortcode: String,
    pub initiator_name: String,
    pub security_credential: String,
    pub result_url: String,
    pub queue_timeout_url: String,
    #[serde(default = "default_command_id")]
    pub command_id: String,
}

impl fmt::Debug for B2cConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2cConfig")
            .field("shortcode", &self.shortcode)
            .field("initiator_name", &self.initiator_name)
            .field("security_credential", &"<redacted>")
            .field("result_url", &self.result_url)
            .field("queue_timeout_url", &self.queue_timeout_url)
            .field("command_id", &self.command_id)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    pub currency: String,
    pub deposit_min: i64,
    pub deposit_max: i64,
    pub withdraw_min: i64,
    pub withdraw_max: i64,
    /// Flat fee deducted from the gross withdrawal amount
    pub withdraw_fee: Decimal,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            deposit_min: 10,
            deposit_max: 150_000,
            withdraw_min: 10,
            withdraw_max: 150_000,
            withdraw_fee: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventsConfig {
    pub channel_capacity: usize,
    /// Downstream consumer receiving every outcome event as a JSON POST
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            webhook_url: None,
            webhook_timeout_secs: 5,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_token_safety_margin_secs() -> u64 {
    60
}

fn default_command_id() -> String {
    "BusinessPayment".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
