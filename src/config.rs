use crate::api::Credentials;
use crate::execution::SizingParams;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

/// Runtime settings, loaded once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub exchange: ExchangeSettings,
    pub webhook: WebhookSettings,
    pub sizing: SizingParams,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Clone, Deserialize)]
pub struct ExchangeSettings {
    /// REST base URL, e.g. https://www.bitmex.com
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Optional client-side throttle
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl std::fmt::Debug for ExchangeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl ExchangeSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.base_url.clone(),
            self.api_key.clone(),
            self.api_secret.clone(),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit(&self) -> Option<NonZeroU32> {
        self.requests_per_minute.and_then(NonZeroU32::new)
    }
}

#[derive(Clone, Deserialize)]
pub struct WebhookSettings {
    pub port: u16,
    /// Shared secret every signal must carry
    pub signature: String,
    /// Strategy id this relay trades for
    pub strategy: String,
    /// Quiet period before the latest signal is acted on
    pub debounce_ms: u64,
}

impl std::fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("port", &self.port)
            .field("strategy", &self.strategy)
            .field("debounce_ms", &self.debounce_ms)
            .finish_non_exhaustive()
    }
}

impl WebhookSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "hookrelay=info".to_string()
}

impl Settings {
    /// Load from `config/` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load from a config directory, then `HOOKRELAY_*` environment variables
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("exchange.base_url", "https://testnet.bitmex.com")?
            .set_default("exchange.timeout_secs", 30)?
            .set_default("webhook.port", 3000)?
            .set_default("webhook.strategy", "my_strategy")?
            .set_default("webhook.debounce_ms", 5000)?
            .set_default("sizing.balance_scale", 1e-8)?
            .set_default("sizing.percent_of_balance", 0.5)?
            .set_default("logging.level", default_log_level())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HOOKRELAY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // HOOKRELAY_EXCHANGE__API_KEY, HOOKRELAY_WEBHOOK__SIGNATURE, ...
            // Values stay strings; numeric fields are converted on deserialize
            .add_source(
                Environment::with_prefix("HOOKRELAY")
                    .prefix_separator("_")
                    .separator("__"),
            );

        builder.build()?.try_deserialize()
    }

    /// Check values that deserialize fine but can't be traded with
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.exchange.base_url.trim().is_empty() {
            errors.push("exchange.base_url must be set".to_string());
        }
        if self.exchange.api_key.trim().is_empty() {
            errors.push("exchange.api_key must be set".to_string());
        }
        if self.exchange.api_secret.trim().is_empty() {
            errors.push("exchange.api_secret must be set".to_string());
        }
        if self.exchange.requests_per_minute == Some(0) {
            errors.push("exchange.requests_per_minute must be positive".to_string());
        }
        if self.webhook.signature.is_empty() {
            errors.push("webhook.signature must be set".to_string());
        }
        if self.webhook.strategy.is_empty() {
            errors.push("webhook.strategy must be set".to_string());
        }
        if !(self.sizing.balance_scale > 0.0) {
            errors.push("sizing.balance_scale must be positive".to_string());
        }
        if !(self.sizing.percent_of_balance > 0.0 && self.sizing.percent_of_balance <= 1.0) {
            errors.push("sizing.percent_of_balance must be in (0, 1]".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
