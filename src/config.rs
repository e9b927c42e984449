use config::{Config, ConfigError, Environment, File};
use hook_core::MAX_SMS_TEXT_LEN;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Decision webhook configuration
    pub webhook: WebhookConfig,
    /// Outbound notification configuration
    pub notify: NotifyConfig,
    /// GSM modem configuration
    pub modem: ModemConfig,
    /// Decision endpoint server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Decision webhook configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    /// URL called for every received SMS (default: http://127.0.0.1:5009/sms)
    pub url: String,
    /// Milliseconds to wait for the webhook answer (default: 2000)
    pub timeout_ms: u64,
}

/// Outbound notification configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    /// Number that receives error notifications (required)
    pub admin_number: String,
    /// Longest outbound text in characters (default: 100)
    pub max_text_len: usize,
}

/// GSM modem configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModemConfig {
    /// Serial port of the modem (default: /dev/ttyACM0)
    pub port: String,
    /// Serial baud rate (default: 115200)
    pub baud_rate: u32,
    /// SIM card PIN, if any
    pub pin: Option<String>,
}

/// Decision endpoint server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 5009)
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: pretty)
    pub format: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5009/sms".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            admin_number: String::new(),
            max_text_len: MAX_SMS_TEXT_LEN,
        }
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            pin: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5009,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (e.g. SMSHOOK__WEBHOOK__URL)
            .add_source(Environment::with_prefix("SMSHOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.url.trim().is_empty() {
            return Err(ConfigError::Message("webhook.url must be set".into()));
        }
        if self.webhook.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "webhook.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.notify.admin_number.trim().is_empty() {
            return Err(ConfigError::Message("notify.admin_number must be set".into()));
        }
        if self.notify.max_text_len == 0 {
            return Err(ConfigError::Message(
                "notify.max_text_len must be greater than zero".into(),
            ));
        }
        if self.notify.max_text_len > MAX_SMS_TEXT_LEN {
            return Err(ConfigError::Message(format!(
                "notify.max_text_len must not exceed {}",
                MAX_SMS_TEXT_LEN
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webhook: WebhookConfig::default(),
            notify: NotifyConfig::default(),
            modem: ModemConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
