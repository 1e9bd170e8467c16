use serde::Deserialize;
use std::net::SocketAddr;

use domain::services::{DispatcherConfig, EngineConfig, ExitPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Evaluation engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
    /// Alert dedup and retry settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Email notification channel
    #[serde(default)]
    pub email: EmailConfig,
    /// SMS notification channel
    #[serde(default)]
    pub sms: SmsConfig,
    /// Webhook notification channel
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// How long shutdown waits for in-flight alert deliveries
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Keep accepted location updates in the location archive
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Days of location history kept before the cleanup job drops them
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Archived rows held in memory before new updates are refused
    #[serde(default = "default_archive_max_entries")]
    pub max_entries: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: default_retention_days(),
            max_entries: default_archive_max_entries(),
        }
    }
}

// Default value functions
fn default_retention_days() -> u32 {
    30
}
fn default_archive_max_entries() -> usize {
    1_000_000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    1_048_576
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_max_batch_size() -> usize {
    50
}
fn default_true() -> bool {
    true
}

/// Email channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email alerts are delivered
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: sendgrid or console (for development)
    #[serde(default = "default_console_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_console_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

/// SMS channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// SMS provider: http (generic gateway) or console (for development)
    #[serde(default = "default_console_provider")]
    pub provider: String,

    /// Gateway endpoint receiving `{to, from, body}` JSON (for http provider)
    #[serde(default)]
    pub gateway_url: String,

    /// Bearer token sent to the gateway
    #[serde(default)]
    pub api_key: String,

    /// Sender id or number shown to recipients
    #[serde(default = "default_sender_name")]
    pub sender_id: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_console_provider(),
            gateway_url: String::new(),
            api_key: String::new(),
            sender_id: default_sender_name(),
        }
    }
}

/// Webhook channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failures before a URL's circuit opens
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Seconds an open circuit rejects deliveries
    #[serde(default = "default_circuit_breaker_cooldown")]
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_webhook_timeout(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown_secs: default_circuit_breaker_cooldown(),
        }
    }
}

fn default_console_provider() -> String {
    "console".to_string() // Default to console logging for development
}

fn default_sender_email() -> String {
    "alerts@geofence.local".to_string()
}

fn default_sender_name() -> String {
    "Geofence Alerts".to_string()
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_cooldown() -> u64 {
    300 // 5 minutes
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Defaults used by [`Config::load_for_test`], mirroring `config/default.toml`.
const TEST_DEFAULTS: &str = r#"
    [server]
    host = "127.0.0.1"
    port = 8080
    request_timeout_secs = 30
    max_body_size = 1048576
    shutdown_timeout_secs = 5

    [logging]
    level = "info"
    format = "json"

    [security]
    cors_origins = []

    [limits]
    max_batch_size = 50

    [engine]
    cell_degrees = 0.05
    linear_scan_threshold = 32
    implicit_parent_containment = true
    exit_policy = "immediate"
    membership_grace_secs = 900

    [dispatcher]
    dedup_window_secs = 60
    dedup_bucket_secs = 60
    max_attempts = 5
    initial_backoff_ms = 10
    max_backoff_ms = 100
    failure_buffer = 1024

    [archive]
    enabled = true
    retention_days = 30
    max_entries = 100000

    [email]
    enabled = false
    provider = "console"
    sender_email = "test@example.com"
    sender_name = "Test"

    [sms]
    enabled = false
    provider = "console"

    [webhook]
    enabled = false
    timeout_secs = 5
    circuit_breaker_threshold = 5
    circuit_breaker_cooldown_secs = 300
"#;

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with GEO__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GEO").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Built entirely from embedded defaults and overrides, without relying on
    /// config files. Validation is skipped to allow partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(TEST_DEFAULTS, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.socket_addr().is_err() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Invalid server address {}:{}",
                self.server.host, self.server.port
            )));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigValidationError::InvalidValue(
                "logging.format must be json or pretty".to_string(),
            ));
        }

        if self.limits.max_batch_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "limits.max_batch_size must be at least 1".to_string(),
            ));
        }

        if !(self.engine.cell_degrees > 0.0 && self.engine.cell_degrees <= 10.0) {
            return Err(ConfigValidationError::InvalidValue(
                "engine.cell_degrees must be in (0, 10]".to_string(),
            ));
        }

        if self.archive.retention_days == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "archive.retention_days must be at least 1".to_string(),
            ));
        }

        if self.dispatcher.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "dispatcher.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.dispatcher.initial_backoff_ms > self.dispatcher.max_backoff_ms {
            return Err(ConfigValidationError::InvalidValue(
                "dispatcher.initial_backoff_ms cannot exceed max_backoff_ms".to_string(),
            ));
        }

        if self.email.enabled {
            match self.email.provider.as_str() {
                "console" => {}
                "sendgrid" if self.email.sendgrid_api_key.is_empty() => {
                    return Err(ConfigValidationError::MissingRequired(
                        "GEO__EMAIL__SENDGRID_API_KEY must be set for the sendgrid provider"
                            .to_string(),
                    ))
                }
                "sendgrid" => {}
                other => {
                    return Err(ConfigValidationError::InvalidValue(format!(
                        "Unknown email provider: {}",
                        other
                    )))
                }
            }
        }

        if self.sms.enabled {
            match self.sms.provider.as_str() {
                "console" => {}
                "http" if self.sms.gateway_url.is_empty() => {
                    return Err(ConfigValidationError::MissingRequired(
                        "GEO__SMS__GATEWAY_URL must be set for the http provider".to_string(),
                    ))
                }
                "http" => {}
                other => {
                    return Err(ConfigValidationError::InvalidValue(format!(
                        "Unknown SMS provider: {}",
                        other
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        self.engine.exit_policy
    }
}
