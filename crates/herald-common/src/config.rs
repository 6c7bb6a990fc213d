//! Configuration for Herald

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// SMTP configuration for the default mailer
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            smtp: SmtpConfig::default(),
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; hosts running on in-memory stores
    /// can leave this unset
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// SMTP relay configuration used by the default mailer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Relay username
    pub username: Option<String>,

    /// Relay password
    pub password: Option<String>,

    /// Use implicit TLS
    #[serde(default)]
    pub use_tls: bool,

    /// Use STARTTLS
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,

    /// Fallback sender address when a definition has none
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Fallback sender display name
    pub from_name: Option<String>,

    /// Transport timeout in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: default_use_starttls(),
            from_address: default_from_address(),
            from_name: None,
            timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_use_starttls() -> bool {
    true
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum bindings dispatched concurrently per fired event
    #[serde(default = "default_max_concurrent_bindings")]
    pub max_concurrent_bindings: usize,

    /// Maximum concurrent per-recipient sends inside a mailer
    #[serde(default = "default_recipient_concurrency")]
    pub recipient_concurrency: usize,

    /// Per-mailer-call timeout in seconds
    #[serde(default = "default_mailer_timeout")]
    pub mailer_timeout_secs: u64,

    /// Subject prefix applied to test sends
    #[serde(default = "default_test_subject_prefix")]
    pub test_subject_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_bindings: default_max_concurrent_bindings(),
            recipient_concurrency: default_recipient_concurrency(),
            mailer_timeout_secs: default_mailer_timeout(),
            test_subject_prefix: default_test_subject_prefix(),
        }
    }
}

fn default_max_concurrent_bindings() -> usize {
    4
}

fn default_recipient_concurrency() -> usize {
    8
}

fn default_mailer_timeout() -> u64 {
    30
}

fn default_test_subject_prefix() -> String {
    "[Test] ".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./herald.toml"),
            std::path::PathBuf::from("/etc/herald/herald.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}
