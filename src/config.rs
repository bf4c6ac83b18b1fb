use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nginx: NginxConfig,
    pub zabbix: ZabbixConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
pub struct NginxConfig {
    /// NGINX Plus API host
    #[serde(default)]
    pub host: String,
    /// NGINX Plus API port
    #[serde(default = "default_nginx_port")]
    pub port: u16,
    /// Basic auth user; no auth header is sent when unset
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Version segment of `api/<version>/...`
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

fn default_nginx_port() -> u16 {
    8080
}

fn default_api_version() -> u32 {
    3
}

fn default_http_timeout() -> u64 {
    10_000
}

impl NginxConfig {
    /// Base URL of the status endpoint, always with a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for NginxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NginxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_version", &self.api_version)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZabbixConfig {
    /// Zabbix server/proxy trapper host
    #[serde(default = "default_zabbix_host")]
    pub host: String,
    /// Zabbix trapper port
    #[serde(default = "default_zabbix_port")]
    pub port: u16,
    /// Connect + exchange timeout in milliseconds
    #[serde(default = "default_zabbix_timeout")]
    pub timeout_ms: u64,
}

fn default_zabbix_host() -> String {
    "127.0.0.1".to_string()
}

fn default_zabbix_port() -> u16 {
    10051
}

fn default_zabbix_timeout() -> u64 {
    5_000
}

impl ZabbixConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What `update_items` does with `requests_total`/`requests_current` when the
/// counters resource answers with an error document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCounters {
    /// Push both counters as 0
    #[default]
    Zero,
    /// Leave both items out of the push
    Omit,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Zabbix host name the items are filed under
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub missing_counters: MissingCounters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Values supplied on the command line; they win over files and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub nginx_host: Option<String>,
    pub nginx_port: Option<u16>,
    pub nginx_user: Option<String>,
    pub nginx_password: Option<String>,
    pub api_version: Option<u32>,
    pub zabbix_host: Option<String>,
    pub zabbix_port: Option<u16>,
    pub sender: Option<String>,
}

impl ConfigOverrides {
    fn apply(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_override_option("nginx.host", self.nginx_host.clone())?
            .set_override_option("nginx.port", self.nginx_port.map(i64::from))?
            .set_override_option("nginx.user", self.nginx_user.clone())?
            .set_override_option("nginx.password", self.nginx_password.clone())?
            .set_override_option("nginx.api_version", self.api_version.map(i64::from))?
            .set_override_option("zabbix.host", self.zabbix_host.clone())?
            .set_override_option("zabbix.port", self.zabbix_port.map(i64::from))?
            .set_override_option("metrics.sender", self.sender.clone())
    }
}

impl AppConfig {
    /// Load configuration from a specific directory, then apply CLI overrides
    pub fn load_from<P: AsRef<Path>>(
        config_dir: P,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("nginx.port", i64::from(default_nginx_port()))?
            .set_default("nginx.api_version", i64::from(default_api_version()))?
            .set_default("zabbix.host", default_zabbix_host())?
            .set_default("zabbix.port", i64::from(default_zabbix_port()))?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("NGINX_STATUS_ENV")
                        .unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (NGINX_STATUS_ZABBIX__HOST, etc.)
            .add_source(
                Environment::with_prefix("NGINX_STATUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        overrides.apply(builder)?.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.nginx.host.trim().is_empty() {
            errors.push("nginx.host must be set".to_string());
        }

        if self.nginx.port == 0 {
            errors.push("nginx.port must be non-zero".to_string());
        }

        if self.nginx.api_version == 0 {
            errors.push("nginx.api_version must be at least 1".to_string());
        }

        if self.nginx.password.is_some() && self.nginx.user.is_none() {
            errors.push("nginx.password is set but nginx.user is not".to_string());
        }

        if self.zabbix.host.trim().is_empty() {
            errors.push("zabbix.host must be set".to_string());
        }

        if self.nginx.timeout_ms == 0 || self.zabbix.timeout_ms == 0 {
            errors.push("timeouts must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
