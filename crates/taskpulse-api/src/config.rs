//! Configuration management for the taskpulse service.

use std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use axum::http::HeaderName;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use taskpulse_pipeline::{
    gateway::DEFAULT_TELEGRAM_API_URL, tracker::DEFAULT_GITHUB_GRAPHQL_URL, Formatter,
    ServiceSettings,
};

const CONFIG_FILE: &str = "taskpulse.toml";
const ENV_PREFIX: &str = "TASKPULSE_";

/// Service configuration with defaults, file and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed `TASKPULSE_` (highest priority)
/// 2. Configuration file (`taskpulse.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Only the Telegram bot token has no usable default.
///
/// # Example
///
/// ```no_run
/// use taskpulse_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `TASKPULSE_HOST`
    #[serde(default = "default_host")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `TASKPULSE_PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `TASKPULSE_REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // Ingestion
    /// Header naming the webhook event type.
    ///
    /// Environment variable: `TASKPULSE_EVENT_HEADER`
    #[serde(default = "default_event_header")]
    pub event_header: String,
    /// Dedup window in milliseconds.
    ///
    /// Environment variable: `TASKPULSE_DEDUP_WINDOW_MS`
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    /// Number of accepted events kept for `GET /webhook-data`.
    ///
    /// Environment variable: `TASKPULSE_RECENT_EVENTS_CAPACITY`
    #[serde(default = "default_recent_events_capacity")]
    pub recent_events_capacity: usize,
    /// Shared secret for `X-Hub-Signature-256`; unsigned deliveries are
    /// accepted when unset.
    ///
    /// Environment variable: `TASKPULSE_WEBHOOK_SECRET`
    #[serde(default)]
    pub webhook_secret: Option<String>,

    // Messaging gateway
    /// Telegram Bot API base URL.
    ///
    /// Environment variable: `TASKPULSE_TELEGRAM_API_URL`
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
    /// Telegram bot token.
    ///
    /// Environment variable: `TASKPULSE_TELEGRAM_BOT_TOKEN`
    #[serde(default)]
    pub telegram_bot_token: String,

    // Tracking service
    /// GitHub GraphQL endpoint.
    ///
    /// Environment variable: `TASKPULSE_GITHUB_GRAPHQL_URL`
    #[serde(default = "default_github_graphql_url")]
    pub github_graphql_url: String,
    /// Token used for task detail lookups.
    ///
    /// Environment variable: `TASKPULSE_GITHUB_TOKEN`
    #[serde(default)]
    pub github_token: String,

    // Presentation
    /// Offset from UTC, in minutes, used for displayed timestamps.
    ///
    /// Environment variable: `TASKPULSE_DISPLAY_UTC_OFFSET_MINUTES`
    #[serde(default)]
    pub display_utc_offset_minutes: i32,

    // Directory
    /// TOML file seeding the subscriber directory.
    ///
    /// Environment variable: `TASKPULSE_SUBSCRIBERS_FILE`
    #[serde(default)]
    pub subscribers_file: Option<PathBuf>,

    // Logging
    /// Log filter directives.
    ///
    /// Environment variable: `TASKPULSE_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Loads configuration from defaults, `taskpulse.toml` and environment
    /// variable overrides, then validates it.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Returns the layered configuration sources.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates configuration from the given sources.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Returns the parsed event header name.
    pub fn event_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_str(self.event_header.trim()).context("Invalid event header name")
    }

    /// Returns the ingestion settings.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            dedup_window: Duration::from_millis(self.dedup_window_ms),
            recent_capacity: self.recent_events_capacity,
        }
    }

    /// Returns the formatter for the configured display offset.
    pub fn formatter(&self) -> Result<Formatter> {
        Formatter::with_offset_minutes(self.display_utc_offset_minutes)
            .context("display_utc_offset_minutes must be within ±24 hours")
    }

    /// Returns the configured webhook secret, ignoring blank values.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref().map(str::trim).filter(|secret| !secret.is_empty())
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        self.event_header_name()?;

        if self.dedup_window_ms == 0 {
            anyhow::bail!("dedup_window_ms must be greater than 0");
        }

        if self.recent_events_capacity == 0 {
            anyhow::bail!("recent_events_capacity must be greater than 0");
        }

        if self.telegram_bot_token.trim().is_empty() {
            anyhow::bail!("telegram_bot_token is required");
        }

        self.formatter()?;

        Ok(())
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "***"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("event_header", &self.event_header)
            .field("dedup_window_ms", &self.dedup_window_ms)
            .field("recent_events_capacity", &self.recent_events_capacity)
            .field("webhook_secret", &self.webhook_secret.as_deref().map(redact))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("telegram_bot_token", &redact(&self.telegram_bot_token))
            .field("github_graphql_url", &self.github_graphql_url)
            .field("github_token", &redact(&self.github_token))
            .field("display_utc_offset_minutes", &self.display_utc_offset_minutes)
            .field("subscribers_file", &self.subscribers_file)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            event_header: default_event_header(),
            dedup_window_ms: default_dedup_window_ms(),
            recent_events_capacity: default_recent_events_capacity(),
            webhook_secret: None,
            telegram_api_url: default_telegram_api_url(),
            telegram_bot_token: String::new(),
            github_graphql_url: default_github_graphql_url(),
            github_token: String::new(),
            display_utc_offset_minutes: 0,
            subscribers_file: None,
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_event_header() -> String {
    "X-GitHub-Event".to_string()
}

fn default_dedup_window_ms() -> u64 {
    5000
}

fn default_recent_events_capacity() -> usize {
    10
}

fn default_telegram_api_url() -> String {
    DEFAULT_TELEGRAM_API_URL.to_string()
}

fn default_github_graphql_url() -> String {
    DEFAULT_GITHUB_GRAPHQL_URL.to_string()
}

fn default_log_level() -> String {
    "info,taskpulse=debug,tower_http=debug".to_string()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, sync::Mutex};

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        vars: Vec<String>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self { _lock: lock, vars: Vec::new(), originals: HashMap::new() }
        }

        fn set_var(&mut self, key: &str, value: &str) {
            if !self.vars.contains(&key.to_string()) {
                self.originals.insert(key.to_string(), env::var(key).ok());
                self.vars.push(key.to_string());
            }
            env::set_var(key, value);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                match self.originals.get(var) {
                    Some(Some(value)) => env::set_var(var, value),
                    Some(None) => env::remove_var(var),
                    None => {},
                }
            }
        }
    }

    fn with_token() -> Config {
        Config { telegram_bot_token: "123:abc".into(), ..Config::default() }
    }

    #[test]
    fn defaults_are_valid_once_a_token_is_set() {
        assert!(Config::default().validate().is_err());

        let config = with_token();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_header, "X-GitHub-Event");
        assert_eq!(config.service_settings(), ServiceSettings::default());
        assert_eq!(config.webhook_secret(), None);
    }

    #[test]
    fn env_overrides_defaults() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("TASKPULSE_TELEGRAM_BOT_TOKEN", "123:env");
        guard.set_var("TASKPULSE_PORT", "9090");
        guard.set_var("TASKPULSE_DEDUP_WINDOW_MS", "2500");
        guard.set_var("TASKPULSE_RECENT_EVENTS_CAPACITY", "25");
        guard.set_var("TASKPULSE_WEBHOOK_SECRET", "hook-secret");
        guard.set_var("TASKPULSE_DISPLAY_UTC_OFFSET_MINUTES", "180");
        guard.set_var("TASKPULSE_SUBSCRIBERS_FILE", "/etc/taskpulse/subscribers.toml");

        let config = Config::load().expect("Config should load with env overrides");

        assert_eq!(config.port, 9090);
        assert_eq!(config.telegram_bot_token, "123:env");
        assert_eq!(config.service_settings().dedup_window, Duration::from_millis(2500));
        assert_eq!(config.service_settings().recent_capacity, 25);
        assert_eq!(config.webhook_secret(), Some("hook-secret"));
        assert_eq!(
            config.subscribers_file,
            Some(PathBuf::from("/etc/taskpulse/subscribers.toml"))
        );
    }

    #[test]
    fn toml_layer_sits_between_defaults_and_env() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("TASKPULSE_PORT", "7070");

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                "port = 6060\nhost = \"0.0.0.0\"\ntelegram_bot_token = \"123:file\"",
            ))
            .merge(Env::prefixed(ENV_PREFIX));

        let config = Config::from_figment(figment).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7070);
        assert_eq!(config.telegram_bot_token, "123:file");
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = with_token();
        config.port = 0;
        assert!(config.validate().is_err());

        config = with_token();
        config.dedup_window_ms = 0;
        assert!(config.validate().is_err());

        config = with_token();
        config.recent_events_capacity = 0;
        assert!(config.validate().is_err());

        config = with_token();
        config.event_header = "not a header".into();
        assert!(config.validate().is_err());

        config = with_token();
        config.display_utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_webhook_secret_is_ignored() {
        let config = Config { webhook_secret: Some("  ".into()), ..with_token() };
        assert_eq!(config.webhook_secret(), None);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config {
            webhook_secret: Some("hook-secret".into()),
            github_token: "ghp_secret".into(),
            ..with_token()
        };

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("123:abc"));
        assert!(!rendered.contains("hook-secret"));
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { port: 9000, ..with_token() };

        let addr = config.parse_server_addr().expect("Should parse socket address");

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
