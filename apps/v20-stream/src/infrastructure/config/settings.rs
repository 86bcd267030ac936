//! Client Configuration Settings
//!
//! Configuration types for the streaming client, loaded from environment
//! variables.

use std::time::Duration;

use crate::infrastructure::stream::{DecoderConfig, HandlerErrorPolicy, SessionOptions};
use crate::infrastructure::stream::decoder::{
    DEFAULT_GROW_BY, DEFAULT_MAX_CAPACITY, DEFAULT_MIN_FREE,
};

/// Stream host for the practice environment.
pub const PRACTICE_STREAM_URL: &str = "https://stream-fxpractice.oanda.com";

/// Stream host for the live environment.
pub const LIVE_STREAM_URL: &str = "https://stream-fxtrade.oanda.com";

/// Trading environment (practice vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// fxPractice (simulated).
    #[default]
    Practice,
    /// fxTrade (real money).
    Live,
}

impl Environment {
    /// Parse environment from string.
    ///
    /// Returns `None` for anything but `practice` or `live`, so a typo never
    /// silently selects an environment.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "practice" => Some(Self::Practice),
            "live" => Some(Self::Live),
            _ => None,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Live => "live",
        }
    }

    /// Default stream host for this environment.
    #[must_use]
    pub const fn stream_base_url(&self) -> &'static str {
        match self {
            Self::Practice => PRACTICE_STREAM_URL,
            Self::Live => LIVE_STREAM_URL,
        }
    }
}

/// API credentials.
#[derive(Clone)]
pub struct Credentials {
    token: String,
    account_id: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(token: String, account_id: String) -> Self {
        Self { token, account_id }
    }

    /// Get the bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the account ID.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Stream session settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Frame buffer bytes allocated up front.
    pub buffer_initial_bytes: usize,
    /// Frame buffer growth step.
    pub buffer_grow_bytes: usize,
    /// Frame buffer ceiling.
    pub buffer_max_bytes: usize,
    /// What a session does when routing a frame fails.
    pub on_handler_error: HandlerErrorPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_initial_bytes: DEFAULT_GROW_BY,
            buffer_grow_bytes: DEFAULT_GROW_BY,
            buffer_max_bytes: DEFAULT_MAX_CAPACITY,
            on_handler_error: HandlerErrorPolicy::Continue,
        }
    }
}

impl StreamSettings {
    /// Session options for these settings.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            decoder: DecoderConfig {
                initial_capacity: self.buffer_initial_bytes,
                grow_by: self.buffer_grow_bytes,
                min_free: DEFAULT_MIN_FREE,
                max_capacity: self.buffer_max_bytes,
            },
            on_handler_error: self.on_handler_error.clone(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout. Streams themselves have no deadline.
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Trading environment.
    pub environment: Environment,
    /// API credentials.
    pub credentials: Credentials,
    /// Stream host override (tests, proxies).
    pub stream_url: Option<String>,
    /// Instruments for the pricing stream.
    pub instruments: Vec<String>,
    /// Whether the pricing stream starts with a snapshot.
    pub snapshot: bool,
    /// Stream session settings.
    pub stream: StreamSettings,
    /// HTTP transport settings.
    pub http: HttpSettings,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but credentials.
    #[must_use]
    pub fn new(environment: Environment, credentials: Credentials) -> Self {
        Self {
            environment,
            credentials,
            stream_url: None,
            instruments: vec!["EUR_USD".to_string()],
            snapshot: true,
            stream: StreamSettings::default(),
            http: HttpSettings::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(&lookup, "V20_TOKEN")?;
        let account_id = required(&lookup, "V20_ACCOUNT_ID")?;

        let environment = match lookup("V20_ENV") {
            Some(value) => Environment::from_str_case_insensitive(&value)
                .ok_or_else(|| invalid("V20_ENV", &value))?,
            None => Environment::default(),
        };

        let mut config = Self::new(environment, Credentials::new(token, account_id));

        config.stream_url = lookup("V20_STREAM_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if let Some(value) = lookup("V20_INSTRUMENTS") {
            let instruments = parse_list(&value);
            if instruments.is_empty() {
                return Err(ConfigError::EmptyValue("V20_INSTRUMENTS".to_string()));
            }
            config.instruments = instruments;
        }

        config.snapshot = parse_env_bool(&lookup, "V20_STREAM_SNAPSHOT", config.snapshot)?;

        let defaults = StreamSettings::default();
        config.stream = StreamSettings {
            buffer_initial_bytes: parse_env_usize(
                &lookup,
                "V20_STREAM_BUFFER_INITIAL_BYTES",
                defaults.buffer_initial_bytes,
            )?,
            buffer_grow_bytes: parse_env_usize(
                &lookup,
                "V20_STREAM_BUFFER_GROW_BYTES",
                defaults.buffer_grow_bytes,
            )?,
            buffer_max_bytes: parse_env_usize(
                &lookup,
                "V20_STREAM_BUFFER_MAX_BYTES",
                defaults.buffer_max_bytes,
            )?,
            on_handler_error: match lookup("V20_STREAM_ON_HANDLER_ERROR") {
                Some(value) => HandlerErrorPolicy::from_str_case_insensitive(&value)
                    .ok_or_else(|| invalid("V20_STREAM_ON_HANDLER_ERROR", &value))?,
                None => defaults.on_handler_error,
            },
        };

        config.http = HttpSettings {
            connect_timeout: parse_env_duration_secs(
                &lookup,
                "V20_HTTP_CONNECT_TIMEOUT_SECS",
                HttpSettings::default().connect_timeout,
            )?,
        };

        Ok(config)
    }

    /// Stream host to use: the override if set, else the environment's.
    #[must_use]
    pub fn stream_base_url(&self) -> &str {
        self.stream_url
            .as_deref()
            .unwrap_or_else(|| self.environment.stream_base_url())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value that cannot be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value.to_string())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env_usize<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |v| {
        v.trim().parse().map_err(|_| invalid(key, &v))
    })
}

fn parse_env_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |v| match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, &v)),
    })
}

fn parse_env_duration_secs<F>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |v| {
        v.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| invalid(key, &v))
    })
}
