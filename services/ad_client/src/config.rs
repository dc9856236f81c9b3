//! services/ad_client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! Configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use ad_delivery_core::RequestMode;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_API_BASE: &str = "https://ads.example.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_PLATFORM: &str = "web";
pub const DEFAULT_LOCATION: &str = "US";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Per-instance delivery settings. Every field can be overridden per call
/// except the transport limits.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    pub api_base: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub mode: RequestMode,
    pub platform: String,
    pub location: String,
    /// Skips the identity store when set.
    pub user_id: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: 0,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            mode: RequestMode::UserQuery,
            platform: DEFAULT_PLATFORM.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            user_id: None,
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub options: ClientOptions,
    pub log_level: Level,
    pub identity_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A missing key is only fatal once an ad is actually requested.
        let api_key = lookup("AD_API_KEY").filter(|key| !key.trim().is_empty());

        let defaults = ClientOptions::default();
        let api_base = lookup("AD_API_BASE").unwrap_or(defaults.api_base);
        let timeout = match lookup("AD_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number("AD_TIMEOUT_MS", &raw)?),
            None => defaults.timeout,
        };
        let max_retries = match lookup("AD_MAX_RETRIES") {
            Some(raw) => parse_number("AD_MAX_RETRIES", &raw)?,
            None => defaults.max_retries,
        };
        let retry_delay = match lookup("AD_RETRY_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number("AD_RETRY_DELAY_MS", &raw)?),
            None => defaults.retry_delay,
        };
        let mode = match lookup("AD_MODE") {
            Some(raw) => parse_mode(&raw)?,
            None => defaults.mode,
        };
        let platform = lookup("AD_PLATFORM").unwrap_or(defaults.platform);
        let location = lookup("AD_LOCATION").unwrap_or(defaults.location);

        let debug_logging = match lookup("AD_DEBUG") {
            Some(raw) => parse_flag("AD_DEBUG", &raw)?,
            None => false,
        };
        let log_level = if debug_logging {
            Level::DEBUG
        } else {
            let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
            log_level_str.parse::<Level>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RUST_LOG".to_string(),
                    format!("'{}' is not a valid log level", log_level_str),
                )
            })?
        };

        let identity_path = lookup("AD_IDENTITY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.ad_client_identity.json"));

        Ok(Self {
            api_key,
            options: ClientOptions {
                api_base,
                timeout,
                max_retries,
                retry_delay,
                mode,
                platform,
                location,
                user_id: None,
            },
            log_level,
            identity_path,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn parse_mode(raw: &str) -> Result<RequestMode, ConfigError> {
    match raw.trim().to_lowercase().replace('-', "_").as_str() {
        "user_query" => Ok(RequestMode::UserQuery),
        "agent_response" => Ok(RequestMode::AgentResponse),
        other => Err(ConfigError::InvalidValue(
            "AD_MODE".to_string(),
            format!("'{}' is not one of user_query, agent_response", other),
        )),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}
