// src/config.rs
use std::{env, fmt::Display, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::services::{relay::RelayOptions, upstream::RetryPolicy};

pub const CHATBOT_URL_VAR: &str = "APPLICATION_CHATBOT_URL";
pub const RECOMMENDATIONS_URL_VAR: &str = "APPLICATION_CHATBOT_RECOMMENDATIONS_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub chatbot_url: Option<String>,
    pub recommendations_url: Option<String>,
    pub admin_key: Option<String>,
    pub relay: RelaySettings,
}

/// Knobs for the upstream connection and the streaming relay.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub connect_timeout: Duration,
    /// Longest wait for a single upstream chunk.
    pub read_timeout: Duration,
    pub connect_retries: u32,
    pub retry_backoff: Duration,
    /// Bound on buffered JSON that has not yet formed a complete value.
    pub max_buffer_bytes: usize,
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            connect_retries: 1,
            retry_backoff: Duration::from_millis(250),
            max_buffer_bytes: 64 * 1024,
            channel_capacity: 32,
        }
    }
}

impl RelaySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.connect_retries,
            backoff: self.retry_backoff,
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            read_timeout: self.read_timeout,
            max_buffer_bytes: self.max_buffer_bytes,
            channel_capacity: self.channel_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            chatbot_url: None,
            recommendations_url: None,
            admin_key: None,
            relay: RelaySettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = &lookup;
        let defaults = RelaySettings::default();

        let channel_capacity =
            parse_or(lookup, "RELAY_CHANNEL_CAPACITY", defaults.channel_capacity)?;
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "RELAY_CHANNEL_CAPACITY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse_or(lookup, "RELAY_BIND_ADDR", Config::default().bind_addr)?,
            chatbot_url: non_empty(lookup, CHATBOT_URL_VAR),
            recommendations_url: non_empty(lookup, RECOMMENDATIONS_URL_VAR),
            admin_key: non_empty(lookup, "RELAY_ADMIN_KEY"),
            relay: RelaySettings {
                connect_timeout: millis(
                    lookup,
                    "RELAY_CONNECT_TIMEOUT_MS",
                    defaults.connect_timeout,
                )?,
                read_timeout: millis(lookup, "RELAY_READ_TIMEOUT_MS", defaults.read_timeout)?,
                connect_retries: parse_or(
                    lookup,
                    "RELAY_CONNECT_RETRIES",
                    defaults.connect_retries,
                )?,
                retry_backoff: millis(lookup, "RELAY_RETRY_BACKOFF_MS", defaults.retry_backoff)?,
                max_buffer_bytes: parse_or(
                    lookup,
                    "RELAY_MAX_BUFFER_BYTES",
                    defaults.max_buffer_bytes,
                )?,
                channel_capacity,
            },
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value: raw,
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}
