//! Configuration for queues and the worker server.
//!
//! Values come from the environment (the binary loads `.env` first). Every
//! knob has a default, so an empty environment yields a working setup.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::domain::budget::{DEFAULT_MEMORY_FRACTION, MemoryLimit};

pub const DEFAULT_ENV_PREFIX: &str = "SPOOL";

const LOCK_TTL_SECS: u64 = 60;
const TIME_LIMIT_SECS: u64 = 20;
const CRON_INTERVAL_MINUTES: u32 = 5;
const TRIGGER_TIMEOUT_MS: u64 = 10;
const BIND_ADDR: &str = "127.0.0.1:8080";
const NAMESPACE: &str = "spool";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: invalid value {value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    #[error("lock ttl ({lock_ttl:?}) must exceed the time limit ({time_limit:?})")]
    LockShorterThanBudget {
        lock_ttl: Duration,
        time_limit: Duration,
    },

    #[error("memory fraction must be in (0, 1], got {0}")]
    MemoryFraction(f64),

    #[error("health-check interval must be at least one minute")]
    CronInterval,
}

/// Per-queue knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// How long the process lock lives if never released.
    pub lock_ttl: Duration,
    /// Wall-clock budget of one drain pass.
    pub time_limit: Duration,
    /// Period of the health-check, in minutes.
    pub cron_interval_minutes: u32,
    pub memory_limit: MemoryLimit,
    /// Share of `memory_limit` a pass may reach before stopping.
    pub memory_fraction: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(LOCK_TTL_SECS),
            time_limit: Duration::from_secs(TIME_LIMIT_SECS),
            cron_interval_minutes: CRON_INTERVAL_MINUTES,
            memory_limit: MemoryLimit::Unlimited,
            memory_fraction: DEFAULT_MEMORY_FRACTION,
        }
    }
}

impl QueueConfig {
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_cron_interval_minutes(mut self, minutes: u32) -> Self {
        self.cron_interval_minutes = minutes;
        self
    }

    pub fn with_memory_limit(mut self, memory_limit: MemoryLimit) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Read `{prefix}_LOCK_TTL_SECS`, `{prefix}_TIME_LIMIT_SECS`,
    /// `{prefix}_CRON_INTERVAL_MINUTES` and `{prefix}_MEMORY_LIMIT`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |name| env::var(name).ok())
    }

    /// Same as [`QueueConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            lock_ttl: parse_var(&lookup, &format!("{prefix}_LOCK_TTL_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.lock_ttl),
            time_limit: parse_var(&lookup, &format!("{prefix}_TIME_LIMIT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.time_limit),
            cron_interval_minutes: parse_var(&lookup, &format!("{prefix}_CRON_INTERVAL_MINUTES"))?
                .unwrap_or(defaults.cron_interval_minutes),
            memory_limit: parse_var(&lookup, &format!("{prefix}_MEMORY_LIMIT"))?
                .unwrap_or(defaults.memory_limit),
            memory_fraction: defaults.memory_fraction,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_ttl <= self.time_limit {
            return Err(ConfigError::LockShorterThanBudget {
                lock_ttl: self.lock_ttl,
                time_limit: self.time_limit,
            });
        }
        if !(self.memory_fraction > 0.0 && self.memory_fraction <= 1.0) {
            return Err(ConfigError::MemoryFraction(self.memory_fraction));
        }
        if self.cron_interval_minutes == 0 {
            return Err(ConfigError::CronInterval);
        }
        Ok(())
    }
}

/// Worker server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Public base URL triggers are sent to, usually the server itself.
    pub base_url: Url,
    /// First path segment of every worker route.
    pub namespace: String,
    pub verify_tls: bool,
    /// How long a trigger may stay in flight.
    pub trigger_timeout: Duration,
}

impl ServerConfig {
    /// Defaults derived from a bind address: base URL `http://{bind}/`.
    pub fn local(bind: SocketAddr) -> Result<Self, ConfigError> {
        let base_url = parse_url("base_url", &format!("http://{bind}/"))?;
        Ok(Self {
            bind,
            base_url,
            namespace: NAMESPACE.to_string(),
            verify_tls: false,
            trigger_timeout: Duration::from_millis(TRIGGER_TIMEOUT_MS),
        })
    }

    /// Read `{prefix}_BIND`, `{prefix}_BASE_URL`, `{prefix}_NAMESPACE`,
    /// `{prefix}_VERIFY_TLS` and `{prefix}_TRIGGER_TIMEOUT_MS`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |name| env::var(name).ok())
    }

    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_name = format!("{prefix}_BIND");
        let bind_raw = lookup(&bind_name).unwrap_or_else(|| BIND_ADDR.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: bind_name.clone(),
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut config = Self::local(bind)?;
        let base_name = format!("{prefix}_BASE_URL");
        if let Some(raw) = lookup(&base_name) {
            config.base_url = parse_url(&base_name, &raw)?;
        }
        if let Some(namespace) = lookup(&format!("{prefix}_NAMESPACE")) {
            config.namespace = namespace.trim_matches('/').to_string();
        }
        if let Some(verify) = parse_var::<bool, _>(&lookup, &format!("{prefix}_VERIFY_TLS"))? {
            config.verify_tls = verify;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, &format!("{prefix}_TRIGGER_TIMEOUT_MS"))? {
            config.trigger_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Absolute URL of a route path on this server.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConfigError::Invalid {
                name: "endpoint".to_string(),
                value: path.to_string(),
                reason: e.to_string(),
            })
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    // a base without a trailing slash would lose its last segment on join
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
