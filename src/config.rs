use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_KAFKA_TOPIC: &str = "auction-events";

/// Broadcast buffer per auction. A subscriber that falls further behind than
/// this is told it lagged and must re-read the auction state.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// PostgreSQL connection string (DATABASE_URL). Unset means in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Comma separated broker list (KAFKA_BROKERS). Unset means in-process fan-out only.
    pub kafka_brokers: Option<String>,
    pub kafka_topic: String,
    /// Every instance needs its own group so that each one sees every event.
    pub kafka_group_id: String,
    pub scheduler_interval: Duration,
    pub feed_capacity: usize,
    pub notifications_enabled: bool,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Self {
            listen_addr: parse_or(&lookup, "LISTEN_ADDR", DEFAULT_LISTEN_ADDR)?,
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            kafka_brokers: non_empty("KAFKA_BROKERS"),
            kafka_topic: non_empty("KAFKA_TOPIC").unwrap_or_else(|| DEFAULT_KAFKA_TOPIC.to_string()),
            kafka_group_id: non_empty("KAFKA_GROUP_ID")
                .unwrap_or_else(|| format!("auction-ledger-{}", std::process::id())),
            scheduler_interval: Duration::from_secs(parse_or(
                &lookup,
                "SCHEDULER_INTERVAL_SECS",
                "1",
            )?),
            feed_capacity: parse_or(&lookup, "FEED_CAPACITY", &DEFAULT_FEED_CAPACITY.to_string())?,
            notifications_enabled: parse_or(&lookup, "NOTIFICATIONS_ENABLED", "true")?,
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        if config.scheduler_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "SCHEDULER_INTERVAL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        if config.feed_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "FEED_CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{raw:?}: {e}"),
    })
}
