use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

use crate::schedule::SchedulePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub accounts_file: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Shared secret of the appointments webhook. Unset rejects every call.
    pub webhook_secret: Option<String>,
    pub policy: SchedulePolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String, reason: String },
    Policy(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value, reason } => {
                write!(f, "invalid {key}={value:?}: {reason}")
            }
            ConfigError::Policy(msg) => write!(f, "invalid schedule policy: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SchedulePolicy::default();
        let data_dir = PathBuf::from(try_load(&lookup, "SLOTDESK_DATA_DIR", "./data".to_string())?);
        let accounts_file = match lookup("SLOTDESK_ACCOUNTS_FILE") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => data_dir.join("accounts.json"),
        };

        let policy = SchedulePolicy {
            slot_minutes: try_load(&lookup, "SLOTDESK_SLOT_MINUTES", defaults.slot_minutes)?,
            open_hour: try_load(&lookup, "SLOTDESK_OPEN_HOUR", defaults.open_hour)?,
            close_hour: try_load(&lookup, "SLOTDESK_CLOSE_HOUR", defaults.close_hour)?,
            step_minutes: try_load(&lookup, "SLOTDESK_STEP_MINUTES", defaults.step_minutes)?,
            max_alternatives: try_load(&lookup, "SLOTDESK_MAX_ALTERNATIVES", defaults.max_alternatives)?,
        };
        policy.validate().map_err(ConfigError::Policy)?;

        let webhook_secret = lookup("SLOTDESK_WEBHOOK_SECRET").filter(|s| !s.is_empty());
        if webhook_secret.is_none() {
            warn!("SLOTDESK_WEBHOOK_SECRET not set, appointments webhook will reject all requests");
        }

        Ok(Self {
            bind: try_load(&lookup, "SLOTDESK_BIND", "0.0.0.0".to_string())?,
            port: try_load(&lookup, "SLOTDESK_PORT", 8080)?,
            data_dir,
            accounts_file,
            max_connections: try_load(&lookup, "SLOTDESK_MAX_CONNECTIONS", 256)?,
            compact_threshold: try_load(&lookup, "SLOTDESK_COMPACT_THRESHOLD", 1000)?,
            metrics_port: match lookup("SLOTDESK_METRICS_PORT") {
                Some(v) => Some(parse("SLOTDESK_METRICS_PORT", &v)?),
                None => None,
            },
            webhook_secret,
            policy,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

fn try_load<T: FromStr + Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => parse(key, &value),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
