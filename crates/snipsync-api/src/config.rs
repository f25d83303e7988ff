use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use snipsync_core::sync::DEFAULT_MAX_PUSH_ITEMS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub api_keys: Vec<String>,
    pub max_push_items: usize,
    pub max_body_bytes: usize,
    pub rate_limit_window: Duration,
    pub push_rate_limit_per_window: u32,
    pub pull_rate_limit_per_window: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field(
                "api_keys",
                &format_args!("[REDACTED; {}]", self.api_keys.len()),
            )
            .field("max_push_items", &self.max_push_items)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "push_rate_limit_per_window",
                &self.push_rate_limit_per_window,
            )
            .field(
                "pull_rate_limit_per_window",
                &self.pull_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SNIPSYNC_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "SNIPSYNC_DATABASE_PATH", "snipsync.db"));

        let api_keys: Vec<String> = required_trimmed(&lookup, "SNIPSYNC_API_KEYS")?
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToString::to_string)
            .collect();
        if api_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "SNIPSYNC_API_KEYS must list at least one key".to_string(),
            ));
        }

        let (min, max) = MAX_PUSH_ITEMS_RANGE;
        let max_push_items = bounded(
            &lookup,
            "SNIPSYNC_MAX_PUSH_ITEMS",
            DEFAULT_MAX_PUSH_ITEMS,
            min,
            max,
        )?;
        let max_body_bytes = bounded(
            &lookup,
            "SNIPSYNC_MAX_BODY_BYTES",
            8 * 1024 * 1024,
            1_024,
            64 * 1024 * 1024,
        )?;
        let rate_limit_window_secs: u64 =
            bounded(&lookup, "RATE_LIMIT_WINDOW_SECS", 60, 10, 3_600)?;
        let push_rate_limit_per_window =
            bounded(&lookup, "PUSH_RATE_LIMIT_PER_WINDOW", 60, 1, 1_000)?;
        let pull_rate_limit_per_window =
            bounded(&lookup, "PULL_RATE_LIMIT_PER_WINDOW", 240, 1, 5_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            api_keys,
            max_push_items,
            max_body_bytes,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            push_rate_limit_per_window,
            pull_rate_limit_per_window,
        })
    }

    /// Override the push size cap, held to the same range as the environment
    pub fn set_max_push_items(&mut self, value: usize) -> Result<(), ConfigError> {
        let (min, max) = MAX_PUSH_ITEMS_RANGE;
        self.max_push_items = in_range("max push items", value, min, max)?;
        Ok(())
    }
}

const MAX_PUSH_ITEMS_RANGE: (usize, usize) = (1, 100_000);

/// Integer setting with a default, accepted only inside `[min, max]`
fn bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
    })?;
    in_range(name, value, min, max)
}

fn in_range<T>(name: &str, value: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
