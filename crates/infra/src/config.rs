//! Store configuration read from the environment.

use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Create tables and indexes on startup.
    pub auto_migrate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
        }
    }
}

impl StoreConfig {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `ROOMSTOCK_AUTO_MIGRATE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(invalid("DATABASE_MAX_CONNECTIONS", raw, "must be at least 1")),
                Err(e) => return Err(invalid("DATABASE_MAX_CONNECTIONS", raw, e)),
            };
        }

        if let Some(raw) = lookup("ROOMSTOCK_AUTO_MIGRATE") {
            config.auto_migrate = parse_bool(&raw)
                .ok_or_else(|| invalid("ROOMSTOCK_AUTO_MIGRATE", raw, "expected true or false"))?;
        }

        Ok(config)
    }
}

fn invalid(name: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value,
        reason: reason.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
