/// Process configuration
/// Command-line flags with environment fallbacks (`.env` is loaded first by `main`)

use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "movies-api", version, about = "JSON API for a movie catalog")]
pub struct Config {
    /// API server port
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    #[arg(long, env = "STORAGE", value_enum, default_value_t = StorageKind::Postgres)]
    pub storage: StorageKind,

    /// PostgreSQL DSN
    #[arg(long, env = "DATABASE_URL")]
    pub db_dsn: Option<String>,

    #[arg(long, env = "DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub db_max_open_conns: u32,

    #[arg(long, env = "DB_MAX_IDLE_TIME_SECS", default_value_t = 900)]
    pub db_max_idle_time_secs: u64,

    /// Upper bound on a single database round-trip
    #[arg(long, env = "DB_QUERY_TIMEOUT_SECS", default_value_t = 3)]
    pub db_query_timeout_secs: u64,

    #[arg(long, env = "LIMITER_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub limiter_enabled: bool,

    #[arg(long, env = "LIMITER_READ_PER_WINDOW", default_value_t = 100)]
    pub limiter_read_per_window: u32,

    #[arg(long, env = "LIMITER_WRITE_PER_WINDOW", default_value_t = 20)]
    pub limiter_write_per_window: u32,

    #[arg(long, env = "LIMITER_WINDOW_SECS", default_value_t = 60)]
    pub limiter_window_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage == StorageKind::Postgres
            && self.db_dsn.as_deref().map_or(true, |dsn| dsn.trim().is_empty())
        {
            return Err(ConfigError::Missing(
                "DATABASE_URL (--db-dsn) is required for postgres storage".to_string(),
            ));
        }

        if self.db_max_open_conns == 0 {
            return Err(ConfigError::Invalid(
                "db-max-open-conns must be greater than zero".to_string(),
            ));
        }

        if self.db_query_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "db-query-timeout-secs must be greater than zero".to_string(),
            ));
        }

        if self.limiter_enabled
            && (self.limiter_read_per_window == 0
                || self.limiter_write_per_window == 0
                || self.limiter_window_secs == 0)
        {
            return Err(ConfigError::Invalid(
                "limiter budgets and window must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.db_query_timeout_secs)
    }

    pub fn limiter_window(&self) -> Duration {
        Duration::from_secs(self.limiter_window_secs)
    }
}
