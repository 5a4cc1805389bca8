use std::{fmt::Display, str::FromStr};

use tracing::info;

use crate::{AppError, AppResult, matches::DEFAULT_MATCH_LIMIT};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Used when a match or listing request asks for `0` results.
    pub match_limit: usize,
    /// Outbound capacity per chat client; a client with this many undelivered
    /// messages is dropped by its hub.
    pub client_buffer: usize,
    pub hub_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            max_connections: 16,
            match_limit: DEFAULT_MATCH_LIMIT,
            client_buffer: 32,
            hub_queue: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            database_url: dotenv::var("DATABASE_URL").unwrap_or_else(|_| {
                info!("DATABASE_URL not set, using {}", defaults.database_url);
                defaults.database_url
            }),
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            match_limit: positive(try_load("MATCH_LIMIT", defaults.match_limit)?, "MATCH_LIMIT")?,
            client_buffer: positive(try_load("CHAT_CLIENT_BUFFER", defaults.client_buffer)?, "CHAT_CLIENT_BUFFER")?,
            hub_queue: positive(try_load("CHAT_HUB_QUEUE", defaults.hub_queue)?, "CHAT_HUB_QUEUE")?,
        })
    }
}

fn try_load<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = dotenv::var(key) else {
        info!("{key} not set, using default: {default}");
        return Ok(default);
    };

    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {key} value {raw:?}: {e}")))
}

// tokio channels panic on a zero capacity, and a zero default limit would
// turn every defaulted request into an empty one
fn positive(value: usize, key: &str) -> AppResult<usize> {
    if value == 0 {
        return Err(AppError::Config(format!("{key} must be greater than zero")));
    }
    Ok(value)
}
