pub mod chat;
pub mod config;
pub mod db;
pub mod logging;
pub mod matches;
pub mod profiles;
pub mod relations;
pub mod service;
pub mod store;

use std::fmt::Display;

pub use config::Config;
pub use service::AppState;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{what} {key} not found")]
    NotFound { what: &'static str, key: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store failure during {op} for {key}: {source}")]
    Store {
        op: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn not_found(what: &'static str, key: impl Display) -> Self {
        Self::NotFound { what, key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::InvalidInput(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::InvalidInput(err.to_owned())
    }
}

/// Attaches the failing operation and key to a backing-store error.
pub trait StoreContext<T> {
    fn store_ctx(self, op: &'static str, key: impl Display) -> AppResult<T>;
}

impl<T, E> StoreContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn store_ctx(self, op: &'static str, key: impl Display) -> AppResult<T> {
        self.map_err(|err| AppError::Store {
            op,
            key: key.to_string(),
            source: err.into(),
        })
    }
}
