// src/config.rs
use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Number of questions on the index page. `None` shows all of them.
    pub index_limit: Option<i64>,
    pub login_url: String,
    pub cors_allowed_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3030,
            database_url: None,
            max_connections: 5,
            index_limit: Some(5),
            login_url: "/accounts/login/".to_string(),
            cors_allowed_origin: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let index_limit: i64 = try_load(&lookup, "POLLS_INDEX_LIMIT", "5")?;
        if index_limit < 0 {
            return Err(ConfigError::Invalid {
                key: "POLLS_INDEX_LIMIT",
                reason: "must not be negative".to_string(),
            });
        }

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, votes will be kept in memory");
        }

        Ok(Self {
            port: try_load(&lookup, "PORT", "3030")?,
            database_url,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            index_limit: (index_limit > 0).then_some(index_limit),
            login_url: lookup("LOGIN_URL").unwrap_or_else(|| "/accounts/login/".to_string()),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN"),
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}
