use std::{env, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Number of posts on one listing page.
    pub page_size: u64,
    /// How long a rendered home page is served from the cache.
    pub index_cache_ttl: Duration,
    pub media_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://yatube.db?mode=rwc".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: 8000,
            page_size: 10,
            index_cache_ttl: Duration::from_secs(20),
            media_root: PathBuf::from("media"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            page_size: parse_var("YATUBE_PAGE_SIZE", defaults.page_size)?,
            index_cache_ttl: Duration::from_secs(parse_var(
                "YATUBE_INDEX_CACHE_SECONDS",
                defaults.index_cache_ttl.as_secs(),
            )?),
            media_root: env::var("YATUBE_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
        })
    }

    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        Err(_) => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
