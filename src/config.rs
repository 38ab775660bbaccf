use std::{env, path::PathBuf, str::FromStr, time::Duration};

use log::LevelFilter;
use thiserror::Error;


const DEV_ENVS: [&'static str; 4] = ["dev", "development", "staging", "stage"];


#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}


#[derive(Clone, Debug)]
pub struct AppConfig {
    pub rocket_env: String,
    /// `None` only in development, where the in-memory store is used.
    pub database_url: Option<String>,
    pub admin_token: Option<String>,
    pub sentry_dsn: Option<String>,
    pub image_dir: PathBuf,
    pub resync_period: Duration,
    pub feed_poll_interval: Duration,
    pub hotspot_limit: usize,
    pub log_level: LevelFilter,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        AppConfig::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError> where
        F: Fn(&str) -> Option<String> {

        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rocket_env = get("ROCKET_ENV").unwrap_or_else(|| {
            if cfg!(debug_assertions) {
                "development".into()
            }
            else {
                "production".into()
            }
        });
        let is_dev = DEV_ENVS.iter().any(|&v| v == rocket_env);

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && !is_dev {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(AppConfig {
            rocket_env,
            database_url,
            admin_token: get("ADMIN_TOKEN"),
            sentry_dsn: get("SENTRY_DSN"),
            image_dir: get("IMAGE_DIR").map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static/images/")),
            resync_period: Duration::from_secs(parse_or(&get, "RESYNC_SECS", 30)?),
            feed_poll_interval: Duration::from_millis(parse_or(&get, "FEED_POLL_MILLIS", 500)?),
            hotspot_limit: parse_or(&get, "HOTSPOT_LIMIT", 5)?,
            log_level: parse_or(&get, "LOG_LEVEL", LevelFilter::Info)?,
        })
    }

    pub fn is_dev(&self) -> bool {
        DEV_ENVS.iter().any(|&v| v == self.rocket_env)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError> where
    T: FromStr,
    G: Fn(&str) -> Option<String> {

    match get(key) {
        Some(value) => value.trim().parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
