use std::{env, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Budget for every store call made while serving one request.
    pub store_timeout: Duration,
    pub concurrency_limit: usize,
    pub body_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parsed(&lookup, "APP_PORT").unwrap_or(3000);
        let store_timeout_ms = parsed(&lookup, "STORE_TIMEOUT_MS").unwrap_or(3000);
        let concurrency_limit = parsed(&lookup, "CONCURRENCY_LIMIT").unwrap_or(100);
        let body_limit_bytes = parsed(&lookup, "BODY_LIMIT_BYTES").unwrap_or(1024 * 1024);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            store_timeout: Duration::from_millis(store_timeout_ms),
            concurrency_limit,
            body_limit_bytes,
        })
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.parse::<T>().ok())
}
