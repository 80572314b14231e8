use std::env;

use anyhow::Context;

use crate::store::Backend;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            host: "127.0.0.1".to_string(),
            port: 3000,
            redis_url: None,
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let backend = match var("CARTS_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };
        let host = var("APP_HOST").unwrap_or(defaults.host);
        let port = match var("APP_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("invalid APP_PORT '{value}'"))?,
            None => defaults.port,
        };
        Ok(Self {
            backend,
            host,
            port,
            redis_url: var("REDIS_URL"),
            database_url: var("DATABASE_URL"),
        })
    }
}
