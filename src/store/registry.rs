//! Selection of the storage backend from configuration.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::Context;

use crate::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};

use super::{CartRepositoryAsync, InMemoryCartRepository, PgCartRepository, RedisCartRepository};

/// Storage backend, keyed by the `CARTS_BACKEND` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    Redis,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Redis => "redis",
            Backend::Postgres => "postgres",
        }
    }

    /// Build the store for this backend. Called once at startup.
    pub async fn connect(self, config: &AppConfig) -> anyhow::Result<Arc<dyn CartRepositoryAsync>> {
        tracing::info!(backend = self.as_str(), "initialising cart store");
        let repository: Arc<dyn CartRepositoryAsync> = match self {
            Backend::Memory => Arc::new(InMemoryCartRepository::new()),
            Backend::Redis => {
                let url = config
                    .redis_url
                    .as_deref()
                    .context("REDIS_URL must be set for the redis backend")?;
                Arc::new(RedisCartRepository::connect(url).await?)
            }
            Backend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set for the postgres backend")?;
                let pool = create_pool(url).await?;
                run_migrations(&pool).await?;
                Arc::new(PgCartRepository::new(pool))
            }
        };
        Ok(repository)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Backend::Memory),
            "redis" => Ok(Backend::Redis),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            other => anyhow::bail!("unknown cart backend '{other}'"),
        }
    }
}
