//! Configuration management

use anyhow::{bail, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,

    /// PostgreSQL connection string for the user store
    pub database_url: String,

    /// Counter store connection settings
    pub redis: RedisSettings,
}

/// Connection settings for the shared counter store.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {raw}"))?,
            Err(_) => 3000,
        };

        let redis = RedisSettings::from_env()?;

        Ok(Self {
            port,
            database_url,
            redis,
        })
    }
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        let host = std::env::var("REDIS_HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("REDIS_PORT") {
            Ok(raw) => {
                let port: u16 = raw
                    .parse()
                    .with_context(|| format!("REDIS_PORT is not a valid port number: {raw}"))?;
                if port == 0 {
                    bail!("REDIS_PORT must be between 1 and 65535");
                }
                port
            }
            Err(_) => 6379,
        };

        let password = std::env::var("REDIS_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        let db = match std::env::var("REDIS_DB") {
            Ok(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("REDIS_DB is not an integer: {raw}"))?,
            Err(_) => 0,
        };

        Ok(Self {
            host,
            port,
            password,
            db,
        })
    }

    /// Render as a `redis://` connection URL.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => {
                format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db)
            }
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}
