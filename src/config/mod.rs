use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub geoip: GeoIpConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Explicit connection URL (`DATABASE_URL`)
    pub url: Option<String>,
    /// Connection parts used for PostgreSQL when no URL is given
    #[serde(default)]
    pub postgres: PostgresParts,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on the time spent serving a single request
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to the MaxMind GeoLite2-City / GeoIP2-City .mmdb file
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached visitors; 0 disables the cache
    pub max_entries: u64,
    pub ttl_secs: u64,
}

/// PostgreSQL connection parts (`DB_HOST`, `DB_PORT`, `DB_USER`,
/// `DB_PASSWORD`, `DB_NAME`).
///
/// These are handed to the driver field by field, so the user and password
/// may contain URL-reserved characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresParts {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub name: String,
}

impl Default for PostgresParts {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "userid".to_string(),
        }
    }
}

impl PostgresParts {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        10
    }

    /// SQLite URL, falling back to [`DEFAULT_SQLITE_URL`].
    pub fn sqlite_url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_SQLITE_URL)
    }

    /// PostgreSQL connection options: `DATABASE_URL` when set, otherwise the
    /// individual parts.
    pub fn postgres_options(&self) -> anyhow::Result<PgConnectOptions> {
        match &self.url {
            Some(url) => PgConnectOptions::from_str(url)
                .context("DATABASE_URL is not a valid PostgreSQL URL"),
            None => Ok(self.postgres.connect_options()),
        }
    }
}

impl CacheConfig {
    pub fn enabled(&self) -> bool {
        self.max_entries > 0
    }
}

pub const DEFAULT_SQLITE_URL: &str = "sqlite://./visitor_id.db";
pub const DEFAULT_GEOIP_DB_PATH: &str = "geoip/GeoLite2-City.mmdb";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_str = var("DATABASE_BACKEND").unwrap_or_else(|| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = var("DATABASE_URL");

        let defaults = PostgresParts::default();
        let postgres = PostgresParts {
            host: var("DB_HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "DB_PORT", defaults.port)?,
            user: var("DB_USER").unwrap_or(defaults.user),
            password: var("DB_PASSWORD").unwrap_or(defaults.password),
            name: var("DB_NAME").unwrap_or(defaults.name),
        };

        let max_connections = parse_or(
            &var,
            "DATABASE_MAX_CONNECTIONS",
            DatabaseConfig::default_max_connections(),
        )?;

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&var, "PORT", 8000u16)?;
        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", 10u64)?;

        let geoip_db_path =
            var("GEOIP_DB_PATH").unwrap_or_else(|| DEFAULT_GEOIP_DB_PATH.to_string());

        let cache_max_entries = parse_or(&var, "CACHE_MAX_ENTRIES", 10_000u64)?;
        let cache_ttl_secs = parse_or(&var, "CACHE_TTL_SECS", 300u64)?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                postgres,
                max_connections,
            },
            server: ServerConfig {
                host,
                port,
                request_timeout_secs,
            },
            geoip: GeoIpConfig {
                db_path: geoip_db_path,
            },
            cache: CacheConfig {
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{value}'")),
        None => Ok(default),
    }
}
