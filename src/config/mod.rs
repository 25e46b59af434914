use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub labels: LabelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    /// Zero disables the statistics cache
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// JSON file of `code: label` pairs replacing the bundled language table
    pub languages_path: Option<String>,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl CacheConfig {
    pub fn enabled(&self) -> bool {
        self.ttl_secs > 0 && self.max_entries > 0
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: memory, sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./tally.db?mode=rwc".to_string());

        let max_connections =
            parse_max_connections(std::env::var("DATABASE_MAX_CONNECTIONS").ok().as_deref())?;

        let cache_max_entries = std::env::var("STATS_CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<u64>()
            .context("STATS_CACHE_MAX_ENTRIES must be an integer")?;

        let cache_ttl_secs = std::env::var("STATS_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .context("STATS_CACHE_TTL_SECS must be an integer")?;

        let languages_path = std::env::var("LANGUAGE_LABELS_PATH").ok();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            cache: CacheConfig {
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
            labels: LabelsConfig { languages_path },
        })
    }
}

/// A pool of zero connections never hands one out, so zero is rejected
fn parse_max_connections(raw: Option<&str>) -> anyhow::Result<u32> {
    let Some(raw) = raw else {
        return Ok(DatabaseConfig::default_max_connections());
    };
    let max_connections = raw
        .parse::<u32>()
        .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
    anyhow::ensure!(
        max_connections > 0,
        "DATABASE_MAX_CONNECTIONS must be a positive integer, got 0"
    );
    Ok(max_connections)
}
