use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tally::config::{Config, DatabaseBackend};
use tally::models::{EventRecord, ScopeId};
use tally::statistics::{LabelTable, Statistic, StatisticsEngine};
use tally::storage::{MemoryStore, PostgresStore, RecordStore, SqliteStore};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Dimension statistics over visitor event records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the records table and indexes
    Init,
    /// Load event records from a file with one JSON record per line
    Ingest {
        /// Path to the JSON lines file
        file: PathBuf,
    },
    /// Print statistics for a dimension as JSON
    Stats {
        /// Scope (site) identifiers, in order
        #[arg(long = "scope", required = true, num_args = 1..)]
        scopes: Vec<String>,
        /// Statistic name (languages, pages, referrers, browsers, screen-resolution, ...)
        #[arg(long)]
        statistic: String,
        /// TOP, NEW or RECENT
        #[arg(long, default_value = "TOP")]
        sorting: String,
        /// LAST_24_HOURS, LAST_7_DAYS, LAST_30_DAYS or LAST_6_MONTHS; unbounded when omitted
        #[arg(long)]
        range: Option<String>,
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<u32>,
        /// DAILY, MONTHLY or YEARLY buckets (TOP only)
        #[arg(long)]
        interval: Option<String>,
    },
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.database.backend {
        DatabaseBackend::Memory => {
            warn!("Using in-memory store: records do not outlive this process");
            Arc::new(MemoryStore::new())
        }
        DatabaseBackend::Sqlite => {
            info!("Using SQLite store: {}", config.database.url);
            Arc::new(SqliteStore::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL store: {}", config.database.url);
            Arc::new(
                PostgresStore::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    store.init().await?;
    Ok(store)
}

async fn ingest(store: &dyn RecordStore, file: &Path) -> Result<usize> {
    let handle = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;
    let mut lines = BufReader::new(handle).lines();
    let mut inserted = 0;
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let record: EventRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid record on line {}", line_number))?;
        store.insert(&record).await?;
        inserted += 1;
    }

    Ok(inserted)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so that stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let store = open_store(&config).await?;

    match cli.command {
        Commands::Init => {
            println!("✅ Store initialized");
        }
        Commands::Ingest { file } => {
            let inserted = ingest(store.as_ref(), &file).await?;
            println!("✅ Ingested {} record(s) from {}", inserted, file.display());
        }
        Commands::Stats {
            scopes,
            statistic,
            sorting,
            range,
            limit,
            interval,
        } => {
            let statistic: Statistic = statistic.parse()?;
            let labels = match &config.labels.languages_path {
                Some(path) => LabelTable::from_path(path)?,
                None => LabelTable::languages(),
            };

            let mut engine = StatisticsEngine::new(store, Arc::new(labels));
            if config.cache.enabled() {
                engine = engine.with_cache(
                    config.cache.max_entries,
                    Duration::from_secs(config.cache.ttl_secs),
                );
            }

            let scope_ids: Vec<ScopeId> = scopes.into_iter().map(ScopeId).collect();
            let entries = engine
                .get_dimension_statistics(
                    &scope_ids,
                    statistic,
                    &sorting,
                    range.as_deref(),
                    limit,
                    interval.as_deref(),
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tally::models::Dimension;
    use tally::storage::{Grouping, QueryPlan, SortOrder};

    fn jsonl(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_ingest_skips_blank_lines() {
        let store = MemoryStore::new();
        let file = jsonl(&[
            r#"{"scope_id":"site","language":"en","created_at":"2024-05-01T12:00:00Z"}"#,
            "",
            "   ",
            r#"{"scope_id":"site","language":"de","created_at":"2024-05-02T12:00:00Z"}"#,
        ]);

        let inserted = ingest(&store, file.path()).await.unwrap();
        assert_eq!(inserted, 2);

        let rows = store
            .execute_grouped_query(&QueryPlan {
                scope_ids: vec![ScopeId::new("site")],
                created_after: None,
                dimensions: vec![Dimension::Language],
                grouping: Grouping::PerRecord,
                order: SortOrder::CreatedDesc,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, vec![Some("de".to_string())]);
    }

    #[tokio::test]
    async fn test_ingest_reports_line_of_invalid_record() {
        let store = MemoryStore::new();
        let file = jsonl(&[
            r#"{"scope_id":"site","created_at":"2024-05-01T12:00:00Z"}"#,
            "",
            r#"{"scope_id":"site","created_at":"yesterday"}"#,
        ]);

        let err = ingest(&store, file.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid record on line 3"));
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let store = MemoryStore::new();
        let err = ingest(&store, Path::new("/nonexistent/records.jsonl"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }
}
