use crate::models::EventRecord;
use crate::storage::QueryPlan;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query execution failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One row returned by a grouped query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedRow {
    /// Raw dimension values, in plan dimension order
    pub key: Vec<Option<String>>,
    pub count: u64,
    pub created: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Initialize the store (create tables, indexes, etc.)
    async fn init(&self) -> Result<()>;

    /// Append an event record
    async fn insert(&self, record: &EventRecord) -> StoreResult<()>;

    /// Execute a grouped query. Either every row is returned or the call fails.
    async fn execute_grouped_query(&self, plan: &QueryPlan) -> StoreResult<Vec<GroupedRow>>;
}
