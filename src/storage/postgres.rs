use crate::models::{Dimension, EventRecord};
use crate::storage::sql::{self, Dialect};
use crate::storage::{GroupedRow, QueryPlan, RecordStore, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::debug;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn decode_row(row: &PgRow, dimensions: usize) -> StoreResult<GroupedRow> {
    let mut key = Vec::with_capacity(dimensions);
    for index in 0..dimensions {
        key.push(row.try_get::<Option<String>, _>(index)?);
    }

    let count: i64 = row.try_get("row_count")?;
    let created: Option<i64> = row.try_get("created_ms")?;

    Ok(GroupedRow {
        key,
        count: sql::count_to_u64(count)?,
        created: created.map(sql::millis_to_datetime).transpose()?,
    })
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(&sql::create_table_sql(Dialect::Postgres))
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(sql::CREATE_INDEX_SQL)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert(&self, record: &EventRecord) -> StoreResult<()> {
        let insert = sql::insert_sql(Dialect::Postgres);
        let mut query = sqlx::query(&insert).bind(record.scope_id.as_str());
        for dimension in Dimension::ALL {
            query = query.bind(record.value(dimension));
        }

        query
            .bind(record.created_millis())
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn execute_grouped_query(&self, plan: &QueryPlan) -> StoreResult<Vec<GroupedRow>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let rendered = sql::grouped_query(plan, Dialect::Postgres);
        debug!("Executing grouped query: {}", rendered.sql);

        let mut query = sqlx::query(&rendered.sql);
        for scope_id in &rendered.scope_ids {
            query = query.bind(scope_id);
        }
        if let Some(after) = rendered.created_after {
            query = query.bind(after);
        }
        if let Some(limit) = rendered.limit {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(self.pool.as_ref()).await?;

        rows.iter()
            .map(|row| decode_row(row, plan.dimensions.len()))
            .collect()
    }
}
