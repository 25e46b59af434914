//! Rendering of query plans to SQL for the sqlx-backed stores
//!
//! Records live in a single `records` table with one nullable TEXT column per
//! dimension and `created_at` in Unix milliseconds. Dimension columns come from
//! [`Dimension::column`], never from user input.

use chrono::{DateTime, Utc};

use crate::models::Dimension;
use crate::statistics::Interval;
use crate::storage::{Grouping, QueryPlan, SortOrder, StoreError, StoreResult};

const DAY_MILLIS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }

    /// Bytewise ordering for key columns
    fn collate(self, column: &str) -> String {
        match self {
            Dialect::Sqlite => column.to_string(),
            Dialect::Postgres => format!("{column} COLLATE \"C\""),
        }
    }

    fn bucket_expr(self, interval: Interval) -> String {
        match (self, interval) {
            (_, Interval::Daily) => floor_to("created_at", DAY_MILLIS),
            (Dialect::Sqlite, Interval::Monthly) => sqlite_trunc("month"),
            (Dialect::Sqlite, Interval::Yearly) => sqlite_trunc("year"),
            (Dialect::Postgres, Interval::Monthly) => postgres_trunc("month"),
            (Dialect::Postgres, Interval::Yearly) => postgres_trunc("year"),
        }
    }
}

/// Floor `expr` to a multiple of `unit`; integer `/` truncates toward zero
/// in both dialects, which is wrong before 1970
fn floor_to(expr: &str, unit: i64) -> String {
    format!("({expr} - ((({expr} % {unit}) + {unit}) % {unit}))")
}

fn sqlite_trunc(field: &str) -> String {
    let seconds = format!("({} / 1000)", floor_to("created_at", 1000));
    format!(
        "(CAST(strftime('%s', {seconds}, 'unixepoch', 'start of {field}') AS INTEGER) * 1000)"
    )
}

fn postgres_trunc(field: &str) -> String {
    format!(
        "(EXTRACT(EPOCH FROM date_trunc('{field}', to_timestamp(created_at / 1000.0) AT TIME ZONE 'UTC')) * 1000)::BIGINT"
    )
}

/// Rendered statement plus its bind values, in bind order:
/// scope ids, then `created_after`, then `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub scope_ids: Vec<String>,
    pub created_after: Option<i64>,
    pub limit: Option<i64>,
}

pub fn create_table_sql(dialect: Dialect) -> String {
    let id = match dialect {
        Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
    };
    let created = match dialect {
        Dialect::Sqlite => "created_at INTEGER NOT NULL",
        Dialect::Postgres => "created_at BIGINT NOT NULL",
    };
    let dimensions: Vec<String> = Dimension::ALL
        .iter()
        .map(|dimension| format!("{} TEXT", dimension.column()))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS records ({id}, scope_id TEXT NOT NULL, {}, {created})",
        dimensions.join(", ")
    )
}

pub const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_scope_created ON records(scope_id, created_at)";

/// Insert statement binding scope_id, every dimension in `Dimension::ALL` order, then created_at
pub fn insert_sql(dialect: Dialect) -> String {
    let mut columns = vec!["scope_id"];
    columns.extend(Dimension::ALL.iter().map(|dimension| dimension.column()));
    columns.push("created_at");

    let placeholders: Vec<String> = (1..=columns.len())
        .map(|index| dialect.placeholder(index))
        .collect();

    format!(
        "INSERT INTO records ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Render a grouped query. Key columns are selected first, followed by
/// `row_count` and `created_ms`.
pub fn grouped_query(plan: &QueryPlan, dialect: Dialect) -> SqlQuery {
    let columns: Vec<&str> = plan.dimensions.iter().map(|d| d.column()).collect();
    let key_list = columns.join(", ");
    let mut bind = 0;

    let scope_placeholders: Vec<String> = plan
        .scope_ids
        .iter()
        .map(|_| {
            bind += 1;
            dialect.placeholder(bind)
        })
        .collect();
    let mut filter = format!("scope_id IN ({})", scope_placeholders.join(", "));
    if plan.created_after.is_some() {
        bind += 1;
        filter.push_str(&format!(" AND created_at >= {}", dialect.placeholder(bind)));
    }

    let key_order: Vec<String> = columns
        .iter()
        .map(|column| format!("{} ASC NULLS FIRST", dialect.collate(column)))
        .collect();
    let key_order = key_order.join(", ");

    let (select, group_by) = match plan.grouping {
        Grouping::ByKey => (
            format!("{key_list}, COUNT(*) AS row_count, MIN(created_at) AS created_ms"),
            Some(key_list.clone()),
        ),
        Grouping::ByKeyAndBucket(interval) => {
            let bucket = dialect.bucket_expr(interval);
            (
                format!("{key_list}, COUNT(*) AS row_count, {bucket} AS created_ms"),
                Some(format!("{key_list}, {bucket}")),
            )
        }
        Grouping::PerRecord => (
            format!("{key_list}, CAST(1 AS BIGINT) AS row_count, created_at AS created_ms"),
            None,
        ),
    };

    let order = match plan.order {
        SortOrder::CountDesc => format!("row_count DESC, {key_order}, created_ms ASC"),
        SortOrder::FirstSeenAsc => format!("created_ms ASC, {key_order}"),
        SortOrder::CreatedDesc => "created_ms DESC, id DESC".to_string(),
    };

    let mut sql = format!("SELECT {select} FROM records WHERE {filter}");
    if let Some(group_by) = group_by {
        sql.push_str(&format!(" GROUP BY {group_by}"));
    }
    sql.push_str(&format!(" ORDER BY {order}"));
    if plan.limit.is_some() {
        bind += 1;
        sql.push_str(&format!(" LIMIT {}", dialect.placeholder(bind)));
    }

    SqlQuery {
        sql,
        scope_ids: plan.scope_ids.iter().map(|id| id.as_str().to_string()).collect(),
        created_after: plan.created_after.map(|after| after.timestamp_millis()),
        limit: plan.limit.map(i64::from),
    }
}

pub fn millis_to_datetime(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Other(anyhow::anyhow!("stored timestamp out of range: {millis}")))
}

pub fn count_to_u64(count: i64) -> StoreResult<u64> {
    u64::try_from(count)
        .map_err(|_| StoreError::Other(anyhow::anyhow!("negative row count: {count}")))
}
