use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{Dimension, ScopeId};
use crate::statistics::Interval;
use crate::storage::GroupedRow;

/// How matching records are turned into rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One row per distinct key, `created` is the earliest matching timestamp
    ByKey,
    /// One row per key and time bucket, `created` is the bucket start
    ByKeyAndBucket(Interval),
    /// One row per matching record, `count` is 1 and `created` is the record's timestamp
    PerRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// count desc, key asc, created asc
    CountDesc,
    /// created asc, key asc
    FirstSeenAsc,
    /// created desc, most recently inserted first
    CreatedDesc,
}

/// Store-independent description of a grouped query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub scope_ids: Vec<ScopeId>,
    /// Inclusive lower bound on `created_at`; `None` disables time filtering
    pub created_after: Option<DateTime<Utc>>,
    pub dimensions: Vec<Dimension>,
    pub grouping: Grouping,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

impl QueryPlan {
    /// True when the plan cannot produce rows regardless of store contents
    pub fn is_empty(&self) -> bool {
        self.scope_ids.is_empty() || self.limit == Some(0)
    }

    /// Compare two rows according to the plan's sort order.
    /// Keys compare bytewise with null first.
    pub fn compare_rows(&self, a: &GroupedRow, b: &GroupedRow) -> Ordering {
        match self.order {
            SortOrder::CountDesc => b
                .count
                .cmp(&a.count)
                .then_with(|| a.key.cmp(&b.key))
                .then_with(|| a.created.cmp(&b.created)),
            SortOrder::FirstSeenAsc => a
                .created
                .cmp(&b.created)
                .then_with(|| a.key.cmp(&b.key)),
            SortOrder::CreatedDesc => b.created.cmp(&a.created),
        }
    }
}
