use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::models::{EventRecord, ScopeId};
use crate::storage::{GroupedRow, Grouping, QueryPlan, RecordStore, StoreError, StoreResult};

/// Record plus its global insertion sequence
#[derive(Debug, Clone)]
struct StoredRecord {
    seq: u64,
    record: EventRecord,
}

/// In-process record store. Records are kept per scope, append-only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ScopeId, Vec<StoredRecord>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all scopes
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the records matching the plan's filter, as (seq, key, created)
    fn matching(&self, plan: &QueryPlan) -> Vec<(u64, Vec<Option<String>>, DateTime<Utc>)> {
        let scopes: HashSet<&ScopeId> = plan.scope_ids.iter().collect();
        let mut matched = Vec::new();

        for scope in scopes {
            let Some(records) = self.records.get(scope) else {
                continue;
            };

            for stored in records.iter() {
                let created = stored.record.created_at;
                if plan.created_after.is_some_and(|after| created < after) {
                    continue;
                }
                matched.push((stored.seq, stored.record.key(&plan.dimensions), created));
            }
        }

        matched
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts.timestamp_millis())
        .ok_or_else(|| StoreError::Other(anyhow::anyhow!("timestamp out of range: {ts}")))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, record: &EventRecord) -> StoreResult<()> {
        let mut record = record.clone();
        record.created_at = truncate_to_millis(record.created_at)?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.records
            .entry(record.scope_id.clone())
            .or_default()
            .push(StoredRecord { seq, record });

        Ok(())
    }

    async fn execute_grouped_query(&self, plan: &QueryPlan) -> StoreResult<Vec<GroupedRow>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let mut matched = self.matching(plan);
        debug!("Memory store matched {} records", matched.len());

        let mut rows: Vec<GroupedRow> = match plan.grouping {
            Grouping::ByKey => {
                let mut groups: HashMap<Vec<Option<String>>, (u64, DateTime<Utc>)> =
                    HashMap::new();
                for (_, key, created) in matched {
                    groups
                        .entry(key)
                        .and_modify(|(count, first)| {
                            *count += 1;
                            *first = (*first).min(created);
                        })
                        .or_insert((1, created));
                }
                groups
                    .into_iter()
                    .map(|(key, (count, first))| GroupedRow {
                        key,
                        count,
                        created: Some(first),
                    })
                    .collect()
            }
            Grouping::ByKeyAndBucket(interval) => {
                let mut groups: HashMap<(Vec<Option<String>>, DateTime<Utc>), u64> =
                    HashMap::new();
                for (_, key, created) in matched {
                    *groups.entry((key, interval.truncate(created))).or_insert(0) += 1;
                }
                groups
                    .into_iter()
                    .map(|((key, bucket), count)| GroupedRow {
                        key,
                        count,
                        created: Some(bucket),
                    })
                    .collect()
            }
            Grouping::PerRecord => {
                // Newest insert first so equal timestamps keep that order after the stable sort
                matched.sort_by(|a, b| b.0.cmp(&a.0));
                matched
                    .into_iter()
                    .map(|(_, key, created)| GroupedRow {
                        key,
                        count: 1,
                        created: Some(created),
                    })
                    .collect()
            }
        };

        rows.sort_by(|a, b| plan.compare_rows(a, b));
        if let Some(limit) = plan.limit {
            rows.truncate(limit as usize);
        }

        Ok(rows)
    }
}
