use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::ScopeId;
use crate::statistics::enhance::{LabelLookup, Statistic};
use crate::statistics::error::StatisticsResult;
use crate::statistics::identifier::{recursive_id, IdPart};
use crate::statistics::pipeline::PipelineInput;
use crate::statistics::types::{Interval, ResultEntry, Sorting, StatisticsRequest, TimeRange};
use crate::storage::{GroupedRow, RecordStore};

const MINUTE_MILLIS: i64 = 60_000;

/// Entry point for dimension statistics.
///
/// Requests are independent; the engine holds no per-request state and can be
/// shared behind an `Arc`. The optional result cache only ever holds complete,
/// successful results.
pub struct StatisticsEngine {
    store: Arc<dyn RecordStore>,
    labels: Arc<dyn LabelLookup>,
    cache: Option<Cache<String, Arc<Vec<ResultEntry>>>>,
}

impl StatisticsEngine {
    pub fn new(store: Arc<dyn RecordStore>, labels: Arc<dyn LabelLookup>) -> Self {
        Self {
            store,
            labels,
            cache: None,
        }
    }

    /// Cache results per request for `ttl`.
    ///
    /// Ranged TOP requests are keyed by their window start, truncated to the
    /// minute, so a moved window never reuses an older result.
    pub fn with_cache(mut self, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        self.cache = Some(cache);
        self
    }

    pub async fn get_statistics(
        &self,
        request: &StatisticsRequest,
    ) -> StatisticsResult<Vec<ResultEntry>> {
        let dimensions = request.statistic.dimensions();
        let input = PipelineInput::from_request(request, &dimensions);
        let plan = request.sorting.builder()(&input)?;

        if plan.is_empty() {
            debug!("Nothing to aggregate for {} request", request.statistic);
            return Ok(Vec::new());
        }

        let cache_key = request_key(request, plan.created_after);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                debug!("Statistics cache hit: {}", cache_key);
                return Ok(cached.as_ref().clone());
            }
        }

        let rows = self.store.execute_grouped_query(&plan).await?;
        info!(
            "Aggregated {} {} rows for {} scope(s) ({})",
            rows.len(),
            request.statistic,
            request.scope_ids.len(),
            request.sorting
        );

        let entries = assemble(rows, request, self.labels.as_ref());

        if let Some(cache) = &self.cache {
            cache.insert(cache_key, Arc::new(entries.clone())).await;
        }

        Ok(entries)
    }

    /// Variant of [`get_statistics`](Self::get_statistics) taking raw sorting,
    /// range and interval values
    pub async fn get_dimension_statistics(
        &self,
        scope_ids: &[ScopeId],
        statistic: Statistic,
        sorting: &str,
        range: Option<&str>,
        limit: Option<u32>,
        interval: Option<&str>,
    ) -> StatisticsResult<Vec<ResultEntry>> {
        let sorting: Sorting = sorting.parse()?;
        let range = range.map(str::parse::<TimeRange>).transpose()?;
        let interval = interval.map(str::parse::<Interval>).transpose()?;

        let request = StatisticsRequest {
            range,
            limit,
            date_details: interval,
            ..StatisticsRequest::new(scope_ids.to_vec(), statistic, sorting)
        };

        self.get_statistics(&request).await
    }
}

/// Cache key for a request and the window start its plan filters on
fn request_key(request: &StatisticsRequest, window_start: Option<DateTime<Utc>>) -> String {
    let window_minute = window_start.map(|start| start.timestamp_millis().div_euclid(MINUTE_MILLIS));
    recursive_id(&[
        request.statistic.name().into(),
        request.sorting.into(),
        request.range.into(),
        request.limit.map(i64::from).into(),
        request.date_details.into(),
        scope_parts(&request.scope_ids),
        window_minute.into(),
    ])
}

fn scope_parts(scope_ids: &[ScopeId]) -> IdPart {
    IdPart::List(scope_ids.iter().map(IdPart::from).collect())
}

/// Turn store rows into result entries, keeping the store's row order.
///
/// The identifier covers the display value, sorting, range and scopes. When a
/// display value repeats within one response, the later entries also carry
/// their raw key and an occurrence ordinal so every id stays unique.
pub fn assemble(
    rows: Vec<GroupedRow>,
    request: &StatisticsRequest,
    labels: &dyn LabelLookup,
) -> Vec<ResultEntry> {
    let scopes = scope_parts(&request.scope_ids);
    let mut occurrences: HashMap<String, i64> = HashMap::new();

    rows.into_iter()
        .map(|row| {
            let value = request.statistic.render(&row.key, labels);
            let mut parts = vec![
                IdPart::from(value.as_str()),
                request.sorting.into(),
                request.range.into(),
                scopes.clone(),
            ];

            let base = recursive_id(&parts);
            let seen = occurrences.entry(base.clone()).or_insert(0);
            *seen += 1;

            let id = if *seen == 1 {
                base
            } else {
                parts.push(row.key.clone().into());
                parts.push(IdPart::Int(*seen - 1));
                recursive_id(&parts)
            };

            ResultEntry {
                id,
                value,
                count: row.count,
                created: row.created,
            }
        })
        .collect()
}
