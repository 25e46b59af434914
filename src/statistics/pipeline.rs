//! Pipeline builders: request parameters to store query plans
//!
//! Each sorting mode has its own builder. Builders are pure; they never touch
//! the store.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Dimension, ScopeId};
use crate::statistics::error::{StatisticsError, StatisticsResult};
use crate::statistics::types::{Interval, Sorting, StatisticsRequest, TimeRange};
use crate::storage::{Grouping, QueryPlan, SortOrder};

/// Parameters shared by every builder
#[derive(Debug, Clone)]
pub struct PipelineInput<'a> {
    pub scope_ids: &'a [ScopeId],
    pub dimensions: &'a [Dimension],
    pub range: Option<TimeRange>,
    pub limit: Option<u32>,
    pub date_details: Option<Interval>,
    pub now: DateTime<Utc>,
}

impl<'a> PipelineInput<'a> {
    pub fn from_request(request: &'a StatisticsRequest, dimensions: &'a [Dimension]) -> Self {
        Self {
            scope_ids: &request.scope_ids,
            dimensions,
            range: request.range,
            limit: request.limit,
            date_details: request.date_details,
            now: request.now,
        }
    }
}

pub type PipelineBuilder = fn(&PipelineInput<'_>) -> StatisticsResult<QueryPlan>;

impl Sorting {
    /// Builder implementing this sorting mode
    pub fn builder(self) -> PipelineBuilder {
        match self {
            Sorting::Top => aggregate_top_records,
            Sorting::New => aggregate_new_records,
            Sorting::Recent => aggregate_recent_records,
        }
    }
}

/// Resolve a raw sorting value to its builder. Unknown values are an error.
pub fn select_pipeline(raw: &str) -> StatisticsResult<PipelineBuilder> {
    raw.parse::<Sorting>().map(Sorting::builder)
}

/// Most frequent keys within the range, optionally split into time buckets
pub fn aggregate_top_records(input: &PipelineInput<'_>) -> StatisticsResult<QueryPlan> {
    let grouping = match input.date_details {
        Some(interval) => match input.range {
            Some(range) if !interval.fits(Some(range)) => {
                return Err(StatisticsError::InvalidRange { range, interval });
            }
            _ => Grouping::ByKeyAndBucket(interval),
        },
        None => Grouping::ByKey,
    };

    Ok(QueryPlan {
        scope_ids: input.scope_ids.to_vec(),
        created_after: input.range.map(|range| range.start(input.now)),
        dimensions: input.dimensions.to_vec(),
        grouping,
        order: SortOrder::CountDesc,
        limit: input.limit,
    })
}

/// Every key once, with its all-time count and first-seen timestamp
pub fn aggregate_new_records(input: &PipelineInput<'_>) -> StatisticsResult<QueryPlan> {
    if input.range.is_some() || input.date_details.is_some() {
        debug!("New records ignore range and date details");
    }

    Ok(QueryPlan {
        scope_ids: input.scope_ids.to_vec(),
        created_after: None,
        dimensions: input.dimensions.to_vec(),
        grouping: Grouping::ByKey,
        order: SortOrder::FirstSeenAsc,
        limit: input.limit,
    })
}

/// Latest occurrences, newest first
pub fn aggregate_recent_records(input: &PipelineInput<'_>) -> StatisticsResult<QueryPlan> {
    if input.range.is_some() || input.date_details.is_some() {
        debug!("Recent records ignore range and date details");
    }

    Ok(QueryPlan {
        scope_ids: input.scope_ids.to_vec(),
        created_after: None,
        dimensions: input.dimensions.to_vec(),
        grouping: Grouping::PerRecord,
        order: SortOrder::CreatedDesc,
        limit: input.limit,
    })
}
