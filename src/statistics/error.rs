use thiserror::Error;

use crate::statistics::types::{Interval, TimeRange};
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("unsupported sorting '{0}', expected one of TOP, NEW, RECENT")]
    UnsupportedSorting(String),

    #[error("range {range} cannot be subdivided into {interval} buckets")]
    InvalidRange {
        range: TimeRange,
        interval: Interval,
    },

    #[error("unknown range '{0}'")]
    UnknownRange(String),

    #[error("unknown interval '{0}'")]
    UnknownInterval(String),

    #[error("unknown statistic '{0}'")]
    UnknownStatistic(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StatisticsResult<T> = Result<T, StatisticsError>;
