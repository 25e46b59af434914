//! Dimensional aggregation engine
//!
//! Turns timestamped event records into grouped, sorted statistics for a
//! dimension under three sorting modes:
//!
//! - `TOP`: most frequent values within a range, optionally per time bucket
//! - `NEW`: every value once, ordered by when it was first seen
//! - `RECENT`: the latest occurrences, newest first

pub mod engine;
pub mod enhance;
pub mod error;
pub mod identifier;
pub mod pipeline;
pub mod types;

pub use engine::{assemble, StatisticsEngine};
pub use enhance::{
    enhance, LabelLookup, LabelTable, ModelKind, ReferrerKind, SizeKind, Statistic, VersionKind,
    UNKNOWN,
};
pub use error::{StatisticsError, StatisticsResult};
pub use identifier::{recursive_id, split_id, IdPart};
pub use pipeline::{select_pipeline, PipelineBuilder, PipelineInput};
pub use types::{Interval, ResultEntry, Sorting, StatisticsRequest, TimeRange};
