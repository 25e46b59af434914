use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::ScopeId;
use crate::statistics::enhance::Statistic;
use crate::statistics::error::StatisticsError;

/// Sorting mode of a statistics query. Each mode has its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sorting {
    Top,
    New,
    Recent,
}

impl Sorting {
    pub const fn as_str(self) -> &'static str {
        match self {
            Sorting::Top => "TOP",
            Sorting::New => "NEW",
            Sorting::Recent => "RECENT",
        }
    }
}

impl fmt::Display for Sorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sorting {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TOP" => Ok(Sorting::Top),
            "NEW" => Ok(Sorting::New),
            "RECENT" => Ok(Sorting::Recent),
            _ => Err(StatisticsError::UnsupportedSorting(s.to_string())),
        }
    }
}

/// Bounded time window ending at the request's reference instant.
/// An absent range means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeRange {
    Last24Hours,
    Last7Days,
    Last30Days,
    Last6Months,
}

impl TimeRange {
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeRange::Last24Hours => "LAST_24_HOURS",
            TimeRange::Last7Days => "LAST_7_DAYS",
            TimeRange::Last30Days => "LAST_30_DAYS",
            TimeRange::Last6Months => "LAST_6_MONTHS",
        }
    }

    /// First instant included in the window
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeRange::Last24Hours => now - Duration::hours(24),
            TimeRange::Last7Days => now - Duration::days(7),
            TimeRange::Last30Days => now - Duration::days(30),
            TimeRange::Last6Months => now
                .checked_sub_months(Months::new(6))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "LAST_24_HOURS" => Ok(TimeRange::Last24Hours),
            "LAST_7_DAYS" => Ok(TimeRange::Last7Days),
            "LAST_30_DAYS" => Ok(TimeRange::Last30Days),
            "LAST_6_MONTHS" => Ok(TimeRange::Last6Months),
            _ => Err(StatisticsError::UnknownRange(s.to_string())),
        }
    }
}

/// Bucket granularity for time-series output (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    Daily,
    Monthly,
    Yearly,
}

impl Interval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "DAILY",
            Interval::Monthly => "MONTHLY",
            Interval::Yearly => "YEARLY",
        }
    }

    /// Start of the bucket containing `ts`
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Interval::Daily => Some(date),
            Interval::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Interval::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        start
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .unwrap_or(ts)
    }

    /// Whether `range` can hold at least one whole bucket of this size
    pub fn fits(self, range: Option<TimeRange>) -> bool {
        match (self, range) {
            (_, None) => true,
            (Interval::Daily, Some(_)) => true,
            (Interval::Monthly, Some(TimeRange::Last6Months)) => true,
            (Interval::Monthly, Some(_)) => false,
            (Interval::Yearly, Some(_)) => false,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Interval::Daily),
            "MONTHLY" => Ok(Interval::Monthly),
            "YEARLY" => Ok(Interval::Yearly),
            _ => Err(StatisticsError::UnknownInterval(s.to_string())),
        }
    }
}

/// A single statistics query. Constructed per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRequest {
    pub scope_ids: Vec<ScopeId>,
    pub statistic: Statistic,
    pub sorting: Sorting,
    pub range: Option<TimeRange>,
    pub limit: Option<u32>,
    pub date_details: Option<Interval>,
    /// Reference instant the range is resolved against
    pub now: DateTime<Utc>,
}

impl StatisticsRequest {
    pub fn new(scope_ids: Vec<ScopeId>, statistic: Statistic, sorting: Sorting) -> Self {
        Self {
            scope_ids,
            statistic,
            sorting,
            range: None,
            limit: None,
            date_details: None,
            now: Utc::now(),
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_date_details(mut self, interval: Interval) -> Self {
        self.date_details = Some(interval);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Caller-visible statistics entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub id: String,
    pub value: String,
    pub count: u64,
    pub created: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sorting_parse() {
        assert_eq!("TOP".parse::<Sorting>().unwrap(), Sorting::Top);
        assert_eq!("recent".parse::<Sorting>().unwrap(), Sorting::Recent);
        assert!(matches!(
            "POPULAR".parse::<Sorting>(),
            Err(StatisticsError::UnsupportedSorting(raw)) if raw == "POPULAR"
        ));
        assert!(matches!(
            "".parse::<Sorting>(),
            Err(StatisticsError::UnsupportedSorting(_))
        ));
    }

    #[test]
    fn test_range_start() {
        let now = Utc.with_ymd_and_hms(2024, 8, 31, 10, 0, 0).unwrap();

        assert_eq!(
            TimeRange::Last24Hours.start(now),
            Utc.with_ymd_and_hms(2024, 8, 30, 10, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::Last7Days.start(now),
            Utc.with_ymd_and_hms(2024, 8, 24, 10, 0, 0).unwrap()
        );
        // Calendar months clamp to the last valid day
        assert_eq!(
            TimeRange::Last6Months.start(now),
            Utc.with_ymd_and_hms(2024, 2, 29, 10, 0, 0).unwrap()
        );
        assert_eq!("last-30-days".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
    }

    #[test]
    fn test_interval_truncate() {
        let ts = Utc.with_ymd_and_hms(2023, 11, 17, 23, 59, 59).unwrap();

        assert_eq!(
            Interval::Daily.truncate(ts),
            Utc.with_ymd_and_hms(2023, 11, 17, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Interval::Monthly.truncate(ts),
            Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Interval::Yearly.truncate(ts),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_interval_fits_range() {
        assert!(Interval::Daily.fits(Some(TimeRange::Last24Hours)));
        assert!(Interval::Monthly.fits(Some(TimeRange::Last6Months)));
        assert!(!Interval::Monthly.fits(Some(TimeRange::Last30Days)));
        assert!(!Interval::Yearly.fits(Some(TimeRange::Last6Months)));
        assert!(Interval::Yearly.fits(None));
    }

    #[test]
    fn test_result_entry_serializes_null_created() {
        let entry = ResultEntry {
            id: "x".to_string(),
            value: "English".to_string(),
            count: 3,
            created: None,
        };
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"id": "x", "value": "English", "count": 3, "created": null})
        );
    }
}
