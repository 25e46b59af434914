use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the site/domain that owns a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Categorical attribute of an event record that can be grouped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Page,
    Referrer,
    Source,
    Language,
    BrowserName,
    BrowserVersion,
    OsName,
    OsVersion,
    DeviceName,
    DeviceManufacturer,
    BrowserWidth,
    BrowserHeight,
    ScreenWidth,
    ScreenHeight,
}

impl Dimension {
    pub const ALL: [Dimension; 14] = [
        Dimension::Page,
        Dimension::Referrer,
        Dimension::Source,
        Dimension::Language,
        Dimension::BrowserName,
        Dimension::BrowserVersion,
        Dimension::OsName,
        Dimension::OsVersion,
        Dimension::DeviceName,
        Dimension::DeviceManufacturer,
        Dimension::BrowserWidth,
        Dimension::BrowserHeight,
        Dimension::ScreenWidth,
        Dimension::ScreenHeight,
    ];

    /// Column name used by the SQL stores
    pub const fn column(self) -> &'static str {
        match self {
            Dimension::Page => "page",
            Dimension::Referrer => "referrer",
            Dimension::Source => "source",
            Dimension::Language => "language",
            Dimension::BrowserName => "browser_name",
            Dimension::BrowserVersion => "browser_version",
            Dimension::OsName => "os_name",
            Dimension::OsVersion => "os_version",
            Dimension::DeviceName => "device_name",
            Dimension::DeviceManufacturer => "device_manufacturer",
            Dimension::BrowserWidth => "browser_width",
            Dimension::BrowserHeight => "browser_height",
            Dimension::ScreenWidth => "screen_width",
            Dimension::ScreenHeight => "screen_height",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single visitor interaction. Records are append-only and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub scope_id: ScopeId,

    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub browser_name: Option<String>,
    #[serde(default)]
    pub browser_version: Option<String>,
    #[serde(default)]
    pub os_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_manufacturer: Option<String>,
    #[serde(default)]
    pub browser_width: Option<String>,
    #[serde(default)]
    pub browser_height: Option<String>,
    #[serde(default)]
    pub screen_width: Option<String>,
    #[serde(default)]
    pub screen_height: Option<String>,

    /// Creation time, truncated to millisecond precision by the stores
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create a record with every dimension unset
    pub fn new(scope_id: impl Into<ScopeId>, created_at: DateTime<Utc>) -> Self {
        Self {
            scope_id: scope_id.into(),
            page: None,
            referrer: None,
            source: None,
            language: None,
            browser_name: None,
            browser_version: None,
            os_name: None,
            os_version: None,
            device_name: None,
            device_manufacturer: None,
            browser_width: None,
            browser_height: None,
            screen_width: None,
            screen_height: None,
            created_at,
        }
    }

    /// Builder-style setter for a single dimension
    pub fn with(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        *self.slot_mut(dimension) = Some(value.into());
        self
    }

    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        let slot = match dimension {
            Dimension::Page => &self.page,
            Dimension::Referrer => &self.referrer,
            Dimension::Source => &self.source,
            Dimension::Language => &self.language,
            Dimension::BrowserName => &self.browser_name,
            Dimension::BrowserVersion => &self.browser_version,
            Dimension::OsName => &self.os_name,
            Dimension::OsVersion => &self.os_version,
            Dimension::DeviceName => &self.device_name,
            Dimension::DeviceManufacturer => &self.device_manufacturer,
            Dimension::BrowserWidth => &self.browser_width,
            Dimension::BrowserHeight => &self.browser_height,
            Dimension::ScreenWidth => &self.screen_width,
            Dimension::ScreenHeight => &self.screen_height,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, dimension: Dimension) -> &mut Option<String> {
        match dimension {
            Dimension::Page => &mut self.page,
            Dimension::Referrer => &mut self.referrer,
            Dimension::Source => &mut self.source,
            Dimension::Language => &mut self.language,
            Dimension::BrowserName => &mut self.browser_name,
            Dimension::BrowserVersion => &mut self.browser_version,
            Dimension::OsName => &mut self.os_name,
            Dimension::OsVersion => &mut self.os_version,
            Dimension::DeviceName => &mut self.device_name,
            Dimension::DeviceManufacturer => &mut self.device_manufacturer,
            Dimension::BrowserWidth => &mut self.browser_width,
            Dimension::BrowserHeight => &mut self.browser_height,
            Dimension::ScreenWidth => &mut self.screen_width,
            Dimension::ScreenHeight => &mut self.screen_height,
        }
    }

    /// Group key for the given ordered dimension list
    pub fn key(&self, dimensions: &[Dimension]) -> Vec<Option<String>> {
        dimensions
            .iter()
            .map(|dimension| self.value(*dimension).map(str::to_string))
            .collect()
    }

    /// Creation time as Unix milliseconds
    pub fn created_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_sets_dimension() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = EventRecord::new("site", created)
            .with(Dimension::Language, "en")
            .with(Dimension::BrowserName, "Firefox");

        assert_eq!(record.value(Dimension::Language), Some("en"));
        assert_eq!(record.value(Dimension::BrowserName), Some("Firefox"));
        assert_eq!(record.value(Dimension::OsName), None);
        assert_eq!(
            record.key(&[Dimension::BrowserName, Dimension::BrowserVersion]),
            vec![Some("Firefox".to_string()), None]
        );
    }

    #[test]
    fn test_dimension_columns_are_distinct() {
        let columns: std::collections::HashSet<_> =
            Dimension::ALL.iter().map(|dimension| dimension.column()).collect();
        assert_eq!(columns.len(), Dimension::ALL.len());
    }

    #[test]
    fn test_record_deserializes_with_missing_dimensions() {
        let json = r#"{"scope_id":"site","language":"de","created_at":"2024-05-01T12:00:00Z"}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.scope_id, ScopeId::new("site"));
        assert_eq!(record.language.as_deref(), Some("de"));
        assert!(record.page.is_none());
    }
}
