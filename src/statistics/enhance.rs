//! Raw dimension values to display values
//!
//! Label tables (language codes and the like) are static data owned by the
//! caller and injected through [`LabelLookup`]. Unmapped codes pass through
//! unchanged.

use anyhow::Context;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::models::Dimension;
use crate::statistics::error::StatisticsError;

/// Display value for groups whose key is entirely null
pub const UNKNOWN: &str = "Unknown";

const BUNDLED_LANGUAGES: &str = include_str!("../../data/languages.json");

/// Code to display-label lookup supplied by the caller
pub trait LabelLookup: Send + Sync {
    fn lookup(&self, code: &str) -> Option<&str>;
}

impl LabelLookup for HashMap<String, String> {
    fn lookup(&self, code: &str) -> Option<&str> {
        self.get(code).map(String::as_str)
    }
}

/// Static label table loaded from a JSON object of `code: label` pairs
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<String, String>,
}

impl LabelTable {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let labels = serde_json::from_str(json)?;
        Ok(Self { labels })
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label table {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("failed to parse label table {}", path.display()))
    }

    /// The bundled language-code table
    pub fn languages() -> Self {
        Self::from_json(BUNDLED_LANGUAGES).unwrap_or_else(|e| {
            warn!("Bundled language table is invalid, labels disabled: {}", e);
            Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl LabelLookup for LabelTable {
    fn lookup(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }
}

/// Map a raw value to its label, passing unmapped values through
pub fn enhance(raw: Option<&str>, labels: &dyn LabelLookup) -> String {
    match raw {
        Some(code) => labels.lookup(code).unwrap_or(code).to_string(),
        None => UNKNOWN.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferrerKind {
    /// Prefer the campaign source parameter, fall back to the referrer
    WithSource,
    NoSource,
    OnlySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKind {
    NoVersion,
    WithVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    NoModel,
    WithModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeKind {
    BrowserResolution,
    BrowserWidth,
    BrowserHeight,
    ScreenResolution,
    ScreenWidth,
    ScreenHeight,
}

/// A dashboard statistic: which dimensions to group by and how to render them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Pages,
    Referrers(ReferrerKind),
    Languages,
    Browsers(VersionKind),
    Systems(VersionKind),
    Devices(ModelKind),
    Sizes(SizeKind),
}

impl Statistic {
    pub const ALL: [Statistic; 17] = [
        Statistic::Pages,
        Statistic::Referrers(ReferrerKind::WithSource),
        Statistic::Referrers(ReferrerKind::NoSource),
        Statistic::Referrers(ReferrerKind::OnlySource),
        Statistic::Languages,
        Statistic::Browsers(VersionKind::NoVersion),
        Statistic::Browsers(VersionKind::WithVersion),
        Statistic::Systems(VersionKind::NoVersion),
        Statistic::Systems(VersionKind::WithVersion),
        Statistic::Devices(ModelKind::NoModel),
        Statistic::Devices(ModelKind::WithModel),
        Statistic::Sizes(SizeKind::BrowserResolution),
        Statistic::Sizes(SizeKind::BrowserWidth),
        Statistic::Sizes(SizeKind::BrowserHeight),
        Statistic::Sizes(SizeKind::ScreenResolution),
        Statistic::Sizes(SizeKind::ScreenWidth),
        Statistic::Sizes(SizeKind::ScreenHeight),
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Statistic::Pages => "pages",
            Statistic::Referrers(ReferrerKind::WithSource) => "referrers",
            Statistic::Referrers(ReferrerKind::NoSource) => "referrers-no-source",
            Statistic::Referrers(ReferrerKind::OnlySource) => "referrers-only-source",
            Statistic::Languages => "languages",
            Statistic::Browsers(VersionKind::NoVersion) => "browsers",
            Statistic::Browsers(VersionKind::WithVersion) => "browsers-with-version",
            Statistic::Systems(VersionKind::NoVersion) => "systems",
            Statistic::Systems(VersionKind::WithVersion) => "systems-with-version",
            Statistic::Devices(ModelKind::NoModel) => "devices",
            Statistic::Devices(ModelKind::WithModel) => "devices-with-model",
            Statistic::Sizes(SizeKind::BrowserResolution) => "browser-resolution",
            Statistic::Sizes(SizeKind::BrowserWidth) => "browser-width",
            Statistic::Sizes(SizeKind::BrowserHeight) => "browser-height",
            Statistic::Sizes(SizeKind::ScreenResolution) => "screen-resolution",
            Statistic::Sizes(SizeKind::ScreenWidth) => "screen-width",
            Statistic::Sizes(SizeKind::ScreenHeight) => "screen-height",
        }
    }

    /// Ordered group-by dimensions
    pub fn dimensions(self) -> Vec<Dimension> {
        use Dimension::*;

        match self {
            Statistic::Pages => vec![Page],
            Statistic::Referrers(ReferrerKind::WithSource) => vec![Source, Referrer],
            Statistic::Referrers(ReferrerKind::NoSource) => vec![Referrer],
            Statistic::Referrers(ReferrerKind::OnlySource) => vec![Source],
            Statistic::Languages => vec![Language],
            Statistic::Browsers(VersionKind::NoVersion) => vec![BrowserName],
            Statistic::Browsers(VersionKind::WithVersion) => vec![BrowserName, BrowserVersion],
            Statistic::Systems(VersionKind::NoVersion) => vec![OsName],
            Statistic::Systems(VersionKind::WithVersion) => vec![OsName, OsVersion],
            Statistic::Devices(ModelKind::NoModel) => vec![DeviceManufacturer],
            Statistic::Devices(ModelKind::WithModel) => vec![DeviceManufacturer, DeviceName],
            Statistic::Sizes(SizeKind::BrowserResolution) => vec![BrowserWidth, BrowserHeight],
            Statistic::Sizes(SizeKind::BrowserWidth) => vec![BrowserWidth],
            Statistic::Sizes(SizeKind::BrowserHeight) => vec![BrowserHeight],
            Statistic::Sizes(SizeKind::ScreenResolution) => vec![ScreenWidth, ScreenHeight],
            Statistic::Sizes(SizeKind::ScreenWidth) => vec![ScreenWidth],
            Statistic::Sizes(SizeKind::ScreenHeight) => vec![ScreenHeight],
        }
    }

    /// Display value for a raw group key
    pub fn render(self, key: &[Option<String>], labels: &dyn LabelLookup) -> String {
        let present: Vec<&str> = key.iter().filter_map(|part| part.as_deref()).collect();

        if present.is_empty() {
            return UNKNOWN.to_string();
        }

        match self {
            Statistic::Languages => enhance(Some(present[0]), labels),
            Statistic::Sizes(_) => present
                .iter()
                .map(|size| format!("{size}px"))
                .collect::<Vec<_>>()
                .join(" x "),
            Statistic::Browsers(VersionKind::WithVersion)
            | Statistic::Systems(VersionKind::WithVersion)
            | Statistic::Devices(ModelKind::WithModel) => present.join(" "),
            // Single-field statistics and the source-then-referrer fallback
            _ => present[0].to_string(),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Statistic {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Statistic::ALL
            .into_iter()
            .find(|statistic| statistic.name() == wanted)
            .ok_or_else(|| StatisticsError::UnknownStatistic(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[Option<&str>]) -> Vec<Option<String>> {
        parts.iter().map(|part| part.map(str::to_string)).collect()
    }

    #[test]
    fn test_enhance_maps_known_codes() {
        let labels = LabelTable::languages();

        assert_eq!(enhance(Some("en"), &labels), "English");
        assert_eq!(enhance(Some("de"), &labels), "German");
    }

    #[test]
    fn test_enhance_passes_unmapped_codes_through() {
        let labels = LabelTable::languages();

        assert_eq!(enhance(Some("tlh"), &labels), "tlh");
        assert_eq!(enhance(None, &labels), UNKNOWN);
    }

    #[test]
    fn test_custom_label_table() {
        let labels = LabelTable::from_json(r#"{"en": "Anglais"}"#).unwrap();

        assert_eq!(labels.len(), 1);
        assert_eq!(Statistic::Languages.render(&key(&[Some("en")]), &labels), "Anglais");
        assert!(LabelTable::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_label_table_from_path() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pt-BR": "Portuguese (Brazil)"}}"#).unwrap();

        let labels = LabelTable::from_path(file.path()).unwrap();
        assert_eq!(enhance(Some("pt-BR"), &labels), "Portuguese (Brazil)");
        assert_eq!(enhance(Some("en"), &labels), "en");

        assert!(LabelTable::from_path(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_render_multi_field_statistics() {
        let labels = LabelTable::default();

        assert_eq!(
            Statistic::Sizes(SizeKind::ScreenResolution)
                .render(&key(&[Some("1920"), Some("1080")]), &labels),
            "1920px x 1080px"
        );
        assert_eq!(
            Statistic::Sizes(SizeKind::BrowserWidth).render(&key(&[Some("800")]), &labels),
            "800px"
        );
        assert_eq!(
            Statistic::Browsers(VersionKind::WithVersion)
                .render(&key(&[Some("Chrome"), Some("86")]), &labels),
            "Chrome 86"
        );
        assert_eq!(
            Statistic::Devices(ModelKind::WithModel)
                .render(&key(&[Some("Apple"), None]), &labels),
            "Apple"
        );
    }

    #[test]
    fn test_render_referrer_prefers_source() {
        let labels = LabelTable::default();
        let statistic = Statistic::Referrers(ReferrerKind::WithSource);

        assert_eq!(
            statistic.render(&key(&[Some("newsletter"), Some("https://a.example")]), &labels),
            "newsletter"
        );
        assert_eq!(
            statistic.render(&key(&[None, Some("https://a.example")]), &labels),
            "https://a.example"
        );
        assert_eq!(statistic.render(&key(&[None, None]), &labels), UNKNOWN);
    }

    #[test]
    fn test_statistic_names_parse() {
        for statistic in Statistic::ALL {
            assert_eq!(statistic.name().parse::<Statistic>().unwrap(), statistic);
            assert!(!statistic.dimensions().is_empty());
        }
        assert_eq!(
            "SCREEN_WIDTH".parse::<Statistic>().unwrap(),
            Statistic::Sizes(SizeKind::ScreenWidth)
        );
        assert!(matches!(
            "events".parse::<Statistic>(),
            Err(StatisticsError::UnknownStatistic(_))
        ));
    }
}
