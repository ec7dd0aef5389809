//! Core domain model for TruthPulse daily snapshots.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const CRATE_NAME: &str = "truthpulse-core";

/// `filters.type` carried by every article snapshot.
pub const NEWS_TYPE_FILTER: &str = "news";

/// Feed item as it appears in the base pool and in generated snapshots.
///
/// Identity is `link`. Fields the generator does not know about are kept in
/// `extra` and written back out unchanged. Base-pool entries should be decoded with
/// [`BaseRecord::from_base_value`] so explicit `null`s survive the round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Wire names of the typed [`Article`] fields.
const ARTICLE_KEYS: &[&str] = &[
    "title",
    "link",
    "snippet",
    "publishedAt",
    "source",
    "theme",
    "type",
];

/// Decoding of one entry from a base feed's `data` array.
pub trait BaseRecord: Sized {
    fn from_base_value(value: JsonValue) -> serde_json::Result<Self>;
}

impl BaseRecord for Article {
    /// Known keys holding `null` are parked in `extra` and re-emitted as `null`.
    /// A non-string `publishedAt` is discarded since stamping replaces it.
    fn from_base_value(value: JsonValue) -> serde_json::Result<Self> {
        let mut object = match value {
            JsonValue::Object(object) => object,
            other => return serde_json::from_value(other),
        };
        if object
            .get("publishedAt")
            .is_some_and(|v| !v.is_string() && !v.is_null())
        {
            object.remove("publishedAt");
        }
        let nulls: Vec<String> = ARTICLE_KEYS
            .iter()
            .filter(|key| object.get(**key).is_some_and(JsonValue::is_null))
            .map(|key| key.to_string())
            .collect();
        for key in &nulls {
            object.remove(key);
        }
        let mut article: Article = serde_json::from_value(JsonValue::Object(object))?;
        for key in nulls {
            article.extra.insert(key, JsonValue::Null);
        }
        Ok(article)
    }
}

impl BaseRecord for PulseCard {
    fn from_base_value(value: JsonValue) -> serde_json::Result<Self> {
        let mut object = match value {
            JsonValue::Object(object) => object,
            other => return serde_json::from_value(other),
        };
        if object.get("dateLabel").is_some_and(|v| !v.is_string()) {
            object.remove("dateLabel");
        }
        serde_json::from_value(JsonValue::Object(object))
    }
}

impl Article {
    /// Replace `publishedAt`, including one parked in `extra` as `null`.
    pub fn set_published_at(&mut self, published_at: Option<String>) {
        self.extra.remove("publishedAt");
        self.published_at = published_at;
    }

    /// Uniqueness key; `None` when absent or empty.
    pub fn key(&self) -> Option<&str> {
        self.link.as_deref().filter(|link| !link.is_empty())
    }

    pub fn published_instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Lowercased `"{title} {snippet}"`, the text searched by theme fallback matching.
    pub fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or_default(),
            self.snippet.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

/// AI safety pulse card. Only `dateLabel` is touched by generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Base input file shape: `{ "data": [...] }`, other keys ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseFeed<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilters {
    pub theme: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SnapshotFilters {
    pub fn all_sources() -> Self {
        Self {
            theme: None,
            kind: NEWS_TYPE_FILTER.to_string(),
        }
    }

    pub fn for_theme(theme: impl Into<String>) -> Self {
        Self {
            theme: Some(theme.into()),
            kind: NEWS_TYPE_FILTER.to_string(),
        }
    }
}

/// One dated article snapshot as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub generated_at: String,
    pub filters: SnapshotFilters,
    pub data: Vec<Article>,
}

/// One dated AI pulse snapshot as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseSnapshotFile {
    pub generated_at: String,
    #[serde(default)]
    pub stats: Map<String, JsonValue>,
    pub data: Vec<PulseCard>,
}

/// Which dated file a payload belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Stream panel feed.
    Stream,
    /// Regional heatmap feed; same payload as `Stream`.
    All,
    Theme(String),
    Pulse,
}

impl SnapshotKind {
    pub fn file_name(&self, date: NaiveDate) -> String {
        let date = date.format("%Y-%m-%d");
        match self {
            Self::Stream => format!("live-sources-{date}.json"),
            Self::All => format!("live-sources-all-{date}.json"),
            Self::Theme(theme) => format!("live-sources-theme-{theme}-{date}.json"),
            Self::Pulse => format!("ai-safety-pulse-{date}.json"),
        }
    }
}

/// `2026-02-14T00:30:00.000Z`: millisecond precision, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
