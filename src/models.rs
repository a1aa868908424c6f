use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UPTIME_PLACEHOLDER: &str = "99.8%";
pub const PEAK_HOUR_PLACEHOLDER: &str = "19:00 UTC";

const KNOWN_FIELDS: &[&str] = &[
    "server_name",
    "server_id",
    "online_count",
    "voice_count",
    "invite_url",
    "estimated_total",
    "last_updated",
    "source",
    "fetch_error",
    "trend",
    "update_history",
    "uptime_percentage",
    "peak_hour",
    "note",
];

/// Provenance marker. Markers written by other tools are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    #[default]
    DiscordWidget,
    DemoData,
    FallbackData,
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::DiscordWidget => "discord_widget",
            Source::DemoData => "demo_data",
            Source::FallbackData => "fallback_data",
            Source::Other(marker) => marker,
        }
    }
}

impl From<String> for Source {
    fn from(marker: String) -> Self {
        match marker.as_str() {
            "discord_widget" => Source::DiscordWidget,
            "demo_data" => Source::DemoData,
            "fallback_data" => Source::FallbackData,
            _ => Source::Other(marker),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        match source {
            Source::Other(marker) => marker,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub online: u64,
}

/// The document persisted to the stats file on every run.
///
/// Fields missing from an older file fall back to their defaults, and fields
/// this version does not know about are carried through in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsRecord {
    pub server_name: String,
    pub server_id: String,
    pub online_count: u64,
    pub voice_count: u64,
    pub invite_url: String,
    pub estimated_total: u64,
    pub last_updated: DateTime<Utc>,
    pub source: Source,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fetch_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    pub update_history: Vec<HistoryEntry>,
    pub uptime_percentage: String,
    pub peak_hour: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StatsRecord {
    pub fn demo(now: DateTime<Utc>) -> Self {
        Self {
            server_name: "Demo Discord Server".to_string(),
            server_id: "demo123".to_string(),
            online_count: 247,
            voice_count: 5,
            invite_url: "https://discord.gg/demo".to_string(),
            estimated_total: 1250,
            last_updated: now,
            source: Source::DemoData,
            note: Some("Set SERVER_ID secret for real Discord widget data".to_string()),
            ..Self::default()
        }
    }

    pub fn fallback(server_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            server_name: "My Discord Server".to_string(),
            server_id: server_id.to_string(),
            online_count: 150,
            voice_count: 3,
            estimated_total: 750,
            last_updated: now,
            source: Source::FallbackData,
            note: Some("Enable server widget in Discord settings for live data".to_string()),
            ..Self::default()
        }
    }

    /// Rebuilds a record from loosely typed JSON. A field that is missing or
    /// has the wrong type takes its default instead of rejecting the record.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        fn field<T: DeserializeOwned + Default>(fields: &Map<String, Value>, key: &str) -> T {
            fields
                .get(key)
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default()
        }

        Self {
            server_name: field(fields, "server_name"),
            server_id: field(fields, "server_id"),
            online_count: field(fields, "online_count"),
            voice_count: field(fields, "voice_count"),
            invite_url: field(fields, "invite_url"),
            estimated_total: field(fields, "estimated_total"),
            last_updated: field(fields, "last_updated"),
            source: field(fields, "source"),
            fetch_error: field(fields, "fetch_error"),
            trend: field(fields, "trend"),
            update_history: history_entries(fields.get("update_history")).unwrap_or_default(),
            uptime_percentage: field(fields, "uptime_percentage"),
            peak_hour: field(fields, "peak_hour"),
            note: field(fields, "note"),
            extra: fields
                .iter()
                .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            timestamp: self.last_updated,
            online: self.online_count,
        }
    }
}

/// Parses a stored history list entry by entry, skipping malformed entries.
/// Returns `None` when the value is absent or not a list.
pub fn history_entries(raw: Option<&Value>) -> Option<Vec<HistoryEntry>> {
    let items = raw?.as_array()?;
    let entries = items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed history entry");
                None
            }
        })
        .collect();
    Some(entries)
}

/// Subset of the public widget payload this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instant_invite: Option<String>,
    #[serde(default)]
    pub members: Option<Vec<Value>>,
    #[serde(default)]
    pub channels: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn optional_fields_are_omitted_when_unset() {
        let record = StatsRecord::fallback("42", fixed_time());
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("fetch_error").is_none());
        assert!(value.get("trend").is_none());
        assert_eq!(value["source"], "fallback_data");
        assert_eq!(value["last_updated"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = r#"{
            "server_name": "Guild",
            "source": "discord_widget",
            "online_count": 12,
            "badge_color": "blue"
        }"#;

        let record: StatsRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.online_count, 12);
        assert_eq!(record.extra.get("badge_color"), Some(&Value::from("blue")));

        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written["badge_color"], "blue");
    }

    #[test]
    fn unrecognized_source_markers_are_preserved() {
        let source: Source = serde_json::from_str(r#""manual_import""#).unwrap();
        assert_eq!(source, Source::Other("manual_import".to_string()));
        assert_eq!(serde_json::to_string(&source).unwrap(), r#""manual_import""#);
        assert_eq!(Source::from("demo_data".to_string()), Source::DemoData);
    }

    #[test]
    fn lenient_rebuild_defaults_bad_fields_and_keeps_the_rest() {
        let fields = json!({
            "server_name": "Alpha Community",
            "source": "discord_widget",
            "online_count": 88,
            "invite_url": null,
            "trend": "sideways",
            "last_updated": "2026-03-01T11:00:00.123456Z",
            "badge_color": "blue"
        });

        let record = StatsRecord::from_fields(fields.as_object().unwrap());

        assert_eq!(record.server_name, "Alpha Community");
        assert_eq!(record.online_count, 88);
        assert_eq!(record.invite_url, "");
        assert!(record.trend.is_none());
        assert_eq!(record.source, Source::DiscordWidget);
        assert_eq!(record.last_updated.timestamp(), fixed_time().timestamp() - 3600);
        assert_eq!(record.extra.get("badge_color"), Some(&Value::from("blue")));
        assert!(!record.extra.contains_key("invite_url"));
    }

    #[test]
    fn history_skips_only_malformed_entries() {
        let raw = json!([
            { "timestamp": "2026-03-01T10:00:00Z", "online": 80 },
            { "timestamp": "2026-03-01T10:30:00Z", "online": null },
            "garbage",
            { "timestamp": "2026-03-01T11:00:00Z", "online": 88 }
        ]);

        let history = history_entries(Some(&raw)).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].online, 80);
        assert_eq!(history[1].online, 88);
        assert!(history_entries(Some(&json!({ "online": 1 }))).is_none());
        assert!(history_entries(None).is_none());
    }

    #[test]
    fn widget_payload_tolerates_nulls_and_missing_arrays() {
        let payload: WidgetPayload =
            serde_json::from_str(r#"{"name": "Guild", "instant_invite": null}"#).unwrap();

        assert_eq!(payload.name.as_deref(), Some("Guild"));
        assert!(payload.instant_invite.is_none());
        assert!(payload.members.is_none());
    }
}
