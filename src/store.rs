use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::models::{history_entries, HistoryEntry, Source, StatsRecord};

/// Whatever the previous run left in the stats file, kept as raw JSON so
/// that "field absent" stays distinguishable from "field zero".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousStats {
    fields: Map<String, Value>,
}

impl PreviousStats {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn online_count(&self) -> Option<u64> {
        self.fields.get("online_count").and_then(Value::as_u64)
    }

    pub fn source(&self) -> Option<&str> {
        self.fields.get("source").and_then(Value::as_str)
    }

    /// Stored history with malformed entries dropped, or `None` when absent
    /// or not a list.
    pub fn history(&self) -> Option<Vec<HistoryEntry>> {
        history_entries(self.fields.get("update_history"))
    }

    /// The previous record, if it carries a source marker other than demo
    /// data and can stand in for a failed fetch.
    pub fn reusable(&self) -> Option<StatsRecord> {
        let source = self.fields.get("source")?;
        if source.as_str() == Some(Source::DemoData.as_str()) {
            return None;
        }
        Some(StatsRecord::from_fields(&self.fields))
    }
}

/// Loads the previous stats file. Missing, unreadable, or malformed files all
/// read as no previous state.
pub fn load_previous(path: &Path) -> Option<PreviousStats> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no previous stats");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(fields)) if !fields.is_empty() => {
            Some(PreviousStats::from_fields(fields))
        }
        Ok(Value::Object(_)) => None,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "previous stats is not a JSON object");
            None
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "previous stats is not valid JSON");
            None
        }
    }
}

pub fn load_record(path: &Path) -> anyhow::Result<StatsRecord> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read stats file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("stats file {} is not valid JSON", path.display()))?;
    let fields = value
        .as_object()
        .with_context(|| format!("stats file {} is not a JSON object", path.display()))?;
    Ok(StatsRecord::from_fields(fields))
}

/// Writes the record as indented JSON next to the target, then renames it
/// into place.
pub fn save(path: &Path, record: &StatsRecord) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp_path = temp_path_for(path);
    let written = write_pretty(&tmp_path, record).and_then(|()| {
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                tmp_path.display(),
                path.display()
            )
        })
    });

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_pretty(tmp_path: &Path, record: &StatsRecord) -> anyhow::Result<()> {
    let file = File::create(tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, record)
        .with_context(|| format!("failed to serialize stats to {}", tmp_path.display()))?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    writer
        .get_ref()
        .sync_all()
        .with_context(|| format!("failed to sync {}", tmp_path.display()))?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
