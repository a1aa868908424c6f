use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::models::{Source, StatsRecord};

pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }

    output
}

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);

    match seconds {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", seconds / 60),
        3600..=86399 => format!("{}h ago", seconds / 3600),
        _ => format!("{}d ago", seconds / 86400),
    }
}

fn source_label(source: &Source) -> &str {
    match source {
        Source::DiscordWidget => "live widget",
        Source::DemoData => "demo data",
        Source::FallbackData => "fallback data",
        Source::Other(marker) => marker,
    }
}

pub fn build_report(record: &StatsRecord, now: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", record.server_name);
    let _ = writeln!(
        output,
        "Updated {} ({}) from {}",
        time_ago(record.last_updated, now),
        record.last_updated.format("%Y-%m-%d %H:%M UTC"),
        source_label(&record.source)
    );
    if record.fetch_error {
        let _ = writeln!(output, "Latest fetch failed; showing previous data.");
    }
    if let Some(note) = &record.note {
        let _ = writeln!(output, "> {}", note);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Members");
    let trend = record.trend.map(|t| format!(" {}", t.arrow())).unwrap_or_default();
    let _ = writeln!(
        output,
        "- Online: {}{}",
        format_number(record.online_count),
        trend
    );
    let _ = writeln!(
        output,
        "- Estimated total: {}",
        format_number(record.estimated_total)
    );
    let _ = writeln!(output, "- Channels: {}", record.voice_count);
    if !record.invite_url.is_empty() {
        let _ = writeln!(output, "- Invite: {}", record.invite_url);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent History");

    if record.update_history.is_empty() {
        let _ = writeln!(output, "No updates recorded yet.");
    } else {
        for entry in record.update_history.iter().rev() {
            let _ = writeln!(
                output,
                "- {}: {} online",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                format_number(entry.online)
            );
        }
    }

    output
}

pub fn export_history_csv(record: &StatsRecord, out: &Path) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    for entry in &record.update_history {
        writer.serialize(entry)?;
    }
    writer.flush()?;

    Ok(record.update_history.len())
}
