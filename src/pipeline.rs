use std::cmp::Ordering;

use reqwest::Client;

use crate::clock::Clock;
use crate::config::Config;
use crate::estimate::JitterSource;
use crate::models::{
    HistoryEntry, StatsRecord, Trend, PEAK_HOUR_PLACEHOLDER, UPTIME_PLACEHOLDER,
};
use crate::store::{self, PreviousStats};
use crate::widget;

pub const HISTORY_LIMIT: usize = 10;

/// Runs one poll: collect a record, merge it with the previous state, and
/// write it back to the stats file.
pub async fn run(
    client: &Client,
    config: &Config,
    clock: &dyn Clock,
    jitter: &mut dyn JitterSource,
) -> anyhow::Result<StatsRecord> {
    let previous = store::load_previous(&config.stats_path);
    let current = collect(client, config, previous.as_ref(), clock, jitter).await;
    let merged = merge(current, previous.as_ref());

    store::save(&config.stats_path, &merged)?;
    Ok(merged)
}

/// Produces this run's record before any merging: demo data when no server is
/// configured, live widget data, or a stand-in when the fetch fails.
pub async fn collect(
    client: &Client,
    config: &Config,
    previous: Option<&PreviousStats>,
    clock: &dyn Clock,
    jitter: &mut dyn JitterSource,
) -> StatsRecord {
    let Some(server_id) = config.server_id.as_deref() else {
        tracing::info!("SERVER_ID not set, using demo data");
        return StatsRecord::demo(clock.now());
    };

    match widget::fetch_widget(client, config, server_id, clock, jitter).await {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(category = err.category(), error = %err, "widget fetch failed");
            recover(server_id, previous, clock)
        }
    }
}

fn recover(server_id: &str, previous: Option<&PreviousStats>, clock: &dyn Clock) -> StatsRecord {
    match previous.and_then(PreviousStats::reusable) {
        Some(mut record) => {
            tracing::info!("reusing previous data after widget fetch failure");
            record.last_updated = clock.now();
            record.fetch_error = true;
            record
        }
        None => {
            tracing::info!("no reusable previous data, writing fallback record");
            StatsRecord::fallback(server_id, clock.now())
        }
    }
}

pub fn merge(mut record: StatsRecord, previous: Option<&PreviousStats>) -> StatsRecord {
    record.trend = previous
        .and_then(PreviousStats::online_count)
        .map(|prev| calculate_trend(record.online_count, prev));

    let prior_history = previous.and_then(PreviousStats::history);
    record.update_history = extend_history(prior_history, record.history_entry());

    record.uptime_percentage = UPTIME_PLACEHOLDER.to_string();
    record.peak_hour = PEAK_HOUR_PLACEHOLDER.to_string();
    record
}

pub fn calculate_trend(current: u64, previous: u64) -> Trend {
    match current.cmp(&previous) {
        Ordering::Greater => Trend::Up,
        Ordering::Less => Trend::Down,
        Ordering::Equal => Trend::Stable,
    }
}

/// Appends `entry`, keeping at most `HISTORY_LIMIT` entries, oldest first.
pub fn extend_history(prior: Option<Vec<HistoryEntry>>, entry: HistoryEntry) -> Vec<HistoryEntry> {
    let mut history = prior.unwrap_or_default();
    let keep = HISTORY_LIMIT - 1;
    if history.len() > keep {
        let excess = history.len() - keep;
        history.drain(..excess);
    }
    history.push(entry);
    history
}
