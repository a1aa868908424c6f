use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::Config;
use crate::estimate::{estimate_total_members, JitterSource};
use crate::models::{Source, StatsRecord, WidgetPayload};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("widget API returned status {0}")]
    Status(u16),
    #[error("widget request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("widget response was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Status(_) => "status",
            FetchError::Transport(_) => "transport",
            FetchError::Parse(_) => "parse",
        }
    }
}

pub fn build_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder().timeout(config.timeout).build()
}

pub async fn fetch_widget(
    client: &Client,
    config: &Config,
    server_id: &str,
    clock: &dyn Clock,
    jitter: &mut dyn JitterSource,
) -> Result<StatsRecord, FetchError> {
    let url = config.widget_url(server_id);
    tracing::debug!(%url, "requesting widget");

    let response = client.get(&url).send().await?;
    if response.status() != StatusCode::OK {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let body = response.bytes().await?;
    let payload: WidgetPayload = serde_json::from_slice(&body)?;
    let record = record_from_payload(payload, server_id, clock, jitter);

    tracing::info!(online = record.online_count, "fetched widget data");
    Ok(record)
}

pub fn record_from_payload(
    payload: WidgetPayload,
    server_id: &str,
    clock: &dyn Clock,
    jitter: &mut dyn JitterSource,
) -> StatsRecord {
    let online_count = payload.members.map_or(0, |members| members.len() as u64);
    let voice_count = payload.channels.map_or(0, |channels| channels.len() as u64);

    StatsRecord {
        server_name: payload
            .name
            .unwrap_or_else(|| "Unknown Server".to_string()),
        server_id: server_id.to_string(),
        online_count,
        voice_count,
        invite_url: payload.instant_invite.unwrap_or_default(),
        estimated_total: estimate_total_members(online_count, jitter),
        last_updated: clock.now(),
        source: Source::DiscordWidget,
        ..StatsRecord::default()
    }
}
