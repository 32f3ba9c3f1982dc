//! Two-day match schedule, cached on disk.

use crate::cache::Cache;
use crate::models::{ApiMatch, ScheduleEvent};
use crate::network::Network;
use crate::utils::{epoch_secs, truncate_for_log};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use url::Url;

const MATCHES_PATH: &str = "api/v1/matches/all";

fn parse_matches(body: &str, date: &str) -> Vec<ScheduleEvent> {
    match serde_json::from_str::<Vec<ApiMatch>>(body) {
        Ok(matches) => matches.into_iter().map(ScheduleEvent::from).collect(),
        Err(e) => {
            warn!(%date, error = %e, body = %truncate_for_log(body, 200), "Schedule response is not a match list");
            Vec::new()
        }
    }
}

/// Fetch today's and tomorrow's schedule from the API.
///
/// Both days are requested concurrently and a failed day contributes
/// nothing. If neither day yields a record, the result is a lone sentinel
/// carrying `now` so the empty answer is cached too. Otherwise the last
/// record is stamped with `now`.
#[instrument(level = "info", skip_all)]
pub async fn refresh_schedule(net: &Network, api_url: &str, now: DateTime<Utc>) -> Vec<ScheduleEvent> {
    info!("Refreshing API cache");

    let fetched_at = epoch_secs(now);
    let Ok(url) = Url::parse(api_url).and_then(|base| base.join(MATCHES_PATH)) else {
        warn!(%api_url, "Invalid schedule API base");
        return vec![ScheduleEvent::sentinel(fetched_at)];
    };

    let today = now.format("%Y-%m-%d").to_string();
    let tomorrow = (now + Duration::days(1)).format("%Y-%m-%d").to_string();

    let today_q = [("date", today.clone())];
    let tomorrow_q = [("date", tomorrow.clone())];
    let (a, b) = tokio::join!(net.request(&url, &today_q), net.request(&url, &tomorrow_q));

    let mut data: Vec<ScheduleEvent> = [(a, today), (b, tomorrow)]
        .into_iter()
        .filter_map(|(body, date)| body.map(|body| parse_matches(&body, &date)))
        .flatten()
        .collect();

    match data.last_mut() {
        Some(last) => last.timestamp = Some(fetched_at),
        None => return vec![ScheduleEvent::sentinel(fetched_at)],
    }

    info!(count = data.len(), "Fetched schedule");
    data
}

/// The cached schedule, refreshed from the API once it has expired.
pub async fn get_schedule(
    net: &Network,
    cache: &Cache,
    api_url: &str,
    now: DateTime<Utc>,
) -> Vec<ScheduleEvent> {
    if let Some(data) = cache.load_stamped::<ScheduleEvent>().await {
        return data;
    }

    let data = refresh_schedule(net, api_url, now).await;
    if let Err(e) = cache.write(&data).await {
        warn!(path = %cache.path().display(), error = %e, "Failed to write schedule cache");
    }
    data
}
