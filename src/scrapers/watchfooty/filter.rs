//! Selects schedule records worth scraping right now.

use crate::models::{CandidateEvent, ScheduleEvent, cache_key};
use crate::utils::{epoch_secs, parse_utc};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

static SPORT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+|\(").unwrap());

/// Display sport from a league string: everything before the first run of
/// hyphens or an opening parenthesis, trimmed.
///
/// ```ignore
/// assert_eq!(sport_from_league("Football - Premier League"), "Football");
/// assert_eq!(sport_from_league("Tennis (ATP)"), "Tennis");
/// ```
pub fn sport_from_league(league: &str) -> &str {
    SPORT_SPLIT.splitn(league, 2).next().unwrap_or(league).trim()
}

/// Everything [`select_candidates`] needs besides the records themselves.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub now: DateTime<Utc>,
    pub window_before: Duration,
    pub window_after: Duration,
    pub valid_sports: &'a [String],
    /// Keys already in the result cache, successful or not.
    pub cached_keys: &'a HashSet<String>,
    pub tag: &'a str,
    /// Mirror the event links are built on.
    pub base_url: &'a str,
    /// Base that relative poster paths resolve against.
    pub api_url: &'a str,
}

/// Pick the records that are live-relevant, supported and not yet cached.
///
/// A record is kept when it has an id, title and league, its raw sport is
/// supported, its cache key is unseen, and its start time lies within
/// `[now - window_before, now + window_after]` (both ends inclusive).
/// A key listed by both schedule days is only taken once. Input order is
/// preserved.
pub fn select_candidates(events: &[ScheduleEvent], ctx: &FilterContext<'_>) -> Vec<CandidateEvent> {
    let start = ctx.now - ctx.window_before;
    let end = ctx.now + ctx.window_after;
    let base = Url::parse(ctx.base_url).ok();
    let api = Url::parse(ctx.api_url).ok();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for ev in events {
        let (Some(match_id), Some(name), Some(league)) = (
            ev.match_id.as_deref().filter(|s| !s.is_empty()),
            ev.title.as_deref().filter(|s| !s.is_empty()),
            ev.league.as_deref().filter(|s| !s.is_empty()),
        ) else {
            continue;
        };

        let supported = ev
            .sport
            .as_deref()
            .is_some_and(|s| ctx.valid_sports.iter().any(|v| v == s));
        if !supported {
            continue;
        }

        let sport = sport_from_league(league);
        let key = cache_key(sport, name, ctx.tag);
        if ctx.cached_keys.contains(&key) || seen.contains(&key) {
            continue;
        }

        let Some(date) = ev.date.as_deref() else {
            warn!(%match_id, "Event has no date");
            continue;
        };
        let Some(event_dt) = parse_utc(date) else {
            warn!(%match_id, %date, "Unparseable event date");
            continue;
        };

        if event_dt < start || event_dt > end {
            continue;
        }

        let Some(link) = base.as_ref().and_then(|b| b.join(&format!("stream/{match_id}")).ok()) else {
            warn!(base = %ctx.base_url, %match_id, "Cannot build event link");
            continue;
        };

        let logo = ev
            .poster
            .as_deref()
            .filter(|p| !p.is_empty())
            .and_then(|p| api.as_ref()?.join(p).ok())
            .map(|u| u.to_string());

        debug!(%match_id, %sport, event = %name, "Selected event");
        seen.insert(key);
        out.push(CandidateEvent {
            sport: sport.to_string(),
            event: name.to_string(),
            link: link.to_string(),
            logo,
            timestamp: epoch_secs(event_dt),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use chrono::{SecondsFormat, TimeZone};

    const TAG: &str = "WATCHFTY";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 19, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, sport: &str, start: DateTime<Utc>) -> ScheduleEvent {
        ScheduleEvent {
            match_id: Some(id.to_string()),
            title: Some(title.to_string()),
            league: Some("Football - Premier League".to_string()),
            sport: Some(sport.to_string()),
            date: Some(start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..Default::default()
        }
    }

    fn run(events: &[ScheduleEvent], cached: &HashSet<String>) -> Vec<CandidateEvent> {
        let config = ScraperConfig::default();
        let ctx = FilterContext {
            now: now(),
            window_before: Duration::minutes(30),
            window_after: Duration::minutes(5),
            valid_sports: &config.valid_sports,
            cached_keys: cached,
            tag: TAG,
            base_url: "https://www.watchfooty.st",
            api_url: "https://api.watchfooty.st",
        };
        select_candidates(events, &ctx)
    }

    #[test]
    fn test_sport_from_league() {
        assert_eq!(sport_from_league("Football - Premier League"), "Football");
        assert_eq!(sport_from_league("Football--Cup"), "Football");
        assert_eq!(sport_from_league("Tennis (ATP)"), "Tennis");
        assert_eq!(sport_from_league("  Darts  "), "Darts");
    }

    #[test]
    fn test_sentinel_produces_nothing() {
        let events = vec![ScheduleEvent::sentinel(epoch_secs(now()))];
        assert!(run(&events, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_unsupported_sport_excluded() {
        let events = vec![
            event("1", "Wallabies vs All Blacks", "rugby", now()),
            event("2", "Yankees vs Red Sox", "baseball", now()),
            event("3", "Carlton vs Collingwood", "australian-football", now()),
            event("4", "Curling final", "curling", now()),
        ];
        assert!(run(&events, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_missing_fields_excluded() {
        let mut no_id = event("1", "A vs B", "football", now());
        no_id.match_id = None;
        let mut no_title = event("2", "C vs D", "football", now());
        no_title.title = None;
        let mut no_league = event("3", "E vs F", "football", now());
        no_league.league = None;
        let mut no_date = event("4", "G vs H", "football", now());
        no_date.date = None;
        let mut bad_date = event("5", "I vs J", "football", now());
        bad_date.date = Some("soon".to_string());

        let events = vec![no_id, no_title, no_league, no_date, bad_date];
        assert!(run(&events, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let n = now();
        let events = vec![
            event("1", "Starts now-30m", "football", n - Duration::minutes(30)),
            event("2", "Starts now+5m", "football", n + Duration::minutes(5)),
            event("3", "Starts now-31m", "football", n - Duration::minutes(31)),
            event("4", "Starts now+6m", "football", n + Duration::minutes(6)),
        ];
        let got: Vec<_> = run(&events, &HashSet::new()).into_iter().map(|c| c.event).collect();
        assert_eq!(got, vec!["Starts now-30m", "Starts now+5m"]);
    }

    #[test]
    fn test_cached_key_excluded_even_if_failed() {
        let events = vec![event("1", "Team A vs Team B", "football", now())];
        let cached: HashSet<String> = [format!("[Football] Team A vs Team B ({TAG})")].into();
        assert!(run(&events, &cached).is_empty());

        let lower: HashSet<String> = ["[football] Team A vs Team B (WATCHFTY)".to_string()].into();
        let mut ev = events[0].clone();
        ev.league = Some("football".to_string());
        assert!(run(&[ev], &lower).is_empty());
    }

    #[test]
    fn test_candidate_fields() {
        let mut ev = event("abc", "Team A vs Team B", "football", now());
        ev.poster = Some("/images/abc.png".to_string());
        let got = run(&[ev], &HashSet::new());

        assert_eq!(got.len(), 1);
        let c = &got[0];
        assert_eq!(c.sport, "Football");
        assert_eq!(c.link, "https://www.watchfooty.st/stream/abc");
        assert_eq!(c.logo.as_deref(), Some("https://api.watchfooty.st/images/abc.png"));
        assert_eq!(c.timestamp, epoch_secs(now()));
    }

    #[test]
    fn test_duplicate_across_days_taken_once() {
        let ev = event("abc", "Team A vs Team B", "football", now());
        let mut late_copy = ev.clone();
        late_copy.match_id = Some("abc-2".to_string());
        let got = run(&[ev, late_copy], &HashSet::new());
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].link, "https://www.watchfooty.st/stream/abc");
    }

    #[test]
    fn test_order_preserved() {
        let events = vec![
            event("2", "Second", "tennis", now() + Duration::minutes(1)),
            event("1", "First", "football", now() - Duration::minutes(1)),
        ];
        let got: Vec<_> = run(&events, &HashSet::new()).into_iter().map(|c| c.event).collect();
        assert_eq!(got, vec!["Second", "First"]);
    }
}
