//! TV-guide metadata for sports and leagues.
//!
//! Playlist entries carry a `tvg-id` so EPG-aware players can attach a guide
//! channel, and a logo. Lookups match the sport category first, then fall back
//! to keywords in the event name (e.g. "UFC" inside a "Fighting" card).
//!
//! No league logos are bundled yet, so every entry answers `None` for the logo
//! and callers use the event poster or their configured fallback.

/// Guide id and logo for one sport or league.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeagueInfo {
    pub tvg_id: &'static str,
    pub logo: Option<&'static str>,
}

const TABLE: &[(&[&str], LeagueInfo)] = &[
    (
        &["football", "soccer", "premier league", "la liga", "serie a", "bundesliga", "mls"],
        LeagueInfo {
            tvg_id: "Soccer.Dummy.us",
            logo: None,
        },
    ),
    (
        &["nfl", "american football", "american-football", "ncaaf"],
        LeagueInfo {
            tvg_id: "NFL.Dummy.us",
            logo: None,
        },
    ),
    (
        &["nba", "basketball", "wnba", "euroleague"],
        LeagueInfo {
            tvg_id: "Basketball.Dummy.us",
            logo: None,
        },
    ),
    (
        &["nhl", "hockey", "ice hockey"],
        LeagueInfo {
            tvg_id: "NHL.Hockey.Dummy.us",
            logo: None,
        },
    ),
    (
        &["ufc", "boxing", "mma", "fighting"],
        LeagueInfo {
            tvg_id: "PPV.EVENTS.Dummy.us",
            logo: None,
        },
    ),
    (
        &["f1", "formula 1", "motogp", "nascar", "indycar", "racing"],
        LeagueInfo {
            tvg_id: "Racing.Dummy.us",
            logo: None,
        },
    ),
    (
        &["tennis", "atp", "wta"],
        LeagueInfo {
            tvg_id: "Tennis.Dummy.us",
            logo: None,
        },
    ),
    (
        &["cricket", "ipl"],
        LeagueInfo {
            tvg_id: "Cricket.Dummy.us",
            logo: None,
        },
    ),
    (
        &["golf", "pga"],
        LeagueInfo {
            tvg_id: "Golf.Dummy.us",
            logo: None,
        },
    ),
    (
        &["darts", "pdc"],
        LeagueInfo {
            tvg_id: "Darts.Dummy.us",
            logo: None,
        },
    ),
    (
        &["volleyball"],
        LeagueInfo {
            tvg_id: "Volleyball.Dummy.us",
            logo: None,
        },
    ),
];

#[derive(Clone, Copy)]
enum Match {
    Exact,
    Phrase,
    Word,
}

fn lookup(text: &str, how: Match) -> Option<LeagueInfo> {
    let text = text.trim().to_lowercase();
    TABLE.iter().find_map(|(keys, info)| {
        let hit = keys.iter().any(|k| match how {
            Match::Exact => text == *k,
            // Keys with separators match anywhere in the text.
            Match::Phrase => !k.chars().all(char::is_alphanumeric) && text.contains(*k),
            Match::Word => text.split(|c: char| !c.is_alphanumeric()).any(|word| word == *k),
        });
        hit.then_some(*info)
    })
}

/// Guide id and logo for an event, if its sport or name is recognised.
///
/// Returns `(tvg_id, logo)`; both are `None` for unknown sports, and the logo
/// is `None` for any league without one.
pub fn get_tvg_info(sport: &str, event: &str) -> (Option<&'static str>, Option<&'static str>) {
    let found = [(sport, Match::Exact), (sport, Match::Phrase), (sport, Match::Word)]
        .into_iter()
        .chain([(event, Match::Phrase), (event, Match::Word)])
        .find_map(|(text, how)| lookup(text, how));
    match found {
        Some(info) => (Some(info.tvg_id), info.logo),
        None => (None, None),
    }
}
