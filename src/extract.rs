//! Record extraction from fetched event and schedule documents.
//!
//! Structural pattern matching over the document tree: event-info pages
//! yield a city/state pair (or the "unknown" sentinel on a pattern miss),
//! and schedule pages yield one [`Extraction`] per bracket-game fragment.
//! Malformed fragments are always skip-and-continue, never an error.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::types::{CandidateGame, EventLocation, Extraction, SkipReason};

/// Forfeit marker used by the source in place of a score.
const FORFEIT_MARKER: &str = "F";

fn selector(src: &'static str) -> Selector {
    Selector::parse(src).expect("static selector must parse")
}

fn event_info_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("div.eventInfo2"))
}

fn bracket_game_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("div.bracket_game"))
}

fn winner_area_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("div.top_area"))
}

fn loser_area_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("div.btm_area"))
}

fn score_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("span.score"))
}

fn team_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("span.team"))
}

fn date_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| selector("span.date"))
}

/// "City: <city> Date: ... State: <2-letter code>" pattern on event pages.
fn location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"City:\s*(.*?)\s+Date:\s*.*?\s+State:\s*([A-Z]{2})")
            .expect("static regex must compile")
    })
}

/// Tournament-seed annotation like " (3)" appended to team names.
fn seed_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d+\)").expect("static regex must compile"))
}

/// "W of Game 4" / "L of Game 2" not-yet-played bracket slots.
fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[WL] of\b").expect("static regex must compile"))
}

/// Flatten an element's text nodes into one whitespace-normalized string.
fn flat_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(flat_text)
}

/// Extract the host city and state from a parsed event-info document.
///
/// A pattern miss degrades to the `"unknown"` sentinel on both fields; it is
/// never a fatal error.
pub fn parse_event_info(html: &str) -> EventLocation {
    let doc = Html::parse_document(html);
    let Some(info) = doc.select(event_info_selector()).next() else {
        return EventLocation::unknown();
    };

    let text = flat_text(info);
    match location_pattern().captures(&text) {
        Some(caps) => EventLocation {
            city: caps[1].trim().to_string(),
            state: caps[2].to_string(),
        },
        None => EventLocation::unknown(),
    }
}

/// Extract every bracket-game fragment from a parsed schedule document, in
/// document order. Each fragment independently resolves to a candidate game
/// or a skip reason.
pub fn parse_bracket_games(html: &str) -> Vec<Extraction> {
    let doc = Html::parse_document(html);
    doc.select(bracket_game_selector())
        .map(extract_fragment)
        .collect()
}

fn extract_fragment(game: ElementRef<'_>) -> Extraction {
    let winner_area = game.select(winner_area_selector()).next();
    let loser_area = game.select(loser_area_selector()).next();
    let (Some(winner_area), Some(loser_area)) = (winner_area, loser_area) else {
        // Bye or structurally incomplete entry
        return Extraction::Skipped(SkipReason::MissingArea);
    };

    let Some(winner_score_raw) = first_text(winner_area, score_selector()) else {
        return Extraction::Skipped(SkipReason::MissingField("winner score"));
    };
    let Some(winner_team_raw) = first_text(winner_area, team_selector()) else {
        return Extraction::Skipped(SkipReason::MissingField("winner team"));
    };
    let Some(loser_score_raw) = first_text(loser_area, score_selector()) else {
        return Extraction::Skipped(SkipReason::MissingField("loser score"));
    };
    let Some(loser_team_raw) = first_text(loser_area, team_selector()) else {
        return Extraction::Skipped(SkipReason::MissingField("loser team"));
    };

    let winner_team = clean_team_name(&winner_team_raw);
    let loser_team = clean_team_name(&loser_team_raw);
    for team in [&winner_team, &loser_team] {
        if team.is_empty() || is_placeholder_name(team) {
            return Extraction::Skipped(SkipReason::PlaceholderTeam(team.clone()));
        }
    }

    let Some(date_raw) = first_text(game, date_selector()) else {
        return Extraction::Skipped(SkipReason::MissingField("date"));
    };
    let Some(date) = normalize_game_date(&date_raw) else {
        return Extraction::Skipped(SkipReason::BadDate(date_raw));
    };

    if winner_score_raw == FORFEIT_MARKER || loser_score_raw == FORFEIT_MARKER {
        return Extraction::Skipped(SkipReason::Forfeit);
    }
    let (Ok(winner_score), Ok(loser_score)) =
        (winner_score_raw.parse::<u32>(), loser_score_raw.parse::<u32>())
    else {
        return Extraction::Skipped(SkipReason::BadScore(format!(
            "{}-{}",
            winner_score_raw, loser_score_raw
        )));
    };
    if winner_score == 0 && loser_score == 0 {
        return Extraction::Skipped(SkipReason::ScorelessTie);
    }

    // Source labels are positional, not authoritative: if the "winner" area
    // holds the lower score, swap the scores and the identities with them.
    let candidate = if winner_score < loser_score {
        CandidateGame {
            winner: loser_team,
            loser: winner_team,
            winner_score: loser_score,
            loser_score: winner_score,
            date,
        }
    } else {
        CandidateGame {
            winner: winner_team,
            loser: loser_team,
            winner_score,
            loser_score,
            date,
        }
    };

    Extraction::Valid(candidate)
}

/// Strip parenthesized seed annotations from a raw team name.
pub fn clean_team_name(raw: &str) -> String {
    seed_pattern().replace_all(raw, "").trim().to_string()
}

/// True for "W of ..." / "L of ..." slots that denote a game not yet played.
pub fn is_placeholder_name(name: &str) -> bool {
    placeholder_pattern().is_match(name)
}

/// Reduce a raw date field to its `MM/DD/YYYY` token, trimming any trailing
/// annotation. Returns `None` when the token is not a valid calendar date.
pub fn normalize_game_date(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().next()?;
    chrono::NaiveDate::parse_from_str(token, "%m/%d/%Y").ok()?;
    Some(token.to_string())
}
