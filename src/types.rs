//! Core record types shared across the pipeline stages.
//!
//! Candidate records are transient: the extractor produces them, the
//! pipeline folds them into the store, and they are dropped afterwards.
//! Persisted rows are referred to only by their typed ids.

use std::fmt;

/// Row id in the `locations` dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationId(pub i64);

/// Row id in the `teams` dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamId(pub i64);

/// Row id in the `dates` dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateId(pub i64);

/// Row id in the `games` fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameId(pub i64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// City/state pair lifted from an event-info page.
///
/// A pattern miss is not an error: both fields degrade to the `"unknown"`
/// sentinel and the location row is created with those values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLocation {
    pub city: String,
    pub state: String,
}

impl EventLocation {
    /// Sentinel used when the city/state pattern does not match.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self {
            city: Self::UNKNOWN.to_string(),
            state: Self::UNKNOWN.to_string(),
        }
    }

    /// True when the event page yielded a real city and state.
    pub fn is_known(&self) -> bool {
        self.city != Self::UNKNOWN && self.state != Self::UNKNOWN
    }
}

/// One completed game lifted from a bracket fragment.
///
/// Winner and loser are already order-corrected: when the source labels a
/// lower score as the winner, the extractor swaps both the scores and the
/// team identities, so `winner_score >= loser_score` always holds here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGame {
    pub winner: String,
    pub loser: String,
    pub winner_score: u32,
    pub loser_score: u32,
    /// Normalized `MM/DD/YYYY` token.
    pub date: String,
}

/// Why a bracket fragment was not turned into a candidate game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Winner or loser sub-area absent (bye/malformed entry).
    MissingArea,
    /// A required field inside an area was absent.
    MissingField(&'static str),
    /// Team slot holds a "W of ..." / "L of ..." not-yet-played placeholder.
    PlaceholderTeam(String),
    /// Date field did not reduce to a valid `MM/DD/YYYY` token.
    BadDate(String),
    /// Score did not parse as a pair of integers.
    BadScore(String),
    /// Forfeit marker in place of a score.
    Forfeit,
    /// 0-0 is not a valid completed-game result.
    ScorelessTie,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingArea => write!(f, "missing winner/loser area"),
            SkipReason::MissingField(field) => write!(f, "missing {} field", field),
            SkipReason::PlaceholderTeam(name) => write!(f, "placeholder team {:?}", name),
            SkipReason::BadDate(raw) => write!(f, "unparseable date {:?}", raw),
            SkipReason::BadScore(raw) => write!(f, "unparseable score {:?}", raw),
            SkipReason::Forfeit => write!(f, "forfeit"),
            SkipReason::ScorelessTie => write!(f, "0-0 tie"),
        }
    }
}

/// Result of extracting one bracket fragment.
///
/// Malformed fragments never abort the page: the caller pattern-matches and
/// carries on with the next fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Valid(CandidateGame),
    Skipped(SkipReason),
}
