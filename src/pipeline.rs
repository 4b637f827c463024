//! The games pipeline: fetch → extract → store.
//!
//! Pages are processed strictly in input-list order and bracket fragments in
//! document order, so the batch cap always admits the same prefix of the
//! available work. A failed page fetch skips that URL pair; nothing short of
//! an unreadable input file or database aborts the run.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::extract;
use crate::fetch::PageSource;
use crate::store::{GameStore, InsertOutcome};
use crate::types::Extraction;

/// End-of-run counters reported to the user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Games inserted this run (bounded by the batch cap)
    pub new_games: usize,
    /// Fragments that matched an already-stored game
    pub duplicates: usize,
    /// Fragments skipped as malformed/placeholder/invalid
    pub skipped: usize,
    /// URL pairs dropped because a page fetch failed
    pub fetch_failures: usize,
    /// Total games in the store after this run
    pub total_games: u64,
}

/// Read a line-oriented URL list: one URL per line, blank lines ignored.
/// An unreadable file is fatal.
pub fn read_url_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("reading url list {}", path.as_ref().display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Scrape the paired event/schedule pages and fold the results into the
/// store, inserting at most `cap` new games.
///
/// Event page N pairs with schedule page N; unpaired trailing URLs are
/// ignored. Re-running against unchanged pages inserts nothing: every
/// candidate either matches the dedup predicate or is skipped again.
pub async fn run_scrape<S: PageSource>(
    store: &GameStore,
    source: &mut S,
    event_urls: &[String],
    schedule_urls: &[String],
    cap: usize,
) -> Result<RunSummary> {
    if event_urls.len() != schedule_urls.len() {
        warn!(
            "input lists differ in length ({} event pages, {} schedule pages); extra URLs ignored",
            event_urls.len(),
            schedule_urls.len()
        );
    }

    let mut summary = RunSummary::default();

    'pages: for (event_url, schedule_url) in event_urls.iter().zip(schedule_urls) {
        if summary.new_games >= cap {
            break;
        }

        let location = match source.fetch_page(event_url).await {
            Ok(html) => extract::parse_event_info(&html),
            Err(e) => {
                warn!("event page {} failed, skipping pair: {:#}", event_url, e);
                summary.fetch_failures += 1;
                continue;
            }
        };
        if !location.is_known() {
            debug!("no city/state pattern on {}", event_url);
        }

        let schedule_html = match source.fetch_page(schedule_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("schedule page {} failed, skipping pair: {:#}", schedule_url, e);
                summary.fetch_failures += 1;
                continue;
            }
        };

        let location_id = store.resolve_location(&location.city, &location.state)?;

        for extraction in extract::parse_bracket_games(&schedule_html) {
            if summary.new_games >= cap {
                break 'pages;
            }
            match extraction {
                Extraction::Skipped(reason) => {
                    summary.skipped += 1;
                    debug!("fragment skipped: {}", reason);
                }
                Extraction::Valid(game) => {
                    let date_id = store.resolve_date(&game.date)?;
                    let winner_id = store.resolve_team(&game.winner)?;
                    let loser_id = store.resolve_team(&game.loser)?;
                    match store.insert_game(
                        location_id,
                        date_id,
                        winner_id,
                        loser_id,
                        game.winner_score,
                        game.loser_score,
                    )? {
                        InsertOutcome::Inserted(id) => {
                            summary.new_games += 1;
                            info!(
                                "stored game {}: {} {} - {} {} on {}",
                                id,
                                game.winner,
                                game.winner_score,
                                game.loser,
                                game.loser_score,
                                game.date
                            );
                        }
                        InsertOutcome::Duplicate => {
                            summary.duplicates += 1;
                            debug!(
                                "duplicate skipped: {} vs {} on {}",
                                game.winner, game.loser, game.date
                            );
                        }
                    }
                }
            }
        }
    }

    summary.total_games = store.game_count()?;
    info!(
        "scrape complete: {} total games stored, {} new this run ({} duplicates, {} fragments skipped, {} fetch failures)",
        summary.total_games,
        summary.new_games,
        summary.duplicates,
        summary.skipped,
        summary.fetch_failures
    );
    Ok(summary)
}
