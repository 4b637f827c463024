//! SQLite-backed normalization store.
//!
//! Owns the relational schema: three dimension tables (locations, teams,
//! dates), the games fact table, and the two enrichment tables keyed by game
//! id. The schema is created idempotently on every open. Dimension
//! resolution is get-or-create (`INSERT OR IGNORE` + lookup) and the fact
//! insert deduplicates on the full identity tuple, so repeated runs over
//! overlapping pages are safe.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{DateId, GameId, LocationId, TeamId};

/// Outcome of a fact-table insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(GameId),
    /// A row with the identical identity tuple already exists.
    Duplicate,
}

/// A game awaiting geocoding: its id plus the raw location strings.
#[derive(Debug, Clone)]
pub struct GeocodeTask {
    pub game_id: GameId,
    pub city: String,
    pub state: String,
}

/// A geocoded game awaiting weather data.
#[derive(Debug, Clone)]
pub struct WeatherTask {
    pub game_id: GameId,
    /// Stored `MM/DD/YYYY` date; the weather pass rewrites it to ISO.
    pub game_date: String,
    pub lat: f64,
    pub lon: f64,
}

/// One stored game joined back to its dimension values, for inspection and
/// end-of-run listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGame {
    pub id: GameId,
    pub city: String,
    pub state: String,
    pub game_date: String,
    pub winner: String,
    pub loser: String,
    pub winner_score: u32,
    pub loser_score: u32,
}

/// One row of the per-date reporting aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub game_date: String,
    pub average_points: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub temperature: f64,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    city  TEXT NOT NULL,
    state TEXT NOT NULL,
    UNIQUE (city, state)
);
CREATE TABLE IF NOT EXISTS teams (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS dates (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    game_date TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS games (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id  INTEGER NOT NULL REFERENCES locations (id),
    date_id      INTEGER NOT NULL REFERENCES dates (id),
    winner_id    INTEGER NOT NULL REFERENCES teams (id),
    loser_id     INTEGER NOT NULL REFERENCES teams (id),
    winner_score INTEGER NOT NULL,
    loser_score  INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_games_identity
    ON games (location_id, date_id, winner_id, loser_id, winner_score, loser_score);
CREATE TABLE IF NOT EXISTS geocoding (
    game_id INTEGER PRIMARY KEY REFERENCES games (id),
    lat     REAL NOT NULL,
    lon     REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS weather (
    game_id       INTEGER PRIMARY KEY REFERENCES games (id),
    wind_speed    INTEGER NOT NULL,
    temperature   INTEGER NOT NULL,
    precipitation INTEGER NOT NULL
);
"#;

/// Single shared connection per run. Not safe for concurrent writers; the
/// pipeline is strictly sequential by design.
pub struct GameStore {
    conn: Connection,
}

impl GameStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating schema")?;
        Ok(Self { conn })
    }

    /// Get-or-create a location row. Stable id across repeated calls.
    pub fn resolve_location(&self, city: &str, state: &str) -> Result<LocationId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO locations (city, state) VALUES (?1, ?2)",
            params![city, state],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM locations WHERE city = ?1 AND state = ?2",
            params![city, state],
            |row| row.get(0),
        )?;
        Ok(LocationId(id))
    }

    /// Get-or-create a team row by cleaned display name.
    pub fn resolve_team(&self, name: &str) -> Result<TeamId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO teams (name) VALUES (?1)",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM teams WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(TeamId(id))
    }

    /// Get-or-create a date row by normalized `MM/DD/YYYY` value.
    pub fn resolve_date(&self, game_date: &str) -> Result<DateId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO dates (game_date) VALUES (?1)",
            params![game_date],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM dates WHERE game_date = ?1",
            params![game_date],
            |row| row.get(0),
        )?;
        Ok(DateId(id))
    }

    /// Insert a game unless a row with the identical
    /// (location, date, winner, loser, winner_score, loser_score) tuple
    /// already exists. This is the dedup mechanism that makes re-scraping
    /// overlapping page sets safe.
    pub fn insert_game(
        &self,
        location: LocationId,
        date: DateId,
        winner: TeamId,
        loser: TeamId,
        winner_score: u32,
        loser_score: u32,
    ) -> Result<InsertOutcome> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM games
                 WHERE location_id = ?1 AND date_id = ?2 AND winner_id = ?3
                   AND loser_id = ?4 AND winner_score = ?5 AND loser_score = ?6",
                params![location.0, date.0, winner.0, loser.0, winner_score, loser_score],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        self.conn.execute(
            "INSERT INTO games
                 (location_id, date_id, winner_id, loser_id, winner_score, loser_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![location.0, date.0, winner.0, loser.0, winner_score, loser_score],
        )?;
        Ok(InsertOutcome::Inserted(GameId(self.conn.last_insert_rowid())))
    }

    /// Total number of stored games.
    pub fn game_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every stored game joined to its dimension values, ordered by id.
    pub fn stored_games(&self) -> Result<Vec<StoredGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT games.id, locations.city, locations.state, dates.game_date,
                    w.name, l.name, games.winner_score, games.loser_score
             FROM games
             JOIN locations ON games.location_id = locations.id
             JOIN dates     ON games.date_id = dates.id
             JOIN teams w   ON games.winner_id = w.id
             JOIN teams l   ON games.loser_id = l.id
             ORDER BY games.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredGame {
                    id: GameId(row.get(0)?),
                    city: row.get(1)?,
                    state: row.get(2)?,
                    game_date: row.get(3)?,
                    winner: row.get(4)?,
                    loser: row.get(5)?,
                    winner_score: row.get(6)?,
                    loser_score: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Games with no geocoding row yet, in id order, capped at `limit`.
    /// Re-evaluated on every run; this predicate is what makes the
    /// geocoding pass resumable.
    pub fn pending_geocoding(&self, limit: usize) -> Result<Vec<GeocodeTask>> {
        let mut stmt = self.conn.prepare(
            "SELECT games.id, locations.city, locations.state
             FROM games
             JOIN locations ON games.location_id = locations.id
             LEFT JOIN geocoding ON games.id = geocoding.game_id
             WHERE geocoding.game_id IS NULL
             ORDER BY games.id
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(GeocodeTask {
                    game_id: GameId(row.get(0)?),
                    city: row.get(1)?,
                    state: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Geocoded games with no weather row yet, in id order, capped at `limit`.
    pub fn pending_weather(&self, limit: usize) -> Result<Vec<WeatherTask>> {
        let mut stmt = self.conn.prepare(
            "SELECT games.id, dates.game_date, geocoding.lat, geocoding.lon
             FROM games
             JOIN dates ON games.date_id = dates.id
             JOIN geocoding ON games.id = geocoding.game_id
             LEFT JOIN weather ON games.id = weather.game_id
             WHERE weather.game_id IS NULL
             ORDER BY games.id
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(WeatherTask {
                    game_id: GameId(row.get(0)?),
                    game_date: row.get(1)?,
                    lat: row.get(2)?,
                    lon: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Persist coordinates for a game, keyed by game id. The pending
    /// predicate never reselects an enriched row, so in practice a row is
    /// written once and never rewritten.
    pub fn insert_geocoding(&self, game_id: GameId, lat: f64, lon: f64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO geocoding (game_id, lat, lon) VALUES (?1, ?2, ?3)",
            params![game_id.0, lat, lon],
        )?;
        Ok(())
    }

    /// Persist daily weather values (already truncated to integers) for a game.
    pub fn insert_weather(
        &self,
        game_id: GameId,
        wind_speed: i64,
        temperature: i64,
        precipitation: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO weather (game_id, wind_speed, temperature, precipitation)
             VALUES (?1, ?2, ?3, ?4)",
            params![game_id.0, wind_speed, temperature, precipitation],
        )?;
        Ok(())
    }

    /// Reporting join: per-date averages of points and weather values.
    /// Read-only; games without weather rows are excluded by the inner join.
    pub fn daily_summary(&self) -> Result<Vec<DailySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT dates.game_date,
                    AVG((games.winner_score + games.loser_score) / 2.0),
                    AVG(weather.wind_speed),
                    AVG(weather.precipitation),
                    AVG(weather.temperature)
             FROM games
             JOIN dates ON games.date_id = dates.id
             JOIN weather ON games.id = weather.game_id
             GROUP BY dates.game_date
             ORDER BY dates.game_date",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DailySummary {
                    game_date: row.get(0)?,
                    average_points: row.get(1)?,
                    wind_speed: row.get(2)?,
                    precipitation: row.get(3)?,
                    temperature: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete every row from every table and reset identity counters.
    /// Destructive and out of the hot path; only the explicit `wipe`
    /// subcommand reaches this.
    pub fn wipe(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM weather;
             DELETE FROM geocoding;
             DELETE FROM games;
             DELETE FROM teams;
             DELETE FROM dates;
             DELETE FROM locations;",
        )?;
        // sqlite_sequence only exists once an AUTOINCREMENT insert happened
        if let Err(e) = self.conn.execute("DELETE FROM sqlite_sequence", []) {
            debug!("identity counters already clear: {}", e);
        }
        info!("store wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_game(store: &GameStore, winner: &str, loser: &str, scores: (u32, u32)) -> GameId {
        let location = store.resolve_location("Round Rock", "TX").unwrap();
        let date = store.resolve_date("10/12/2024").unwrap();
        let w = store.resolve_team(winner).unwrap();
        let l = store.resolve_team(loser).unwrap();
        match store
            .insert_game(location, date, w, l, scores.0, scores.1)
            .unwrap()
        {
            InsertOutcome::Inserted(id) => id,
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn dimension_resolution_is_stable() {
        let store = GameStore::open_in_memory().unwrap();

        let a = store.resolve_location("Round Rock", "TX").unwrap();
        let b = store.resolve_location("Round Rock", "TX").unwrap();
        assert_eq!(a, b);

        let t1 = store.resolve_team("Alabama").unwrap();
        let t2 = store.resolve_team("Alabama").unwrap();
        assert_eq!(t1, t2);

        let d1 = store.resolve_date("10/12/2024").unwrap();
        let d2 = store.resolve_date("10/12/2024").unwrap();
        assert_eq!(d1, d2);

        // Different values get different ids
        assert_ne!(a, store.resolve_location("Austin", "TX").unwrap());
        assert_ne!(t1, store.resolve_team("Auburn").unwrap());
    }

    #[test]
    fn duplicate_games_are_detected() {
        let store = GameStore::open_in_memory().unwrap();
        seeded_game(&store, "Alabama", "Auburn", (13, 11));

        let location = store.resolve_location("Round Rock", "TX").unwrap();
        let date = store.resolve_date("10/12/2024").unwrap();
        let w = store.resolve_team("Alabama").unwrap();
        let l = store.resolve_team("Auburn").unwrap();
        assert_eq!(
            store.insert_game(location, date, w, l, 13, 11).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(store.game_count().unwrap(), 1);

        // A different score pair is a different game
        assert!(matches!(
            store.insert_game(location, date, w, l, 15, 11).unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert_eq!(store.game_count().unwrap(), 2);
    }

    #[test]
    fn pending_geocoding_respects_limit_and_predicate() {
        let store = GameStore::open_in_memory().unwrap();
        let a = seeded_game(&store, "Alabama", "Auburn", (13, 11));
        let b = seeded_game(&store, "Georgia", "Clemson", (15, 9));
        let c = seeded_game(&store, "Texas", "Baylor", (12, 10));

        assert_eq!(store.pending_geocoding(25).unwrap().len(), 3);
        assert_eq!(store.pending_geocoding(2).unwrap().len(), 2);

        store.insert_geocoding(a, 30.5, -97.6).unwrap();
        let pending = store.pending_geocoding(25).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].game_id, b);
        assert_eq!(pending[1].game_id, c);
        assert_eq!(pending[0].city, "Round Rock");
    }

    #[test]
    fn pending_weather_requires_geocoding() {
        let store = GameStore::open_in_memory().unwrap();
        let a = seeded_game(&store, "Alabama", "Auburn", (13, 11));
        let b = seeded_game(&store, "Georgia", "Clemson", (15, 9));

        // No coordinates yet: nothing is eligible
        assert!(store.pending_weather(25).unwrap().is_empty());

        store.insert_geocoding(a, 30.5, -97.6).unwrap();
        store.insert_geocoding(b, 33.7, -84.4).unwrap();
        assert_eq!(store.pending_weather(25).unwrap().len(), 2);

        store.insert_weather(a, 12, 68, 3).unwrap();
        let pending = store.pending_weather(25).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].game_id, b);
        assert_eq!(pending[0].game_date, "10/12/2024");
    }

    #[test]
    fn daily_summary_averages_per_date() {
        let store = GameStore::open_in_memory().unwrap();
        let a = seeded_game(&store, "Alabama", "Auburn", (13, 11)); // avg 12
        let b = seeded_game(&store, "Georgia", "Clemson", (15, 9)); // avg 12
        store.insert_geocoding(a, 30.5, -97.6).unwrap();
        store.insert_geocoding(b, 30.5, -97.6).unwrap();
        store.insert_weather(a, 10, 70, 2).unwrap();
        store.insert_weather(b, 20, 60, 4).unwrap();

        let summary = store.daily_summary().unwrap();
        assert_eq!(summary.len(), 1);
        let row = &summary[0];
        assert_eq!(row.game_date, "10/12/2024");
        assert!((row.average_points - 12.0).abs() < f64::EPSILON);
        assert!((row.wind_speed - 15.0).abs() < f64::EPSILON);
        assert!((row.precipitation - 3.0).abs() < f64::EPSILON);
        assert!((row.temperature - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_excludes_games_without_weather() {
        let store = GameStore::open_in_memory().unwrap();
        let a = seeded_game(&store, "Alabama", "Auburn", (13, 11));
        seeded_game(&store, "Georgia", "Clemson", (15, 9));
        store.insert_geocoding(a, 30.5, -97.6).unwrap();
        store.insert_weather(a, 10, 70, 2).unwrap();

        let summary = store.daily_summary().unwrap();
        assert_eq!(summary.len(), 1);
        assert!((summary[0].average_points - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wipe_clears_everything() {
        let store = GameStore::open_in_memory().unwrap();
        let a = seeded_game(&store, "Alabama", "Auburn", (13, 11));
        store.insert_geocoding(a, 30.5, -97.6).unwrap();
        store.insert_weather(a, 10, 70, 2).unwrap();

        store.wipe().unwrap();
        assert_eq!(store.game_count().unwrap(), 0);
        assert!(store.stored_games().unwrap().is_empty());
        assert!(store.pending_geocoding(25).unwrap().is_empty());

        // Identity counters restart
        let id = seeded_game(&store, "Alabama", "Auburn", (13, 11));
        assert_eq!(id, GameId(1));
    }
}
