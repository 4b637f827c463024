//! Pipeline configuration: endpoints, batch caps, and environment overrides.
//!
//! Values that sit on a per-row path are cached behind a `OnceLock` so the
//! environment is consulted once per run.

use std::sync::OnceLock;

/// OpenWeatherMap direct geocoding endpoint
pub const GEOCODING_API_BASE: &str = "http://api.openweathermap.org/geo/1.0/direct";

/// Open-Meteo historical weather archive endpoint
pub const WEATHER_API_BASE: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Default cap on new fact/enrichment rows created per invocation.
/// Bounds external-call volume; remaining rows are picked up by later runs.
const DEFAULT_BATCH_CAP: usize = 25;

/// Default SQLite database path
pub const DEFAULT_DB_PATH: &str = "games.db";

/// Default input file listing event-info page URLs, one per line
pub const DEFAULT_EVENT_PAGES: &str = "event_pages.txt";

/// Default input file listing schedule/bracket page URLs, paired
/// positionally with the event pages file
pub const DEFAULT_SCHEDULE_PAGES: &str = "schedule_pages.txt";

/// HTTP request timeout for all outbound calls
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// User agent sent on every outbound request
pub const USER_AGENT: &str = "frisbee-weather/0.1";

/// Timezone the weather archive resolves daily values against
const DEFAULT_WEATHER_TIMEZONE: &str = "America/New_York";

/// Per-run cap on newly created rows of a given kind.
///
/// Reads `MAX_NEW_GAMES` (must be > 0) and falls back to the default of 25.
/// Cached after first call.
pub fn batch_cap() -> usize {
    static CACHED: OnceLock<usize> = OnceLock::new();
    *CACHED.get_or_init(|| {
        std::env::var("MAX_NEW_GAMES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_BATCH_CAP)
    })
}

/// SQLite database path, from `FRISBEE_DB` or the default.
pub fn db_path() -> String {
    std::env::var("FRISBEE_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

/// OpenWeatherMap API key, required by the geocoding pass.
pub fn geocoding_api_key() -> anyhow::Result<String> {
    std::env::var("GEOCODING_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("GEOCODING_API_KEY is not set"))
}

/// Timezone parameter for the weather archive, from `WEATHER_TIMEZONE`.
pub fn weather_timezone() -> String {
    std::env::var("WEATHER_TIMEZONE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WEATHER_TIMEZONE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_cap_default_is_bounded() {
        // The cached value is whatever the environment said at first call;
        // it must always be positive.
        assert!(batch_cap() > 0);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        std::env::remove_var("GEOCODING_API_KEY");
        assert!(geocoding_api_key().is_err());
    }
}
