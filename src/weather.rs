//! Weather enrichment: Open-Meteo archive client and the incremental pass
//! that fills the `weather` table.
//!
//! The only external call in the pipeline with transport-level retry: the
//! archive endpoint rate-limits aggressively and transient 5xx responses are
//! common enough to be worth a bounded backoff before giving the row up to
//! the next run.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::config;
use crate::enrich::{self, PassOutcome};
use crate::retry::{self, RetryPolicy};
use crate::store::GameStore;

/// Daily weather values for one game, truncated to integers for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWeather {
    /// Maximum wind speed, mph
    pub wind_speed: i64,
    /// Maximum temperature, Fahrenheit
    pub temperature: i64,
    /// Hours of precipitation
    pub precipitation: i64,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: DailyBlock,
}

/// One value per requested day; a single-day query yields single-element
/// arrays. Values can be null for dates outside the archive's coverage.
#[derive(Debug, Deserialize)]
struct DailyBlock {
    wind_speed_10m_max: Vec<Option<f64>>,
    precipitation_hours: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
}

/// Rewrite a stored `MM/DD/YYYY` date to the zero-padded `YYYY-MM-DD` form
/// the archive API expects.
pub fn to_iso_date(game_date: &str) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(game_date.trim(), "%m/%d/%Y")
        .with_context(|| format!("malformed game date {:?}", game_date))?;
    Ok(parsed.format("%Y-%m-%d").to_string())
}

pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    timezone: String,
    retry: RetryPolicy,
}

impl WeatherClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config::HTTP_TIMEOUT_SECS))
                .user_agent(config::USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: config::WEATHER_API_BASE.to_string(),
            timezone: config::weather_timezone(),
            retry: RetryPolicy::from_env(),
        }
    }

    /// Fetch the daily values for one coordinate/date, retrying transient
    /// failures per the configured policy.
    pub async fn lookup(&self, lat: f64, lon: f64, iso_date: &str) -> Result<DailyWeather> {
        retry::retry_async(&self.retry, "weather_archive", || {
            self.fetch_daily(lat, lon, iso_date)
        })
        .await
    }

    async fn fetch_daily(&self, lat: f64, lon: f64, iso_date: &str) -> Result<DailyWeather> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("start_date", iso_date.to_string()),
                ("end_date", iso_date.to_string()),
                (
                    "daily",
                    "wind_speed_10m_max,precipitation_hours,temperature_2m_max".to_string(),
                ),
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await
            .with_context(|| format!("weather request for {}", iso_date))?;

        // Keep the reqwest error so the retry layer can classify the status
        let resp = resp.error_for_status()?;

        let body: ArchiveResponse = resp
            .json()
            .await
            .with_context(|| format!("decoding weather response for {}", iso_date))?;

        Ok(DailyWeather {
            wind_speed: first_value(&body.daily.wind_speed_10m_max, "wind_speed_10m_max")?,
            temperature: first_value(&body.daily.temperature_2m_max, "temperature_2m_max")?,
            precipitation: first_value(&body.daily.precipitation_hours, "precipitation_hours")?,
        })
    }
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

/// First daily value, truncated to an integer for storage.
fn first_value(values: &[Option<f64>], variable: &str) -> Result<i64> {
    values
        .first()
        .copied()
        .flatten()
        .map(|v| v.trunc() as i64)
        .ok_or_else(|| anyhow!("archive response missing {}", variable))
}

/// Run one weather pass: select up to `limit` geocoded games without weather
/// rows, fetch each day's values, persist successes, skip failures. Rows
/// with malformed stored dates are skipped the same way.
pub async fn run_weather_pass(
    store: &GameStore,
    client: &WeatherClient,
    limit: usize,
) -> Result<PassOutcome> {
    let tasks = store.pending_weather(limit)?;
    if tasks.is_empty() {
        info!("weather: nothing pending");
        return Ok(PassOutcome::default());
    }
    info!("weather: {} rows pending", tasks.len());

    let outcome = enrich::run_pass("weather", tasks, |task| async move {
        let iso_date = to_iso_date(&task.game_date)?;
        let daily = client.lookup(task.lat, task.lon, &iso_date).await?;
        store.insert_weather(
            task.game_id,
            daily.wind_speed,
            daily.temperature,
            daily.precipitation,
        )?;
        info!(
            "weather for game {} on {}: wind={} mph, temp={} F, precip={} h",
            task.game_id, iso_date, daily.wind_speed, daily.temperature, daily.precipitation
        );
        Ok(())
    })
    .await;

    Ok(outcome)
}
