//! Geocoding enrichment: OpenWeatherMap direct-geocoding client and the
//! incremental pass that fills the `geocoding` table.
//!
//! One API call per pending game, no retry: a failed lookup leaves the row
//! unenriched and eligible for the next run.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config;
use crate::enrich::{self, PassOutcome};
use crate::store::GameStore;

/// Geocoded coordinates for one game's location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// First element of the direct-geocoding response list.
#[derive(Debug, Deserialize)]
struct GeoEntry {
    lat: f64,
    lon: f64,
}

pub struct GeocodeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config::HTTP_TIMEOUT_SECS))
                .user_agent(config::USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: config::GEOCODING_API_BASE.to_string(),
        }
    }

    /// Multi-city event names ("Blaine and Ham Lake") reduce to their first
    /// city token before querying. A deliberate approximation: the first
    /// listed city stands in for the whole metro area.
    pub fn query_city(city: &str) -> &str {
        if city.split_whitespace().any(|word| word == "and") {
            city.split_whitespace().next().unwrap_or(city)
        } else {
            city
        }
    }

    /// Look up coordinates for a city/state pair, restricted to the US.
    pub async fn lookup(&self, city: &str, state: &str) -> Result<Coordinates> {
        let place = format!("{},{},US", Self::query_city(city), state);

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", place.as_str()),
                ("limit", "1"),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("geocoding request for {}", place))?;

        if !resp.status().is_success() {
            bail!("geocoding HTTP {} for {}", resp.status(), place);
        }

        let entries: Vec<GeoEntry> = resp
            .json()
            .await
            .with_context(|| format!("decoding geocoding response for {}", place))?;
        let first = entries
            .first()
            .ok_or_else(|| anyhow!("no geocoding match for {}", place))?;

        Ok(Coordinates {
            lat: first.lat,
            lon: first.lon,
        })
    }
}

/// Run one geocoding pass: select up to `limit` games without coordinates,
/// look each one up, persist successes, skip failures.
pub async fn run_geocoding_pass(
    store: &GameStore,
    client: &GeocodeClient,
    limit: usize,
) -> Result<PassOutcome> {
    let tasks = store.pending_geocoding(limit)?;
    if tasks.is_empty() {
        info!("geocoding: nothing pending");
        return Ok(PassOutcome::default());
    }
    info!("geocoding: {} rows pending", tasks.len());

    let outcome = enrich::run_pass("geocoding", tasks, |task| async move {
        let coords = client.lookup(&task.city, &task.state).await?;
        store.insert_geocoding(task.game_id, coords.lat, coords.lon)?;
        debug!(
            "game {} geocoded to ({:.4}, {:.4})",
            task.game_id, coords.lat, coords.lon
        );
        Ok(())
    })
    .await;

    Ok(outcome)
}
