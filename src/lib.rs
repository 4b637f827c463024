//! Ultimate-frisbee tournament results pipeline.
//!
//! Scrapes event-info and bracket/schedule pages, normalizes game results
//! into a relational SQLite store, and incrementally enriches each game with
//! geocoded coordinates and historical weather data. A read-only reporting
//! step joins the fact and enrichment tables into per-date averages for the
//! downstream visualization layer.
//!
//! Every stage is idempotent: re-running the scrape against overlapping page
//! sets inserts nothing twice, and the enrichment passes can be invoked
//! repeatedly until no rows remain unenriched.

pub mod config;
pub mod enrich;
pub mod extract;
pub mod fetch;
pub mod geocode;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod store;
pub mod types;
pub mod weather;
