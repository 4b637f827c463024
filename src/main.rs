//! Command-line entry point.
//!
//! One subcommand per pipeline stage, each a single idempotent run:
//! `scrape` folds new games into the store, `geocode` and `weather` fill the
//! enrichment tables one bounded batch at a time, `report` writes the
//! per-date CSV, and `wipe` destroys everything (explicit `--yes` required).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use frisbee_weather::config;
use frisbee_weather::fetch::PageFetcher;
use frisbee_weather::geocode::{self, GeocodeClient};
use frisbee_weather::logging;
use frisbee_weather::pipeline;
use frisbee_weather::report;
use frisbee_weather::store::GameStore;
use frisbee_weather::weather::{self, WeatherClient};

#[derive(Parser)]
#[command(
    name = "frisbee-weather",
    about = "Scrape ultimate-frisbee tournament results and correlate them with weather",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape event/schedule page pairs and store new games
    Scrape {
        /// File listing event-info page URLs, one per line
        #[arg(long)]
        events: Option<PathBuf>,
        /// File listing schedule/bracket page URLs, paired positionally
        #[arg(long)]
        schedules: Option<PathBuf>,
    },
    /// Geocode stored games that have no coordinates yet
    Geocode,
    /// Fetch historical weather for geocoded games without weather rows
    Weather,
    /// Write the per-date aggregate table as CSV
    Report {
        #[arg(long, default_value = "calculations.csv")]
        out: PathBuf,
    },
    /// Delete every stored row and reset identity counters
    Wipe {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging();

    let store = GameStore::open(config::db_path())?;

    match cli.command {
        Command::Scrape { events, schedules } => {
            let events = events.unwrap_or_else(|| config::DEFAULT_EVENT_PAGES.into());
            let schedules = schedules.unwrap_or_else(|| config::DEFAULT_SCHEDULE_PAGES.into());
            let event_urls = pipeline::read_url_list(&events)?;
            let schedule_urls = pipeline::read_url_list(&schedules)?;
            info!(
                "scraping {} page pairs (cap {})",
                event_urls.len().min(schedule_urls.len()),
                config::batch_cap()
            );

            let mut fetcher = PageFetcher::new();
            let summary = pipeline::run_scrape(
                &store,
                &mut fetcher,
                &event_urls,
                &schedule_urls,
                config::batch_cap(),
            )
            .await?;

            info!("{} distinct pages fetched", fetcher.fetched_count());
            println!("Total games in database: {}", summary.total_games);
            println!("New games added this run: {}", summary.new_games);
        }
        Command::Geocode => {
            let client = GeocodeClient::new(config::geocoding_api_key()?);
            let outcome = geocode::run_geocoding_pass(&store, &client, config::batch_cap()).await?;
            println!(
                "Geocoded {} of {} pending games ({} failed)",
                outcome.enriched, outcome.attempted, outcome.failed
            );
        }
        Command::Weather => {
            let client = WeatherClient::new();
            let outcome = weather::run_weather_pass(&store, &client, config::batch_cap()).await?;
            println!(
                "Fetched weather for {} of {} pending games ({} failed)",
                outcome.enriched, outcome.attempted, outcome.failed
            );
        }
        Command::Report { out } => {
            let rows = report::write_csv(&store, &out)?;
            println!("Wrote {} aggregate rows to {}", rows, out.display());
        }
        Command::Wipe { yes } => {
            if !yes {
                anyhow::bail!("refusing to wipe the store without --yes");
            }
            store.wipe()?;
            println!("Store wiped");
        }
    }

    Ok(())
}
