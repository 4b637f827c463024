//! Per-date aggregation export.
//!
//! Pure read side: joins games, dates, and weather, averages per date, and
//! writes the summary CSV consumed by the external visualization step.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::store::{DailySummary, GameStore};

const CSV_HEADER: &str = "game_date,average_points,wind_speed,precipitation,temperature";

fn render_csv(rows: &[DailySummary]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows {
        // game_date is MM/DD/YYYY and never contains commas or quotes
        let _ = writeln!(
            out,
            "{},{:.2},{:.2},{:.2},{:.2}",
            row.game_date, row.average_points, row.wind_speed, row.precipitation, row.temperature
        );
    }
    out
}

/// Write the per-date aggregate table to `path`. Returns the row count.
pub fn write_csv<P: AsRef<Path>>(store: &GameStore, path: P) -> Result<usize> {
    let rows = store.daily_summary()?;
    std::fs::write(path.as_ref(), render_csv(&rows))
        .with_context(|| format!("writing {}", path.as_ref().display()))?;
    info!(
        "wrote {} aggregate rows to {}",
        rows.len(),
        path.as_ref().display()
    );
    Ok(rows.len())
}
