//! Shared incremental enrichment driver.
//!
//! Both enrichment passes (geocoding, weather) run the same loop: take the
//! pending batch, process rows strictly in order, and treat every per-row
//! failure as log-and-skip. A failed row stays unenriched and is picked up
//! again on the next invocation; there is no in-run retry loop at this
//! level.

use anyhow::Result;
use std::future::Future;
use tracing::{info, warn};

/// Counters for one enrichment pass invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub attempted: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Process a batch of pending tasks sequentially.
///
/// `process` performs the external lookup and persists the result for one
/// task; its error is consumed here as a per-row skip, never propagated.
pub async fn run_pass<T, F, Fut>(pass: &str, tasks: Vec<T>, mut process: F) -> PassOutcome
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut outcome = PassOutcome::default();
    for task in tasks {
        outcome.attempted += 1;
        match process(task).await {
            Ok(()) => outcome.enriched += 1,
            Err(e) => {
                outcome.failed += 1;
                warn!("{} row skipped: {:#}", pass, e);
            }
        }
    }
    info!(
        "{} pass complete: {} attempted, {} enriched, {} failed",
        pass, outcome.attempted, outcome.enriched, outcome.failed
    );
    outcome
}
