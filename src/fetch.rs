//! Deduplicated page fetching.
//!
//! One shared HTTP client per run, with a per-run body cache so a URL that
//! appears twice in the input lists is fetched once. Scraped pages are not
//! retried: a failed fetch is reported to the caller, which skips the page
//! pair and continues.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use tracing::debug;

use crate::config;

/// Source of raw page bodies. The pipeline is generic over this so tests can
/// substitute canned documents for live HTTP.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&mut self, url: &str) -> Result<String>;
}

/// HTTP-backed page source with a per-run cache.
pub struct PageFetcher {
    http: reqwest::Client,
    cache: HashMap<String, String>,
}

impl PageFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config::HTTP_TIMEOUT_SECS))
                .user_agent(config::USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            cache: HashMap::new(),
        }
    }

    /// Number of distinct pages fetched so far this run.
    pub fn fetched_count(&self) -> usize {
        self.cache.len()
    }
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for PageFetcher {
    async fn fetch_page(&mut self, url: &str) -> Result<String> {
        if let Some(body) = self.cache.get(url) {
            debug!("cache hit for {}", url);
            return Ok(body.clone());
        }

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?;

        if !resp.status().is_success() {
            bail!("HTTP {} fetching {}", resp.status(), url);
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {}", url))?;

        debug!("fetched {} ({} bytes)", url, body.len());
        self.cache.insert(url.to_string(), body.clone());
        Ok(body)
    }
}
