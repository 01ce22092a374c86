//! Zeromev MEV-classification feed client.
//!
//! The feed returns, for a block number, the list of transactions it flagged
//! as MEV together with their subtype and counterparty addresses. A block
//! whose feed request fails contributes no per-transaction attributions, only
//! its block count; failures are therefore logged and swallowed at the range
//! level rather than failing a batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::types::MevEvent;

const DEFAULT_FEED_URL: &str = "https://data.zeromev.org/v1/mevBlock";

/// HTTP client for the per-block MEV event feed.
pub struct MevFeed {
    client: reqwest::Client,
    base_url: String,
}

impl Default for MevFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MevFeed {
    /// Creates a client against the public Zeromev endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_FEED_URL)
    }

    /// Creates a client against a custom endpoint (used by tests and mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetches the MEV events of one block.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-2xx status, or a
    /// malformed response body.
    pub async fn mev_block(&self, block_number: u64) -> Result<Vec<MevEvent>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("block_number", block_number.to_string()),
                ("count", "1".to_string()),
            ])
            .send()
            .await
            .wrap_err_with(|| format!("mev feed request failed for block {}", block_number))?;

        if !response.status().is_success() {
            return Err(eyre!(
                "mev feed returned status {} for block {}",
                response.status(),
                block_number
            ));
        }

        response
            .json::<Vec<MevEvent>>()
            .await
            .wrap_err_with(|| format!("malformed mev feed body for block {}", block_number))
    }

    /// Fetches events for a set of blocks with bounded concurrency.
    ///
    /// Each block is retried up to 3 times with exponential backoff. Blocks
    /// that still fail are logged and omitted from the result; the caller
    /// treats a missing entry as "feed unavailable" for that block.
    #[tracing::instrument(skip_all, fields(blocks = block_numbers.len()))]
    pub async fn fetch_range(
        self: Arc<Self>,
        block_numbers: &[u64],
        concurrency: usize,
    ) -> HashMap<u64, Vec<MevEvent>> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let pb = ProgressBar::new(block_numbers.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} mev blocks")
                .unwrap(),
        );

        let mut handles = Vec::new();
        for &block_number in block_numbers {
            let sem = semaphore.clone();
            let feed = self.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();

                for attempt in 0..3 {
                    match feed.mev_block(block_number).await {
                        Ok(events) => return Some((block_number, events)),
                        Err(e) if attempt < 2 => {
                            let backoff_ms = 500 * 2_u64.pow(attempt);
                            tracing::debug!(
                                block_number,
                                attempt = attempt + 1,
                                backoff_ms,
                                "retrying mev feed fetch: {e:#}"
                            );
                            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                block_number,
                                "mev feed unavailable after 3 attempts: {e:#}"
                            );
                            return None;
                        }
                    }
                }
                unreachable!()
            }));
        }

        let mut events_by_block = HashMap::new();
        for handle in handles {
            match handle.await {
                Ok(Some((block_number, events))) => {
                    events_by_block.insert(block_number, events);
                    pb.inc(1);
                }
                Ok(None) => pb.inc(1),
                Err(e) => tracing::error!("feed task join error: {}", e),
            }
        }

        pb.finish_and_clear();
        events_by_block
    }
}
