//! Internal-transfer index builder.
//!
//! Uses `alchemy_getAssetTransfers` to pull the internal (trace-level) ETH
//! transfers landing on a block's fee recipient, simplified down to
//! `tx hash → {from, to, value}`. Direct coinbase-style payments are the
//! strongest bribe evidence the attributors have.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Context, Result};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::types::{Block, BlockTransfers, InternalTransfer, TransferIndex};

#[derive(Debug, Deserialize)]
struct AssetTransfersResponse {
    result: Option<AssetTransfersResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AssetTransfersResult {
    transfers: Vec<RawAssetTransfer>,
}

#[derive(Debug, Deserialize)]
struct RawAssetTransfer {
    hash: String,
    from: String,
    to: Option<String>,
    value: Option<f64>,
}

/// Fetches fee-recipient internal transfers per block.
pub struct TransferFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl TransferFetcher {
    /// Creates a fetcher against an Alchemy-compatible JSON-RPC endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Fetches the internal transfers sent to `fee_recipient` within one block.
    ///
    /// # Errors
    /// Returns an error on transport failure or an RPC-level error object.
    pub async fn internal_transfers_to(
        &self,
        block_number: u64,
        fee_recipient: &str,
    ) -> Result<TransferIndex> {
        let payload = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "alchemy_getAssetTransfers",
            "params": [{
                "category": ["internal"],
                "toAddress": fee_recipient,
                "fromBlock": format!("0x{block_number:x}"),
                "toBlock": format!("0x{block_number:x}"),
            }],
        });

        let response: AssetTransfersResponse = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .wrap_err_with(|| format!("asset transfer request failed for block {block_number}"))?
            .json()
            .await
            .wrap_err_with(|| format!("malformed asset transfer body for block {block_number}"))?;

        if let Some(error) = response.error {
            return Err(eyre!(
                "asset transfer rpc error for block {block_number}: {error}"
            ));
        }

        let transfers = response
            .result
            .ok_or_else(|| eyre!("asset transfer response missing result"))?
            .transfers;

        Ok(simplify_transfers(transfers))
    }

    /// Builds the per-block transfer index for a whole batch of blocks.
    ///
    /// Bounded concurrency, 3 attempts per block with backoff. A block whose
    /// transfers cannot be fetched is logged and left out of the result; the
    /// attribution engine treats a missing index as an empty one.
    #[tracing::instrument(skip_all, fields(blocks = blocks.len()))]
    pub async fn fetch_for_blocks(
        self: Arc<Self>,
        blocks: &HashMap<u64, Block>,
        concurrency: usize,
    ) -> BlockTransfers {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let mut handles = Vec::new();
        for (&block_number, block) in blocks {
            let sem = semaphore.clone();
            let fetcher = self.clone();
            let fee_recipient = block.fee_recipient.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();

                for attempt in 0..3 {
                    match fetcher
                        .internal_transfers_to(block_number, &fee_recipient)
                        .await
                    {
                        Ok(index) => return Some((block_number, index)),
                        Err(e) if attempt < 2 => {
                            let backoff_ms = 500 * 2_u64.pow(attempt);
                            tracing::debug!(
                                block_number,
                                attempt = attempt + 1,
                                backoff_ms,
                                "retrying transfer fetch: {e:#}"
                            );
                            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                block_number,
                                "internal transfers unavailable after 3 attempts: {e:#}"
                            );
                            return None;
                        }
                    }
                }
                unreachable!()
            }));
        }

        let mut transfers = HashMap::new();
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(Some((block_number, index))) => {
                    transfers.insert(block_number, index);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("transfer task join error: {}", e),
            }
        }
        transfers
    }
}

/// Simplifies raw Alchemy transfer records into the attribution-facing index.
///
/// Transfers with no destination are dropped; a missing value is kept as 0 so
/// the sender still shows up in the coinbase-bribe trail.
fn simplify_transfers(transfers: Vec<RawAssetTransfer>) -> TransferIndex {
    let mut index = TransferIndex::new();
    for transfer in transfers {
        let Some(to) = transfer.to else {
            continue;
        };
        index.insert(
            transfer.hash.to_lowercase(),
            InternalTransfer {
                from_address: transfer.from.to_lowercase(),
                to_address: to.to_lowercase(),
                value: transfer.value.unwrap_or(0.0),
            },
        );
    }
    index
}
