//! Alloy RPC provider integration for fetching on-chain block data.
//!
//! Pulls blocks with full transactions plus block receipts, and simplifies
//! them down to the schema the attribution engine consumes. Raw JSON-RPC is
//! used so the simplification controls exactly which fields survive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::types::{Block, BlockTransaction};

type ProviderType = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider<Ethereum>,
>;

/// Fetches and simplifies full blocks from an Ethereum RPC endpoint.
pub struct BlockFetcher {
    provider: Arc<ProviderType>,
}

impl BlockFetcher {
    /// Creates a new fetcher and tests RPC connectivity via `eth_blockNumber`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connectivity test fails.
    #[tracing::instrument(skip_all, fields(rpc_url = %rpc_url))]
    pub async fn new(rpc_url: &str) -> Result<Self> {
        let provider =
            ProviderBuilder::new().on_http(rpc_url.parse().wrap_err("invalid RPC URL format")?);
        let provider = Arc::new(provider);

        let latest = provider
            .get_block_number()
            .await
            .wrap_err("failed to test RPC connectivity with eth_blockNumber")?;

        tracing::info!(latest_block = latest, "RPC connection successful");

        Ok(Self { provider })
    }

    /// Fetches one block with full transactions and per-tx gas used.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    ///
    /// # Errors
    /// Returns an error if an RPC call fails or a required field is missing.
    #[tracing::instrument(skip(self), fields(block_number))]
    pub async fn fetch_block(&self, block_number: u64) -> Result<Option<Block>> {
        let tag = format!("0x{block_number:x}");

        let raw: Value = self
            .provider
            .raw_request("eth_getBlockByNumber".into(), (tag.clone(), true))
            .await
            .wrap_err_with(|| format!("failed to fetch block {}", block_number))?;

        if raw.is_null() {
            tracing::debug!(block_number, "block not found");
            return Ok(None);
        }

        let receipts: Value = self
            .provider
            .raw_request("eth_getBlockReceipts".into(), (tag,))
            .await
            .wrap_err_with(|| format!("failed to fetch receipts for block {}", block_number))?;

        Ok(Some(simplify_block(block_number, &raw, &receipts)?))
    }

    /// Fetches a range of blocks with rate limiting, retries, and progress.
    ///
    /// - Limits to 10 concurrent RPC calls via `tokio::sync::Semaphore`
    /// - Retries failed blocks up to 3 times with 500ms exponential backoff
    /// - Logs and skips missing or persistently failing blocks
    #[tracing::instrument(skip(self), fields(start, end))]
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<HashMap<u64, Block>> {
        let semaphore = Arc::new(Semaphore::new(10));
        let pb = ProgressBar::new(end.saturating_sub(start) + 1);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks")
                .unwrap(),
        );

        let mut handles = Vec::new();
        for block_number in start..=end {
            let sem = semaphore.clone();
            let provider = self.provider.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();
                let fetcher = BlockFetcher { provider };

                for attempt in 0..3 {
                    match fetcher.fetch_block(block_number).await {
                        Ok(result) => return Ok((block_number, result)),
                        Err(_e) if attempt < 2 => {
                            let backoff_ms = 500 * 2_u64.pow(attempt);
                            tracing::debug!(
                                block_number,
                                attempt = attempt + 1,
                                backoff_ms,
                                "retrying failed block fetch"
                            );
                            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        }
                        Err(e) => return Err((block_number, e)),
                    }
                }
                unreachable!()
            }));
        }

        let mut blocks = HashMap::new();
        for handle in handles {
            match handle.await {
                Ok(Ok((block_number, Some(block)))) => {
                    blocks.insert(block_number, block);
                    pb.inc(1);
                }
                Ok(Ok((block_number, None))) => {
                    tracing::warn!(block_number, "block not found in RPC");
                    pb.inc(1);
                }
                Ok(Err((block_number, e))) => {
                    tracing::error!(
                        block_number,
                        "failed to fetch block after 3 retries: {e:#}"
                    );
                    pb.inc(1);
                }
                Err(e) => tracing::error!("block task join error: {}", e),
            }
        }

        pb.finish_with_message("fetched all blocks");
        Ok(blocks)
    }
}

fn hex_field_u64(value: &Value, key: &str) -> u64 {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(parse_hex_u128)
        .unwrap_or(0) as u64
}

fn hex_field_u128(value: &Value, key: &str) -> u128 {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(parse_hex_u128)
        .unwrap_or(0)
}

fn str_field_lower(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_lowercase()
}

/// Parses a `0x`-prefixed (or bare) hex quantity; malformed input reads as 0.
pub fn parse_hex_u128(value: &str) -> u128 {
    let stripped = value.trim().trim_start_matches("0x");
    if stripped.is_empty() {
        return 0;
    }
    u128::from_str_radix(stripped, 16).unwrap_or(0)
}

/// Simplifies a raw block + receipt response down to the attribution schema.
fn simplify_block(block_number: u64, raw: &Value, receipts: &Value) -> Result<Block> {
    // receipt gasUsed keyed by tx hash
    let mut gas_used_by_hash: HashMap<String, u64> = HashMap::new();
    if let Some(receipts) = receipts.as_array() {
        for receipt in receipts {
            if let Some(hash) = receipt.get("transactionHash").and_then(Value::as_str) {
                gas_used_by_hash.insert(hash.to_lowercase(), hex_field_u64(receipt, "gasUsed"));
            }
        }
    }

    let raw_txs = raw
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre!("block {block_number} response has no transactions array"))?;

    let mut transactions = Vec::with_capacity(raw_txs.len());
    for tx in raw_txs {
        let hash = str_field_lower(tx, "hash", "");
        let gas_used = gas_used_by_hash.get(&hash).copied().unwrap_or(0);
        transactions.push(BlockTransaction {
            tx_index: hex_field_u64(tx, "transactionIndex"),
            hash,
            from_address: str_field_lower(tx, "from", ""),
            to_address: str_field_lower(tx, "to", "0x0"),
            gas: hex_field_u64(tx, "gas"),
            gas_price: hex_field_u128(tx, "gasPrice"),
            gas_used,
            value: hex_field_u128(tx, "value"),
        });
    }

    Ok(Block {
        block_number,
        hash: str_field_lower(raw, "hash", ""),
        extra_data: raw
            .get("extraData")
            .and_then(Value::as_str)
            .unwrap_or("0x")
            .to_string(),
        fee_recipient: str_field_lower(raw, "miner", ""),
        base_fee_per_gas: hex_field_u128(raw, "baseFeePerGas"),
        gas_used: hex_field_u64(raw, "gasUsed"),
        gas_limit: hex_field_u64(raw, "gasLimit"),
        transactions,
    })
}
