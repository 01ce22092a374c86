//! Type definitions for block, MEV-event, and internal-transfer data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// On-chain block data, simplified to the fields attribution needs.
///
/// Serialized with the upstream camelCase field names so cached block files
/// round-trip against the raw `eth_getBlockByNumber` schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block number.
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    /// Block hash (lowercase hex with 0x prefix).
    pub hash: String,
    /// Raw extradata field (hex with 0x prefix), as published by the builder.
    #[serde(rename = "extraData")]
    pub extra_data: String,
    /// Fee recipient address (lowercase hex). Can be the builder or the proposer.
    #[serde(rename = "feeRecipient")]
    pub fee_recipient: String,
    /// Base fee per gas in Wei.
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: u128,
    /// Gas used by the whole block.
    #[serde(rename = "gasUsed")]
    pub gas_used: u64,
    /// Block gas limit.
    #[serde(rename = "gasLimit")]
    pub gas_limit: u64,
    /// Transactions in execution order, index-addressable.
    pub transactions: Vec<BlockTransaction>,
}

/// Transaction included in a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockTransaction {
    /// Transaction index in block.
    #[serde(rename = "transactionIndex")]
    pub tx_index: u64,
    /// Transaction hash (lowercase hex).
    pub hash: String,
    /// Sender address (lowercase hex).
    #[serde(rename = "from")]
    pub from_address: String,
    /// Recipient address (lowercase hex, `"0x0"` for contract creation).
    #[serde(rename = "to")]
    pub to_address: String,
    /// Gas limit of the transaction.
    pub gas: u64,
    /// Effective gas price in Wei.
    #[serde(rename = "gasPrice")]
    pub gas_price: u128,
    /// Gas actually consumed, from the receipt.
    #[serde(rename = "gasUsed")]
    pub gas_used: u64,
    /// ETH value in Wei.
    pub value: u128,
}

/// MEV classification tag attached to a transaction by the external feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MevType {
    /// Atomic arbitrage.
    Arb,
    /// Frontrun leg of a sandwich.
    Frontrun,
    /// Backrun leg of a sandwich.
    Backrun,
    /// Liquidation.
    Liquid,
    /// Multi-protocol swap re-tagged as likely atomic MEV.
    Uncertain,
    /// Directional swap (non-atomic CEX-DEX candidate).
    Swap,
    /// Victim transaction inside a sandwich.
    Sandwich,
    /// Any tag this pipeline does not recognize; dropped by the dispatcher.
    #[serde(other)]
    Unknown,
}

impl MevType {
    /// Stable lowercase key used in exported maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            MevType::Arb => "arb",
            MevType::Frontrun => "frontrun",
            MevType::Backrun => "backrun",
            MevType::Liquid => "liquid",
            MevType::Uncertain => "uncertain",
            MevType::Swap => "swap",
            MevType::Sandwich => "sandwich",
            MevType::Unknown => "unknown",
        }
    }
}

/// One MEV-flagged transaction record from the external feed.
///
/// Correlated to a [`BlockTransaction`] via `tx_index`. The counterparty
/// addresses are the economically relevant ones and may differ from the raw
/// transaction `from`/`to`. Optional USD fields default to zero at use sites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MevEvent {
    /// Block the event belongs to.
    #[serde(default)]
    pub block_number: u64,
    /// Index of the flagged transaction within its block.
    pub tx_index: u64,
    /// MEV subtype tag.
    pub mev_type: MevType,
    /// Economic source address, if the feed identified one.
    #[serde(default)]
    pub address_from: Option<String>,
    /// Economic destination address (usually the searcher contract).
    #[serde(default)]
    pub address_to: Option<String>,
    /// Extractor profit in USD.
    #[serde(default)]
    pub extractor_profit_usd: Option<f64>,
    /// Extractor swap volume in USD.
    #[serde(default)]
    pub extractor_swap_volume_usd: Option<f64>,
    /// Victim-side swap volume in USD.
    #[serde(default)]
    pub user_swap_volume_usd: Option<f64>,
    /// Protocol label, `"multiple"` for multi-hop swaps.
    #[serde(default)]
    pub protocol: Option<String>,
}

impl MevEvent {
    /// Extractor profit with the absent-field-is-zero convention.
    pub fn profit_usd(&self) -> f64 {
        self.extractor_profit_usd.unwrap_or(0.0)
    }

    /// Extractor swap volume with the absent-field-is-zero convention.
    pub fn volume_usd(&self) -> f64 {
        self.extractor_swap_volume_usd.unwrap_or(0.0)
    }

    /// Victim swap volume with the absent-field-is-zero convention.
    pub fn user_volume_usd(&self) -> f64 {
        self.user_swap_volume_usd.unwrap_or(0.0)
    }
}

/// Simplified internal transfer whose destination is the block's fee recipient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalTransfer {
    /// Transfer sender (lowercase hex).
    #[serde(rename = "from")]
    pub from_address: String,
    /// Transfer recipient (the fee recipient, lowercase hex).
    #[serde(rename = "to")]
    pub to_address: String,
    /// Transferred value in ETH.
    pub value: f64,
}

/// Transfer lookup for one block: transaction hash → fee-recipient transfer.
pub type TransferIndex = HashMap<String, InternalTransfer>;

/// Transfer indices for a batch of blocks, keyed by block number.
pub type BlockTransfers = HashMap<u64, TransferIndex>;
