//! Shared attribution state.
//!
//! Every in-flight block task writes into the same nested builder→searcher
//! maps. Each cell update happens under a `DashMap` shard lock, which makes
//! the read-modify-write atomic at the cell granularity; the invariant the
//! engine needs is only that every event contributes exactly once, not that
//! blocks land in any particular order. Aggregation reads the state strictly
//! after all block tasks have joined, through [`AttributionState::snapshot`].

use dashmap::DashMap;
use indexmap::IndexMap;
use mev_data::types::{BlockTransaction, MevType};
use serde::{Deserialize, Serialize};

/// Wei per ETH, for normalizing gas bribes into ETH.
pub const WEI_PER_ETH: f64 = 1e18;

/// Nested builder → searcher → metric map shared across block tasks.
pub type SharedMap<V> = DashMap<String, DashMap<String, V>>;

/// Per-searcher metric split by atomic MEV subtype.
///
/// The same shape is used for tx counts, USD profit/volume, and ETH/Wei
/// bribes; `total` carries whatever the subtype policy of the call site adds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtypeStats {
    pub total: f64,
    pub arb: f64,
    pub frontrun: f64,
    pub backrun: f64,
    pub liquid: f64,
    pub uncertain: f64,
}

impl SubtypeStats {
    fn bucket_mut(&mut self, kind: MevType) -> Option<&mut f64> {
        match kind {
            MevType::Arb => Some(&mut self.arb),
            MevType::Frontrun => Some(&mut self.frontrun),
            MevType::Backrun => Some(&mut self.backrun),
            MevType::Liquid => Some(&mut self.liquid),
            MevType::Uncertain => Some(&mut self.uncertain),
            _ => None,
        }
    }

    /// Adds to the subtype bucket and to `total`.
    pub fn add(&mut self, kind: MevType, amount: f64) {
        if let Some(bucket) = self.bucket_mut(kind) {
            *bucket += amount;
            self.total += amount;
        }
    }

    /// Adds to the subtype bucket without touching `total`.
    pub fn add_subtype_only(&mut self, kind: MevType, amount: f64) {
        if let Some(bucket) = self.bucket_mut(kind) {
            *bucket += amount;
        }
    }

    /// Adds to `total` without a subtype bucket.
    pub fn add_total_only(&mut self, amount: f64) {
        self.total += amount;
    }
}

/// Evidence record for a coinbase-transfer or trailing-transfer bribe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferBribe {
    /// Hash of the attributed swap transaction.
    pub hash: String,
    /// Builder that received the bribe.
    pub builder: String,
    /// Bribe value in ETH.
    pub bribe: f64,
}

/// Evidence record for a top-of-block gas-priority attribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopOfBlockBribe {
    /// Hash of the attributed swap transaction.
    pub hash: String,
    /// Builder of the containing block.
    pub builder: String,
    /// Transaction index within the block.
    pub index: u64,
    /// Effective gas price in Wei.
    pub gas_price: u128,
    /// Gas limit of the transaction.
    pub gas: u64,
    /// Median gas price of the block, for later plausibility checks.
    pub block_median_gas: f64,
}

/// All maps mutated by the attribution engine.
#[derive(Debug, Default)]
pub struct AttributionState {
    // atomic domain
    pub atomic_block_totals: DashMap<String, u64>,
    pub atomic_blocks: SharedMap<u64>,
    pub atomic_txs: SharedMap<SubtypeStats>,
    pub atomic_profit: SharedMap<SubtypeStats>,
    pub atomic_volume: SharedMap<SubtypeStats>,
    pub atomic_coin_bribes: SharedMap<SubtypeStats>,
    pub atomic_gas_bribes: SharedMap<SubtypeStats>,
    pub atomic_volume_lists: SharedMap<Vec<f64>>,

    // non-atomic (CEX-DEX) domain
    pub nonatomic_block_totals: DashMap<String, u64>,
    pub nonatomic_blocks: SharedMap<u64>,
    pub nonatomic_txs: SharedMap<f64>,
    pub nonatomic_volume: SharedMap<f64>,
    pub nonatomic_coin_bribes: SharedMap<f64>,
    pub nonatomic_gas_bribes: SharedMap<f64>,
    pub nonatomic_volume_lists: SharedMap<Vec<f64>>,

    // bribe-evidence side channels, append-only, keyed by searcher
    pub coinbase_bribe: DashMap<String, Vec<TransferBribe>>,
    pub after_bribe: DashMap<String, Vec<TransferBribe>>,
    pub tob_bribe: DashMap<String, Vec<TopOfBlockBribe>>,
}

impl AttributionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic, ordered copy of the whole state for aggregation and
    /// export. Must only be called after all block tasks have joined.
    pub fn snapshot(&self) -> AttributionSnapshot {
        AttributionSnapshot {
            atomic: AtomicSnapshot {
                block_totals: freeze_flat(&self.atomic_block_totals),
                blocks: freeze(&self.atomic_blocks),
                txs: freeze(&self.atomic_txs),
                profit: freeze(&self.atomic_profit),
                volume: freeze(&self.atomic_volume),
                coin_bribes: freeze(&self.atomic_coin_bribes),
                gas_bribes: freeze(&self.atomic_gas_bribes),
                volume_lists: freeze(&self.atomic_volume_lists),
            },
            nonatomic: NonAtomicSnapshot {
                block_totals: freeze_flat(&self.nonatomic_block_totals),
                blocks: freeze(&self.nonatomic_blocks),
                txs: freeze(&self.nonatomic_txs),
                volume: freeze(&self.nonatomic_volume),
                coin_bribes: freeze(&self.nonatomic_coin_bribes),
                gas_bribes: freeze(&self.nonatomic_gas_bribes),
                volume_lists: freeze(&self.nonatomic_volume_lists),
            },
            evidence: EvidenceSnapshot {
                coinbase_bribe: freeze_flat(&self.coinbase_bribe),
                after_bribe: freeze_flat(&self.after_bribe),
                tob_bribe: freeze_flat(&self.tob_bribe),
            },
        }
    }
}

/// Atomic-domain view of the state, ordered and detached.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AtomicSnapshot {
    pub block_totals: IndexMap<String, u64>,
    pub blocks: IndexMap<String, IndexMap<String, u64>>,
    pub txs: IndexMap<String, IndexMap<String, SubtypeStats>>,
    pub profit: IndexMap<String, IndexMap<String, SubtypeStats>>,
    pub volume: IndexMap<String, IndexMap<String, SubtypeStats>>,
    pub coin_bribes: IndexMap<String, IndexMap<String, SubtypeStats>>,
    pub gas_bribes: IndexMap<String, IndexMap<String, SubtypeStats>>,
    pub volume_lists: IndexMap<String, IndexMap<String, Vec<f64>>>,
}

/// Non-atomic-domain view of the state, ordered and detached.
#[derive(Clone, Debug, Default, Serialize)]
pub struct NonAtomicSnapshot {
    pub block_totals: IndexMap<String, u64>,
    pub blocks: IndexMap<String, IndexMap<String, u64>>,
    pub txs: IndexMap<String, IndexMap<String, f64>>,
    pub volume: IndexMap<String, IndexMap<String, f64>>,
    pub coin_bribes: IndexMap<String, IndexMap<String, f64>>,
    pub gas_bribes: IndexMap<String, IndexMap<String, f64>>,
    pub volume_lists: IndexMap<String, IndexMap<String, Vec<f64>>>,
}

/// Raw bribe evidence keyed by searcher.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EvidenceSnapshot {
    pub coinbase_bribe: IndexMap<String, Vec<TransferBribe>>,
    pub after_bribe: IndexMap<String, Vec<TransferBribe>>,
    pub tob_bribe: IndexMap<String, Vec<TopOfBlockBribe>>,
}

/// Full ordered view handed to the aggregation layer.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AttributionSnapshot {
    pub atomic: AtomicSnapshot,
    pub nonatomic: NonAtomicSnapshot,
    pub evidence: EvidenceSnapshot,
}

/// Priority fee of a transaction in Wei: `gas_used * (gas_price - base_fee)`.
pub fn priority_fee_wei(tx: &BlockTransaction, block_base_fee: u128) -> u128 {
    (tx.gas_used as u128).saturating_mul(tx.gas_price.saturating_sub(block_base_fee))
}

/// Converts a Wei amount to ETH.
pub fn wei_to_eth(wei: u128) -> f64 {
    wei as f64 / WEI_PER_ETH
}

// Cell-level mutation helpers, shared by the attributors and by tests that
// assemble states directly. Lock order is always outer shard then inner
// shard, so nested guards cannot deadlock.

pub fn add_stat<F>(map: &SharedMap<SubtypeStats>, builder: &str, searcher: &str, apply: F)
where
    F: FnOnce(&mut SubtypeStats),
{
    let inner = map.entry(builder.to_string()).or_default();
    let mut cell = inner.entry(searcher.to_string()).or_default();
    apply(&mut cell);
}

pub fn add_value(map: &SharedMap<f64>, builder: &str, searcher: &str, amount: f64) {
    let inner = map.entry(builder.to_string()).or_default();
    *inner.entry(searcher.to_string()).or_default() += amount;
}

pub fn push_volume(map: &SharedMap<Vec<f64>>, builder: &str, searcher: &str, volume: f64) {
    let inner = map.entry(builder.to_string()).or_default();
    inner.entry(searcher.to_string()).or_default().push(volume);
}

pub fn bump_block_total(totals: &DashMap<String, u64>, builder: &str) {
    *totals.entry(builder.to_string()).or_default() += 1;
}

/// Counts `searcher` against the builder's block-count metric at most once
/// per block, via the caller's block-local seen set.
pub fn count_block_once(
    blocks: &SharedMap<u64>,
    builder: &str,
    searcher: &str,
    addrs_seen_in_block: &mut std::collections::HashSet<String>,
) {
    if addrs_seen_in_block.insert(searcher.to_string()) {
        let inner = blocks.entry(builder.to_string()).or_default();
        *inner.entry(searcher.to_string()).or_default() += 1;
    }
}

fn freeze<V: Clone>(map: &SharedMap<V>) -> IndexMap<String, IndexMap<String, V>> {
    let mut outer: Vec<(String, IndexMap<String, V>)> = map
        .iter()
        .map(|entry| {
            let mut inner: Vec<(String, V)> = entry
                .value()
                .iter()
                .map(|cell| (cell.key().clone(), cell.value().clone()))
                .collect();
            inner.sort_by(|a, b| a.0.cmp(&b.0));
            (entry.key().clone(), inner.into_iter().collect())
        })
        .collect();
    outer.sort_by(|a, b| a.0.cmp(&b.0));
    outer.into_iter().collect()
}

fn freeze_flat<V: Clone>(map: &DashMap<String, V>) -> IndexMap<String, V> {
    let mut entries: Vec<(String, V)> = map
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().collect()
}
