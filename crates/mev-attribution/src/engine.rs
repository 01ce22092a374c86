//! Per-block attribution driver and the batch worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mev_data::types::{Block, BlockTransaction, BlockTransfers, MevEvent, TransferIndex};
use tokio::sync::Semaphore;

use crate::builder::resolve_builder;
use crate::dispatch::dispatch;
use crate::state::{bump_block_total, AttributionState};

/// Upper bound on in-flight per-block attribution tasks.
const MAX_CONCURRENT_BLOCKS: usize = 64;

/// Index marking the first ~10% of a block's transactions.
///
/// A transaction placed at or before this boundary qualifies for the
/// top-of-block heuristic.
pub fn top_of_block_boundary(total_txs: usize) -> u64 {
    (total_txs as u64).div_ceil(10)
}

/// Median effective gas price across a block's transactions.
pub fn block_median_gas_price(txs: &[BlockTransaction]) -> f64 {
    if txs.is_empty() {
        return 0.0;
    }
    let mut gas_prices: Vec<u128> = txs.iter().map(|tx| tx.gas_price).collect();
    gas_prices.sort_unstable();

    let mid = gas_prices.len() / 2;
    if gas_prices.len() % 2 == 1 {
        gas_prices[mid] as f64
    } else {
        (gas_prices[mid - 1] as f64 + gas_prices[mid] as f64) / 2.0
    }
}

/// Attributes every MEV event of one block into the shared state.
///
/// The builder is resolved once; both domains' block totals are incremented
/// for every non-empty block, so a block whose feed fetch failed (`events`
/// is `None`) still contributes its block count and nothing else. An event
/// referencing a transaction index out of range is logged and skipped.
pub fn analyze_block(
    state: &AttributionState,
    block: &Block,
    events: Option<&[MevEvent]>,
    transfer_index: Option<&TransferIndex>,
) {
    let total_txs = block.transactions.len();
    if total_txs == 0 {
        return;
    }

    let builder = resolve_builder(&block.extra_data, &block.fee_recipient);
    let fee_recipient = block.fee_recipient.to_lowercase();
    let boundary = top_of_block_boundary(total_txs);
    let median_gas = block_median_gas_price(&block.transactions);
    let empty_index = TransferIndex::new();
    let transfer_index = transfer_index.unwrap_or(&empty_index);

    bump_block_total(&state.atomic_block_totals, &builder);
    bump_block_total(&state.nonatomic_block_totals, &builder);

    let Some(events) = events else {
        return;
    };

    let mut addrs_seen_in_block = HashSet::new();

    for event in events {
        let Some(full_tx) = block.transactions.get(event.tx_index as usize) else {
            tracing::warn!(
                block_number = block.block_number,
                tx_index = event.tx_index,
                total_txs,
                "mev event references a transaction index out of range"
            );
            continue;
        };
        let full_next_tx = block.transactions.get(event.tx_index as usize + 1);

        dispatch(
            state,
            &builder,
            &fee_recipient,
            event,
            full_tx,
            full_next_tx,
            transfer_index,
            boundary,
            block.base_fee_per_gas,
            median_gas,
            &mut addrs_seen_in_block,
        );
    }
}

/// Runs attribution for a batch of blocks on a bounded worker pool.
///
/// One task per block, all writing the same shared maps; a failed task is
/// logged with its block number and affects no other block. Returns only
/// after every task has joined, so the caller may snapshot immediately.
#[tracing::instrument(skip_all, fields(blocks = blocks.len()))]
pub async fn analyze_blocks(
    blocks: Arc<HashMap<u64, Block>>,
    transfers: Arc<BlockTransfers>,
    events: Arc<HashMap<u64, Vec<MevEvent>>>,
) -> Arc<AttributionState> {
    let state = Arc::new(AttributionState::new());
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_BLOCKS));

    let mut handles = Vec::with_capacity(blocks.len());
    for &block_number in blocks.keys() {
        let sem = semaphore.clone();
        let state = state.clone();
        let blocks = blocks.clone();
        let transfers = transfers.clone();
        let events = events.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire().await.ok();
            let block = &blocks[&block_number];
            analyze_block(
                &state,
                block,
                events.get(&block_number).map(Vec::as_slice),
                transfers.get(&block_number),
            );
        });
        handles.push((block_number, handle));
    }

    for (block_number, handle) in handles {
        if let Err(e) = handle.await {
            tracing::error!(block_number, "block attribution task failed: {}", e);
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use mev_data::types::MevType;

    fn mk_tx(index: u64, gas_price: u128) -> BlockTransaction {
        BlockTransaction {
            tx_index: index,
            hash: format!("0xt{index}"),
            from_address: "0xsender".to_string(),
            to_address: "0xrouter".to_string(),
            gas: 100_000,
            gas_price,
            gas_used: 80_000,
            value: 0,
        }
    }

    fn mk_block(number: u64, tx_count: usize) -> Block {
        Block {
            block_number: number,
            hash: format!("0xb{number}"),
            // "beaverbuild.org"
            extra_data: "0x6265617665726275696c642e6f7267".to_string(),
            fee_recipient: "0xfee".to_string(),
            base_fee_per_gas: 10,
            gas_used: 10_000_000,
            gas_limit: 30_000_000,
            transactions: (0..tx_count as u64).map(|i| mk_tx(i, 50 + i as u128)).collect(),
        }
    }

    fn mk_arb(index: u64, searcher: &str) -> MevEvent {
        MevEvent {
            block_number: 0,
            tx_index: index,
            mev_type: MevType::Arb,
            address_from: Some("0xeoa".to_string()),
            address_to: Some(searcher.to_string()),
            extractor_profit_usd: Some(10.0),
            extractor_swap_volume_usd: Some(100.0),
            user_swap_volume_usd: None,
            protocol: None,
        }
    }

    #[test]
    fn boundary_is_integer_ceil_of_ten_percent() {
        assert_eq!(top_of_block_boundary(0), 0);
        assert_eq!(top_of_block_boundary(1), 1);
        assert_eq!(top_of_block_boundary(10), 1);
        assert_eq!(top_of_block_boundary(20), 2);
        assert_eq!(top_of_block_boundary(25), 3);
        assert_eq!(top_of_block_boundary(30), 3);
        assert_eq!(top_of_block_boundary(199), 20);
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        let odd: Vec<BlockTransaction> = [30, 10, 20].iter().map(|&p| mk_tx(0, p)).collect();
        assert_eq!(block_median_gas_price(&odd), 20.0);

        let even: Vec<BlockTransaction> = [40, 10, 20, 30].iter().map(|&p| mk_tx(0, p)).collect();
        assert_eq!(block_median_gas_price(&even), 25.0);

        assert_eq!(block_median_gas_price(&[]), 0.0);
    }

    #[test]
    fn empty_block_contributes_nothing() {
        let state = AttributionState::new();
        analyze_block(&state, &mk_block(1, 0), Some(&[]), None);
        assert!(state.snapshot().atomic.block_totals.is_empty());
    }

    #[test]
    fn feedless_block_contributes_only_block_totals() {
        let state = AttributionState::new();
        analyze_block(&state, &mk_block(1, 5), None, None);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.block_totals["beaverbuild"], 1);
        assert_eq!(snapshot.nonatomic.block_totals["beaverbuild"], 1);
        assert!(snapshot.atomic.txs.is_empty());
    }

    #[test]
    fn out_of_range_event_is_skipped() {
        let state = AttributionState::new();
        let events = vec![mk_arb(99, "0xbot"), mk_arb(1, "0xbot")];
        analyze_block(&state, &mk_block(1, 5), Some(&events), None);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.txs["beaverbuild"]["0xbot"].arb, 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn batch_attribution_joins_before_returning() {
        let mut blocks = HashMap::new();
        let mut events = HashMap::new();
        for number in 1..=20u64 {
            blocks.insert(number, mk_block(number, 10));
            events.insert(number, vec![mk_arb(1, "0xbot"), mk_arb(2, "0xbot")]);
        }

        let state = analyze_blocks(
            Arc::new(blocks),
            Arc::new(BlockTransfers::new()),
            Arc::new(events),
        )
        .await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.block_totals["beaverbuild"], 20);
        assert_eq!(snapshot.atomic.txs["beaverbuild"]["0xbot"].arb, 40.0);
        // one block-count per block despite two events per block
        assert_eq!(snapshot.atomic.blocks["beaverbuild"]["0xbot"], 20);
    }
}
