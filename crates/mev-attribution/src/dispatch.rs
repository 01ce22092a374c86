//! MEV type dispatch: routes each feed event to the matching attributor.

use std::collections::HashSet;

use mev_data::types::{BlockTransaction, MevEvent, MevType, TransferIndex};

use crate::atomic::attribute_atomic;
use crate::nonatomic::attribute_nonatomic;
use crate::state::AttributionState;

/// Protocol label the feed uses for multi-hop swaps.
const MULTI_PROTOCOL: &str = "multiple";

/// Routes one classified event, holding no state of its own.
///
/// - `sandwich` legs are accounted as non-atomic searcher activity;
/// - a `swap` across multiple protocols is heuristically atomic arbitrage
///   and is re-tagged `uncertain` for the atomic attributor, any other
///   `swap` goes down the non-atomic path;
/// - the atomic subtypes go straight to the atomic attributor;
/// - unrecognized tags are discarded.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    state: &AttributionState,
    builder: &str,
    fee_recipient: &str,
    event: &MevEvent,
    full_tx: &BlockTransaction,
    full_next_tx: Option<&BlockTransaction>,
    transfer_index: &TransferIndex,
    top_of_block_boundary: u64,
    block_base_fee: u128,
    block_median_gas: f64,
    addrs_seen_in_block: &mut HashSet<String>,
) {
    match event.mev_type {
        MevType::Sandwich => attribute_nonatomic(
            state,
            builder,
            fee_recipient,
            event,
            full_tx,
            full_next_tx,
            transfer_index,
            top_of_block_boundary,
            block_base_fee,
            block_median_gas,
            addrs_seen_in_block,
        ),
        MevType::Swap => {
            if event.protocol.as_deref() == Some(MULTI_PROTOCOL) {
                let mut retagged = event.clone();
                retagged.mev_type = MevType::Uncertain;
                attribute_atomic(
                    state,
                    builder,
                    &retagged,
                    full_tx,
                    transfer_index,
                    block_base_fee,
                    addrs_seen_in_block,
                );
            } else {
                attribute_nonatomic(
                    state,
                    builder,
                    fee_recipient,
                    event,
                    full_tx,
                    full_next_tx,
                    transfer_index,
                    top_of_block_boundary,
                    block_base_fee,
                    block_median_gas,
                    addrs_seen_in_block,
                );
            }
        }
        MevType::Arb
        | MevType::Frontrun
        | MevType::Backrun
        | MevType::Liquid
        | MevType::Uncertain => attribute_atomic(
            state,
            builder,
            event,
            full_tx,
            transfer_index,
            block_base_fee,
            addrs_seen_in_block,
        ),
        MevType::Unknown => {
            tracing::debug!(
                block_number = event.block_number,
                tx_index = event.tx_index,
                "discarding event with unrecognized mev_type"
            );
        }
    }
}
