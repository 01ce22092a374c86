//! Atomic MEV attribution: arb, frontrun, backrun, liquid, uncertain.

use std::collections::HashSet;

use mev_data::types::{BlockTransaction, MevEvent, MevType, TransferIndex};

use crate::state::{
    add_stat, count_block_once, priority_fee_wei, push_volume, AttributionState,
};

/// Updates the per-builder/per-searcher atomic counters for one MEV event.
///
/// The searcher of record is `address_to` for every subtype except `liquid`,
/// which keys on `address_from`: liquidations fire from an EOA rather than a
/// dedicated contract. Both bribe channels are recorded up front and are not
/// mutually exclusive: a direct fee-recipient transfer when the transfer
/// index knows the tx, and the gas priority fee always.
pub fn attribute_atomic(
    state: &AttributionState,
    builder: &str,
    event: &MevEvent,
    full_tx: &BlockTransaction,
    transfer_index: &TransferIndex,
    block_base_fee: u128,
    addrs_seen_in_block: &mut HashSet<String>,
) {
    let kind = event.mev_type;

    let (Some(addr_to), Some(addr_from)) = (
        event.address_to.as_deref().map(str::to_lowercase),
        event.address_from.as_deref().map(str::to_lowercase),
    ) else {
        tracing::debug!(
            block_number = event.block_number,
            tx_index = event.tx_index,
            "skipping atomic event without counterparty addresses"
        );
        return;
    };

    let profit = event.profit_usd();
    let volume = event.volume_usd();

    // Bribe collection is keyed on address_to for every subtype, liquid
    // included: the transfer trail identifies the paying contract.
    if let Some(transfer) = transfer_index.get(&full_tx.hash) {
        add_stat(&state.atomic_coin_bribes, builder, &addr_to, |stats| {
            stats.add(kind, transfer.value)
        });
    }

    let priority_fee = priority_fee_wei(full_tx, block_base_fee) as f64;
    add_stat(&state.atomic_gas_bribes, builder, &addr_to, |stats| {
        stats.add(kind, priority_fee)
    });

    match kind {
        MevType::Arb | MevType::Frontrun => {
            add_stat(&state.atomic_txs, builder, &addr_to, |s| s.add(kind, 1.0));
            add_stat(&state.atomic_profit, builder, &addr_to, |s| {
                s.add(kind, profit)
            });
            add_stat(&state.atomic_volume, builder, &addr_to, |s| {
                s.add(kind, volume)
            });
            push_volume(&state.atomic_volume_lists, builder, &addr_to, volume);
            count_block_once(&state.atomic_blocks, builder, &addr_to, addrs_seen_in_block);
        }
        MevType::Backrun => {
            // Sandwich totals policy: both legs count a tx and carry their
            // (usually zero) profit into `total`, but volume lands in `total`
            // only on the frontrun leg so a sandwich is not double-counted.
            add_stat(&state.atomic_txs, builder, &addr_to, |s| s.add(kind, 1.0));
            add_stat(&state.atomic_profit, builder, &addr_to, |s| {
                s.add(kind, profit)
            });
            add_stat(&state.atomic_volume, builder, &addr_to, |s| {
                s.add_subtype_only(kind, volume)
            });
            push_volume(&state.atomic_volume_lists, builder, &addr_to, volume);
            count_block_once(&state.atomic_blocks, builder, &addr_to, addrs_seen_in_block);
        }
        MevType::Liquid => {
            add_stat(&state.atomic_txs, builder, &addr_from, |s| s.add(kind, 1.0));
            add_stat(&state.atomic_volume, builder, &addr_from, |s| {
                s.add(kind, volume)
            });
            // the feed reports liquidation profit without a subtype frame
            add_stat(&state.atomic_profit, builder, &addr_from, |s| {
                s.add_total_only(profit)
            });
            push_volume(&state.atomic_volume_lists, builder, &addr_from, volume);
            count_block_once(
                &state.atomic_blocks,
                builder,
                &addr_from,
                addrs_seen_in_block,
            );
        }
        MevType::Uncertain => {
            // No identified extractor: the economic frame is the victim's
            // volume, so user_swap_volume_usd stands in for extractor volume.
            let user_volume = event.user_volume_usd();
            add_stat(&state.atomic_txs, builder, &addr_to, |s| s.add(kind, 1.0));
            add_stat(&state.atomic_volume, builder, &addr_to, |s| {
                s.add(kind, user_volume)
            });
            push_volume(&state.atomic_volume_lists, builder, &addr_to, user_volume);
            count_block_once(&state.atomic_blocks, builder, &addr_to, addrs_seen_in_block);
        }
        other => {
            tracing::debug!(mev_type = other.as_str(), "non-atomic event reached the atomic attributor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mev_data::types::InternalTransfer;

    fn mk_tx(hash: &str, gas_used: u64, gas_price: u128) -> BlockTransaction {
        BlockTransaction {
            tx_index: 0,
            hash: hash.to_string(),
            from_address: "0xsender".to_string(),
            to_address: "0xcontract".to_string(),
            gas: 300_000,
            gas_price,
            gas_used,
            value: 0,
        }
    }

    fn mk_event(kind: MevType, profit: f64, volume: f64) -> MevEvent {
        MevEvent {
            block_number: 1,
            tx_index: 0,
            mev_type: kind,
            address_from: Some("0xEOA".to_string()),
            address_to: Some("0xBOT".to_string()),
            extractor_profit_usd: Some(profit),
            extractor_swap_volume_usd: Some(volume),
            user_swap_volume_usd: None,
            protocol: None,
        }
    }

    #[test]
    fn arb_counts_under_subtype_and_total() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xh", 100_000, 60);

        attribute_atomic(
            &state,
            "beaverbuild",
            &mk_event(MevType::Arb, 100.0, 1000.0),
            &tx,
            &TransferIndex::new(),
            10,
            &mut seen,
        );

        let snapshot = state.snapshot();
        let stats = snapshot.atomic.txs["beaverbuild"]["0xbot"];
        assert_eq!(stats.arb, 1.0);
        assert_eq!(stats.total, 1.0);
        assert_eq!(snapshot.atomic.profit["beaverbuild"]["0xbot"].total, 100.0);
        assert_eq!(snapshot.atomic.volume["beaverbuild"]["0xbot"].total, 1000.0);
        // gas bribe: 100_000 * (60 - 10)
        assert_eq!(
            snapshot.atomic.gas_bribes["beaverbuild"]["0xbot"].arb,
            5_000_000.0
        );
        assert_eq!(snapshot.atomic.blocks["beaverbuild"]["0xbot"], 1);
    }

    #[test]
    fn backrun_volume_stays_out_of_total() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xh", 100_000, 60);

        attribute_atomic(
            &state,
            "rsync",
            &mk_event(MevType::Backrun, 5.0, 800.0),
            &tx,
            &TransferIndex::new(),
            10,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.txs["rsync"]["0xbot"].total, 1.0);
        assert_eq!(snapshot.atomic.profit["rsync"]["0xbot"].total, 5.0);
        let volume = snapshot.atomic.volume["rsync"]["0xbot"];
        assert_eq!(volume.backrun, 800.0);
        assert_eq!(volume.total, 0.0, "backrun volume is counted on the frontrun leg");
    }

    #[test]
    fn liquidation_keys_on_the_liquidator_eoa() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xh", 100_000, 60);

        attribute_atomic(
            &state,
            "titan",
            &mk_event(MevType::Liquid, 40.0, 500.0),
            &tx,
            &TransferIndex::new(),
            10,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.txs["titan"]["0xeoa"].liquid, 1.0);
        assert_eq!(snapshot.atomic.profit["titan"]["0xeoa"].total, 40.0);
        assert_eq!(snapshot.atomic.profit["titan"]["0xeoa"].liquid, 0.0);
        // bribes still track the contract address
        assert!(snapshot.atomic.gas_bribes["titan"].contains_key("0xbot"));
        assert!(seen.contains("0xeoa"));
    }

    #[test]
    fn coin_and_gas_bribes_are_not_exclusive() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xbribed", 100_000, 60);

        let mut transfers = TransferIndex::new();
        transfers.insert(
            "0xbribed".to_string(),
            InternalTransfer {
                from_address: "0xbot".to_string(),
                to_address: "0xfee".to_string(),
                value: 2.0,
            },
        );

        attribute_atomic(
            &state,
            "beaverbuild",
            &mk_event(MevType::Arb, 0.0, 0.0),
            &tx,
            &transfers,
            10,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.coin_bribes["beaverbuild"]["0xbot"].total, 2.0);
        assert_eq!(
            snapshot.atomic.gas_bribes["beaverbuild"]["0xbot"].total,
            5_000_000.0
        );
    }

    #[test]
    fn block_count_dedups_across_events() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xh", 1, 1);

        for _ in 0..3 {
            attribute_atomic(
                &state,
                "beaverbuild",
                &mk_event(MevType::Arb, 1.0, 1.0),
                &tx,
                &TransferIndex::new(),
                0,
                &mut seen,
            );
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.atomic.txs["beaverbuild"]["0xbot"].arb, 3.0);
        assert_eq!(
            snapshot.atomic.blocks["beaverbuild"]["0xbot"], 1,
            "three events in one block count one block"
        );
    }

    #[test]
    fn event_without_addresses_is_skipped() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx("0xh", 1, 1);

        let mut event = mk_event(MevType::Arb, 1.0, 1.0);
        event.address_to = None;
        attribute_atomic(
            &state,
            "beaverbuild",
            &event,
            &tx,
            &TransferIndex::new(),
            0,
            &mut seen,
        );

        assert!(state.snapshot().atomic.txs.is_empty());
    }
}
