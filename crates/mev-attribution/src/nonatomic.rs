//! Non-atomic (CEX-DEX) attribution.
//!
//! A directional swap only counts as builder-directed MEV when one of three
//! bribe signals fires, evaluated first-match-wins:
//!
//! 1. a coinbase-style internal transfer to the fee recipient in the same tx,
//! 2. the next transaction paying the fee recipient from the same sender,
//! 3. placement inside the top ~10% of the block, priced by priority fee.
//!
//! Tier order is fixed: a qualifying top-of-block swap is attributed by a
//! stronger earlier signal when one exists, and later, weaker evidence is
//! never revisited.

use std::collections::HashSet;

use mev_data::types::{BlockTransaction, MevEvent, TransferIndex};

use crate::state::{
    add_value, count_block_once, priority_fee_wei, push_volume, wei_to_eth, AttributionState,
    TopOfBlockBribe, TransferBribe,
};

/// Two-transaction "swap, then pay the builder directly" pattern: returns the
/// follow-up payment when the next transaction has the same sender and pays
/// the fee recipient.
fn trailing_builder_payment<'a>(
    fee_recipient: &str,
    cur_tx: &BlockTransaction,
    next_tx: Option<&'a BlockTransaction>,
) -> Option<&'a BlockTransaction> {
    next_tx.filter(|next| {
        next.from_address == cur_tx.from_address && next.to_address == fee_recipient
    })
}

/// Applies the tiered bribe heuristic to one swap or sandwich-leg event.
#[allow(clippy::too_many_arguments)]
pub fn attribute_nonatomic(
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
    let (Some(addr_to), Some(addr_from)) = (
        event.address_to.as_deref().map(str::to_lowercase),
        event.address_from.as_deref().map(str::to_lowercase),
    ) else {
        tracing::debug!(
            block_number = event.block_number,
            tx_index = event.tx_index,
            "skipping non-atomic event without counterparty addresses"
        );
        return;
    };

    let tx_volume = event.user_volume_usd();

    if let Some(transfer) = transfer_index.get(&full_tx.hash) {
        // The coinbase-transfer trail is the strongest evidence of who paid;
        // the searcher is the transfer sender, not the swap's raw recipient.
        let searcher = transfer.from_address.clone();
        let priority_fee = priority_fee_wei(full_tx, block_base_fee) as f64;

        add_value(&state.nonatomic_txs, builder, &searcher, 1.0);
        add_value(&state.nonatomic_volume, builder, &searcher, tx_volume);
        add_value(
            &state.nonatomic_coin_bribes,
            builder,
            &searcher,
            transfer.value,
        );
        add_value(&state.nonatomic_gas_bribes, builder, &searcher, priority_fee);
        push_volume(&state.nonatomic_volume_lists, builder, &searcher, tx_volume);

        state
            .coinbase_bribe
            .entry(searcher.clone())
            .or_default()
            .push(TransferBribe {
                hash: full_tx.hash.clone(),
                builder: builder.to_string(),
                bribe: transfer.value,
            });

        count_block_once(
            &state.nonatomic_blocks,
            builder,
            &searcher,
            addrs_seen_in_block,
        );
    } else if let Some(next_tx) = trailing_builder_payment(fee_recipient, full_tx, full_next_tx) {
        // The payer here is an EOA sending a plain value transfer.
        let searcher = addr_from;
        let bribe_eth = wei_to_eth(next_tx.value);

        add_value(&state.nonatomic_txs, builder, &searcher, 1.0);
        add_value(&state.nonatomic_volume, builder, &searcher, tx_volume);
        add_value(&state.nonatomic_coin_bribes, builder, &searcher, bribe_eth);
        push_volume(&state.nonatomic_volume_lists, builder, &searcher, tx_volume);

        state
            .after_bribe
            .entry(searcher.clone())
            .or_default()
            .push(TransferBribe {
                hash: full_tx.hash.clone(),
                builder: builder.to_string(),
                bribe: bribe_eth,
            });

        count_block_once(
            &state.nonatomic_blocks,
            builder,
            &searcher,
            addrs_seen_in_block,
        );
    } else if event.tx_index <= top_of_block_boundary {
        // Privileged placement with no visible payment: the priority fee is
        // the implicit bribe.
        let searcher = addr_to;
        let priority_fee = priority_fee_wei(full_tx, block_base_fee) as f64;

        add_value(&state.nonatomic_txs, builder, &searcher, 1.0);
        add_value(&state.nonatomic_volume, builder, &searcher, tx_volume);
        add_value(&state.nonatomic_gas_bribes, builder, &searcher, priority_fee);
        push_volume(&state.nonatomic_volume_lists, builder, &searcher, tx_volume);

        state
            .tob_bribe
            .entry(searcher.clone())
            .or_default()
            .push(TopOfBlockBribe {
                hash: full_tx.hash.clone(),
                builder: builder.to_string(),
                index: event.tx_index,
                gas_price: full_tx.gas_price,
                gas: full_tx.gas,
                block_median_gas,
            });

        count_block_once(
            &state.nonatomic_blocks,
            builder,
            &searcher,
            addrs_seen_in_block,
        );
    }
    // No tier fired: the swap is not counted as MEV-for-builder activity.
}

#[cfg(test)]
mod tests {
    use super::*;
    use mev_data::types::{InternalTransfer, MevType};

    const FEE_RECIPIENT: &str = "0xfee";

    fn mk_tx(index: u64, hash: &str, from: &str, to: &str, value: u128) -> BlockTransaction {
        BlockTransaction {
            tx_index: index,
            hash: hash.to_string(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            gas: 400_000,
            gas_price: 70,
            gas_used: 200_000,
            value,
        }
    }

    fn mk_swap(index: u64, volume: f64) -> MevEvent {
        MevEvent {
            block_number: 1,
            tx_index: index,
            mev_type: MevType::Swap,
            address_from: Some("0xTRADER".to_string()),
            address_to: Some("0xROUTERBOT".to_string()),
            extractor_profit_usd: None,
            extractor_swap_volume_usd: None,
            user_swap_volume_usd: Some(volume),
            protocol: Some("uniswap3".to_string()),
        }
    }

    fn transfers_for(hash: &str, from: &str, value: f64) -> TransferIndex {
        let mut index = TransferIndex::new();
        index.insert(
            hash.to_string(),
            InternalTransfer {
                from_address: from.to_string(),
                to_address: FEE_RECIPIENT.to_string(),
                value,
            },
        );
        index
    }

    #[test]
    fn coinbase_transfer_tier_attributes_the_transfer_sender() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx(0, "0xh", "0xsender", "0xrouter", 0);

        attribute_nonatomic(
            &state,
            "beaverbuild",
            FEE_RECIPIENT,
            &mk_swap(0, 5000.0),
            &tx,
            None,
            &transfers_for("0xh", "0xpayer", 1.5),
            3,
            10,
            50.0,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.nonatomic.txs["beaverbuild"]["0xpayer"], 1.0);
        assert_eq!(snapshot.nonatomic.coin_bribes["beaverbuild"]["0xpayer"], 1.5);
        // tier 1 records the priority fee too: 200_000 * (70 - 10)
        assert_eq!(
            snapshot.nonatomic.gas_bribes["beaverbuild"]["0xpayer"],
            12_000_000.0
        );
        assert_eq!(snapshot.evidence.coinbase_bribe["0xpayer"].len(), 1);
        assert_eq!(snapshot.nonatomic.blocks["beaverbuild"]["0xpayer"], 1);
    }

    #[test]
    fn tier_one_wins_over_top_of_block() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        // index 0 is inside the top-of-block boundary AND has a transfer
        let tx = mk_tx(0, "0xh", "0xsender", "0xrouter", 0);

        attribute_nonatomic(
            &state,
            "rsync",
            FEE_RECIPIENT,
            &mk_swap(0, 100.0),
            &tx,
            None,
            &transfers_for("0xh", "0xpayer", 0.3),
            5,
            10,
            50.0,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert!(snapshot.evidence.tob_bribe.is_empty(), "tier 3 must not fire");
        assert_eq!(snapshot.evidence.coinbase_bribe["0xpayer"].len(), 1);
    }

    #[test]
    fn trailing_transfer_tier_attributes_the_swap_sender() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx(40, "0xh", "0xsender", "0xrouter", 0);
        let next = mk_tx(41, "0xh2", "0xsender", FEE_RECIPIENT, 2_000_000_000_000_000_000);

        attribute_nonatomic(
            &state,
            "titan",
            FEE_RECIPIENT,
            &mk_swap(40, 900.0),
            &tx,
            Some(&next),
            &TransferIndex::new(),
            5,
            10,
            50.0,
            &mut seen,
        );

        let snapshot = state.snapshot();
        // searcher is the event's address_from (an EOA), bribe the next tx value in ETH
        assert_eq!(snapshot.nonatomic.txs["titan"]["0xtrader"], 1.0);
        assert_eq!(snapshot.nonatomic.coin_bribes["titan"]["0xtrader"], 2.0);
        assert_eq!(snapshot.evidence.after_bribe["0xtrader"][0].bribe, 2.0);
    }

    #[test]
    fn top_of_block_tier_uses_priority_fee() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx(2, "0xh", "0xsender", "0xrouter", 0);

        attribute_nonatomic(
            &state,
            "titan",
            FEE_RECIPIENT,
            &mk_swap(2, 900.0),
            &tx,
            None,
            &TransferIndex::new(),
            3,
            10,
            50.0,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.nonatomic.txs["titan"]["0xrouterbot"], 1.0);
        assert_eq!(
            snapshot.nonatomic.gas_bribes["titan"]["0xrouterbot"],
            12_000_000.0
        );
        let evidence = &snapshot.evidence.tob_bribe["0xrouterbot"][0];
        assert_eq!(evidence.index, 2);
        assert_eq!(evidence.block_median_gas, 50.0);
    }

    #[test]
    fn deep_unbribed_swap_is_not_attributed() {
        let state = AttributionState::new();
        let mut seen = HashSet::new();
        let tx = mk_tx(90, "0xh", "0xsender", "0xrouter", 0);

        attribute_nonatomic(
            &state,
            "titan",
            FEE_RECIPIENT,
            &mk_swap(90, 900.0),
            &tx,
            None,
            &TransferIndex::new(),
            10,
            10,
            50.0,
            &mut seen,
        );

        let snapshot = state.snapshot();
        assert!(snapshot.nonatomic.txs.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn trailing_transfer_requires_matching_sender_and_recipient() {
        let tx = mk_tx(40, "0xh", "0xsender", "0xrouter", 0);
        let wrong_sender = mk_tx(41, "0xh2", "0xother", FEE_RECIPIENT, 1);
        let wrong_recipient = mk_tx(41, "0xh2", "0xsender", "0xelse", 1);

        assert!(trailing_builder_payment(FEE_RECIPIENT, &tx, None).is_none());
        assert!(trailing_builder_payment(FEE_RECIPIENT, &tx, Some(&wrong_sender)).is_none());
        assert!(trailing_builder_payment(FEE_RECIPIENT, &tx, Some(&wrong_recipient)).is_none());
    }
}
