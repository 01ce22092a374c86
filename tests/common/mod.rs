//! Shared fixtures for integration tests.

use mev_data::types::{Block, BlockTransaction, InternalTransfer, MevEvent, MevType, TransferIndex};

pub const FEE_RECIPIENT: &str = "0xfee";

/// Hex-encodes builder extradata text the way it appears on chain.
pub fn extra_data(text: &str) -> String {
    let encoded: String = text.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{encoded}")
}

pub fn mk_tx(index: u64, gas_used: u64, gas_price: u128) -> BlockTransaction {
    BlockTransaction {
        tx_index: index,
        hash: format!("0xt{index}"),
        from_address: "0xsender".to_string(),
        to_address: "0xrouter".to_string(),
        gas: 300_000,
        gas_price,
        gas_used,
        value: 0,
    }
}

/// A block signed by the given builder extradata, with `tx_count` simple txs.
pub fn mk_block(number: u64, builder_text: &str, tx_count: usize) -> Block {
    Block {
        block_number: number,
        hash: format!("0xb{number}"),
        extra_data: extra_data(builder_text),
        fee_recipient: FEE_RECIPIENT.to_string(),
        base_fee_per_gas: 10,
        gas_used: 15_000_000,
        gas_limit: 30_000_000,
        transactions: (0..tx_count as u64).map(|i| mk_tx(i, 100_000, 60)).collect(),
    }
}

pub fn mk_event(
    block_number: u64,
    tx_index: u64,
    mev_type: MevType,
    address_to: &str,
) -> MevEvent {
    MevEvent {
        block_number,
        tx_index,
        mev_type,
        address_from: Some("0xeoa".to_string()),
        address_to: Some(address_to.to_string()),
        extractor_profit_usd: Some(100.0),
        extractor_swap_volume_usd: Some(1000.0),
        user_swap_volume_usd: Some(500.0),
        protocol: None,
    }
}

/// Transfer index holding a single fee-recipient payment for `tx_hash`.
pub fn transfer_index(tx_hash: &str, from: &str, value_eth: f64) -> TransferIndex {
    let mut index = TransferIndex::new();
    index.insert(
        tx_hash.to_string(),
        InternalTransfer {
            from_address: from.to_string(),
            to_address: FEE_RECIPIENT.to_string(),
            value: value_eth,
        },
    );
    index
}
