//! mev-data crate
//!
//! Data model and external collaborators for builder/searcher attribution:
//! simplified block structures, the MEV-classification feed, the internal
//! transfer index, static known-entity tables, and JSON cache helpers.

pub mod blocks;
pub mod entities;
pub mod feed;
pub mod json;
pub mod transfers;
pub mod types;

pub use types::{
    Block, BlockTransaction, BlockTransfers, InternalTransfer, MevEvent, MevType, TransferIndex,
};
