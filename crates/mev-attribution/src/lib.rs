//! mev-attribution crate
//!
//! The classification-and-attribution engine: resolves which builder produced
//! each block, routes MEV-flagged transactions to the atomic or non-atomic
//! attributor, and folds every event into shared builder→searcher maps under
//! a bounded per-block worker pool.

pub mod atomic;
pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod nonatomic;
pub mod state;

pub use builder::{resolve_builder, VANILLA_BUILDER};
pub use engine::{analyze_block, analyze_blocks, block_median_gas_price, top_of_block_boundary};
pub use state::{
    AtomicSnapshot, AttributionSnapshot, AttributionState, EvidenceSnapshot, NonAtomicSnapshot,
    SubtypeStats, TopOfBlockBribe, TransferBribe,
};
