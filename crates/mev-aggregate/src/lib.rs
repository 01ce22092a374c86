//! mev-aggregate crate
//!
//! Read-only aggregation over attribution snapshots: sorted totals, entity
//! pruning, coverage filtering, bribe combination, notable-relationship
//! detection, and the JSON export tree the reporting layer consumes.

pub mod agg;
pub mod export;
pub mod notable;

pub use agg::{
    aggregate_map, combine_bribes_in_eth, counts_to_metric, filter_map_and_agg_in_range,
    prune_known_entities, remove_atomic_overlap, remove_small_builders, sort_agg, sort_map,
    stats_totals, BuilderSearcherMap, SearcherAgg, SubtypeMap,
};
pub use export::{aggregate_block_counts, export_snapshot};
pub use notable::{find_notable, HighlightedPair, NotableReport};
