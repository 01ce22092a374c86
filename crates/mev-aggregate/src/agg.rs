//! Pure aggregation operations over builder→searcher maps.
//!
//! Every function returns fresh maps; nothing mutates its input and no
//! lookup ever inserts an entry. Paired map/aggregate results uphold
//! `agg[s] == Σ_builder map[builder][s]` whenever the inputs did.

use indexmap::IndexMap;
use mev_attribution::state::{SubtypeStats, WEI_PER_ETH};
use mev_data::entities::is_known_entity;

/// Searcher → metric, summed across builders. Entry order is data: always
/// value-descending after any operation here.
pub type SearcherAgg = IndexMap<String, f64>;

/// Builder → searcher → metric.
pub type BuilderSearcherMap = IndexMap<String, IndexMap<String, f64>>;

/// Builder → searcher → per-subtype stats (atomic domain).
pub type SubtypeMap = IndexMap<String, IndexMap<String, SubtypeStats>>;

fn sorted_desc(entries: Vec<(String, f64)>) -> IndexMap<String, f64> {
    let mut entries = entries;
    // stable sort keeps the original order on ties
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.into_iter().collect()
}

/// Reorders an aggregate by value descending (stable on ties).
pub fn sort_agg(agg: &SearcherAgg) -> SearcherAgg {
    sorted_desc(agg.iter().map(|(k, v)| (k.clone(), *v)).collect())
}

/// Sorts each builder's searchers by value descending, then orders builders
/// by their summed totals descending.
pub fn sort_map(map: &BuilderSearcherMap) -> BuilderSearcherMap {
    let mut builders: Vec<(String, f64, IndexMap<String, f64>)> = map
        .iter()
        .map(|(builder, searchers)| {
            let total: f64 = searchers.values().sum();
            let inner = sorted_desc(searchers.iter().map(|(k, v)| (k.clone(), *v)).collect());
            (builder.clone(), total, inner)
        })
        .collect();
    builders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    builders
        .into_iter()
        .map(|(builder, _, inner)| (builder, inner))
        .collect()
}

/// Sums a map's inner values across builders into a sorted aggregate.
pub fn aggregate_map(map: &BuilderSearcherMap) -> SearcherAgg {
    let mut totals: IndexMap<String, f64> = IndexMap::new();
    for searchers in map.values() {
        for (searcher, value) in searchers {
            *totals.entry(searcher.clone()).or_insert(0.0) += value;
        }
    }
    sort_agg(&totals)
}

/// Flattens an atomic subtype map to its `total` field.
pub fn stats_totals(map: &SubtypeMap) -> BuilderSearcherMap {
    map.iter()
        .map(|(builder, searchers)| {
            (
                builder.clone(),
                searchers
                    .iter()
                    .map(|(searcher, stats)| (searcher.clone(), stats.total))
                    .collect(),
            )
        })
        .collect()
}

/// Widens an integer-count map (block counts) to the shared metric type.
pub fn counts_to_metric(map: &IndexMap<String, IndexMap<String, u64>>) -> BuilderSearcherMap {
    map.iter()
        .map(|(builder, searchers)| {
            (
                builder.clone(),
                searchers
                    .iter()
                    .map(|(searcher, count)| (searcher.clone(), *count as f64))
                    .collect(),
            )
        })
        .collect()
}

/// Removes searchers that are known venues or labeled order-flow contracts,
/// consistently from the map and its aggregate.
pub fn prune_known_entities(
    map: &BuilderSearcherMap,
    agg: &SearcherAgg,
) -> (BuilderSearcherMap, SearcherAgg) {
    let pruned_map: BuilderSearcherMap = map
        .iter()
        .map(|(builder, searchers)| {
            (
                builder.clone(),
                searchers
                    .iter()
                    .filter(|(searcher, _)| !is_known_entity(searcher))
                    .map(|(searcher, value)| (searcher.clone(), *value))
                    .collect::<IndexMap<String, f64>>(),
            )
        })
        .filter(|(_, searchers)| !searchers.is_empty())
        .collect();

    let pruned_agg: SearcherAgg = agg
        .iter()
        .filter(|(searcher, _)| !is_known_entity(searcher))
        .map(|(searcher, value)| (searcher.clone(), *value))
        .collect();

    (pruned_map, pruned_agg)
}

/// Removes from the non-atomic view every searcher that also appears in the
/// atomic aggregate, so a dual-mode actor is not counted twice.
pub fn remove_atomic_overlap(
    nonatomic_map: &BuilderSearcherMap,
    nonatomic_agg: &SearcherAgg,
    atomic_agg: &SearcherAgg,
) -> (BuilderSearcherMap, SearcherAgg) {
    let filtered_map: BuilderSearcherMap = nonatomic_map
        .iter()
        .map(|(builder, searchers)| {
            (
                builder.clone(),
                searchers
                    .iter()
                    .filter(|(searcher, _)| !atomic_agg.contains_key(*searcher))
                    .map(|(searcher, value)| (searcher.clone(), *value))
                    .collect::<IndexMap<String, f64>>(),
            )
        })
        .filter(|(_, searchers)| !searchers.is_empty())
        .collect();

    let filtered_agg: SearcherAgg = nonatomic_agg
        .iter()
        .filter(|(searcher, _)| !atomic_agg.contains_key(*searcher))
        .map(|(searcher, value)| (searcher.clone(), *value))
        .collect();

    (filtered_map, filtered_agg)
}

/// Keeps the minimal set of top searchers covering `fraction` of total
/// volume: the aggregate is walked in descending order, accumulating until
/// the running total exceeds `fraction * total`, inclusive of the entry that
/// crosses the threshold. This is a covering-set operation, not a quantile.
pub fn filter_map_and_agg_in_range(
    map: &BuilderSearcherMap,
    agg: &SearcherAgg,
    fraction: f64,
) -> (BuilderSearcherMap, SearcherAgg) {
    let sorted = sort_agg(agg);
    let total: f64 = sorted.values().sum();
    let threshold = fraction * total;

    let mut retained = SearcherAgg::new();
    let mut running = 0.0;
    for (searcher, value) in &sorted {
        retained.insert(searcher.clone(), *value);
        running += value;
        if running > threshold {
            break;
        }
    }

    let filtered_map: BuilderSearcherMap = map
        .iter()
        .map(|(builder, searchers)| {
            (
                builder.clone(),
                searchers
                    .iter()
                    .filter(|(searcher, _)| retained.contains_key(*searcher))
                    .map(|(searcher, value)| (searcher.clone(), *value))
                    .collect::<IndexMap<String, f64>>(),
            )
        })
        .filter(|(_, searchers)| !searchers.is_empty())
        .collect();

    (filtered_map, retained)
}

/// Drops builders whose summed total is `<= min_count` and subtracts their
/// per-searcher contributions back out of the aggregate so the two views
/// stay consistent.
pub fn remove_small_builders(
    map: &BuilderSearcherMap,
    agg: &SearcherAgg,
    min_count: f64,
) -> (BuilderSearcherMap, SearcherAgg) {
    let mut adjusted: IndexMap<String, f64> =
        agg.iter().map(|(k, v)| (k.clone(), *v)).collect();

    let filtered_map: BuilderSearcherMap = map
        .iter()
        .filter(|(_, searchers)| {
            let total: f64 = searchers.values().sum();
            if total <= min_count {
                for (searcher, value) in searchers.iter() {
                    if let Some(remaining) = adjusted.get_mut(searcher) {
                        *remaining -= value;
                    }
                }
                false
            } else {
                true
            }
        })
        .map(|(builder, searchers)| (builder.clone(), searchers.clone()))
        .collect();

    let filtered_agg: SearcherAgg =
        sort_agg(&adjusted.into_iter().filter(|(_, v)| *v > 0.0).collect());

    (filtered_map, filtered_agg)
}

/// Normalizes the gas-bribe map from Wei to ETH and sums it key-wise with
/// the coin-bribe map (already in ETH), returning the combined map and its
/// aggregate.
pub fn combine_bribes_in_eth(
    gas_map: &BuilderSearcherMap,
    coin_map: &BuilderSearcherMap,
) -> (BuilderSearcherMap, SearcherAgg) {
    let mut combined: IndexMap<String, IndexMap<String, f64>> = IndexMap::new();

    for (builder, searchers) in gas_map {
        let inner = combined.entry(builder.clone()).or_default();
        for (searcher, wei) in searchers {
            *inner.entry(searcher.clone()).or_insert(0.0) += wei / WEI_PER_ETH;
        }
    }
    for (builder, searchers) in coin_map {
        let inner = combined.entry(builder.clone()).or_default();
        for (searcher, eth) in searchers {
            *inner.entry(searcher.clone()).or_insert(0.0) += eth;
        }
    }

    let sorted = sort_map(&combined);
    let agg = aggregate_map(&sorted);
    (sorted, agg)
}
