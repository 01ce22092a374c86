//! JSON export of every map and aggregate the reporting layer consumes.
//!
//! One document per metric per view, laid out as
//! `<out>/atomic/builder_atomic_maps/*.json`, `<out>/atomic/agg/*.json`,
//! and the non-atomic equivalents plus the raw bribe-evidence specs.

use std::path::Path;

use eyre::Result;
use indexmap::IndexMap;
use mev_attribution::state::{AtomicSnapshot, AttributionSnapshot, NonAtomicSnapshot};
use mev_data::json::dump_json;

use crate::agg::{
    aggregate_map, combine_bribes_in_eth, counts_to_metric, sort_map, stats_totals,
    BuilderSearcherMap, SearcherAgg,
};

/// Re-materializes the exported block-count shape: each builder's searcher
/// counts plus a `total` entry carrying the builder's overall block count.
fn block_map_with_totals(
    blocks: &IndexMap<String, IndexMap<String, u64>>,
    block_totals: &IndexMap<String, u64>,
) -> IndexMap<String, IndexMap<String, u64>> {
    let mut out: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();
    for (builder, total) in block_totals {
        let mut inner = IndexMap::new();
        inner.insert("total".to_string(), *total);
        if let Some(searchers) = blocks.get(builder) {
            for (searcher, count) in searchers {
                inner.insert(searcher.clone(), *count);
            }
        }
        out.insert(builder.clone(), inner);
    }
    out
}

/// Aggregates per-searcher block counts across builders, descending.
pub fn aggregate_block_counts(blocks: &IndexMap<String, IndexMap<String, u64>>) -> SearcherAgg {
    aggregate_map(&counts_to_metric(blocks))
}

fn export_map_and_agg(
    dir: &Path,
    maps_subdir: &str,
    name: &str,
    map: &BuilderSearcherMap,
    agg_name: &str,
    agg: &SearcherAgg,
) -> Result<()> {
    dump_json(dir.join(maps_subdir).join(format!("{name}.json")), &sort_map(map))?;
    dump_json(dir.join("agg").join(format!("{agg_name}.json")), agg)?;
    Ok(())
}

fn export_atomic(snapshot: &AtomicSnapshot, dir: &Path) -> Result<()> {
    let maps_dir = "builder_atomic_maps";

    dump_json(
        dir.join(maps_dir).join("builder_atomic_map_block.json"),
        &block_map_with_totals(&snapshot.blocks, &snapshot.block_totals),
    )?;
    dump_json(
        dir.join("agg").join("agg_block.json"),
        &aggregate_block_counts(&snapshot.blocks),
    )?;

    for (name, agg_name, map) in [
        ("builder_atomic_map_tx", "agg_tx", &snapshot.txs),
        ("builder_atomic_map_profit", "agg_profit", &snapshot.profit),
        ("builder_atomic_map_vol", "agg_vol", &snapshot.volume),
        ("builder_atomic_map_coin_bribe", "agg_coin", &snapshot.coin_bribes),
        ("builder_atomic_map_gas_bribe", "agg_gas", &snapshot.gas_bribes),
    ] {
        dump_json(dir.join(maps_dir).join(format!("{name}.json")), map)?;
        let totals = stats_totals(map);
        dump_json(
            dir.join("agg").join(format!("{agg_name}.json")),
            &aggregate_map(&totals),
        )?;
    }

    dump_json(
        dir.join(maps_dir).join("builder_atomic_map_vol_list.json"),
        &snapshot.volume_lists,
    )?;

    let (bribe_map, bribe_agg) = combine_bribes_in_eth(
        &stats_totals(&snapshot.gas_bribes),
        &stats_totals(&snapshot.coin_bribes),
    );
    export_map_and_agg(
        dir,
        maps_dir,
        "builder_atomic_map_bribe",
        &bribe_map,
        "agg_bribe",
        &bribe_agg,
    )
}

fn export_nonatomic(snapshot: &NonAtomicSnapshot, dir: &Path) -> Result<()> {
    let maps_dir = "builder_nonatomic_maps";

    dump_json(
        dir.join(maps_dir).join("builder_nonatomic_map_block.json"),
        &block_map_with_totals(&snapshot.blocks, &snapshot.block_totals),
    )?;
    dump_json(
        dir.join("agg").join("agg_block.json"),
        &aggregate_block_counts(&snapshot.blocks),
    )?;

    for (name, agg_name, map) in [
        ("builder_nonatomic_map_tx", "agg_tx", &snapshot.txs),
        ("builder_nonatomic_map_vol", "agg_vol", &snapshot.volume),
        ("builder_nonatomic_map_coin_bribe", "agg_coin", &snapshot.coin_bribes),
        ("builder_nonatomic_map_gas_bribe", "agg_gas", &snapshot.gas_bribes),
    ] {
        export_map_and_agg(dir, maps_dir, name, map, agg_name, &aggregate_map(map))?;
    }

    dump_json(
        dir.join(maps_dir).join("builder_nonatomic_map_vol_list.json"),
        &snapshot.volume_lists,
    )?;

    let (bribe_map, bribe_agg) =
        combine_bribes_in_eth(&snapshot.gas_bribes, &snapshot.coin_bribes);
    export_map_and_agg(
        dir,
        maps_dir,
        "builder_nonatomic_map_bribe",
        &bribe_map,
        "agg_bribe",
        &bribe_agg,
    )
}

/// Writes the complete output tree for one attribution run.
#[tracing::instrument(skip(snapshot), fields(out_dir = %out_dir.as_ref().display()))]
pub fn export_snapshot(snapshot: &AttributionSnapshot, out_dir: impl AsRef<Path>) -> Result<()> {
    let out_dir = out_dir.as_ref();

    export_atomic(&snapshot.atomic, &out_dir.join("atomic"))?;
    export_nonatomic(&snapshot.nonatomic, &out_dir.join("nonatomic"))?;

    let specs = out_dir.join("nonatomic").join("bribe_specs");
    dump_json(specs.join("coinbase_bribe.json"), &snapshot.evidence.coinbase_bribe)?;
    dump_json(specs.join("after_bribe.json"), &snapshot.evidence.after_bribe)?;
    dump_json(specs.join("tob_bribe.json"), &snapshot.evidence.tob_bribe)?;

    tracing::info!("exported attribution artifacts");
    Ok(())
}
