use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use mev_aggregate::{
    aggregate_map, export_snapshot, filter_map_and_agg_in_range, find_notable,
    prune_known_entities, remove_atomic_overlap, remove_small_builders, stats_totals,
    BuilderSearcherMap, NotableReport,
};
use mev_attribution::engine::analyze_blocks;
use mev_data::blocks::BlockFetcher;
use mev_data::feed::MevFeed;
use mev_data::json::{dump_json, load_json};
use mev_data::transfers::TransferFetcher;
use mev_data::types::{Block, BlockTransfers, MevEvent};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    rpc_url: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "mev-attr")]
#[command(about = "Attributes block-builder revenue to the searchers generating it")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a block range and its fee-recipient internal transfers to JSON.
    Fetch(FetchArgs),
    /// Run attribution + aggregation over cached blocks and export artifacts.
    Analyze(AnalyzeArgs),
    /// Re-run notable-relationship detection on an exported map.
    Notable(NotableArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[arg(long)]
    start_block: u64,

    #[arg(long)]
    end_block: u64,

    #[arg(long, default_value = "data/blocks.json")]
    blocks_out: PathBuf,

    #[arg(long, default_value = "data/internal_transfers.json")]
    transfers_out: PathBuf,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(long, default_value = "data/blocks.json")]
    blocks: PathBuf,

    #[arg(long, default_value = "data/internal_transfers.json")]
    transfers: PathBuf,

    /// Cached feed events (block number → event list); fetched live when absent.
    #[arg(long)]
    events: Option<PathBuf>,

    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Volume coverage retained in the reporting view.
    #[arg(long, default_value_t = 0.9)]
    coverage: f64,

    /// Builders at or below this many attributed txs are dropped from the
    /// reporting view.
    #[arg(long, default_value_t = 5.0)]
    min_builder_txs: f64,

    /// Concurrent feed requests.
    #[arg(long, default_value_t = 64)]
    feed_concurrency: usize,
}

#[derive(Args, Debug)]
struct NotableArgs {
    /// Path to an exported builder→searcher map JSON document.
    #[arg(long)]
    map: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        rpc_url: std::env::var("MEV_RPC_URL").ok(),
    };

    match cli.command {
        Commands::Fetch(args) => handle_fetch(&ctx, args).await,
        Commands::Analyze(args) => handle_analyze(&ctx, args).await,
        Commands::Notable(args) => handle_notable(args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn handle_fetch(ctx: &AppContext, args: FetchArgs) -> Result<()> {
    if args.start_block > args.end_block {
        return Err(eyre!(
            "invalid range: start-block {} is greater than end-block {}",
            args.start_block,
            args.end_block
        ));
    }

    let rpc_url = ctx
        .rpc_url
        .as_deref()
        .ok_or_else(|| eyre!("MEV_RPC_URL is required for the fetch command"))?;

    let fetcher = BlockFetcher::new(rpc_url).await?;
    let blocks = fetcher
        .fetch_range(args.start_block, args.end_block)
        .await
        .wrap_err("failed to fetch block range")?;
    dump_json(&args.blocks_out, &blocks).wrap_err("failed to write block cache")?;

    // internal transfers need an Alchemy-compatible endpoint behind the same URL
    let transfer_fetcher = Arc::new(TransferFetcher::new(rpc_url));
    let transfers = transfer_fetcher.fetch_for_blocks(&blocks, 10).await;
    dump_json(&args.transfers_out, &transfers).wrap_err("failed to write transfer cache")?;

    info!(
        start_block = args.start_block,
        end_block = args.end_block,
        blocks = blocks.len(),
        transfer_blocks = transfers.len(),
        "fetch command finished"
    );
    Ok(())
}

async fn handle_analyze(_ctx: &AppContext, args: AnalyzeArgs) -> Result<()> {
    let blocks: HashMap<u64, Block> =
        load_json(&args.blocks).wrap_err("failed to load block cache")?;
    if blocks.is_empty() {
        return Err(eyre!("block cache {} is empty", args.blocks.display()));
    }
    let transfers: BlockTransfers = match load_json(&args.transfers) {
        Ok(transfers) => transfers,
        Err(e) => {
            tracing::warn!(
                "no internal-transfer cache ({e:#}); coinbase bribes will not be attributed"
            );
            BlockTransfers::new()
        }
    };

    let events: HashMap<u64, Vec<MevEvent>> = match &args.events {
        Some(path) => load_json(path).wrap_err("failed to load event cache")?,
        None => {
            let feed = Arc::new(MevFeed::new());
            let block_numbers: Vec<u64> = blocks.keys().copied().collect();
            feed.fetch_range(&block_numbers, args.feed_concurrency).await
        }
    };

    let block_count = blocks.len();
    let event_block_count = events.len();
    info!(
        blocks = block_count,
        event_blocks = event_block_count,
        "starting attribution"
    );

    let state = analyze_blocks(Arc::new(blocks), Arc::new(transfers), Arc::new(events)).await;
    let snapshot = state.snapshot();

    export_snapshot(&snapshot, &args.out_dir).wrap_err("failed to export artifacts")?;
    dump_json(
        args.out_dir.join("run_manifest.json"),
        &serde_json::json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "blocks": block_count,
            "event_blocks": event_block_count,
            "coverage": args.coverage,
            "min_builder_txs": args.min_builder_txs,
        }),
    )?;

    // Reporting view: atomic totals, pruned non-atomic view without
    // dual-mode actors, filtered to the requested volume coverage.
    let atomic_map = stats_totals(&snapshot.atomic.txs);
    let atomic_agg = aggregate_map(&atomic_map);
    let (atomic_map, atomic_agg) = prune_known_entities(&atomic_map, &atomic_agg);

    let nonatomic_map = snapshot.nonatomic.txs.clone();
    let nonatomic_agg = aggregate_map(&nonatomic_map);
    let (nonatomic_map, nonatomic_agg) = prune_known_entities(&nonatomic_map, &nonatomic_agg);
    let (nonatomic_map, nonatomic_agg) =
        remove_atomic_overlap(&nonatomic_map, &nonatomic_agg, &atomic_agg);
    let (nonatomic_map, nonatomic_agg) =
        remove_small_builders(&nonatomic_map, &nonatomic_agg, args.min_builder_txs);
    let (nonatomic_map, _) =
        filter_map_and_agg_in_range(&nonatomic_map, &nonatomic_agg, args.coverage);

    let (atomic_map, _) = {
        let (map, agg) = remove_small_builders(&atomic_map, &atomic_agg, args.min_builder_txs);
        filter_map_and_agg_in_range(&map, &agg, args.coverage)
    };

    let atomic_report = find_notable(&atomic_map);
    let nonatomic_report = find_notable(&nonatomic_map);
    dump_json(args.out_dir.join("atomic/notable.json"), &atomic_report)?;
    dump_json(args.out_dir.join("nonatomic/notable.json"), &nonatomic_report)?;

    println!("\nAtomic searcher→builder orderflow");
    print_notable(&atomic_report);
    println!("\nNon-atomic searcher→builder orderflow");
    print_notable(&nonatomic_report);

    info!(out_dir = %args.out_dir.display(), "analyze command completed");
    Ok(())
}

fn handle_notable(args: NotableArgs) -> Result<()> {
    let map: BuilderSearcherMap =
        load_json(&args.map).wrap_err("failed to load builder→searcher map")?;
    print_notable(&find_notable(&map));
    Ok(())
}

fn print_notable(report: &NotableReport) {
    let mut share_table = Table::new();
    share_table.load_preset(UTF8_BORDERS_ONLY);
    share_table.set_header(vec!["Builder", "Market Share"]);
    for (builder, share) in &report.builder_market_share {
        share_table.add_row(vec![builder.as_str(), &format!("{share:.2}%")]);
    }
    println!("{share_table}");

    if report.highlighted_pairs.is_empty() {
        println!("no notable relationships found");
        return;
    }

    let mut pair_table = Table::new();
    pair_table.load_preset(UTF8_BORDERS_ONLY);
    pair_table.set_header(vec!["Searcher", "Builder", "Directed Flow"]);
    for pair in &report.highlighted_pairs {
        pair_table.add_row(vec![
            &truncate_address(&pair.searcher),
            pair.builder.as_str(),
            &format!("{:.1}%", pair.percent),
        ]);
    }
    println!("{pair_table}");
}

/// Truncate a hex address for compact table display.
fn truncate_address(address: &str) -> String {
    if address.len() > 14 {
        format!("{}…{}", &address[..8], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
