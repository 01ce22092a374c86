//! Static known-entity tables.
//!
//! All addresses are lowercase hex. The builder tables identify blocks; the
//! contract tables feed the aggregation layer's pruning pass so router and
//! order-flow contracts never show up as searchers.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// Known builder fee recipient addresses.
pub const BUILDER_0X69: &str = "0x690b9a9e9aa1c9db991c7721a92d351db4fac990";
pub const BEAVERBUILD: &str = "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5";
pub const RSYNC: &str = "0x1f9090aae28b8a3dceadf281b0f12828e676c326";
pub const FLASHBOTS: &str = "0xdafea492d9c6733ae3d56b7ed1adb60692c98bc5";
pub const TITAN: &str = "0x4838b106fce9647bdf1e7877bf73ce8b0bad5f97";
pub const BLOXROUTE_MAX_PROFIT: &str = "0xf2f5c73fa04406b1995e397b55c24ab1f3ea726c";
pub const BLOXROUTE_REGULATED: &str = "0x199d5ed7f45f4ee35960cf22eade2076e95b253f";
pub const BLOCKNATIVE: &str = "0xbaf6dc2e647aeb6f510f9e318856a1bcd66c5e19";
pub const F1B: &str = "0x5124fcc2b3f99f571ad67d075643c743f38f1c34";
pub const BUILDAI: &str = "0xbd3afb0bb76683ecb4225f9dbc91f998713c3b01";
pub const ETHBUILDER: &str = "0xfeebabe6b0418ec13b30aadf129f5dcdd4f70cea";
pub const BOBABUILDER: &str = "0x3b64216ad1a58f61538b4fa1b27327675ab7ed67";
pub const PAYLOAD: &str = "0xce0babc8398144aa98d9210d595e3a9714910748";
pub const EDEN: &str = "0xaab27b150451726ec7738aa1d0a94505c8729bd1";
pub const LIGHTSPEEDBUILDER_1: &str = "0x7316b4e0f0d4b19b4ac13895224cd522d785e51d";
pub const LIGHTSPEEDBUILDER_2: &str = "0xd2090025857b9c7b24387741f120538e928a3a59";
pub const ANTBUILDER: &str = "0xc9d945721ed37c6451e457b3c7f1e0cec42417fb";
pub const UWUBUILDER: &str = "0xd0d0ce5c067eeea7487ca11153247905364eeb12";
pub const GAMBIT: &str = "0x0aa8ebb6ad5a8e499e550ae2c461197624c6e667";
pub const NFACTORIAL: &str = "0x3b7faec3181114a99c243608bc822c5436441fff";

/// Extradata fragment → canonical builder name.
///
/// Fragments must be minimally unique (e.g. `uwu` matches uwubuilder and no
/// other builder). Where spelling variants exist they both map to the same
/// canonical name. Matching is longest-fragment-first; see
/// `mev_attribution::builder`.
pub static EXTRA_DATA_FRAGMENTS: &[(&str, &str)] = &[
    ("beaverbuild", "beaverbuild"),
    ("builder0x69", "builder0x69"),
    ("rsync", "rsync"),
    ("blocknative", "blocknative"),
    ("titan", "titan"),
    ("bloxroute", "bloxroute"),
    ("bloxr", "bloxroute"),
    ("illuminate", "flashbots"),
    ("buildai", "buildai"),
    ("f1b", "f1b"),
    ("eden", "eden"),
    ("ethbuilder", "ethbuilder"),
    ("boba", "bobabuilder"),
    ("lightspeed", "lightspeedbuilder"),
    ("payload", "payload"),
    ("gambit", "gambitlabs"),
    ("bobthebuilder", "bobthebuilder"),
    ("nfactorial", "nfactorial"),
    ("antbuilder", "antbuilder"),
    ("uwu", "uwubuilder"),
];

/// Known fee recipient address → canonical builder name.
///
/// Consulted when a block carries no extradata at all; an imposter can copy a
/// real builder's fee recipient, but doing so is financially pointless so no
/// further check is made.
pub static BUILDER_FEE_RECIPIENTS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            (BEAVERBUILD, "beaverbuild"),
            (BUILDER_0X69, "builder0x69"),
            (RSYNC, "rsync"),
            (FLASHBOTS, "flashbots"),
            (TITAN, "titan"),
            (BLOXROUTE_MAX_PROFIT, "bloxroute"),
            (BLOXROUTE_REGULATED, "bloxroute"),
            (BLOCKNATIVE, "blocknative"),
            (F1B, "f1b"),
            (BUILDAI, "buildai"),
            (ETHBUILDER, "ethbuilder"),
            (BOBABUILDER, "bobabuilder"),
            (PAYLOAD, "payload"),
            (EDEN, "eden"),
            (LIGHTSPEEDBUILDER_1, "lightspeedbuilder"),
            (LIGHTSPEEDBUILDER_2, "lightspeedbuilder"),
            (ANTBUILDER, "antbuilder"),
            (UWUBUILDER, "uwubuilder"),
            (GAMBIT, "gambitlabs"),
            (NFACTORIAL, "nfactorial"),
        ])
    });

/// Router and aggregator contracts that take user order flow.
///
/// An address in this set is a venue, not a searcher, and is pruned from
/// every aggregate view.
pub static COMMON_CONTRACTS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        // Uniswap v2 router 02
        "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
        // Uniswap v3 swap router
        "0xe592427a0aece92de3edee1f18e0157c05861564",
        // Uniswap v3 swap router 02
        "0x68b3465833fb72a70ecdf485e0e4c7bd8665fc45",
        // Uniswap universal router
        "0x3fc91a3afd70395cd496c647d5a6cc9d4b2b7fad",
        // Sushiswap router
        "0xd9e1ce17f2641f24ae83637ab66a2cca9c378b9f",
        // 1inch aggregation router v5
        "0x1111111254eeb25477b68fb85ed929f73a960582",
        // 0x exchange proxy
        "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
        // Metamask swap router
        "0x881d40237659c251811cec9c364ef91dc08d300c",
        // Kyberswap meta aggregation router v2
        "0x6131b5fae19ea4f9d964eac0408e4408b66337b5",
        // Paraswap augustus v5
        "0xdef171fe48cf0115b1d80b88dc8eab59176fee57",
    ])
});

/// Labeled order-flow contracts: address → human label.
///
/// Telegram-bot routers and similar order-flow entities whose swaps land in
/// the feed but are user flow rather than searcher activity.
pub static LABELED_CONTRACTS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            (
                "0x3328f7f4a1d1c57c35df56bbf0c9dcafca309c49",
                "banana_gun_router",
            ),
            (
                "0x80a64c6d7f12c47b7c66c5b4e20e72bc1fcd5d9e",
                "maestro_router",
            ),
            (
                "0x00000047bb99ea4d791bb749d970de71ee0b1a34",
                "transit_swap_router",
            ),
            (
                "0xe66b31678d6c16e9ebf358268a790b763c133750",
                "coinbase_wallet_router",
            ),
            (
                "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
                "lifi_diamond",
            ),
        ])
    });

/// True when the address belongs to a known venue or labeled order-flow
/// contract and must never be counted as a searcher.
pub fn is_known_entity(address: &str) -> bool {
    COMMON_CONTRACTS.contains(address) || LABELED_CONTRACTS.contains_key(address)
}
