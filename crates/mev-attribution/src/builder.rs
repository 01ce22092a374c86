//! Builder identity resolution from block extradata.
//!
//! Builders sign the blocks they assemble through the extradata field
//! (`"beaverbuild.org"`, `"rsync-builder.xyz"`, ...). Resolution never fails:
//! an unrecognized signature becomes its own bucket so no MEV event is ever
//! dropped for lack of a builder identity.

use std::sync::LazyLock;

use alloy::primitives::hex;
use mev_data::entities::{BUILDER_FEE_RECIPIENTS, EXTRA_DATA_FRAGMENTS};

/// Client signatures of locally built (non-MEV-pipeline) blocks.
const VANILLA_SIGNATURES: &[&str] = &["geth", "nethermind", "linux"];

/// Sentinel identity for blocks built by an unmodified execution client.
pub const VANILLA_BUILDER: &str = "vanilla_builder";

/// Fragment table ordered longest-first so the most specific pattern wins
/// (`boba` must be tried before `bob`).
static FRAGMENTS_BY_SPECIFICITY: LazyLock<Vec<(&'static str, &'static str)>> =
    LazyLock::new(|| {
        let mut fragments = EXTRA_DATA_FRAGMENTS.to_vec();
        fragments.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        fragments
    });

/// Resolves a block's raw identifying data to a canonical builder name.
///
/// - empty extradata: the fee recipient identifies the block (a known
///   builder address maps to its canonical name, anything else becomes the
///   lowercased address itself);
/// - a known name fragment in the cleaned extradata: the canonical name;
/// - a bare client signature (`geth`, `nethermind`, `linux`): the
///   [`VANILLA_BUILDER`] sentinel;
/// - anything else: the cleaned extradata as an ad-hoc identity.
pub fn resolve_builder(extra_data: &str, fee_recipient: &str) -> String {
    let cleaned = clean_extra_data(extra_data);

    if cleaned.is_empty() {
        let fee_recipient = fee_recipient.to_lowercase();
        return match BUILDER_FEE_RECIPIENTS.get(fee_recipient.as_str()) {
            Some(name) => (*name).to_string(),
            None => fee_recipient,
        };
    }

    for (fragment, canonical) in FRAGMENTS_BY_SPECIFICITY.iter() {
        if cleaned.contains(fragment) {
            return (*canonical).to_string();
        }
    }

    if VANILLA_SIGNATURES.iter().any(|sig| cleaned.contains(sig)) {
        return VANILLA_BUILDER.to_string();
    }

    cleaned
}

/// Decodes hex extradata as Latin-1 and strips everything non-alphanumeric.
///
/// Latin-1 maps every byte to a char, so arbitrary builder bytes never fail
/// to decode; malformed hex reads as empty.
fn clean_extra_data(extra_data: &str) -> String {
    let bytes = hex::decode(extra_data.trim_start_matches("0x")).unwrap_or_default();
    bytes
        .iter()
        .map(|&b| b as char)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mev_data::entities::BEAVERBUILD;

    fn encode(text: &str) -> String {
        format!("0x{}", hex::encode(text.as_bytes()))
    }

    #[test]
    fn resolves_known_fragment() {
        assert_eq!(
            resolve_builder(&encode("beaverbuild.org"), "0xfee"),
            "beaverbuild"
        );
        assert_eq!(
            resolve_builder(&encode("@rsync-builder.xyz"), "0xfee"),
            "rsync"
        );
        assert_eq!(
            resolve_builder(&encode("Illuminate Dmocratize Dstribute"), "0xfee"),
            "flashbots"
        );
    }

    #[test]
    fn longest_fragment_wins() {
        // "boba" must not be shadowed by the shorter "bob" pattern
        assert_eq!(
            resolve_builder(&encode("boba-builder"), "0xfee"),
            "bobabuilder"
        );
    }

    #[test]
    fn client_signatures_collapse_to_vanilla() {
        assert_eq!(
            resolve_builder(&encode("geth go1.20 linux"), "0xfee"),
            VANILLA_BUILDER
        );
        assert_eq!(
            resolve_builder(&encode("Nethermind v1.18"), "0xfee"),
            VANILLA_BUILDER
        );
    }

    #[test]
    fn empty_extradata_falls_back_to_fee_recipient() {
        assert_eq!(resolve_builder("0x", "0xFEE"), "0xfee");
        // a known builder address resolves to its canonical name
        assert_eq!(resolve_builder("0x", BEAVERBUILD), "beaverbuild");
    }

    #[test]
    fn unknown_signature_becomes_its_own_bucket() {
        assert_eq!(
            resolve_builder(&encode("made by spider-man!"), "0xfee"),
            "madebyspiderman"
        );
    }

    #[test]
    fn malformed_hex_reads_as_empty() {
        assert_eq!(resolve_builder("0xzzzz", "0xfee"), "0xfee");
    }
}
