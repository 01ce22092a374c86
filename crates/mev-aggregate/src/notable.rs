//! Notable-relationship detection.
//!
//! Flags searchers whose orderflow is disproportionately directed at one
//! builder relative to that builder's overall market share. The thresholds
//! scale with share: dominant builders naturally receive most flow, so only
//! near-exclusive routing is surprising for them, while heavy flow toward a
//! marginal builder is surprising at much lower percentages. This yields a
//! small bounded diagnostic set, not an exhaustive statistical test.

use indexmap::IndexMap;
use serde::Serialize;

use crate::agg::{sort_agg, BuilderSearcherMap, SearcherAgg};

/// Only the heaviest searchers are examined.
const TOP_SEARCHERS: usize = 20;

/// One flagged searcher→builder routing relationship.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HighlightedPair {
    pub searcher: String,
    pub builder: String,
    /// Share of the searcher's flow directed at the builder, in percent.
    pub percent: f64,
}

/// Output of [`find_notable`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct NotableReport {
    /// Flagged searchers with their full builder-percentage breakdown.
    pub notable: IndexMap<String, IndexMap<String, f64>>,
    /// Builder → market share in percent, descending.
    pub builder_market_share: SearcherAgg,
    /// The specific searcher→builder pairs that crossed a threshold.
    pub highlighted_pairs: Vec<HighlightedPair>,
}

/// True when `percent` of a searcher's flow toward a builder holding
/// `share` percent of the market is disproportionate for that tier.
fn crosses_threshold(share: f64, percent: f64) -> bool {
    if share > 40.0 {
        percent > 80.0
    } else if share > 25.0 {
        percent > 2.0 * share
    } else if share > 3.0 {
        percent > 3.0 * share
    } else {
        percent > 10.0 * share && percent > 10.0
    }
}

/// Detects statistically disproportionate searcher→builder orderflow.
///
/// Market share is computed per builder over the map's grand total; the map
/// is inverted to a searcher→builder view sorted by searcher totals, and for
/// each of the top searchers the first builder destination that crosses its
/// share tier's threshold flags the searcher and ends its scan.
pub fn find_notable(map: &BuilderSearcherMap) -> NotableReport {
    let builder_totals: SearcherAgg = map
        .iter()
        .map(|(builder, searchers)| (builder.clone(), searchers.values().sum()))
        .collect();
    let grand_total: f64 = builder_totals.values().sum();

    if grand_total <= 0.0 {
        return NotableReport::default();
    }

    let builder_market_share: SearcherAgg = sort_agg(
        &builder_totals
            .iter()
            .map(|(builder, total)| (builder.clone(), total / grand_total * 100.0))
            .collect(),
    );

    // invert to searcher → builder → value
    let mut by_searcher: IndexMap<String, IndexMap<String, f64>> = IndexMap::new();
    for (builder, searchers) in map {
        for (searcher, value) in searchers {
            by_searcher
                .entry(searcher.clone())
                .or_default()
                .insert(builder.clone(), *value);
        }
    }

    let mut searcher_totals: Vec<(String, f64)> = by_searcher
        .iter()
        .map(|(searcher, builders)| (searcher.clone(), builders.values().sum()))
        .collect();
    searcher_totals
        .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut report = NotableReport {
        builder_market_share,
        ..NotableReport::default()
    };

    for (searcher, searcher_total) in searcher_totals.into_iter().take(TOP_SEARCHERS) {
        if searcher_total <= 0.0 {
            continue;
        }
        let destinations = sort_agg(&by_searcher[&searcher]);

        for (builder, value) in &destinations {
            let percent = value / searcher_total * 100.0;
            let share = report
                .builder_market_share
                .get(builder)
                .copied()
                .unwrap_or(0.0);

            if crosses_threshold(share, percent) {
                let breakdown: IndexMap<String, f64> = destinations
                    .iter()
                    .map(|(b, v)| (b.clone(), v / searcher_total * 100.0))
                    .collect();
                report.notable.insert(searcher.clone(), breakdown);
                report.highlighted_pairs.push(HighlightedPair {
                    searcher: searcher.clone(),
                    builder: builder.clone(),
                    percent,
                });
                break;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_map(entries: &[(&str, &[(&str, f64)])]) -> BuilderSearcherMap {
        entries
            .iter()
            .map(|(builder, searchers)| {
                (
                    builder.to_string(),
                    searchers
                        .iter()
                        .map(|(s, v)| (s.to_string(), *v))
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn threshold_tiers_scale_with_share() {
        // dominant builder: only near-exclusive flow is notable
        assert!(!crosses_threshold(45.0, 70.0));
        assert!(crosses_threshold(45.0, 85.0));
        // mid-size builder: 2x its usual share
        assert!(!crosses_threshold(30.0, 55.0));
        assert!(crosses_threshold(30.0, 65.0));
        // small builder: 3x its usual share
        assert!(!crosses_threshold(10.0, 25.0));
        assert!(crosses_threshold(10.0, 35.0));
        // marginal builder: 10x share AND an absolute floor
        assert!(!crosses_threshold(0.5, 8.0));
        assert!(crosses_threshold(0.5, 12.0));
        assert!(!crosses_threshold(2.0, 15.0), "15% is below 10x a 2% share");
    }

    #[test]
    fn flags_searcher_routing_to_a_marginal_builder() {
        // tinybuilder holds 2% of the market, but 0xloyal sends it 60%
        let map = mk_map(&[
            ("megabuilder", &[("0xwide", 880.0), ("0xloyal", 40.0)]),
            ("tinybuilder", &[("0xloyal", 60.0), ("0xwide", 20.0)]),
        ]);

        let report = find_notable(&map);
        assert!((report.builder_market_share["megabuilder"] - 92.0).abs() < 1e-9);
        assert!((report.builder_market_share["tinybuilder"] - 8.0).abs() < 1e-9);

        let pair = report
            .highlighted_pairs
            .iter()
            .find(|p| p.searcher == "0xloyal")
            .expect("0xloyal should be flagged");
        assert_eq!(pair.builder, "tinybuilder");
        assert!((pair.percent - 60.0).abs() < 1e-9);

        // the breakdown covers every destination of the flagged searcher
        assert_eq!(report.notable["0xloyal"].len(), 2);
    }

    #[test]
    fn balanced_flow_is_not_notable() {
        // both searchers route proportionally to market share
        let map = mk_map(&[
            ("a", &[("0x1", 50.0), ("0x2", 50.0)]),
            ("b", &[("0x1", 50.0), ("0x2", 50.0)]),
        ]);

        let report = find_notable(&map);
        assert!(report.notable.is_empty());
        assert!(report.highlighted_pairs.is_empty());
    }

    #[test]
    fn empty_map_yields_empty_report() {
        let report = find_notable(&BuilderSearcherMap::new());
        assert!(report.notable.is_empty());
        assert!(report.builder_market_share.is_empty());
    }

    #[test]
    fn only_first_crossing_per_searcher_is_recorded() {
        // one searcher crossing thresholds for two builders is flagged once
        let map = mk_map(&[
            ("big", &[("0xother", 900.0)]),
            ("nicheA", &[("0xsplit", 30.0)]),
            ("nicheB", &[("0xsplit", 30.0)]),
        ]);

        let report = find_notable(&map);
        let flagged: Vec<&HighlightedPair> = report
            .highlighted_pairs
            .iter()
            .filter(|p| p.searcher == "0xsplit")
            .collect();
        assert_eq!(flagged.len(), 1);
    }
}
