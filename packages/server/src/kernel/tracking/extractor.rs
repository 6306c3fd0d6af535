//! Rank extraction over a rendered search-results page.
//!
//! Single page, single pass, no retries: when the target is absent the
//! caller decides whether to widen the search to more pages.

use serde::{Deserialize, Serialize};

/// Number of leading results captured for the competitor snapshot.
const TOP_ENTRIES: usize = 10;

/// One entry as rendered on the results page, in rendered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub display_name: String,
    pub external_id: String,
    pub is_sponsored: bool,
}

/// The entity whose rank is being computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub external_id: String,
    pub display_name: String,
}

/// One row of the top-N competitor snapshot. `rank` is the position within
/// the item's own list (organic or sponsored), not the page position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopEntry {
    pub rank: u32,
    pub display_name: String,
    pub external_id: String,
    pub is_sponsored: bool,
}

/// Output of rank extraction.
///
/// Organic and sponsored ranks are counted independently: an entity that
/// appears only as a paid placement has `organic_rank == None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSnapshot {
    pub organic_rank: Option<u32>,
    pub ad_rank: Option<u32>,
    pub found: bool,
    pub top_entries: Vec<TopEntry>,
}

/// Compute the target's organic and sponsored ranks plus a top-10 snapshot.
///
/// Two independent 1-based counters run over the items in rendered order.
/// A match is primarily by external id; when the id does not match, a
/// normalized-name comparison is tried as a fallback. Each rank slot takes
/// its first match only - a later duplicate listing never overwrites it -
/// but one entity can legitimately hold both an organic and a sponsored
/// rank through two distinct listings.
pub fn extract(items: &[ResultItem], target: &Target) -> RankSnapshot {
    let mut snapshot = RankSnapshot::default();
    let mut organic = 0u32;
    let mut sponsored = 0u32;
    let target_name = normalize_name(&target.display_name);

    for item in items {
        let rank = if item.is_sponsored {
            sponsored += 1;
            sponsored
        } else {
            organic += 1;
            organic
        };

        if snapshot.top_entries.len() < TOP_ENTRIES {
            snapshot.top_entries.push(TopEntry {
                rank,
                display_name: item.display_name.clone(),
                external_id: item.external_id.clone(),
                is_sponsored: item.is_sponsored,
            });
        }

        let slot = if item.is_sponsored {
            &mut snapshot.ad_rank
        } else {
            &mut snapshot.organic_rank
        };
        if slot.is_none() && matches_target(item, target, &target_name) {
            *slot = Some(rank);
            snapshot.found = true;
        }
    }

    snapshot
}

fn matches_target(item: &ResultItem, target: &Target, target_name: &str) -> bool {
    if !target.external_id.is_empty() && item.external_id == target.external_id {
        return true;
    }
    // Name fallback is heuristic: listings often render the same place with
    // different spacing or decoration than the registered name.
    !target_name.is_empty() && normalize_name(&item.display_name) == target_name
}

/// Lowercase and keep only alphanumeric characters. `char::is_alphanumeric`
/// is Unicode-aware, so Hangul survives while whitespace and punctuation are
/// stripped.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
