//! Restricts resolved locators to public road links.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::{model::RoadLink, resolver::ResolvedAsset};

/// Result of [`filter_locators`].
#[derive(Debug, Default)]
pub struct LinkFilterOutcome {
    /// Assets with at least one locator on a public link.
    pub kept: Vec<ResolvedAsset>,
    /// Referenced link ids that are not public road links.
    pub missing_links: BTreeSet<String>,
    /// External ids of assets left without any locator.
    pub dropped: Vec<String>,
}

/// All distinct link ids referenced by `resolved`, sorted.
pub fn referenced_links(resolved: &[ResolvedAsset]) -> Vec<String> {
    resolved
        .iter()
        .flat_map(|r| r.locators.iter().map(|l| l.link_id.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Drops locators whose link is not in `links` and attaches the link's side
/// code to the rest. Assets left without locators are reported as dropped;
/// that is a resolution gap, not an error.
pub fn filter_locators(
    resolved: Vec<ResolvedAsset>,
    links: &HashMap<String, RoadLink>,
) -> LinkFilterOutcome {
    let mut out = LinkFilterOutcome::default();
    for mut r in resolved {
        r.locators.retain_mut(|l| match links.get(&l.link_id) {
            Some(link) => {
                l.side_code = link.side_code;
                true
            }
            None => {
                out.missing_links.insert(l.link_id.clone());
                false
            }
        });
        if r.locators.is_empty() {
            out.dropped.push(r.asset.oid.clone());
        } else {
            out.kept.push(r);
        }
    }

    if out.missing_links.is_empty() {
        info!(links = links.len(), "all resolved links are public road links");
    } else {
        warn!(
            missing = out.missing_links.len(),
            dropped_assets = out.dropped.len(),
            links = ?out.missing_links,
            "resolved links missing from the public network"
        );
    }
    out
}
