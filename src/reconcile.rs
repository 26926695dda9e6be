//! Additive-only album membership reconciliation.

use std::collections::{btree_map, BTreeMap, HashSet};

use crate::api::AssetRef;

/// Assets matched for one holiday, merged across all of its windows. Keyed
/// by asset id, so overlapping windows contribute each asset once and
/// iteration order is stable.
#[derive(Debug, Default)]
pub struct MatchSet {
    assets: BTreeMap<String, AssetRef>,
}

impl MatchSet {
    /// Returns `false` when the asset was already present.
    pub fn insert(&mut self, asset: AssetRef) -> bool {
        match self.assets.entry(asset.id.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(asset);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRef> {
        self.assets.values()
    }
}

/// The minimal work needed to bring an album up to date with a match set.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub to_add: Vec<AssetRef>,
    pub already_present: Vec<AssetRef>,
}

/// Diffs matches against current album membership. Purely additive:
/// membership entries that no longer match any window are left untouched,
/// so a manual removal by the user is never reverted unless the asset
/// matches again.
pub fn reconcile(matched: &MatchSet, membership: &HashSet<String>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    for asset in matched.iter() {
        if membership.contains(&asset.id) {
            plan.already_present.push(asset.clone());
        } else {
            plan.to_add.push(asset.clone());
        }
    }
    plan
}
