//! Matching of supporting-asset labels against inventory group names.

use crate::error::SyncResult;
use crate::models::{GroupId, InventoryGroup, ScoreMap};
use crate::sources::AssetSink;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Maps each label to the id of the group bearing exactly that name.
///
/// Groups with unrelated names are ignored. If the inventory holds several
/// groups with the same name, the last one listed wins.
pub fn match_groups(
    groups: &[InventoryGroup],
    labels: &BTreeSet<String>,
) -> BTreeMap<String, GroupId> {
    let mut matches = BTreeMap::new();

    for group in groups {
        if labels.contains(&group.name) {
            debug!("Group '{}' (#{}) is an Egerie supporting asset", group.name, group.id);
            matches.insert(group.name.clone(), group.id);
        }
    }

    matches
}

/// Resolves inventory groups for the assets of a score map.
pub struct GroupMatcher<'a, S: AssetSink + ?Sized> {
    sink: &'a S,
}

impl<'a, S: AssetSink + ?Sized> GroupMatcher<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    /// Lists inventory groups and records matches on tiered assets.
    ///
    /// Returns the number of assets that found their group.
    pub async fn apply(&self, scores: &mut ScoreMap) -> SyncResult<usize> {
        let groups = self.sink.list_groups().await?;
        info!("Found {} groups in Cyberwatch", groups.len());

        let labels: BTreeSet<String> = scores.keys().cloned().collect();
        let matches = match_groups(&groups, &labels);

        let mut matched = 0;
        for asset in scores.values_mut() {
            match matches.get(&asset.label) {
                Some(&group_id) => {
                    if asset.assign_group(group_id) {
                        matched += 1;
                    }
                }
                None => {
                    if asset.mark_no_group() {
                        debug!("No Cyberwatch group named '{}'", asset.label);
                    }
                }
            }
        }

        info!("{} supporting assets matched a Cyberwatch group", matched);
        Ok(matched)
    }
}
