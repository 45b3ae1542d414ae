//! Application of resolved criticalities to inventory servers.
//!
//! Each supporting asset with both a tier and a group gets its tier pushed
//! to every server of the group. Failures are isolated: a failed update
//! or an unlistable group is counted and the run moves on.

use crate::models::{LabelOutcome, ScoreMap, SyncState, SyncSummary};
use crate::sources::AssetSink;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Options for a reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// List servers and plan updates without applying them.
    pub dry_run: bool,
    /// Whether to show a progress bar over server updates.
    pub show_progress: bool,
}

/// Pushes tiers to the inventory.
pub struct Reconciler<'a, S: AssetSink + ?Sized> {
    sink: &'a S,
    options: ReconcileOptions,
}

impl<'a, S: AssetSink + ?Sized> Reconciler<'a, S> {
    pub fn new(sink: &'a S, options: ReconcileOptions) -> Self {
        Self { sink, options }
    }

    /// Reconciles every ready asset and returns the run summary.
    ///
    /// In dry-run mode matched assets stay `GroupMatched` and `updated`
    /// counts the updates that would have been sent.
    pub async fn run(&self, scores: &mut ScoreMap) -> SyncSummary {
        let mut summary = SyncSummary::new(self.options.dry_run);
        summary.labels = scores.len();

        let progress = self.progress_bar();

        for asset in scores.values_mut() {
            let Some((tier, group_id)) = asset.update_target() else {
                match asset.state {
                    SyncState::SkippedNoGroup => summary.skipped_no_group += 1,
                    SyncState::SkippedNoTier => summary.skipped_no_tier += 1,
                    _ => {}
                }
                summary.outcomes.push(LabelOutcome::from_asset(asset));
                continue;
            };

            info!(
                "Applying tier {} to servers of group #{} ('{}')",
                tier, group_id, asset.label
            );

            let servers = match self.sink.list_assets(group_id).await {
                Ok(servers) => servers,
                Err(e) => {
                    warn!("Cannot list servers of group '{}': {}", asset.label, e);
                    summary.group_failures += 1;
                    summary.outcomes.push(LabelOutcome::from_asset(asset));
                    continue;
                }
            };

            progress.inc_length(servers.len() as u64);
            let mut updated = 0;
            let mut failed = 0;

            for server in &servers {
                if self.options.dry_run {
                    info!("Would set {} to tier {}", server.display_name(), tier);
                    updated += 1;
                } else {
                    match self.sink.set_criticality(server.id, tier).await {
                        Ok(()) => {
                            debug!("Updated {} to tier {}", server.display_name(), tier);
                            updated += 1;
                        }
                        Err(e) => {
                            warn!("{} ({})", e, server.display_name());
                            failed += 1;
                        }
                    }
                }
                progress.inc(1);
            }

            if !self.options.dry_run {
                asset.mark_reconciled();
            }
            summary.groups_reconciled += 1;
            summary.updated += updated;
            summary.failed += failed;

            let mut outcome = LabelOutcome::from_asset(asset);
            outcome.assets = servers.len();
            outcome.updated = updated;
            outcome.failed = failed;
            summary.outcomes.push(outcome);
        }

        progress.finish_and_clear();
        summary.finished_at = Utc::now();

        info!(
            "Reconciled {} groups: {} servers updated, {} failed, {} labels skipped",
            summary.groups_reconciled,
            summary.updated,
            summary.failed,
            summary.skipped()
        );

        summary
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} servers")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
