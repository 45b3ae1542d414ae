//! The synchronization pipeline.
//!
//! `collect scores → resolve tiers → match groups → reconcile`, run once,
//! sequentially, against a [`RiskSource`] and an [`AssetSink`].

pub mod collector;
pub mod matcher;
pub mod reconciler;
pub mod tiers;

pub use collector::ScoreCollector;
pub use matcher::GroupMatcher;
pub use reconciler::{ReconcileOptions, Reconciler};
pub use tiers::TierResolver;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::SyncSummary;
use crate::sources::{AssetSink, Credentials, RiskSource};
use tracing::{info, warn};

/// Checks inventory connectivity and opens the risk-source session.
pub async fn connect<R, S>(
    source: &mut R,
    sink: &S,
    credentials: &Credentials,
    check_sink: bool,
) -> SyncResult<()>
where
    R: RiskSource + ?Sized,
    S: AssetSink + ?Sized,
{
    if check_sink {
        if !sink.ping().await? {
            return Err(SyncError::Auth(
                "Cyberwatch did not answer the ping, check the URL and API keys".to_string(),
            ));
        }
        info!("Cyberwatch API reachable");
    }

    source.authenticate(credentials).await?;
    Ok(())
}

/// Runs the full pipeline and returns the summary.
///
/// Configuration and collection errors abort before any update is sent.
/// Per-asset problems only show up in the summary.
pub async fn run_pipeline<R, S>(
    source: &R,
    sink: &S,
    config: &SyncConfig,
    options: ReconcileOptions,
) -> SyncResult<SyncSummary>
where
    R: RiskSource + ?Sized,
    S: AssetSink + ?Sized,
{
    let started_at = chrono::Utc::now();

    let resolver = TierResolver::new(config.bands.clone());
    for (from, to) in resolver.gaps() {
        warn!("No threshold band covers sigma in ({}, {})", from, to);
    }

    let mut scores = ScoreCollector::new(source, config.analyses.clone())
        .collect()
        .await?;

    let unmapped = resolver.assign(&mut scores);
    info!(
        "Resolved tiers for {} supporting assets ({} unmapped)",
        scores.len() - unmapped,
        unmapped
    );

    GroupMatcher::new(sink).apply(&mut scores).await?;

    let mut summary = Reconciler::new(sink, options).run(&mut scores).await;
    summary.analyses = config.analyses.len();
    summary.started_at = started_at;
    Ok(summary)
}
