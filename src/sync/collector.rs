//! Score collection from the risk source.
//!
//! Fetches every configured analysis in order and merges their supporting
//! assets into one label-keyed map. A label seen twice keeps the score of
//! its latest sighting.

use crate::error::{SyncError, SyncResult};
use crate::models::{AnalysisId, RawSupportingAsset, ScoreMap, SupportingAsset};
use crate::sources::RiskSource;
use tracing::{debug, info};

/// Builds the label → supporting asset map.
pub struct ScoreCollector<'a, R: RiskSource + ?Sized> {
    source: &'a R,
    analyses: Vec<AnalysisId>,
}

impl<'a, R: RiskSource + ?Sized> ScoreCollector<'a, R> {
    pub fn new(source: &'a R, analyses: Vec<AnalysisId>) -> Self {
        Self { source, analyses }
    }

    /// Fetches and merges all analyses.
    ///
    /// An empty analysis list is rejected before any request is made. The
    /// first failing fetch aborts the collection.
    pub async fn collect(&self) -> SyncResult<ScoreMap> {
        if self.analyses.is_empty() {
            return Err(SyncError::Configuration(
                "no Egerie analysis id configured".to_string(),
            ));
        }

        info!("Fetching {} analyses from Egerie", self.analyses.len());

        let mut scores = ScoreMap::new();
        for analysis in &self.analyses {
            let records = self.source.fetch_supporting_assets(analysis).await?;
            info!(
                "Analysis {}: {} supporting assets",
                analysis,
                records.len()
            );
            merge_records(&mut scores, records);
        }

        info!("Collected {} distinct supporting assets", scores.len());
        Ok(scores)
    }
}

/// Merges raw records into the map, overwriting earlier scores for the same label.
pub fn merge_records(scores: &mut ScoreMap, records: Vec<RawSupportingAsset>) {
    for record in records {
        let asset = scores
            .entry(record.label.clone())
            .or_insert_with(|| SupportingAsset::new(record.label));

        if let Some(previous) = asset.sigma {
            debug!(
                "Label '{}' seen again: sigma {} replaces {}",
                asset.label, record.sigma, previous
            );
        }
        asset.assign_score(record.sigma);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncState;
    use crate::sources::fake::FakeRiskSource;
    use tokio_test::{assert_err, assert_ok};

    fn ids(raw: &[&str]) -> Vec<AnalysisId> {
        raw.iter().map(|s| AnalysisId::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_collect_merges_analyses() {
        let source = FakeRiskSource::new()
            .with_analysis("1", &[("WebFarm", 0.7), ("DB", 0.2)])
            .with_analysis("2", &[("Orphan", 0.5)]);

        let scores = assert_ok!(ScoreCollector::new(&source, ids(&["1", "2"])).collect().await);

        assert_eq!(scores.len(), 3);
        assert_eq!(scores["WebFarm"].sigma, Some(0.7));
        assert_eq!(scores["Orphan"].state, SyncState::ScoreAssigned);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_label_takes_later_analysis() {
        let source = FakeRiskSource::new()
            .with_analysis("1", &[("DB", 0.2)])
            .with_analysis("2", &[("DB", 0.9)]);

        let scores = ScoreCollector::new(&source, ids(&["1", "2"]))
            .collect()
            .await
            .unwrap();
        assert_eq!(scores["DB"].sigma, Some(0.9));

        let reversed = ScoreCollector::new(&source, ids(&["2", "1"]))
            .collect()
            .await
            .unwrap();
        assert_eq!(reversed["DB"].sigma, Some(0.2));
    }

    #[tokio::test]
    async fn test_duplicate_label_within_one_analysis() {
        let source = FakeRiskSource::new().with_analysis("1", &[("DB", 0.2), ("DB", 0.4)]);
        let scores = ScoreCollector::new(&source, ids(&["1"]))
            .collect()
            .await
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores["DB"].sigma, Some(0.4));
    }

    #[tokio::test]
    async fn test_empty_analyses_makes_no_calls() {
        let source = FakeRiskSource::new().with_analysis("1", &[("DB", 0.2)]);
        let result = ScoreCollector::new(&source, Vec::new()).collect().await;

        assert!(matches!(result, Err(SyncError::Configuration(_))));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_collection() {
        let source = FakeRiskSource::new()
            .with_analysis("1", &[("DB", 0.2)])
            .with_failing_analysis("2")
            .with_analysis("3", &[("WebFarm", 0.7)]);

        let err = assert_err!(
            ScoreCollector::new(&source, ids(&["1", "2", "3"]))
                .collect()
                .await
        );
        assert!(matches!(err, SyncError::Upstream(_)));
        assert_eq!(source.calls(), 2);
    }
}
