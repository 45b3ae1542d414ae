//! Sigma score → criticality tier resolution.

use crate::error::{SyncError, SyncResult};
use crate::models::{ScoreMap, ThresholdBand, TierId};
use tracing::{debug, warn};

/// Maps scores to tiers through an ordered list of inclusive bands.
#[derive(Debug, Clone)]
pub struct TierResolver {
    bands: Vec<ThresholdBand>,
}

impl TierResolver {
    pub fn new(bands: Vec<ThresholdBand>) -> Self {
        Self { bands }
    }

    /// Returns the tier of the last band containing `sigma`.
    ///
    /// Overlapping bands are legal; the one configured later wins, so a
    /// score sitting on a shared boundary goes to the upper band of the
    /// default layout. No clamping is applied.
    pub fn resolve(&self, sigma: f64) -> SyncResult<TierId> {
        self.bands
            .iter()
            .rev()
            .find(|band| band.contains(sigma))
            .map(|band| band.tier)
            .ok_or(SyncError::UnmappedScore { sigma })
    }

    /// Resolves every scored asset in the map. Returns the number of unmapped assets.
    pub fn assign(&self, scores: &mut ScoreMap) -> usize {
        let mut unmapped = 0;

        for asset in scores.values_mut() {
            let Some(sigma) = asset.sigma else {
                continue;
            };
            match self.resolve(sigma) {
                Ok(tier) => {
                    debug!("'{}' (sigma {}) → tier {}", asset.label, sigma, tier);
                    asset.assign_tier(tier);
                }
                Err(e) => {
                    warn!("Skipping '{}': {}", asset.label, e);
                    asset.mark_unmapped();
                    unmapped += 1;
                }
            }
        }

        unmapped
    }

    /// Sub-ranges of `[0, 1]` not covered by any band.
    pub fn gaps(&self) -> Vec<(f64, f64)> {
        let mut bands: Vec<&ThresholdBand> = self.bands.iter().collect();
        bands.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut gaps = Vec::new();
        let mut covered_to: Option<f64> = None;

        for band in bands {
            if band.max < 0.0 || band.min > 1.0 {
                continue;
            }
            match covered_to {
                None if band.min > 0.0 => gaps.push((0.0, band.min)),
                Some(edge) if band.min > edge => gaps.push((edge, band.min)),
                _ => {}
            }
            covered_to = Some(covered_to.map_or(band.max, |edge| edge.max(band.max)));
        }

        match covered_to {
            None => gaps.push((0.0, 1.0)),
            Some(edge) if edge < 1.0 => gaps.push((edge, 1.0)),
            _ => {}
        }

        gaps
    }
}
