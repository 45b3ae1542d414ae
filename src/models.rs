//! Data models for the criticality synchronization.
//!
//! This module contains the records flowing through the pipeline: risk
//! analysis identifiers, threshold bands, supporting assets and their
//! lifecycle, inventory entities, and the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cyberwatch environment (criticality) identifier.
pub type TierId = u32;

/// Cyberwatch group identifier.
pub type GroupId = u64;

/// Cyberwatch server identifier.
pub type AssetId = u64;

/// Merged label → supporting asset map built by the score collector.
pub type ScoreMap = BTreeMap<String, SupportingAsset>;

/// Identifier of one Egerie risk analysis.
///
/// Accepts either a string or an integer in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawAnalysisId", into = "String")]
pub struct AnalysisId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnalysisId {
    Text(String),
    Number(u64),
}

impl From<RawAnalysisId> for AnalysisId {
    fn from(raw: RawAnalysisId) -> Self {
        match raw {
            RawAnalysisId::Text(s) => AnalysisId(s.trim().to_string()),
            RawAnalysisId::Number(n) => AnalysisId(n.to_string()),
        }
    }
}

impl From<AnalysisId> for String {
    fn from(id: AnalysisId) -> Self {
        id.0
    }
}

impl AnalysisId {
    pub fn new(id: impl Into<String>) -> Self {
        AnalysisId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sigma range mapped to one criticality tier. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub min: f64,
    pub max: f64,
    pub tier: TierId,
}

impl ThresholdBand {
    pub fn new(min: f64, max: f64, tier: TierId) -> Self {
        Self { min, max, tier }
    }

    /// Returns true if `sigma` lies within `[min, max]`.
    pub fn contains(&self, sigma: f64) -> bool {
        self.min <= sigma && sigma <= self.max
    }
}

/// Bands applied when configuration does not provide any:
/// low below 0.33, medium up to 0.66, high above.
pub fn default_bands() -> Vec<ThresholdBand> {
    vec![
        ThresholdBand::new(0.0, 0.33, 1),
        ThresholdBand::new(0.33, 0.66, 2),
        ThresholdBand::new(0.66, 1.0, 3),
    ]
}

/// A labeled score as returned by the risk source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSupportingAsset {
    pub label: String,
    pub sigma: f64,
}

impl RawSupportingAsset {
    pub fn new(label: impl Into<String>, sigma: f64) -> Self {
        Self {
            label: label.into(),
            sigma,
        }
    }
}

/// An asset group in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryGroup {
    pub id: GroupId,
    pub name: String,
}

/// A server in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAsset {
    pub id: AssetId,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl InventoryAsset {
    /// Hostname for display, falling back to the server id.
    pub fn display_name(&self) -> String {
        match &self.hostname {
            Some(h) if !h.is_empty() => h.clone(),
            _ => format!("server #{}", self.id),
        }
    }
}

/// Lifecycle of a supporting asset within one run.
///
/// `Discovered → ScoreAssigned → TierAssigned → GroupMatched → Reconciled`,
/// with `SkippedNoTier` and `SkippedNoGroup` as early exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Discovered,
    ScoreAssigned,
    TierAssigned,
    GroupMatched,
    Reconciled,
    SkippedNoGroup,
    SkippedNoTier,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Reconciled | SyncState::SkippedNoGroup | SyncState::SkippedNoTier
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Discovered => write!(f, "discovered"),
            SyncState::ScoreAssigned => write!(f, "score assigned"),
            SyncState::TierAssigned => write!(f, "tier assigned"),
            SyncState::GroupMatched => write!(f, "group matched"),
            SyncState::Reconciled => write!(f, "reconciled"),
            SyncState::SkippedNoGroup => write!(f, "skipped (no group)"),
            SyncState::SkippedNoTier => write!(f, "skipped (no tier)"),
        }
    }
}

/// A business-impact unit from Egerie, enriched as it moves through the pipeline.
///
/// Every transition method returns `false` and leaves the record untouched
/// when called from the wrong state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingAsset {
    pub label: String,
    pub sigma: Option<f64>,
    pub tier: Option<TierId>,
    pub group_id: Option<GroupId>,
    pub state: SyncState,
}

impl SupportingAsset {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sigma: None,
            tier: None,
            group_id: None,
            state: SyncState::Discovered,
        }
    }

    /// Sets the sigma score. A second call before tier resolution overwrites the first.
    pub fn assign_score(&mut self, sigma: f64) -> bool {
        match self.state {
            SyncState::Discovered | SyncState::ScoreAssigned => {
                self.sigma = Some(sigma);
                self.state = SyncState::ScoreAssigned;
                true
            }
            _ => false,
        }
    }

    pub fn assign_tier(&mut self, tier: TierId) -> bool {
        if self.state != SyncState::ScoreAssigned {
            return false;
        }
        self.tier = Some(tier);
        self.state = SyncState::TierAssigned;
        true
    }

    /// The score fell outside every threshold band.
    pub fn mark_unmapped(&mut self) -> bool {
        if self.state != SyncState::ScoreAssigned {
            return false;
        }
        self.state = SyncState::SkippedNoTier;
        true
    }

    pub fn assign_group(&mut self, group_id: GroupId) -> bool {
        if self.state != SyncState::TierAssigned {
            return false;
        }
        self.group_id = Some(group_id);
        self.state = SyncState::GroupMatched;
        true
    }

    /// No inventory group carries this label.
    pub fn mark_no_group(&mut self) -> bool {
        if self.state != SyncState::TierAssigned {
            return false;
        }
        self.state = SyncState::SkippedNoGroup;
        true
    }

    pub fn mark_reconciled(&mut self) -> bool {
        if self.state != SyncState::GroupMatched {
            return false;
        }
        self.state = SyncState::Reconciled;
        true
    }

    /// Tier and group, present only once the asset is ready for the update stage.
    pub fn update_target(&self) -> Option<(TierId, GroupId)> {
        if self.state != SyncState::GroupMatched {
            return None;
        }
        Some((self.tier?, self.group_id?))
    }
}

/// Per-label record of what happened during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelOutcome {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub state: SyncState,
    /// Servers found in the matched group.
    pub assets: usize,
    /// Servers successfully updated.
    pub updated: usize,
    /// Servers whose update failed.
    pub failed: usize,
}

impl LabelOutcome {
    pub fn from_asset(asset: &SupportingAsset) -> Self {
        Self {
            label: asset.label.clone(),
            sigma: asset.sigma,
            tier: asset.tier,
            group_id: asset.group_id,
            state: asset.state,
            assets: 0,
            updated: 0,
            failed: 0,
        }
    }
}

/// Summary of a synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Whether updates were only planned, not applied.
    pub dry_run: bool,
    /// Number of analyses fetched.
    pub analyses: usize,
    /// Number of distinct labels collected.
    pub labels: usize,
    /// Number of groups whose servers were processed.
    pub groups_reconciled: usize,
    /// Groups whose server listing failed.
    pub group_failures: usize,
    /// Servers updated (or planned, in dry-run mode).
    pub updated: usize,
    /// Server updates that failed.
    pub failed: usize,
    /// Labels without a matching inventory group.
    pub skipped_no_group: usize,
    /// Labels whose score matched no threshold band.
    pub skipped_no_tier: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<LabelOutcome>,
}

impl SyncSummary {
    pub fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            dry_run,
            analyses: 0,
            labels: 0,
            groups_reconciled: 0,
            group_failures: 0,
            updated: 0,
            failed: 0,
            skipped_no_group: 0,
            skipped_no_tier: 0,
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    /// Total labels skipped before the update stage.
    pub fn skipped(&self) -> usize {
        self.skipped_no_group + self.skipped_no_tier
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
