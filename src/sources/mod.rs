//! External collaborators.
//!
//! The pipeline only talks to the outside world through two interfaces:
//! a [`RiskSource`] providing labeled sigma scores, and an [`AssetSink`]
//! holding the groups and servers whose criticality gets updated.

pub mod cyberwatch;
pub mod egerie;
#[cfg(test)]
pub mod fake;

pub use cyberwatch::CyberwatchClient;
pub use egerie::EgerieClient;

use crate::config::Secret;
use crate::error::SyncResult;
use crate::models::{
    AnalysisId, AssetId, GroupId, InventoryAsset, InventoryGroup, RawSupportingAsset, TierId,
};
use async_trait::async_trait;
use std::fmt;

/// Username/password pair for the risk source.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

/// Session token returned by a successful authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        SessionToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

/// Source of business-impact scores (Egerie).
#[async_trait]
pub trait RiskSource: Send + Sync {
    /// Opens a session. Fails with `SyncError::Auth` on rejected credentials.
    async fn authenticate(&mut self, credentials: &Credentials) -> SyncResult<SessionToken>;

    /// Fetches the labeled supporting assets of one analysis.
    async fn fetch_supporting_assets(
        &self,
        analysis: &AnalysisId,
    ) -> SyncResult<Vec<RawSupportingAsset>>;
}

/// Inventory whose servers receive criticalities (Cyberwatch).
#[async_trait]
pub trait AssetSink: Send + Sync {
    /// Liveness check.
    async fn ping(&self) -> SyncResult<bool>;

    async fn list_groups(&self) -> SyncResult<Vec<InventoryGroup>>;

    async fn list_assets(&self, group: GroupId) -> SyncResult<Vec<InventoryAsset>>;

    /// Sets the criticality of one server. Failures are reported per call.
    async fn set_criticality(&self, asset: AssetId, tier: TierId) -> SyncResult<()>;
}
