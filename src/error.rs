//! Error taxonomy for a synchronization run.
//!
//! Configuration, authentication and upstream errors abort the run.
//! Unmapped scores and update failures are isolated per asset and only
//! surface in the final summary.

use crate::models::AssetId;
use thiserror::Error;

/// Errors that can occur while synchronizing criticalities.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("No threshold band matches sigma score {sigma}")]
    UnmappedScore { sigma: f64 },

    #[error("Failed to update asset {asset_id}: {reason}")]
    Update { asset_id: AssetId, reason: String },
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
