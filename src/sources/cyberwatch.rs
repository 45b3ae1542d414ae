//! Cyberwatch API client.
//!
//! Uses the v3 REST API with the access/secret key pair as basic-auth
//! credentials. Groups and servers are paginated; a server's criticality
//! is its environment.

use super::AssetSink;
use crate::config::{CyberwatchConfig, Secret};
use crate::error::{SyncError, SyncResult};
use crate::models::{AssetId, GroupId, InventoryAsset, InventoryGroup, TierId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 1000;

/// HTTP client for the Cyberwatch API.
pub struct CyberwatchClient {
    base_url: String,
    api_key: String,
    secret_key: Secret,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl CyberwatchClient {
    pub fn new(config: &CyberwatchConfig, timeout_seconds: u64) -> SyncResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            timeout_seconds,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Upstream(format!(
                "Cyberwatch request timed out after {}s",
                self.timeout_seconds
            ))
        } else if e.is_connect() {
            SyncError::Upstream(format!("Cannot connect to Cyberwatch at {}", self.base_url))
        } else {
            SyncError::Upstream(format!("Cyberwatch request failed: {}", e))
        }
    }

    /// Fetches every page of a list endpoint.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, String)],
    ) -> SyncResult<Vec<T>> {
        let url = self.endpoint(path);
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut query: Vec<(&str, String)> = filters.to_vec();
            query.push(("page", page.to_string()));
            query.push(("per_page", PER_PAGE.to_string()));

            debug!("GET {} page {}", url, page);
            let response = self
                .http_client
                .get(&url)
                .basic_auth(&self.api_key, Some(self.secret_key.expose()))
                .query(&query)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(SyncError::Auth(format!(
                    "Cyberwatch rejected the API keys (HTTP {})",
                    status
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::Upstream(format!(
                    "Cyberwatch API error {} on {}: {}",
                    status, path, body
                )));
            }

            let batch: Vec<T> = response.json().await.map_err(|e| {
                SyncError::Upstream(format!("Failed to parse Cyberwatch response on {}: {}", path, e))
            })?;

            let count = batch.len();
            items.extend(batch);
            if count < PER_PAGE {
                return Ok(items);
            }
        }

        warn!("Stopped paginating {} after {} pages", path, MAX_PAGES);
        Ok(items)
    }
}

#[async_trait]
impl AssetSink for CyberwatchClient {
    async fn ping(&self) -> SyncResult<bool> {
        let response = self
            .http_client
            .get(self.endpoint("/api/v3/ping"))
            .basic_auth(&self.api_key, Some(self.secret_key.expose()))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Auth(format!(
                "Cyberwatch rejected the API keys (HTTP {})",
                status
            )));
        }
        Ok(status.is_success())
    }

    async fn list_groups(&self) -> SyncResult<Vec<InventoryGroup>> {
        self.get_paginated("/api/v3/groups", &[]).await
    }

    async fn list_assets(&self, group: GroupId) -> SyncResult<Vec<InventoryAsset>> {
        self.get_paginated(
            "/api/v3/vulnerabilities/servers",
            &[("group_id", group.to_string())],
        )
        .await
    }

    async fn set_criticality(&self, asset: AssetId, tier: TierId) -> SyncResult<()> {
        let url = self.endpoint(&format!("/api/v3/vulnerabilities/servers/{}", asset));

        let response = self
            .http_client
            .patch(&url)
            .basic_auth(&self.api_key, Some(self.secret_key.expose()))
            .json(&json!({ "environment_id": tier }))
            .send()
            .await
            .map_err(|e| SyncError::Update {
                asset_id: asset,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Update {
                asset_id: asset,
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        Ok(())
    }
}
