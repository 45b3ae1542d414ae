//! Egerie risk-management API client.
//!
//! Authenticates with username/password against `/v4/login_check` and
//! reads the supporting assets of an analysis together with their
//! `impact_sigma_score_maj`.

use super::{Credentials, RiskSource, SessionToken};
use crate::error::{SyncError, SyncResult};
use crate::models::{AnalysisId, RawSupportingAsset};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "_username")]
    username: &'a str,
    #[serde(rename = "_password")]
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupportingAssetsResponse {
    data: Vec<SupportingAssetEnvelope>,
}

#[derive(Debug, Deserialize)]
struct SupportingAssetEnvelope {
    data: SupportingAssetFields,
}

#[derive(Debug, Deserialize)]
struct SupportingAssetFields {
    label: Option<String>,
    impact_sigma_score_maj: Option<f64>,
}

/// HTTP client for the Egerie API.
pub struct EgerieClient {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
    token: Option<SessionToken>,
}

impl EgerieClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> SyncResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
            http_client,
            token: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Upstream(format!(
                "Egerie request timed out after {}s",
                self.timeout_seconds
            ))
        } else if e.is_connect() {
            SyncError::Upstream(format!("Cannot connect to Egerie at {}", self.base_url))
        } else {
            SyncError::Upstream(format!("Egerie request failed: {}", e))
        }
    }
}

#[async_trait]
impl RiskSource for EgerieClient {
    async fn authenticate(&mut self, credentials: &Credentials) -> SyncResult<SessionToken> {
        let url = self.endpoint("/v4/login_check");
        let request = LoginRequest {
            username: &credentials.username,
            password: credentials.password.expose(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    SyncError::Auth(format!("Cannot reach Egerie at {}: {}", self.base_url, e))
                } else {
                    SyncError::Auth(format!("Login request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SyncError::Auth(format!(
                "Egerie rejected the credentials (HTTP {}), check the Egerie API username and password",
                status
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to parse Egerie login response: {}", e)))?;

        let token = login
            .token
            .filter(|t| !t.is_empty())
            .map(SessionToken::new)
            .ok_or_else(|| SyncError::Auth("Egerie login response carried no token".to_string()))?;

        info!("Authenticated against Egerie as {}", credentials.username);
        self.token = Some(token.clone());
        Ok(token)
    }

    async fn fetch_supporting_assets(
        &self,
        analysis: &AnalysisId,
    ) -> SyncResult<Vec<RawSupportingAsset>> {
        let token = self.token.as_ref().ok_or_else(|| {
            SyncError::Auth("Not authenticated against Egerie".to_string())
        })?;

        let url = self.endpoint(&format!(
            "/v4/EgerieRM/api/analyses/{}/supporting-assets",
            analysis
        ));
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("iss", "1")])
            .header("X-Security-Token", format!("Bearer {}", token.as_str()))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Upstream(format!(
                "Egerie API error {} for analysis {}: {}",
                status, analysis, body
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            SyncError::Upstream(format!(
                "Failed to parse Egerie response for analysis {}: {}",
                analysis, e
            ))
        })?;

        parse_supporting_assets(analysis, body)
    }
}

/// Extracts `(label, sigma)` pairs from a supporting-assets payload.
///
/// Every record must carry both fields; one malformed record rejects the
/// whole payload.
fn parse_supporting_assets(
    analysis: &AnalysisId,
    body: Value,
) -> SyncResult<Vec<RawSupportingAsset>> {
    let parsed: SupportingAssetsResponse = serde_json::from_value(body).map_err(|e| {
        SyncError::Upstream(format!(
            "Malformed supporting-assets payload for analysis {}: {}",
            analysis, e
        ))
    })?;

    parsed
        .data
        .into_iter()
        .enumerate()
        .map(|(index, envelope)| {
            let fields = envelope.data;
            match (fields.label, fields.impact_sigma_score_maj) {
                (Some(label), Some(sigma)) => Ok(RawSupportingAsset::new(label, sigma)),
                (None, _) => Err(SyncError::Upstream(format!(
                    "Supporting asset #{} of analysis {} has no label",
                    index, analysis
                ))),
                (Some(label), None) => Err(SyncError::Upstream(format!(
                    "Supporting asset '{}' of analysis {} has no impact_sigma_score_maj",
                    label, analysis
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::sources::fake::CannedServer;
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            username: "api".to_string(),
            password: Secret::new("s3cret"),
        }
    }

    #[test]
    fn test_parse_supporting_assets() {
        let body = json!({
            "data": [
                {"data": {"label": "WebFarm", "impact_sigma_score_maj": 0.7, "id": 3}},
                {"data": {"label": "DB", "impact_sigma_score_maj": 0.2}}
            ]
        });

        let assets = parse_supporting_assets(&AnalysisId::new("9"), body).unwrap();
        assert_eq!(
            assets,
            vec![
                RawSupportingAsset::new("WebFarm", 0.7),
                RawSupportingAsset::new("DB", 0.2)
            ]
        );
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let id = AnalysisId::new("9");

        let no_sigma = json!({"data": [{"data": {"label": "WebFarm"}}]});
        let err = parse_supporting_assets(&id, no_sigma).unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));
        assert!(err.to_string().contains("impact_sigma_score_maj"));

        let no_label = json!({"data": [{"data": {"impact_sigma_score_maj": 0.1}}]});
        assert!(matches!(
            parse_supporting_assets(&id, no_label),
            Err(SyncError::Upstream(_))
        ));

        let no_data = json!({"items": []});
        assert!(matches!(
            parse_supporting_assets(&id, no_data),
            Err(SyncError::Upstream(_))
        ));
    }

    #[test]
    fn test_parse_keeps_out_of_range_sigma() {
        let body = json!({"data": [{"data": {"label": "X", "impact_sigma_score_maj": 1.2}}]});
        let assets = parse_supporting_assets(&AnalysisId::new("1"), body).unwrap();
        assert_eq!(assets[0].sigma, 1.2);
    }

    #[tokio::test]
    async fn test_fetch_requires_authentication() {
        let client = EgerieClient::new("https://egerie.invalid/", 5).unwrap();
        assert_eq!(client.endpoint("/v4/login_check"), "https://egerie.invalid/v4/login_check");

        let result = client.fetch_supporting_assets(&AnalysisId::new("1")).await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
    }

    #[tokio::test]
    async fn test_login_posts_credentials_and_keeps_token() {
        let assets = json!({"data": [{"data": {"label": "DB", "impact_sigma_score_maj": 0.2}}]});
        let server = CannedServer::start(vec![
            (200, json!({"token": "abc"}).to_string()),
            (200, assets.to_string()),
        ])
        .await;
        let mut client = EgerieClient::new(&server.base_url, 5).unwrap();

        let token = client.authenticate(&credentials()).await.unwrap();
        assert_eq!(token.as_str(), "abc");

        let fetched = client
            .fetch_supporting_assets(&AnalysisId::new("42"))
            .await
            .unwrap();
        assert_eq!(fetched, vec![RawSupportingAsset::new("DB", 0.2)]);

        let requests = server.requests();
        assert!(requests[0].line.starts_with("POST /v4/login_check "));
        let login: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(login, json!({"_username": "api", "_password": "s3cret"}));

        assert!(requests[1]
            .line
            .starts_with("GET /v4/EgerieRM/api/analyses/42/supporting-assets?iss=1 "));
        assert!(requests[1].headers.contains("x-security-token: bearer abc"));
    }

    #[tokio::test]
    async fn test_rejected_login_is_auth_error() {
        let server = CannedServer::start(vec![(401, json!({"code": 401}).to_string())]).await;
        let mut client = EgerieClient::new(&server.base_url, 5).unwrap();

        let result = client.authenticate(&credentials()).await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
    }

    #[tokio::test]
    async fn test_login_without_token_is_auth_error() {
        let server = CannedServer::start(vec![
            (200, "{}".to_string()),
            (200, json!({"token": ""}).to_string()),
        ])
        .await;
        let mut client = EgerieClient::new(&server.base_url, 5).unwrap();

        assert!(matches!(
            client.authenticate(&credentials()).await,
            Err(SyncError::Auth(_))
        ));
        assert!(matches!(
            client.authenticate(&credentials()).await,
            Err(SyncError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_upstream_error() {
        let server = CannedServer::start(vec![
            (200, json!({"token": "abc"}).to_string()),
            (404, "analysis not found".to_string()),
        ])
        .await;
        let mut client = EgerieClient::new(&server.base_url, 5).unwrap();
        client.authenticate(&credentials()).await.unwrap();

        let err = client
            .fetch_supporting_assets(&AnalysisId::new("7"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));
        assert!(err.to_string().contains("analysis not found"));
    }
}
