//! In-memory collaborators and a canned HTTP server for tests.

use super::{AssetSink, Credentials, RiskSource, SessionToken};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    AnalysisId, AssetId, GroupId, InventoryAsset, InventoryGroup, RawSupportingAsset, TierId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Risk source serving canned analyses.
#[derive(Default)]
pub struct FakeRiskSource {
    analyses: HashMap<String, Vec<RawSupportingAsset>>,
    failing: HashSet<String>,
    password: Option<String>,
    calls: AtomicUsize,
}

impl FakeRiskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(mut self, id: &str, assets: &[(&str, f64)]) -> Self {
        self.analyses.insert(
            id.to_string(),
            assets
                .iter()
                .map(|(label, sigma)| RawSupportingAsset::new(*label, *sigma))
                .collect(),
        );
        self
    }

    /// Makes fetching this analysis fail with an upstream error.
    pub fn with_failing_analysis(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Only this password will be accepted.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RiskSource for FakeRiskSource {
    async fn authenticate(&mut self, credentials: &Credentials) -> SyncResult<SessionToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.password {
            Some(expected) if expected != credentials.password.expose() => {
                Err(SyncError::Auth("bad credentials".to_string()))
            }
            _ => Ok(SessionToken::new("fake-token")),
        }
    }

    async fn fetch_supporting_assets(
        &self,
        analysis: &AnalysisId,
    ) -> SyncResult<Vec<RawSupportingAsset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(analysis.as_str()) {
            return Err(SyncError::Upstream(format!("HTTP 500 for {}", analysis)));
        }
        self.analyses
            .get(analysis.as_str())
            .cloned()
            .ok_or_else(|| SyncError::Upstream(format!("HTTP 404 for {}", analysis)))
    }
}

/// Inventory with canned groups and servers, recording every update.
#[derive(Default)]
pub struct FakeAssetSink {
    groups: Vec<InventoryGroup>,
    assets: HashMap<GroupId, Vec<InventoryAsset>>,
    failing_assets: HashSet<AssetId>,
    failing_groups: HashSet<GroupId>,
    updates: Mutex<Vec<(AssetId, TierId)>>,
    calls: AtomicUsize,
}

impl FakeAssetSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, id: GroupId, name: &str, asset_ids: &[AssetId]) -> Self {
        self.groups.push(InventoryGroup {
            id,
            name: name.to_string(),
        });
        self.assets.insert(
            id,
            asset_ids
                .iter()
                .map(|&asset| InventoryAsset {
                    id: asset,
                    hostname: Some(format!("host-{}", asset)),
                })
                .collect(),
        );
        self
    }

    /// Makes updating this server fail.
    pub fn with_failing_asset(mut self, id: AssetId) -> Self {
        self.failing_assets.insert(id);
        self
    }

    /// Makes listing the servers of this group fail.
    pub fn with_failing_group(mut self, id: GroupId) -> Self {
        self.failing_groups.insert(id);
        self
    }

    /// Successful updates, in call order.
    pub fn updates(&self) -> Vec<(AssetId, TierId)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSink for FakeAssetSink {
    async fn ping(&self) -> SyncResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn list_groups(&self) -> SyncResult<Vec<InventoryGroup>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.groups.clone())
    }

    async fn list_assets(&self, group: GroupId) -> SyncResult<Vec<InventoryAsset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_groups.contains(&group) {
            return Err(SyncError::Upstream(format!("HTTP 500 for group {}", group)));
        }
        Ok(self.assets.get(&group).cloned().unwrap_or_default())
    }

    async fn set_criticality(&self, asset: AssetId, tier: TierId) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_assets.contains(&asset) {
            return Err(SyncError::Update {
                asset_id: asset,
                reason: "HTTP 422".to_string(),
            });
        }
        self.updates.lock().unwrap().push((asset, tier));
        Ok(())
    }
}

/// A request captured by [`CannedServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request line, e.g. `GET /api/v3/groups?page=1&per_page=100 HTTP/1.1`.
    pub line: String,
    /// Header block, lowercased.
    pub headers: String,
    pub body: String,
}

/// Local HTTP server answering each connection with the next canned
/// `(status, body)` response, for exercising the real clients.
pub struct CannedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut stream).await {
                    recorded.lock().unwrap().push(request);
                }
                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { base_url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let (line, headers) = head.split_once("\r\n").unwrap_or((head.as_str(), ""));
    let headers = headers.to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|h| h.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body_end = buffer.len().min(body_start + content_length);

    Some(RecordedRequest {
        line: line.to_string(),
        headers,
        body: String::from_utf8_lossy(&buffer[body_start..body_end]).to_string(),
    })
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}
