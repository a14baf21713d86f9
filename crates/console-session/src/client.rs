//! Permission snapshot client.
//!
//! The wire format of the snapshot endpoint and the [`SnapshotFetcher`]
//! seam the store fetches through. [`HttpSnapshotFetcher`] is the
//! production implementation.

use async_trait::async_trait;
use console_rbac::PermissionSnapshot;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::config::{ServiceEndpoint, SessionConfig};
use crate::error::{StoreError, StoreResult};

/// Body of the permission snapshot endpoint.
///
/// Every field defaults when absent, so an empty object decodes to the
/// fail-closed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// Identifiers the actor holds.
    #[serde(default)]
    pub user_permissions: Vec<String>,

    /// Whether the actor is a superadmin.
    #[serde(default)]
    pub is_superadmin: bool,

    /// Every identifier the server knows about.
    #[serde(default)]
    pub all_permissions: KnownPermissions,

    /// Identifiers every authenticated actor receives.
    #[serde(default)]
    pub base_permissions: Vec<String>,
}

impl SnapshotResponse {
    /// Convert into a snapshot (version 0; the store stamps it).
    pub fn into_snapshot(self) -> PermissionSnapshot {
        PermissionSnapshot::new(self.user_permissions, self.is_superadmin)
            .with_known(self.all_permissions.into_identifiers())
            .with_base(self.base_permissions)
    }
}

/// The `all_permissions` field.
///
/// The server groups identifiers by module; a flat list is accepted too.
/// Any other shape is kept as raw JSON and mined for identifier strings,
/// since the known universe is informational and must not fail a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnownPermissions {
    /// `{ "blog": ["blog.create", ...], ... }`
    Grouped(BTreeMap<String, Vec<String>>),
    /// `["blog.create", ...]`
    Flat(Vec<String>),
    /// Anything else.
    Other(serde_json::Value),
}

impl Default for KnownPermissions {
    fn default() -> Self {
        KnownPermissions::Flat(Vec::new())
    }
}

impl KnownPermissions {
    /// Flatten into identifier strings.
    pub fn into_identifiers(self) -> Vec<String> {
        match self {
            KnownPermissions::Grouped(groups) => groups.into_values().flatten().collect(),
            KnownPermissions::Flat(list) => list,
            KnownPermissions::Other(value) => {
                let mut out = Vec::new();
                collect_identifier_strings(&value, &mut out);
                out
            }
        }
    }
}

fn collect_identifier_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) if s.contains('.') => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_identifier_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_identifier_strings(item, out);
            }
        }
        _ => {}
    }
}

/// Source of permission snapshots.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the actor's current snapshot from the authorization server.
    async fn fetch(&self) -> StoreResult<SnapshotResponse>;
}

/// Fetches the snapshot over HTTP.
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    /// HTTP client instance.
    client: Client,

    /// Console API endpoint.
    endpoint: ServiceEndpoint,

    /// Snapshot resource path.
    path: String,
}

impl std::fmt::Debug for HttpSnapshotFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSnapshotFetcher")
            .field("url", &self.url())
            .field("has_auth", &self.endpoint.has_auth())
            .finish()
    }
}

impl HttpSnapshotFetcher {
    /// Create a fetcher from session configuration.
    pub fn new(config: &SessionConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            path: config.permissions_path.clone(),
        })
    }

    /// The snapshot URL.
    pub fn url(&self) -> String {
        self.endpoint.url(&self.path)
    }

    /// Fetch and decode the snapshot.
    #[instrument(skip(self), fields(url = %self.url()))]
    pub async fn fetch_snapshot(&self) -> StoreResult<SnapshotResponse> {
        debug!("Fetching permission snapshot");

        let mut request = self
            .client
            .get(self.url())
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(ref token) = self.endpoint.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> StoreResult<SnapshotResponse> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Permission snapshot request rejected");
            return Err(StoreError::Auth {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = status.as_u16(), message = %message, "Permission snapshot request failed");
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self) -> StoreResult<SnapshotResponse> {
        self.fetch_snapshot().await
    }
}
