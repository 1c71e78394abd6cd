use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use super::document::{self, AuditDocument};

const DEFAULT_INDEX_PREFIX: &str = "audit-";
const DEFAULT_SHARDS: u32 = 1;
const DEFAULT_REPLICAS: u32 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub endpoints: Vec<String>,
    pub api_key: Option<(String, String)>,
    pub index_prefix: String,
    pub shards: u32,
    pub replicas: u32,
    pub timeout_secs: u64,
}

impl ElasticConfig {
    /// Load search-engine config from environment.
    ///
    /// `ELASTIC_ENDPOINTS` is mandatory; everything else has a default.
    /// Any malformed value is an error here, before a workspace is claimed.
    pub fn from_env() -> Result<Self, String> {
        let raw_endpoints = std::env::var("ELASTIC_ENDPOINTS")
            .map_err(|_| "ELASTIC_ENDPOINTS is required but not set".to_string())?;
        let endpoints = parse_endpoints(&raw_endpoints)?;

        let api_key = match (
            std::env::var("ELASTIC_API_KEY_ID").ok().filter(|v| !v.is_empty()),
            std::env::var("ELASTIC_API_KEY").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(id), Some(key)) => Some((id, key)),
            (None, None) => None,
            _ => {
                return Err(
                    "ELASTIC_API_KEY_ID and ELASTIC_API_KEY must be set together".to_string()
                )
            }
        };

        let index_prefix = match std::env::var("ELASTIC_INDEX_PREFIX") {
            Ok(raw) => parse_index_prefix(&raw)?,
            Err(_) => DEFAULT_INDEX_PREFIX.to_string(),
        };

        let shards = parse_index_setting("ELASTIC_INDEX_SHARDS", DEFAULT_SHARDS)?;
        let replicas = parse_index_setting("ELASTIC_INDEX_REPLICAS", DEFAULT_REPLICAS)?;

        let timeout_secs = match std::env::var("ELASTIC_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("ELASTIC_TIMEOUT_SECS must be an integer, got {raw:?}"))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoints,
            api_key,
            index_prefix,
            shards,
            replicas,
            timeout_secs,
        })
    }
}

fn parse_endpoints(raw: &str) -> Result<Vec<String>, String> {
    let mut endpoints = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        reqwest::Url::parse(entry).map_err(|e| format!("invalid endpoint {entry:?}: {e}"))?;
        endpoints.push(entry.trim_end_matches('/').to_string());
    }
    if endpoints.is_empty() {
        return Err("ELASTIC_ENDPOINTS contains no usable URLs".to_string());
    }
    Ok(endpoints)
}

/// Index names share the search engine's charset rules, so the prefix is
/// lowercased and checked up front rather than failing at index creation.
fn parse_index_prefix(raw: &str) -> Result<String, String> {
    let prefix = raw.trim().to_lowercase();
    if prefix.is_empty() {
        return Err("ELASTIC_INDEX_PREFIX is set but empty".to_string());
    }
    let valid = prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(format!(
            "ELASTIC_INDEX_PREFIX has characters outside the index-name charset: {prefix:?}"
        ));
    }
    if prefix.starts_with(['-', '_', '.']) {
        return Err(format!(
            "ELASTIC_INDEX_PREFIX must not begin with '-', '_' or '.': {prefix:?}"
        ));
    }
    Ok(prefix)
}

fn parse_index_setting(key: &str, default: u32) -> Result<u32, String> {
    match std::env::var(key) {
        Ok(raw) => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| format!("{key} must be an integer, got {raw:?}"))?;
            // Out-of-range values fall back rather than abort.
            Ok(u32::try_from(value).unwrap_or(default))
        }
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ElasticError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("{operation} of index {index} not acknowledged")]
    NotAcknowledged {
        operation: &'static str,
        index: String,
    },

    #[error("bulk indexing rejected {failed} of {total} documents: {first_reason}")]
    BulkItems {
        failed: usize,
        total: usize,
        first_reason: String,
    },

    #[error("body serialization failed: {0}")]
    Body(#[from] serde_json::Error),
}

/// Thin client over the search engine's REST API. One HTTP attempt per
/// call; a failed call is the caller's problem to reschedule.
#[derive(Clone)]
pub struct ElasticClient {
    client: Client,
    config: ElasticConfig,
    auth_header: Option<String>,
    cursor: Arc<AtomicUsize>,
}

impl ElasticClient {
    pub fn new(config: ElasticConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let auth_header = config.api_key.as_ref().map(|(id, key)| {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{id}:{key}"));
            format!("ApiKey {token}")
        });
        Ok(Self {
            client,
            config,
            auth_header,
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn index_name(&self, workspace_id: i64) -> String {
        format!("{}{}", self.config.index_prefix, workspace_id)
    }

    /// Rotate through the configured nodes, one per request.
    fn endpoint(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.config.endpoints.len();
        &self.config.endpoints[i]
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}/{path}", self.endpoint()));
        if let Some(header) = &self.auth_header {
            builder = builder.header("Authorization", header);
        }
        builder
    }

    async fn http_error(response: reqwest::Response) -> ElasticError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ElasticError::Http { status, body }
    }

    /// Cluster liveness probe.
    pub async fn ping(&self) -> Result<(), ElasticError> {
        let response = self.request(Method::GET, "").send().await?;
        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }
        Ok(())
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool, ElasticError> {
        let response = self.request(Method::HEAD, index).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::http_error(response).await),
        }
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ElasticError> {
        let body = serde_json::json!({
            "settings": {
                "number_of_shards": self.config.shards,
                "number_of_replicas": self.config.replicas,
            },
            "mappings": { "properties": document::mapping() },
        });

        let response = self.request(Method::PUT, index).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        let ack: AckResponse = response.json().await?;
        if !ack.acknowledged {
            return Err(ElasticError::NotAcknowledged {
                operation: "create",
                index: index.to_string(),
            });
        }
        Ok(())
    }

    pub async fn delete_index(&self, index: &str) -> Result<(), ElasticError> {
        let response = self.request(Method::DELETE, index).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Never created or already gone; deletion stays idempotent.
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        let ack: AckResponse = response.json().await?;
        if !ack.acknowledged {
            return Err(ElasticError::NotAcknowledged {
                operation: "delete",
                index: index.to_string(),
            });
        }
        Ok(())
    }

    /// One `_bulk` request. `_id` is the audit record id, so re-indexing a
    /// document overwrites instead of duplicating.
    pub async fn bulk_index(
        &self,
        index: &str,
        docs: &[AuditDocument],
    ) -> Result<(), ElasticError> {
        if docs.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for doc in docs {
            let action = serde_json::json!({ "index": { "_id": doc.audit_record_id.to_string() } });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(doc)?);
            body.push('\n');
        }

        let response = self
            .request(Method::POST, &format!("{index}/_bulk"))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        let outcome: BulkResponse = response.json().await?;
        if outcome.errors {
            let failed: Vec<&BulkItemStatus> = outcome
                .items
                .iter()
                .filter_map(|item| item.index.as_ref())
                .filter(|status| status.error.is_some())
                .collect();
            let first_reason = failed
                .first()
                .map(|status| status.describe())
                .unwrap_or_else(|| "unreported item error".to_string());
            return Err(ElasticError::BulkItems {
                failed: failed.len(),
                total: docs.len(),
                first_reason,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    acknowledged: bool,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    index: Option<BulkItemStatus>,
}

#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    error: Option<BulkItemError>,
}

impl BulkItemStatus {
    fn describe(&self) -> String {
        let id = self.id.as_deref().unwrap_or("?");
        match &self.error {
            Some(error) => format!(
                "document {id}: {} ({})",
                error.reason.as_deref().unwrap_or("no reason given"),
                error.kind.as_deref().unwrap_or("unknown")
            ),
            None => format!("document {id}: status {}", self.status),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type")]
    kind: Option<String>,
    reason: Option<String>,
}
