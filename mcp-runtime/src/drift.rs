//! Background check that the upstream OpenAPI document still matches the
//! local copy the tool surface was written against. Diagnostic only: it
//! never touches the request path and never fails the process.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::util::client_with_timeout;

pub const DEFAULT_DOCS_URL: &str = "https://api.commonroom.io/docs/community.html";
pub const DEFAULT_SPEC_PATH: &str = "openapi.json";

const INITIAL_DELAY: Duration = Duration::from_secs(30);
const CHECK_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DriftCheckConfig {
    pub docs_url: String,
    pub spec_path: PathBuf,
}

impl Default for DriftCheckConfig {
    fn default() -> Self {
        Self {
            docs_url: DEFAULT_DOCS_URL.to_string(),
            spec_path: PathBuf::from(DEFAULT_SPEC_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftReport {
    UpToDate {
        hash: String,
    },
    UpdateAvailable {
        current_hash: Option<String>,
        latest_hash: String,
    },
    Unavailable {
        reason: String,
    },
}

impl DriftReport {
    pub fn status(&self) -> &'static str {
        match self {
            DriftReport::UpToDate { .. } => "up_to_date",
            DriftReport::UpdateAvailable { .. } => "update_available",
            DriftReport::Unavailable { .. } => "unavailable",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DriftReport::UpToDate { hash } => json!({
                "status": self.status(),
                "hash": hash,
            }),
            DriftReport::UpdateAvailable {
                current_hash,
                latest_hash,
            } => json!({
                "status": self.status(),
                "current_hash": current_hash,
                "latest_hash": latest_hash,
            }),
            DriftReport::Unavailable { reason } => json!({
                "status": self.status(),
                "reason": reason,
            }),
        }
    }
}

pub struct DriftChecker {
    config: DriftCheckConfig,
    http: reqwest::Client,
}

impl DriftChecker {
    pub fn new(config: DriftCheckConfig) -> reqwest::Result<Self> {
        Ok(Self {
            config,
            http: client_with_timeout(FETCH_TIMEOUT)?,
        })
    }

    pub async fn check(&self) -> DriftReport {
        let latest = match self.fetch_latest_spec().await {
            Ok(spec) => spec,
            Err(reason) => return DriftReport::Unavailable { reason },
        };
        let latest_hash = spec_hash(&latest);
        let current_hash = self.local_spec_hash().await;

        if current_hash.as_deref() == Some(latest_hash.as_str()) {
            DriftReport::UpToDate { hash: latest_hash }
        } else {
            DriftReport::UpdateAvailable {
                current_hash,
                latest_hash,
            }
        }
    }

    async fn fetch_latest_spec(&self) -> Result<Value, String> {
        let response = self
            .http
            .get(&self.config.docs_url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch {}: {e}", self.config.docs_url))?;
        if !response.status().is_success() {
            return Err(format!(
                "Docs page {} returned HTTP {}",
                self.config.docs_url,
                response.status().as_u16()
            ));
        }
        let html = response
            .text()
            .await
            .map_err(|e| format!("Failed to read docs page: {e}"))?;
        extract_redoc_spec(&html).ok_or_else(|| "Docs page has no embedded OpenAPI spec".to_string())
    }

    async fn local_spec_hash(&self) -> Option<String> {
        let raw = tokio::fs::read_to_string(&self.config.spec_path).await.ok()?;
        Some(match serde_json::from_str::<Value>(&raw) {
            Ok(spec) => spec_hash(&spec),
            Err(_) => sha256_hex(raw.as_bytes()),
        })
    }
}

/// Pull `spec.data` out of the `__redoc_state = {...};` blob a Redoc page embeds.
pub fn extract_redoc_spec(html: &str) -> Option<Value> {
    let marker = Regex::new(r"__redoc_state\s*=\s*").ok()?;
    let start = marker.find(html)?.end();
    let state = serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;
    state.pointer("/spec/data").cloned()
}

/// SHA-256 of the canonical (key-sorted, compact) JSON encoding.
pub fn spec_hash(spec: &Value) -> String {
    sha256_hex(spec.to_string().as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn log_report(report: &DriftReport) {
    match report {
        DriftReport::UpToDate { .. } => tracing::info!("OpenAPI spec is up to date"),
        DriftReport::UpdateAvailable {
            current_hash,
            latest_hash,
        } => tracing::warn!(
            current_hash = current_hash.as_deref().unwrap_or("none"),
            latest_hash = latest_hash.as_str(),
            "new Common Room API spec available"
        ),
        DriftReport::Unavailable { reason } => {
            tracing::info!(reason = reason.as_str(), "could not check for API spec updates")
        }
    }
}

/// Run the drift check once after startup and then periodically.
pub fn spawn_background(config: DriftCheckConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let checker = match DriftChecker::new(config) {
            Ok(checker) => checker,
            Err(e) => {
                tracing::warn!(error = %e, "drift check disabled");
                return;
            }
        };
        tokio::time::sleep(INITIAL_DELAY).await;
        loop {
            log_report(&checker.check().await);
            tokio::time::sleep(CHECK_INTERVAL).await;
        }
    })
}
