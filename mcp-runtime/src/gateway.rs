use std::time::Instant;

use commonroom_core::error::GatewayError;
use commonroom_core::urls::DashboardUrls;
use commonroom_core::Config;
use reqwest::Method;
use serde_json::Value;

/// One Common Room REST call per operation. No retries: the first failure
/// is returned as-is.
pub struct Gateway<'a> {
    config: &'a Config,
    http: reqwest::Client,
}

impl<'a> Gateway<'a> {
    pub fn new(config: &'a Config, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub async fn token_status(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["api-token-status"], None).await
    }

    pub async fn activity_types(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["activityTypes"], None).await
    }

    pub async fn segments(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["segments"], None).await
    }

    pub async fn segment(&self, segment_id: &str) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["segments", segment_id], None).await
    }

    pub async fn tags(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["tags"], None).await
    }

    pub async fn custom_fields(&self) -> Result<Value, GatewayError> {
        self.send(Method::GET, &["members", "customFields"], None)
            .await
    }

    /// Look up a user by email and, when a dashboard base URL is configured,
    /// attach `dashboard_url` pointing at the member page of the first id.
    pub async fn user_by_email(&self, email: &str) -> Result<Value, GatewayError> {
        let mut body = self.send(Method::GET, &["user", email], None).await?;
        attach_dashboard_urls(&mut body, self.config.dashboard());
        Ok(body)
    }

    pub async fn add_activity(
        &self,
        destination_source_id: &str,
        activity: &Value,
    ) -> Result<Value, GatewayError> {
        self.send(
            Method::POST,
            &["source", destination_source_id, "activity"],
            Some(activity),
        )
        .await
    }

    pub async fn add_user(
        &self,
        destination_source_id: &str,
        user: &Value,
    ) -> Result<Value, GatewayError> {
        self.send(
            Method::POST,
            &["source", destination_source_id, "user"],
            Some(user),
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let mut url = self.config.api_url().clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport {
                message: format!("API URL '{}' cannot take a path", self.config.api_url()),
            })?
            .pop_if_empty()
            .extend(segments);

        let started = Instant::now();
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(self.config.api_key())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, path = url.path(), error = %e, "upstream request failed");
            GatewayError::Transport {
                message: format!("{e}"),
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| GatewayError::Transport {
            message: format!("Failed to read API response body: {e}"),
        })?;
        let body = parse_response_body(&bytes);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            tracing::warn!(
                %method,
                path = url.path(),
                status = status.as_u16(),
                elapsed_ms,
                "upstream returned error status"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(%method, path = url.path(), status = status.as_u16(), elapsed_ms, "upstream ok");
        Ok(body)
    }
}

fn attach_dashboard_urls(body: &mut Value, dashboard: DashboardUrls<'_>) {
    if !dashboard.is_configured() {
        return;
    }
    match body {
        Value::Array(users) => {
            for user in users {
                attach_dashboard_url(user, dashboard);
            }
        }
        user => attach_dashboard_url(user, dashboard),
    }
}

fn attach_dashboard_url(user: &mut Value, dashboard: DashboardUrls<'_>) {
    let Some(first_id) = user
        .get("ids")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(id_to_string)
    else {
        return;
    };
    if let (Ok(url), Some(record)) = (dashboard.member_url(&first_id, false), user.as_object_mut()) {
        record.insert("dashboard_url".to_string(), Value::String(url));
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}
