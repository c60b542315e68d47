use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Subcommand};
use commonroom_core::Config;
use commonroom_core::error::{Error, GatewayError, Result};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};

pub mod catalog;
pub mod drift;
pub mod gateway;
pub mod normalize;
pub mod transport;
mod util;

use catalog::{ToolName, catalog, lookup};
use drift::{DEFAULT_DOCS_URL, DEFAULT_SPEC_PATH, DriftCheckConfig, DriftChecker, DriftReport};
use gateway::Gateway;
use normalize::normalize;
use transport::{Inbound, read_message, write_message};
use util::{client, to_pretty_json};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "commonroom";

pub const EXIT_OK: i32 = 0;
pub const EXIT_TRANSPORT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the Common Room MCP server over stdio
    Serve(McpServeArgs),
    /// Check the API token (and optionally spec drift), print a JSON report
    Diagnose(McpDiagnoseArgs),
}

#[derive(Args, Clone, Debug)]
pub struct DriftArgs {
    /// Compare the published Common Room OpenAPI spec against the local copy
    #[arg(long, env = "COMMONROOM_DRIFT_CHECK")]
    pub drift_check: bool,
    /// Local OpenAPI spec used as the drift baseline
    #[arg(long, env = "COMMONROOM_OPENAPI_SPEC", default_value = DEFAULT_SPEC_PATH)]
    pub openapi_spec: PathBuf,
    /// Docs page embedding the published spec
    #[arg(long, env = "COMMONROOM_DOCS_URL", default_value = DEFAULT_DOCS_URL)]
    pub docs_url: String,
}

impl DriftArgs {
    fn drift_config(&self) -> DriftCheckConfig {
        DriftCheckConfig {
            docs_url: self.docs_url.clone(),
            spec_path: self.openapi_spec.clone(),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    #[command(flatten)]
    pub drift: DriftArgs,
}

#[derive(Args, Clone, Debug)]
pub struct McpDiagnoseArgs {
    #[command(flatten)]
    pub drift: DriftArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to read MCP message: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to write MCP response: {0}")]
    Write(#[source] std::io::Error),
}

pub async fn run(config: Config, command: McpCommands) -> i32 {
    let server = match McpServer::new(config) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialise MCP server");
            eprintln!("{err}");
            return EXIT_CONFIG_ERROR;
        }
    };
    match command {
        McpCommands::Serve(args) => {
            let _drift_task = args
                .drift
                .drift_check
                .then(|| drift::spawn_background(args.drift.drift_config()));
            match server.serve_stdio().await {
                Ok(()) => {
                    tracing::info!("stdin closed, shutting down");
                    EXIT_OK
                }
                Err(err) => {
                    tracing::error!(error = %err, cause = ?err, "mcp transport failed");
                    let payload = json!({
                        "error": "mcp_transport_error",
                        "message": err.to_string(),
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    EXIT_TRANSPORT_FAILURE
                }
            }
        }
        McpCommands::Diagnose(args) => {
            let (report, code) = server.run_diagnostics(&args).await;
            println!("{}", to_pretty_json(&report));
            code
        }
    }
}

pub struct McpServer {
    config: Config,
    http: reqwest::Client,
}

impl McpServer {
    pub fn new(config: Config) -> Result<Self> {
        let http = client().map_err(|e| {
            Error::configuration(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self { config, http })
    }

    pub async fn serve_stdio(&self) -> std::result::Result<(), TransportError> {
        self.emit_capability_status();
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Serve requests one at a time until the reader hits EOF. Only I/O
    /// failures on the channel itself end the loop with an error.
    pub async fn serve<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> std::result::Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let incoming = read_message(&mut reader)
                .await
                .map_err(TransportError::Read)?;
            let Some(incoming) = incoming else {
                break;
            };

            let (responses, framing) = match incoming {
                Inbound::Message(value, framing) => {
                    (self.handle_incoming_message(value).await, framing)
                }
                Inbound::Malformed(reason, framing) => {
                    tracing::warn!(reason = reason.as_str(), "malformed MCP message");
                    (
                        vec![error_response(Value::Null, RpcError::parse_error(reason))],
                        framing,
                    )
                }
            };
            for response in responses {
                write_message(&mut writer, &response, framing)
                    .await
                    .map_err(TransportError::Write)?;
            }
        }

        Ok(())
    }

    fn emit_capability_status(&self) {
        tracing::info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            protocol_version = MCP_PROTOCOL_VERSION,
            tools = catalog().len(),
            dashboard_configured = self.config.dashboard().is_configured(),
            "mcp server ready"
        );
    }

    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            tracing::debug!(method, "notification ignored");
            None
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        let dashboard_note = if self.config.dashboard().is_configured() {
            "Dashboard URL tools are enabled."
        } else {
            "Dashboard URL tools are disabled until COMMONROOM_BASE_URL is set."
        };
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Read-only tools list Common Room activity types, segments, tags and custom fields, and look up members by email. commonroom_add_activity and commonroom_add_user write under a destination source; activity and user IDs are always generated by the server. {dashboard_note}"
            )
        })
    }

    async fn handle_tools_call(&self, params: Value) -> std::result::Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let started = Instant::now();
        let outcome = self.call_tool(name, params.get("arguments")).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::info!(tool = name, elapsed_ms, "tool call succeeded"),
            Err(err) => tracing::info!(
                tool = name,
                elapsed_ms,
                error = err.code(),
                detail = %err,
                "tool call failed"
            ),
        }
        Ok(build_tool_call_response(name, &outcome))
    }

    /// Resolve, normalize and invoke one tool. Every failure comes back as an
    /// [`Error`]; nothing here can end the session.
    pub async fn call_tool(&self, name: &str, arguments: Option<&Value>) -> Result<Value> {
        let descriptor = lookup(name)?;
        let raw = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(Error::validation(
                    "arguments",
                    "tools/call 'arguments' must be an object",
                ));
            }
        };
        let args = normalize(&descriptor.schema, &raw)?;
        self.execute_tool(descriptor.name, &args).await
    }

    async fn execute_tool(&self, tool: ToolName, args: &Map<String, Value>) -> Result<Value> {
        let gateway = Gateway::new(&self.config, self.http.clone());
        let dashboard = self.config.dashboard();

        let payload = match tool {
            ToolName::TokenStatus => gateway.token_status().await?,
            ToolName::ActivityTypes => gateway.activity_types().await?,
            ToolName::Segments => gateway.segments().await?,
            ToolName::Segment => gateway.segment(required_str(args, "segment_id")?).await?,
            ToolName::Tags => gateway.tags().await?,
            ToolName::CustomFields => gateway.custom_fields().await?,
            ToolName::User => gateway.user_by_email(required_str(args, "email")?).await?,
            ToolName::AddActivity => {
                let source = required_str(args, "destination_source_id")?;
                let activity = required_value(args, "activity")?;
                let response = gateway.add_activity(source, activity).await?;
                json!({
                    "request": {
                        "destination_source_id": source,
                        "activity": activity
                    },
                    "response": response
                })
            }
            ToolName::AddUser => {
                let source = required_str(args, "destination_source_id")?;
                let user = required_value(args, "user")?;
                let response = gateway.add_user(source, user).await?;
                json!({
                    "request": {
                        "destination_source_id": source,
                        "user": user
                    },
                    "response": response
                })
            }
            ToolName::DashboardUrls => json!(dashboard.sections()?),
            ToolName::MemberUrl => json!({
                "url": dashboard.member_url(
                    required_str(args, "user_id")?,
                    arg_bool(args, "show_activity")?,
                )?
            }),
            ToolName::MemberActivityUrl => json!({
                "url": dashboard.member_activity_url(required_str(args, "user_id")?)?
            }),
            ToolName::OrganizationUrl => json!({
                "url": dashboard.organization_url(required_str(args, "org_id")?)?
            }),
            ToolName::SegmentUrl => json!({
                "url": dashboard.segment_url(required_str(args, "segment_id")?)?
            }),
        };
        Ok(payload)
    }

    async fn run_diagnostics(&self, args: &McpDiagnoseArgs) -> (Value, i32) {
        let gateway = Gateway::new(&self.config, self.http.clone());
        let (token_status, code) = match gateway.token_status().await {
            Ok(body) => (json!({ "ok": true, "body": body }), EXIT_OK),
            Err(err @ GatewayError::Status { status: 401 | 403, .. }) => (
                json!({ "ok": false, "error": Error::from(err).to_value() }),
                EXIT_CONFIG_ERROR,
            ),
            Err(err) => (
                json!({ "ok": false, "error": Error::from(err).to_value() }),
                EXIT_TRANSPORT_FAILURE,
            ),
        };

        let mut report = json!({
            "server": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "status": if code == EXIT_OK { "ready" } else { "not_ready" },
            "api_url": self.config.api_url().as_str(),
            "dashboard_configured": self.config.dashboard().is_configured(),
            "tool_count": catalog().len(),
            "token_status": token_status,
        });
        if args.drift.drift_check {
            let drift = match DriftChecker::new(args.drift.drift_config()) {
                Ok(checker) => checker.check().await,
                Err(e) => DriftReport::Unavailable {
                    reason: format!("Failed to build HTTP client: {e}"),
                },
            };
            report["drift"] = drift.to_value();
        }
        (report, code)
    }
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = catalog().iter().map(|tool| tool.to_value()).collect();
    json!({ "tools": tools })
}

/// The single conversion point from a tool outcome to the wire envelope.
/// Tool failures are still JSON-RPC successes, flagged with `isError`.
fn build_tool_call_response(tool_name: &str, outcome: &Result<Value>) -> Value {
    let (envelope, is_error) = match outcome {
        Ok(data) => (
            json!({
                "status": "ok",
                "tool": tool_name,
                "data": data
            }),
            false,
        ),
        Err(err) => (
            json!({
                "status": "error",
                "tool": tool_name,
                "error": err.to_value()
            }),
            true,
        ),
    };
    let text = to_pretty_json(&envelope);

    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(v)) => Ok(v),
        Some(_) => Err(Error::validation(key, format!("'{key}' must be a string"))),
        None => Err(Error::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
    }
}

fn required_value<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    args.get(key)
        .ok_or_else(|| Error::validation(key, format!("Missing required field '{key}'")))
}

fn arg_bool(args: &Map<String, Value>, key: &str) -> Result<bool> {
    match args.get(key) {
        None => Err(Error::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
        Some(Value::Bool(v)) => Ok(*v),
        Some(_) => Err(Error::validation(key, format!("'{key}' must be a boolean"))),
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const BASE: &str = "https://app.commonroom.io/community/8683-amazon-developer";

    fn offline_server(dashboard: Option<&str>) -> McpServer {
        McpServer::new(
            Config::new(
                Some("test_key".to_string()),
                "http://127.0.0.1:9/community/v1",
                dashboard.map(str::to_string),
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn mock_server(upstream: &MockServer, dashboard: Option<&str>) -> McpServer {
        McpServer::new(
            Config::new(
                Some("test_key".to_string()),
                &format!("{}/community/v1", upstream.uri()),
                dashboard.map(str::to_string),
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn call(id: i64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    async fn single(server: &McpServer, request: Value) -> Value {
        let mut responses = server.handle_incoming_message(request).await;
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }

    #[test]
    fn initialize_advertises_tools_capability_and_dashboard_state() {
        let payload = offline_server(None).initialize_payload();
        assert_eq!(payload["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(payload["serverInfo"]["name"], "commonroom");
        assert_eq!(payload["capabilities"]["tools"]["listChanged"], false);
        assert!(
            payload["instructions"]
                .as_str()
                .unwrap()
                .contains("COMMONROOM_BASE_URL")
        );
    }

    #[tokio::test]
    async fn tools_list_returns_full_catalog() {
        let server = offline_server(None);
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        )
        .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), ToolName::ALL.len());
        assert_eq!(tools[0]["name"], "commonroom_get_token_status");
        assert!(tools.iter().all(|tool| tool["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_envelope_not_a_protocol_error() {
        let server = offline_server(None);
        let response = single(&server, call(2, "commonroom_nope", json!({}))).await;
        assert!(response.get("error").is_none());
        let result = &response["result"];
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"]["error"], "unknown_tool");
        assert!(
            result["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("Unknown tool: commonroom_nope")
        );
    }

    #[tokio::test]
    async fn missing_required_field_names_the_field() {
        let server = offline_server(Some(BASE));
        let response = single(&server, call(3, "commonroom_get_member_url", json!({}))).await;
        let error = &response["result"]["structuredContent"]["error"];
        assert_eq!(error["error"], "validation_error");
        assert_eq!(error["field"], "user_id");
    }

    #[tokio::test]
    async fn non_object_arguments_are_a_validation_error() {
        let server = offline_server(Some(BASE));
        let err = server
            .call_tool("commonroom_get_segment_url", Some(&json!(["1"])))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("arguments"));
    }

    #[tokio::test]
    async fn url_tools_build_dashboard_links() {
        let server = offline_server(Some(BASE));

        let url = server
            .call_tool(
                "commonroom_get_member_url",
                Some(&json!({"user_id": "226882839", "show_activity": true})),
            )
            .await
            .unwrap();
        assert_eq!(url["url"], format!("{BASE}/member/226882839/activity"));

        let sugar = server
            .call_tool(
                "commonroom_get_member_activity_url",
                Some(&json!({"user_id": "226882839"})),
            )
            .await
            .unwrap();
        assert_eq!(sugar, url);

        let org = server
            .call_tool(
                "commonroom_get_organization_url",
                Some(&json!({"org_id": "414214-td"})),
            )
            .await
            .unwrap();
        assert_eq!(org["url"], format!("{BASE}/organization/414214-td"));

        let sections = server
            .call_tool("commonroom_get_dashboard_urls", None)
            .await
            .unwrap();
        assert_eq!(sections["workflows"], format!("{BASE}/workflows"));
    }

    #[tokio::test]
    async fn url_tools_without_base_url_are_configuration_errors() {
        let server = offline_server(None);
        for (name, args) in [
            ("commonroom_get_dashboard_urls", json!({})),
            ("commonroom_get_member_url", json!({"user_id": "1"})),
            ("commonroom_get_member_activity_url", json!({"user_id": "1"})),
            ("commonroom_get_organization_url", json!({"org_id": "1"})),
            ("commonroom_get_segment_url", json!({"segment_id": "1"})),
        ] {
            let err = server.call_tool(name, Some(&args)).await.unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn upstream_failure_does_not_poison_later_calls() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/community/v1/segments"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/community/v1/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "vip"}])))
            .mount(&upstream)
            .await;

        let server = mock_server(&upstream, None);
        let failed = single(&server, call(1, "commonroom_get_segments", json!({}))).await;
        let error = &failed["result"]["structuredContent"]["error"];
        assert_eq!(failed["result"]["isError"], true);
        assert_eq!(error["error"], "gateway_error");
        assert_eq!(error["details"]["status"], 500);

        let ok = single(&server, call(2, "commonroom_get_tags", json!({}))).await;
        assert!(ok["result"].get("isError").is_none());
        assert_eq!(ok["result"]["structuredContent"]["data"][0]["name"], "vip");
    }

    #[tokio::test]
    async fn add_activity_posts_generated_ids() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/community/v1/source/98765/activity"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"accepted": true})))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = mock_server(&upstream, None);
        let payload = server
            .call_tool(
                "commonroom_add_activity",
                Some(&json!({
                    "destination_source_id": "98765",
                    "activity": {
                        "id": "mine",
                        "activityType": "attended_gathering",
                        "user": {"id": "me", "fullName": "Ada"}
                    }
                })),
            )
            .await
            .unwrap();

        let activity = &payload["request"]["activity"];
        assert!(activity["id"].as_str().unwrap().starts_with("activity_"));
        assert!(activity["user"]["id"].as_str().unwrap().starts_with("user_"));
        assert_eq!(payload["response"]["accepted"], true);

        let received = upstream.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(&sent, activity);
    }

    #[tokio::test]
    async fn protocol_errors_use_jsonrpc_error_objects() {
        let server = offline_server(None);

        let response = single(&server, json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).await;
        assert_eq!(response["error"]["code"], -32600);

        let response = single(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "nope"})).await;
        assert_eq!(response["error"]["code"], -32601);

        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {}}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);

        let response = single(&server, json!("hello")).await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn notifications_and_client_responses_get_no_reply() {
        let server = offline_server(None);
        let responses = server
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .await;
        assert!(responses.is_empty());

        let responses = server
            .handle_incoming_message(json!({"jsonrpc": "2.0", "id": 9, "result": {}}))
            .await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn batch_is_answered_in_order() {
        let server = offline_server(None);
        let responses = server
            .handle_incoming_message(json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
            ]))
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);

        let responses = server.handle_incoming_message(json!([])).await;
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn diagnostics_report_rejected_token() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/community/v1/api-token-status"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad token"})))
            .mount(&upstream)
            .await;

        let server = mock_server(&upstream, None);
        let args = McpDiagnoseArgs {
            drift: DriftArgs {
                drift_check: false,
                openapi_spec: PathBuf::from(DEFAULT_SPEC_PATH),
                docs_url: DEFAULT_DOCS_URL.to_string(),
            },
        };
        let (report, code) = server.run_diagnostics(&args).await;
        assert_eq!(code, EXIT_CONFIG_ERROR);
        assert_eq!(report["status"], "not_ready");
        assert_eq!(report["token_status"]["error"]["details"]["status"], 401);
        assert!(report.get("drift").is_none());
    }

    #[tokio::test]
    async fn diagnostics_treat_upstream_outage_as_unreachable() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/community/v1/api-token-status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&upstream)
            .await;

        let server = mock_server(&upstream, None);
        let args = McpDiagnoseArgs {
            drift: DriftArgs {
                drift_check: false,
                openapi_spec: PathBuf::from(DEFAULT_SPEC_PATH),
                docs_url: DEFAULT_DOCS_URL.to_string(),
            },
        };
        let (report, code) = server.run_diagnostics(&args).await;
        assert_eq!(code, EXIT_TRANSPORT_FAILURE);
        assert_eq!(report["token_status"]["error"]["details"]["status"], 503);
    }

    #[test]
    fn arg_bool_has_no_default_of_its_own() {
        let mut args = Map::new();
        let err = arg_bool(&args, "show_activity").unwrap_err();
        assert_eq!(err.field(), Some("show_activity"));

        args.insert("show_activity".to_string(), json!(true));
        assert!(arg_bool(&args, "show_activity").unwrap());
    }
}
