// crates/ontos-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared tools, sinks, and server builders for MCP tests.
// Purpose: Provide reusable test infrastructure for deterministic testing.
// Dependencies: ontos-core, ontos-mcp
// ============================================================================

//! ## Overview
//! Fixtures build an [`McpServer`] over an in-memory token store seeded with
//! known secrets, plus recording audit and metrics sinks and a handful of
//! tools with distinct scopes and failure behavior.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use ontos_core::InMemoryTokenStore;
use ontos_core::RequiredScope;
use ontos_core::ScopeSet;
use ontos_core::Timestamp;
use ontos_mcp::McpAuditEvent;
use ontos_mcp::McpAuditSink;
use ontos_mcp::McpDiagnosticEvent;
use ontos_mcp::McpMetricEvent;
use ontos_mcp::McpMetrics;
use ontos_mcp::McpServer;
use ontos_mcp::OntosConfig;
use ontos_mcp::Tool;
use ontos_mcp::ToolContext;
use ontos_mcp::ToolDefinition;
use ontos_mcp::ToolExecutionError;
use ontos_mcp::ToolResult;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Secrets
// ============================================================================

pub const ADMIN_SECRET: &str = "ontos_test_admin";
pub const READER_SECRET: &str = "ontos_test_reader";
pub const DATA_WILDCARD_SECRET: &str = "ontos_test_data_all";
pub const EXPIRED_SECRET: &str = "ontos_test_expired";
pub const REVOKED_SECRET: &str = "ontos_test_revoked";

// ============================================================================
// SECTION: Sinks
// ============================================================================

#[derive(Default)]
pub struct RecordingAudit {
    pub requests: Mutex<Vec<McpAuditEvent>>,
    pub diagnostics: Mutex<Vec<McpDiagnosticEvent>>,
}

impl McpAuditSink for RecordingAudit {
    fn record(&self, event: &McpAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }

    fn record_diagnostic(&self, event: &McpDiagnosticEvent) {
        self.diagnostics.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub requests: Mutex<Vec<McpMetricEvent>>,
    pub latencies: Mutex<Vec<(McpMetricEvent, Duration)>>,
}

impl McpMetrics for RecordingMetrics {
    fn record_request(&self, event: McpMetricEvent) {
        self.requests.lock().unwrap().push(event);
    }

    fn record_latency(&self, event: McpMetricEvent, latency: Duration) {
        self.latencies.lock().unwrap().push((event, latency));
    }
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Tool with a configurable scope and behavior.
pub struct FixtureTool {
    pub name: &'static str,
    pub scope: Option<RequiredScope>,
    pub behavior: Behavior,
}

#[derive(Clone, Copy)]
pub enum Behavior {
    Echo,
    Fail(&'static str),
    Error,
    Panic,
    /// Sleeps for the given milliseconds, then echoes.
    Sleep(u64),
}

impl FixtureTool {
    pub fn shared(name: &'static str, scope: Option<RequiredScope>, behavior: Behavior) -> Arc<dyn Tool> {
        Arc::new(Self {
            name,
            scope,
            behavior,
        })
    }
}

#[async_trait]
impl Tool for FixtureTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: format!("fixture tool {}", self.name),
            input_schema: json!({"type": "object"}),
        }
    }

    fn required_scope(&self) -> RequiredScope {
        self.scope.clone().unwrap_or_default()
    }

    async fn execute(
        &self,
        context: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolExecutionError> {
        match self.behavior {
            Behavior::Echo => Ok(ToolResult::Success(json!({
                "caller": context.token.name,
                "arguments": Value::Object(arguments),
            }))),
            Behavior::Fail(message) => Ok(ToolResult::Failure(message.to_string())),
            Behavior::Error => Err(ToolExecutionError::Failed("backend unavailable".to_string())),
            Behavior::Panic => panic!("fixture tool exploded"),
            Behavior::Sleep(millis) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(ToolResult::Success(json!({ "slept_ms": millis })))
            }
        }
    }
}

/// The fixture tool set registered by [`TestServer::new`].
pub fn fixture_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        FixtureTool::shared("data_read", Some(RequiredScope::named("data:read")), Behavior::Echo),
        FixtureTool::shared("data_write", Some(RequiredScope::named("data:write")), Behavior::Echo),
        FixtureTool::shared("data_anything", Some(RequiredScope::named("data:anything")), Behavior::Echo),
        FixtureTool::shared("admin_only", None, Behavior::Echo),
        FixtureTool::shared("open_echo", Some(RequiredScope::Open), Behavior::Echo),
        FixtureTool::shared("declared_failure", Some(RequiredScope::Open), Behavior::Fail("quota exceeded")),
        FixtureTool::shared("silent_failure", Some(RequiredScope::Open), Behavior::Fail("")),
        FixtureTool::shared("faulty", Some(RequiredScope::Open), Behavior::Error),
        FixtureTool::shared("panicky", Some(RequiredScope::Open), Behavior::Panic),
    ]
}

// ============================================================================
// SECTION: Server
// ============================================================================

pub struct TestServer {
    pub server: McpServer,
    pub store: InMemoryTokenStore,
    pub audit: Arc<RecordingAudit>,
    pub metrics: Arc<RecordingMetrics>,
}

pub fn scopes(values: &[&str]) -> ScopeSet {
    values.iter().copied().collect()
}

/// Seeds the standard callers into a fresh store.
pub fn seeded_store() -> InMemoryTokenStore {
    let store = InMemoryTokenStore::new();
    store.seed("admin", ADMIN_SECRET, scopes(&["*"]), None).unwrap();
    store.seed("reader", READER_SECRET, scopes(&["data:read"]), None).unwrap();
    store.seed("data-all", DATA_WILDCARD_SECRET, scopes(&["data:*"]), None).unwrap();
    let past = Timestamp::from_unix_millis(Timestamp::now().as_unix_millis() - 1_000);
    store.seed("expired", EXPIRED_SECRET, scopes(&["*"]), Some(past)).unwrap();
    let revoked = store.seed("revoked", REVOKED_SECRET, scopes(&["*"]), None).unwrap();
    ontos_core::TokenAdmin::revoke_token(&store, &revoked).unwrap();
    store
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(OntosConfig::default())
    }

    pub fn with_config(config: OntosConfig) -> Self {
        let store = seeded_store();
        let audit = Arc::new(RecordingAudit::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let mut builder = McpServer::builder(config)
            .token_store(store.clone())
            .audit_sink(audit.clone())
            .metrics(metrics.clone());
        for tool in fixture_tools() {
            builder = builder.tool(tool);
        }
        let server = builder.build().unwrap();
        Self {
            server,
            store,
            audit,
            metrics,
        }
    }

    /// Sends a JSON body and returns the serialized envelope.
    pub async fn call(&self, secret: Option<&str>, body: &Value) -> Value {
        self.call_raw(secret, body.to_string().as_bytes()).await
    }

    /// Sends raw bytes and returns the serialized envelope.
    pub async fn call_raw(&self, secret: Option<&str>, body: &[u8]) -> Value {
        let response = self.server.handle_request(&api_key_headers(secret), body).await;
        serde_json::to_value(response).unwrap()
    }
}

pub fn api_key_headers(secret: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(secret) = secret {
        headers.insert("x-api-key", HeaderValue::from_str(secret).unwrap());
    }
    headers
}

pub fn rpc(method: &str, params: Option<Value>, id: Option<Value>) -> Value {
    let mut body = json!({"jsonrpc": "2.0", "method": method});
    if let Some(params) = params {
        body["params"] = params;
    }
    if let Some(id) = id {
        body["id"] = id;
    }
    body
}

pub fn call_tool(name: &str, arguments: Value, id: i64) -> Value {
    rpc("tools/call", Some(json!({"name": name, "arguments": arguments})), Some(json!(id)))
}

pub fn error_code(envelope: &Value) -> Option<i64> {
    envelope.get("error").and_then(|error| error.get("code")).and_then(Value::as_i64)
}

pub fn tool_names(envelope: &Value) -> Vec<String> {
    envelope["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect()
}
