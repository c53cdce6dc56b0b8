// crates/ontos-mcp/src/dispatcher.rs
// ============================================================================
// Module: MCP Method Dispatcher
// Description: Fixed MCP method table and tool invocation.
// Purpose: Turn an authenticated request into exactly one response envelope.
// Dependencies: ontos-core, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The dispatcher resolves a method name against a closed table, runs the
//! handler, and maps its outcome into an envelope. Handlers return
//! `Result<Value, McpError>`; every [`McpError`] variant carries its own code.
//!
//! Tool faults are not RPC errors. A tool that returns an error or panics
//! still produces a success envelope whose payload sets `isError: true`.
//! Tools run on their own task so a panic stays inside the invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use ontos_core::ScopeSet;
use ontos_core::Timestamp;
use ontos_core::TokenInfo;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::DiagnosticLevel;
use crate::audit::McpAuditSink;
use crate::audit::McpDiagnosticEvent;
use crate::jsonrpc::INTERNAL_ERROR;
use crate::jsonrpc::INVALID_PARAMS;
use crate::jsonrpc::JsonRpcError;
use crate::jsonrpc::JsonRpcRequest;
use crate::jsonrpc::JsonRpcResponse;
use crate::jsonrpc::METHOD_NOT_FOUND;
use crate::jsonrpc::MISSING_SCOPE;
use crate::telemetry::McpMethod;
use crate::tools::ServerIdentity;
use crate::tools::ToolContext;
use crate::tools::ToolRegistry;
use crate::tools::ToolResult;
use crate::tools::ToolServices;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Method handler errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpError {
    /// Method is not in the supported table.
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    /// Parameters are missing or malformed.
    #[error("{0}")]
    InvalidParams(String),
    /// Named tool is not registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    /// Caller lacks the scope the tool requires.
    #[error("Missing required scope: {required}")]
    MissingScope {
        /// Scope the tool requires.
        required: String,
        /// Scopes the caller holds.
        granted: Vec<String>,
    },
    /// Unexpected fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Returns the JSON-RPC error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::MissingScope {
                ..
            } => MISSING_SCOPE,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Converts the error into a JSON-RPC error object.
    #[must_use]
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let error = JsonRpcError::new(self.code(), self.to_string());
        match self {
            Self::MissingScope {
                required,
                granted,
            } => error.with_data(json!({
                "required_scope": required,
                "token_scopes": granted,
            })),
            _ => error,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// MCP method dispatcher.
///
/// # Invariants
/// - The registry is never mutated after construction.
/// - Every call yields exactly one envelope.
#[derive(Clone)]
pub struct Dispatcher {
    /// Registered tools.
    registry: Arc<ToolRegistry>,
    /// Server identity for `initialize`.
    identity: Arc<ServerIdentity>,
    /// Optional collaborators passed to tools.
    services: Arc<ToolServices>,
    /// Diagnostic sink for tool and internal faults.
    audit: Arc<dyn McpAuditSink>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        identity: Arc<ServerIdentity>,
        services: Arc<ToolServices>,
        audit: Arc<dyn McpAuditSink>,
    ) -> Self {
        Self {
            registry,
            identity,
            services,
            audit,
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatches an authenticated request.
    pub async fn dispatch(&self, request: &JsonRpcRequest, token: &TokenInfo) -> JsonRpcResponse {
        match self.handle(request, token).await {
            Ok(result) => JsonRpcResponse::success(request.id.clone(), result),
            Err(error) => {
                if let McpError::Internal(cause) = &error {
                    self.diagnose(DiagnosticLevel::Error, request, cause.clone());
                }
                JsonRpcResponse::error(request.id.clone(), error.to_rpc_error())
            }
        }
    }

    /// Routes a request to its method handler.
    async fn handle(&self, request: &JsonRpcRequest, token: &TokenInfo) -> Result<Value, McpError> {
        match McpMethod::from_name(&request.method) {
            McpMethod::Initialize => Ok(self.initialize()),
            McpMethod::Initialized => Ok(json!({})),
            McpMethod::Ping => ping(),
            McpMethod::ToolsList => self.tools_list(&token.scopes),
            McpMethod::ToolsCall => self.tools_call(request, token).await,
            McpMethod::Invalid | McpMethod::Other => {
                Err(McpError::MethodNotFound(request.method.clone()))
            }
        }
    }

    /// Handles `initialize`.
    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": self.identity.protocol_version,
            "serverInfo": {
                "name": self.identity.name,
                "version": self.identity.version,
            },
            "capabilities": {
                "tools": {},
            },
        })
    }

    /// Handles `tools/list`.
    fn tools_list(&self, granted: &ScopeSet) -> Result<Value, McpError> {
        let tools = serde_json::to_value(self.registry.visible_definitions(granted))
            .map_err(|err| McpError::Internal(err.to_string()))?;
        Ok(json!({ "tools": tools }))
    }

    /// Handles `tools/call`.
    async fn tools_call(&self, request: &JsonRpcRequest, token: &TokenInfo) -> Result<Value, McpError> {
        let name = match request.params.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.as_str(),
            _ => return Err(McpError::InvalidParams("Missing tool name".to_string())),
        };
        let arguments = match request.params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(McpError::InvalidParams("Tool arguments must be an object".to_string()));
            }
        };
        let entry =
            self.registry.get(name).ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        if !entry.required_scope().is_satisfied_by(&token.scopes) {
            return Err(McpError::MissingScope {
                required: entry.required_scope().label().to_string(),
                granted: token.scopes.to_vec(),
            });
        }

        let context = ToolContext {
            token: token.clone(),
            request_id: request.id.clone(),
            identity: Arc::clone(&self.identity),
            services: Arc::clone(&self.services),
            registered_tools: self.registry.len(),
        };
        let tool = entry.tool();
        let task = tokio::spawn(async move { tool.execute(&context, arguments).await });
        let content = match task.await {
            Ok(Ok(ToolResult::Success(data))) => {
                let text =
                    serde_json::to_string(&data).map_err(|err| McpError::Internal(err.to_string()))?;
                tool_content(text, false)
            }
            Ok(Ok(ToolResult::Failure(message))) => {
                let text = if message.is_empty() { "Unknown error".to_string() } else { message };
                tool_content(text, true)
            }
            Ok(Err(err)) => {
                self.diagnose(DiagnosticLevel::Warn, request, format!("tool {name} failed: {err}"));
                tool_content(format!("Tool execution failed: {err}"), true)
            }
            Err(join) => {
                let cause = if join.is_panic() { "tool panicked" } else { "tool task was cancelled" };
                self.diagnose(DiagnosticLevel::Error, request, format!("tool {name}: {cause}"));
                tool_content(format!("Tool execution failed: {cause}"), true)
            }
        };
        Ok(content)
    }

    /// Records a diagnostic event for the request.
    fn diagnose(&self, level: DiagnosticLevel, request: &JsonRpcRequest, message: String) {
        let request_id = request.id.as_ref().map(ToString::to_string);
        self.audit.record_diagnostic(&McpDiagnosticEvent::new(
            level,
            "dispatcher",
            request_id,
            message,
        ));
    }
}

/// Handles `ping`.
fn ping() -> Result<Value, McpError> {
    let timestamp =
        Timestamp::now().to_iso8601().map_err(|err| McpError::Internal(err.to_string()))?;
    Ok(json!({ "pong": true, "timestamp": timestamp }))
}

/// Wraps text as a single MCP content block.
fn tool_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}
