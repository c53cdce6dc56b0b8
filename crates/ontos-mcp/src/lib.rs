// crates/ontos-mcp/src/lib.rs
// ============================================================================
// Module: Ontos MCP
// Description: JSON-RPC 2.0 MCP gateway with API-token authorization.
// Purpose: Authenticate callers, authorize tools by scope, and dispatch MCP.
// Dependencies: ontos-core, ontos-config, ontos-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! Ontos MCP serves the Model Context Protocol method set over HTTP. Each
//! request is authenticated with an API token, decoded as JSON-RPC 2.0, and
//! dispatched to a fixed method table. `tools/list` and `tools/call` are
//! filtered by the scopes the token grants. Every outcome, including tool
//! crashes, is returned as a single well-formed envelope.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod builtin;
pub mod dispatcher;
pub mod jsonrpc;
pub mod pipeline;
pub mod server;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DiagnosticLevel;
pub use audit::McpAuditEvent;
pub use audit::McpAuditSink;
pub use audit::McpDiagnosticEvent;
pub use audit::McpFileAuditSink;
pub use audit::McpNoopAuditSink;
pub use audit::McpStderrAuditSink;
pub use dispatcher::Dispatcher;
pub use dispatcher::McpError;
pub use jsonrpc::JsonRpcError;
pub use jsonrpc::JsonRpcRequest;
pub use jsonrpc::JsonRpcResponse;
pub use jsonrpc::RequestId;
pub use jsonrpc::ResponsePayload;
pub use ontos_config::OntosConfig;
pub use pipeline::RequestBody;
pub use pipeline::RequestPipeline;
pub use server::McpServer;
pub use server::McpServerBuilder;
pub use server::McpServerError;
pub use telemetry::McpMethod;
pub use telemetry::McpMetricEvent;
pub use telemetry::McpMetrics;
pub use telemetry::McpOutcome;
pub use telemetry::NoopMetrics;
pub use tools::RegistryError;
pub use tools::ServerIdentity;
pub use tools::Tool;
pub use tools::ToolContext;
pub use tools::ToolDefinition;
pub use tools::ToolExecutionError;
pub use tools::ToolRegistry;
pub use tools::ToolRegistryBuilder;
pub use tools::ToolResult;
pub use tools::ToolServices;
