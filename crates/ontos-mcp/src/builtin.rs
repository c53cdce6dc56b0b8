// crates/ontos-mcp/src/builtin.rs
// ============================================================================
// Module: Built-in MCP Tools
// Description: Tools every gateway registers.
// Purpose: Provide server identity, caller introspection, and token listing.
// Dependencies: async-trait, ontos-core, serde_json
// ============================================================================

//! ## Overview
//! Built-in tools cover the gateway itself rather than business logic:
//! `server_info` is open to any valid token, `token_introspect` requires
//! `tokens:read`, and `tokens_list` requires `tokens:admin` plus an exposed
//! token administration collaborator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use ontos_core::RequiredScope;
use ontos_core::Timestamp;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::pipeline::run_blocking;
use crate::tools::RegistryError;
use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolDefinition;
use crate::tools::ToolExecutionError;
use crate::tools::ToolRegistryBuilder;
use crate::tools::ToolResult;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers every built-in tool.
///
/// # Errors
///
/// Returns [`RegistryError`] when a built-in name is already taken.
pub fn register_builtin_tools(builder: &mut ToolRegistryBuilder) -> Result<(), RegistryError> {
    builder
        .register(Arc::new(ServerInfoTool))?
        .register(Arc::new(TokenIntrospectTool))?
        .register(Arc::new(TokensListTool))?;
    Ok(())
}

/// Schema for tools that take no arguments.
fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}, "additionalProperties": false})
}

/// Renders an optional timestamp as ISO-8601.
fn iso_or_null(timestamp: Option<Timestamp>) -> Result<Value, ToolExecutionError> {
    timestamp.map_or(Ok(Value::Null), |timestamp| {
        timestamp
            .to_iso8601()
            .map(Value::String)
            .map_err(|err| ToolExecutionError::Failed(err.to_string()))
    })
}

// ============================================================================
// SECTION: server_info
// ============================================================================

/// Reports server identity.
pub struct ServerInfoTool;

#[async_trait]
impl Tool for ServerInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "server_info".to_string(),
            description: "Return the gateway name, version, and registered tool count.".to_string(),
            input_schema: empty_schema(),
        }
    }

    fn required_scope(&self) -> RequiredScope {
        RequiredScope::Open
    }

    async fn execute(
        &self,
        context: &ToolContext,
        _arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolExecutionError> {
        Ok(ToolResult::Success(json!({
            "name": context.identity.name,
            "version": context.identity.version,
            "protocolVersion": context.identity.protocol_version,
            "tools": context.registered_tools,
        })))
    }
}

// ============================================================================
// SECTION: token_introspect
// ============================================================================

/// Describes the calling token.
pub struct TokenIntrospectTool;

#[async_trait]
impl Tool for TokenIntrospectTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "token_introspect".to_string(),
            description: "Describe the API token used for this request.".to_string(),
            input_schema: empty_schema(),
        }
    }

    fn required_scope(&self) -> RequiredScope {
        RequiredScope::named("tokens:read")
    }

    async fn execute(
        &self,
        context: &ToolContext,
        _arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolExecutionError> {
        let token = &context.token;
        Ok(ToolResult::Success(json!({
            "id": token.id.as_str(),
            "name": token.name,
            "scopes": token.scopes.to_vec(),
            "expires_at": iso_or_null(token.expires_at)?,
        })))
    }
}

// ============================================================================
// SECTION: tokens_list
// ============================================================================

/// Lists API tokens through the token administration collaborator.
pub struct TokensListTool;

#[async_trait]
impl Tool for TokensListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "tokens_list".to_string(),
            description: "List API tokens without their secrets.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "include_inactive": {"type": "boolean", "default": false}
                },
                "additionalProperties": false
            }),
        }
    }

    fn required_scope(&self) -> RequiredScope {
        RequiredScope::named("tokens:admin")
    }

    async fn execute(
        &self,
        context: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolExecutionError> {
        let Some(admin) = context.services.token_admin.as_ref() else {
            return Ok(ToolResult::Failure("token administration is not enabled".to_string()));
        };
        let include_inactive = match arguments.get("include_inactive") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                return Ok(ToolResult::Failure("include_inactive must be a boolean".to_string()));
            }
        };
        let tokens = run_blocking(|| admin.list_tokens(include_inactive))?;
        let tokens = serde_json::to_value(tokens)
            .map_err(|err| ToolExecutionError::Failed(err.to_string()))?;
        Ok(ToolResult::Success(json!({ "tokens": tokens })))
    }
}
