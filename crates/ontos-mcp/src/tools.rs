// crates/ontos-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Registry
// Description: Tool contract, execution context, and the immutable registry.
// Purpose: Map tool names to executable tools with declared scopes.
// Dependencies: async-trait, ontos-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Tool`] declares its listing definition, the scope a caller must hold,
//! and an async `execute` entry point. Tools are registered once through
//! [`ToolRegistryBuilder`]; the resulting [`ToolRegistry`] is read-only and
//! shared across requests behind an `Arc`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ontos_core::RequiredScope;
use ontos_core::ScopeSet;
use ontos_core::StoreError;
use ontos_core::TokenAdmin;
use ontos_core::TokenInfo;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::jsonrpc::RequestId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum tool name length in bytes.
const MAX_TOOL_NAME_BYTES: usize = 128;

// ============================================================================
// SECTION: Tool Contract
// ============================================================================

/// Tool listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name used by `tools/call`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the tool arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool invocation result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Tool succeeded with a payload.
    Success(Value),
    /// Tool reported a failure.
    Failure(String),
}

/// Unexpected tool execution faults.
///
/// These differ from [`ToolResult::Failure`], which a tool returns on purpose.
#[derive(Debug, Error)]
pub enum ToolExecutionError {
    /// A collaborator the tool depends on failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
    /// Tool output could not be produced.
    #[error("{0}")]
    Failed(String),
}

impl From<StoreError> for ToolExecutionError {
    fn from(error: StoreError) -> Self {
        Self::Collaborator(error.to_string())
    }
}

/// Server identity reported by `initialize` and the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIdentity {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// MCP protocol version.
    pub protocol_version: String,
}

/// Optional collaborators handed to tools.
#[derive(Clone, Default)]
pub struct ToolServices {
    /// Token administration, present only when explicitly exposed.
    pub token_admin: Option<Arc<dyn TokenAdmin>>,
}

/// Per-invocation tool context.
#[derive(Clone)]
pub struct ToolContext {
    /// Authenticated caller.
    pub token: TokenInfo,
    /// Request identifier when provided.
    pub request_id: Option<RequestId>,
    /// Server identity.
    pub identity: Arc<ServerIdentity>,
    /// Optional collaborators.
    pub services: Arc<ToolServices>,
    /// Number of registered tools.
    pub registered_tools: usize,
}

/// Executable MCP tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool listing entry.
    fn definition(&self) -> ToolDefinition;

    /// Returns the scope required to list or call the tool.
    ///
    /// Tools that do not override this require the global wildcard.
    fn required_scope(&self) -> RequiredScope {
        RequiredScope::Wildcard
    }

    /// Executes the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolExecutionError`] for unexpected faults. Expected failures
    /// are reported as [`ToolResult::Failure`].
    async fn execute(
        &self,
        context: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolExecutionError>;
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registered tool with its cached definition and scope.
pub struct RegisteredTool {
    /// Listing entry captured at registration.
    definition: ToolDefinition,
    /// Scope captured at registration.
    required_scope: RequiredScope,
    /// Tool implementation.
    tool: Arc<dyn Tool>,
}

impl RegisteredTool {
    /// Returns the listing entry.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Returns the required scope.
    #[must_use]
    pub const fn required_scope(&self) -> &RequiredScope {
        &self.required_scope
    }

    /// Returns a shared handle to the implementation.
    #[must_use]
    pub fn tool(&self) -> Arc<dyn Tool> {
        Arc::clone(&self.tool)
    }
}

/// Immutable tool registry.
///
/// # Invariants
/// - Tool names are unique.
/// - Listing order is registration order.
pub struct ToolRegistry {
    /// Tools in registration order.
    tools: Vec<RegisteredTool>,
    /// Name to position lookup.
    index: BTreeMap<String, usize>,
}

impl ToolRegistry {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Returns every tool definition in registration order.
    #[must_use]
    pub fn list_definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|entry| &entry.definition).collect()
    }

    /// Returns the definitions the granted scopes may see.
    #[must_use]
    pub fn visible_definitions(&self, granted: &ScopeSet) -> Vec<&ToolDefinition> {
        self.tools
            .iter()
            .filter(|entry| entry.required_scope.is_satisfied_by(granted))
            .map(|entry| &entry.definition)
            .collect()
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).and_then(|position| self.tools.get(*position))
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Tool name already registered.
    #[error("duplicate tool name: {0}")]
    Duplicate(String),
    /// Tool name is unusable.
    #[error("invalid tool name: {0}")]
    InvalidName(String),
}

/// Builder for [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    /// Tools in registration order.
    tools: Vec<RegisteredTool>,
    /// Name to position lookup.
    index: BTreeMap<String, usize>,
}

impl ToolRegistryBuilder {
    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the name is empty, too long, contains
    /// whitespace, or is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<&mut Self, RegistryError> {
        let definition = tool.definition();
        let name = definition.name.clone();
        if name.is_empty()
            || name.len() > MAX_TOOL_NAME_BYTES
            || name.chars().any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(RegistryError::InvalidName(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        let required_scope = tool.required_scope();
        self.index.insert(name, self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            required_scope,
            tool,
        });
        Ok(self)
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            index: self.index,
        }
    }
}
