// crates/ontos-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: HTTP transport and server assembly for the MCP gateway.
// Purpose: Wire configuration, token store, tools, and sinks into axum.
// Dependencies: axum, ontos-config, ontos-core, ontos-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`McpServer`] assembles the request pipeline from an [`OntosConfig`] and
//! serves it over HTTP. `POST <endpoint>` runs the pipeline and always answers
//! `200` with a JSON-RPC envelope. `GET <endpoint>/health` is unauthenticated
//! and reports static server identity.
//!
//! Requests run detached from the connection that carried them. A client
//! disconnect or a panic in the pipeline never skips the commit or the audit
//! event, and a panic still produces an internal error envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use http_body_util::LengthLimitError;
use ontos_config::OntosConfig;
use ontos_config::TokenStoreConfig;
use ontos_config::TokenStoreType;
use ontos_core::InMemoryTokenStore;
use ontos_core::ScopeSet;
use ontos_core::Timestamp;
use ontos_core::TokenAdmin;
use ontos_core::TokenStore;
use ontos_core::TokenValidator;
use ontos_store_sqlite::SqliteTokenStore;
use serde_json::json;

use crate::audit::McpAuditSink;
use crate::audit::McpFileAuditSink;
use crate::audit::McpNoopAuditSink;
use crate::audit::McpStderrAuditSink;
use crate::builtin::register_builtin_tools;
use crate::dispatcher::Dispatcher;
use crate::jsonrpc::JsonRpcResponse;
use crate::pipeline::PipelineParts;
use crate::pipeline::RequestBody;
use crate::pipeline::RequestPipeline;
use crate::telemetry::McpMetrics;
use crate::telemetry::NoopMetrics;
use crate::tools::ServerIdentity;
use crate::tools::Tool;
use crate::tools::ToolRegistry;
use crate::tools::ToolServices;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Token store handles: the per-request store and its administration view.
type StoreHandles = (Arc<dyn TokenStore>, Arc<dyn TokenAdmin>);

/// MCP server instance.
pub struct McpServer {
    /// Loaded configuration.
    config: OntosConfig,
    /// Shared request state.
    state: Arc<ServerState>,
}

/// Shared state for HTTP handlers.
struct ServerState {
    /// Request pipeline.
    pipeline: Arc<RequestPipeline>,
    /// Server identity for the health endpoint.
    identity: Arc<ServerIdentity>,
    /// Maximum accepted body size in bytes.
    max_body_bytes: usize,
}

/// Builder for [`McpServer`].
pub struct McpServerBuilder {
    /// Configuration to serve.
    config: OntosConfig,
    /// Tools registered after the built-ins.
    tools: Vec<Arc<dyn Tool>>,
    /// Token store overriding the configured one.
    token_store: Option<StoreHandles>,
    /// Audit sink overriding the configured one.
    audit: Option<Arc<dyn McpAuditSink>>,
    /// Metrics sink; defaults to [`NoopMetrics`].
    metrics: Option<Arc<dyn McpMetrics>>,
}

// ============================================================================
// SECTION: Server
// ============================================================================

impl McpServer {
    /// Builds a server from configuration alone.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when configuration or initialization fails.
    pub fn from_config(config: OntosConfig) -> Result<Self, McpServerError> {
        Self::builder(config).build()
    }

    /// Starts a builder for customized assembly.
    #[must_use]
    pub fn builder(config: OntosConfig) -> McpServerBuilder {
        McpServerBuilder {
            config,
            tools: Vec::new(),
            token_store: None,
            audit: None,
            metrics: None,
        }
    }

    /// Returns the axum router for the configured endpoint.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.config.server.endpoint, post(handle_rpc))
            .route(&self.config.server.health_path(), get(handle_health))
            .with_state(Arc::clone(&self.state))
    }

    /// Runs one request through the pipeline without a transport.
    pub async fn handle_request(&self, headers: &HeaderMap, body: &[u8]) -> JsonRpcResponse {
        self.handle_body(headers.clone(), RequestBody::Complete(Bytes::copy_from_slice(body))).await
    }

    /// Runs one request with a body as the transport observed it.
    pub async fn handle_body(&self, headers: HeaderMap, body: RequestBody) -> JsonRpcResponse {
        self.state.pipeline.handle_detached(headers, body).await
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        self.state.pipeline.dispatcher().registry()
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| McpServerError::Transport(format!("http bind failed: {err}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|err| McpServerError::Transport(format!("http server failed: {err}")))
    }
}

impl McpServerBuilder {
    /// Registers an additional tool.
    #[must_use]
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Uses the given token store instead of the configured one.
    #[must_use]
    pub fn token_store<S>(mut self, store: S) -> Self
    where
        S: TokenStore + TokenAdmin + 'static,
    {
        let store = Arc::new(store);
        let admin: Arc<dyn TokenAdmin> = store.clone();
        let store: Arc<dyn TokenStore> = store;
        self.token_store = Some((store, admin));
        self
    }

    /// Uses the given audit sink.
    #[must_use]
    pub fn audit_sink(mut self, audit: Arc<dyn McpAuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Uses the given metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn McpMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assembles the server.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when configuration is invalid, the token
    /// store cannot be opened, or tool names collide.
    pub fn build(self) -> Result<McpServer, McpServerError> {
        let config = self.config;
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let api_key_header = HeaderName::from_bytes(config.server.auth.api_key_header.as_bytes())
            .map_err(|_| McpServerError::Config("invalid api key header".to_string()))?;

        let (store, admin) = match self.token_store {
            Some(handles) => handles,
            None => build_token_store(&config.token_store)?,
        };
        let audit = match self.audit {
            Some(audit) => audit,
            None => build_audit_sink(&config)?,
        };
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));

        let mut builder = ToolRegistry::builder();
        register_builtin_tools(&mut builder).map_err(|err| McpServerError::Init(err.to_string()))?;
        for tool in self.tools {
            builder.register(tool).map_err(|err| McpServerError::Init(err.to_string()))?;
        }
        let registry = Arc::new(builder.build());

        let identity = Arc::new(ServerIdentity {
            name: config.server.identity.name.clone(),
            version: config.server.identity.version.clone(),
            protocol_version: config.server.identity.protocol_version.clone(),
        });
        let services = Arc::new(ToolServices {
            token_admin: config.tools.expose_token_admin.then_some(admin),
        });
        let dispatcher =
            Dispatcher::new(registry, Arc::clone(&identity), services, Arc::clone(&audit));
        let pipeline = Arc::new(RequestPipeline::new(PipelineParts {
            store,
            validator: TokenValidator::new(config.server.auth.max_api_key_bytes),
            dispatcher,
            audit,
            metrics,
            api_key_header,
            max_body_bytes: config.server.max_body_bytes,
        }));
        let state = Arc::new(ServerState {
            pipeline,
            identity,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(McpServer {
            config,
            state,
        })
    }
}

// ============================================================================
// SECTION: Assembly Helpers
// ============================================================================

/// Builds the configured token store.
fn build_token_store(config: &TokenStoreConfig) -> Result<StoreHandles, McpServerError> {
    match config.store_type {
        TokenStoreType::Memory => {
            let store = InMemoryTokenStore::new();
            for seed in &config.tokens {
                let scopes: ScopeSet = seed.scopes.iter().cloned().collect();
                let expires_at = seed.expires_at_ms.map(Timestamp::from_unix_millis);
                store
                    .seed(&seed.name, &seed.secret, scopes, expires_at)
                    .map_err(|err| McpServerError::Init(err.to_string()))?;
            }
            let store = Arc::new(store);
            let admin: Arc<dyn TokenAdmin> = store.clone();
            let store: Arc<dyn TokenStore> = store;
            Ok((store, admin))
        }
        TokenStoreType::Sqlite => {
            let sqlite = config.sqlite_config().ok_or_else(|| {
                McpServerError::Config("sqlite token_store requires path".to_string())
            })?;
            let store = Arc::new(
                SqliteTokenStore::new(&sqlite).map_err(|err| McpServerError::Init(err.to_string()))?,
            );
            let admin: Arc<dyn TokenAdmin> = store.clone();
            let store: Arc<dyn TokenStore> = store;
            Ok((store, admin))
        }
    }
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &OntosConfig) -> Result<Arc<dyn McpAuditSink>, McpServerError> {
    let audit = &config.server.audit;
    if !audit.enabled {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let sink = McpFileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: HTTP Handlers
// ============================================================================

/// Handles JSON-RPC requests over HTTP.
async fn handle_rpc(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let body = read_body(body, state.max_body_bytes).await;
    let response = state.pipeline.handle_detached(headers, body).await;
    (StatusCode::OK, Json(response))
}

/// Reads a request body up to `limit` bytes.
async fn read_body(body: Body, limit: usize) -> RequestBody {
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => RequestBody::Complete(bytes),
        Err(err) if is_length_limit(&err) => RequestBody::Oversized,
        Err(_) => RequestBody::Interrupted,
    }
}

/// Returns true when the error chain contains a body length limit.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(error) = current {
        if error.is::<LengthLimitError>() {
            return true;
        }
        current = error.source();
    }
    false
}

/// Handles unauthenticated liveness checks.
async fn handle_health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "server": state.identity.name,
            "version": state.identity.version,
        })),
    )
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::io;

    use axum::body::Body;
    use axum::body::Bytes;

    use super::read_body;
    use crate::pipeline::RequestBody;

    #[tokio::test]
    async fn body_within_limit_is_complete() {
        let body = read_body(Body::from("{}"), 16).await;
        assert_eq!(body, RequestBody::Complete(Bytes::from_static(b"{}")));
    }

    #[tokio::test]
    async fn body_over_limit_is_oversized() {
        let body = read_body(Body::from(vec![b'x'; 64]), 16).await;
        assert_eq!(body, RequestBody::Oversized);
        assert_eq!(body.received_bytes(), None);
    }

    #[tokio::test]
    async fn failed_stream_is_interrupted() {
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"jsonrpc\"")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let body = read_body(Body::from_stream(tokio_stream::iter(chunks)), 1_024).await;
        assert_eq!(body, RequestBody::Interrupted);
    }
}
