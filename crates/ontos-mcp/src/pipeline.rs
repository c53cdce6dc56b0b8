// crates/ontos-mcp/src/pipeline.rs
// ============================================================================
// Module: MCP Request Pipeline
// Description: Credential check, decoding, dispatch, and commit per request.
// Purpose: Orchestrate one request from raw headers and body to an envelope.
// Dependencies: axum, ontos-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Each request opens its own token store session. The credential is
//! validated inside that session, the body is decoded, the dispatcher runs,
//! and the session is committed. Any early exit rolls the session back. A
//! failed commit is reported as a diagnostic and does not change the
//! response already produced.
//!
//! Authentication failures never reveal why a credential was rejected and
//! never echo a request id: the body has not been read at that point.
//!
//! [`RequestPipeline::handle_detached`] runs the whole request on its own
//! task. A caller that goes away does not cancel the commit or the audit
//! event, and a panic anywhere in the pipeline still yields an envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use ontos_core::StoreSession;
use ontos_core::Timestamp;
use ontos_core::TokenInfo;
use ontos_core::TokenStore;
use ontos_core::TokenValidator;
use serde_json::Value;

use crate::audit::DiagnosticLevel;
use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::McpAuditSink;
use crate::audit::McpDiagnosticEvent;
use crate::dispatcher::Dispatcher;
use crate::jsonrpc::AUTH_FAILED;
use crate::jsonrpc::INTERNAL_ERROR;
use crate::jsonrpc::INVALID_REQUEST;
use crate::jsonrpc::JsonRpcError;
use crate::jsonrpc::JsonRpcRequest;
use crate::jsonrpc::JsonRpcResponse;
use crate::jsonrpc::RequestDecodeError;
use crate::jsonrpc::decode_request;
use crate::jsonrpc::error_kind;
use crate::telemetry::McpMethod;
use crate::telemetry::McpMetricEvent;
use crate::telemetry::McpMetrics;
use crate::telemetry::McpOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message for every rejected credential.
const INVALID_KEY_MESSAGE: &str = "Invalid or expired API key";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request body as received by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Complete body bytes.
    Complete(Bytes),
    /// Transport stopped reading at its size limit.
    Oversized,
    /// Body stream failed before it ended.
    Interrupted,
}

impl RequestBody {
    /// Returns the body size, or `None` when the body was not fully read.
    #[must_use]
    pub fn received_bytes(&self) -> Option<usize> {
        match self {
            Self::Complete(bytes) => Some(bytes.len()),
            Self::Oversized | Self::Interrupted => None,
        }
    }
}

/// Pipeline collaborators and limits.
pub struct PipelineParts {
    /// Token store opened once per request.
    pub store: Arc<dyn TokenStore>,
    /// Credential validator.
    pub validator: TokenValidator,
    /// Method dispatcher.
    pub dispatcher: Dispatcher,
    /// Audit sink.
    pub audit: Arc<dyn McpAuditSink>,
    /// Metrics sink.
    pub metrics: Arc<dyn McpMetrics>,
    /// Header carrying the API key.
    pub api_key_header: HeaderName,
    /// Maximum accepted body size in bytes.
    pub max_body_bytes: usize,
}

/// Request pipeline.
pub struct RequestPipeline {
    /// Token store opened once per request.
    store: Arc<dyn TokenStore>,
    /// Credential validator.
    validator: TokenValidator,
    /// Method dispatcher.
    dispatcher: Dispatcher,
    /// Audit sink.
    audit: Arc<dyn McpAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn McpMetrics>,
    /// Header carrying the API key.
    api_key_header: HeaderName,
    /// Maximum accepted body size in bytes.
    max_body_bytes: usize,
}

/// Outcome of a single request, before telemetry.
struct Exchange {
    /// Envelope returned to the caller.
    response: JsonRpcResponse,
    /// Method classification.
    method: McpMethod,
    /// Tool name for `tools/call`.
    tool: Option<String>,
    /// Authenticated token name.
    token_name: Option<String>,
}

impl Exchange {
    /// Builds an exchange rejected before decoding.
    const fn rejected(response: JsonRpcResponse, token_name: Option<String>) -> Self {
        Self {
            response,
            method: McpMethod::Invalid,
            tool: None,
            token_name,
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

impl RequestPipeline {
    /// Assembles a pipeline.
    #[must_use]
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            store: parts.store,
            validator: parts.validator,
            dispatcher: parts.dispatcher,
            audit: parts.audit,
            metrics: parts.metrics,
            api_key_header: parts.api_key_header,
            max_body_bytes: parts.max_body_bytes,
        }
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handles one request and records its audit and metric events.
    pub async fn handle(&self, headers: &HeaderMap, body: RequestBody) -> JsonRpcResponse {
        let started = Instant::now();
        let request_bytes = body.received_bytes();
        let exchange = self.process(headers, &body).await;
        self.observe(&exchange, request_bytes, started);
        exchange.response
    }

    /// Handles one request on its own task.
    ///
    /// Dropping the returned future does not cancel the request. A panic
    /// inside the pipeline becomes an internal error envelope with a
    /// diagnostic and an audit event.
    pub async fn handle_detached(
        self: &Arc<Self>,
        headers: HeaderMap,
        body: RequestBody,
    ) -> JsonRpcResponse {
        let started = Instant::now();
        let request_bytes = body.received_bytes();
        let pipeline = Arc::clone(self);
        let task = tokio::spawn(async move { pipeline.handle(&headers, body).await });
        match task.await {
            Ok(response) => response,
            Err(join) => {
                let cause = if join.is_panic() {
                    "request handler panicked"
                } else {
                    "request handler was cancelled"
                };
                self.diagnose(DiagnosticLevel::Error, "pipeline", cause.to_string());
                let exchange = Exchange::rejected(internal_failure(cause), None);
                self.observe(&exchange, request_bytes, started);
                exchange.response
            }
        }
    }

    /// Runs the request steps in order.
    async fn process(&self, headers: &HeaderMap, body: &RequestBody) -> Exchange {
        let Some(raw) = headers.get(&self.api_key_header).filter(|value| !value.is_empty()) else {
            let message = format!("Missing {} header", self.api_key_header.as_str());
            return Exchange::rejected(auth_failure(message), None);
        };
        let Ok(credential) = raw.to_str() else {
            return Exchange::rejected(auth_failure(INVALID_KEY_MESSAGE), None);
        };
        if credential.len() > self.validator.max_secret_bytes() {
            return Exchange::rejected(auth_failure(INVALID_KEY_MESSAGE), None);
        }

        let mut session = match run_blocking(|| self.store.begin()) {
            Ok(session) => session,
            Err(err) => {
                self.diagnose(DiagnosticLevel::Error, "token_store", format!("begin failed: {err}"));
                return Exchange::rejected(internal_failure(&err.to_string()), None);
            }
        };
        let token = match self.authenticate(session.as_mut(), credential) {
            Ok(Some(token)) => token,
            Ok(None) => {
                rollback(session);
                return Exchange::rejected(auth_failure(INVALID_KEY_MESSAGE), None);
            }
            Err(err) => {
                rollback(session);
                self.diagnose(DiagnosticLevel::Error, "token_validator", err.clone());
                return Exchange::rejected(internal_failure(&err), None);
            }
        };
        let token_name = Some(token.name.clone());

        let request = match self.decode(body) {
            Ok(request) => request,
            Err(response) => {
                rollback(session);
                return Exchange::rejected(response, token_name);
            }
        };

        let method = McpMethod::from_name(&request.method);
        let tool = tool_name(&request, method);
        let response = self.dispatcher.dispatch(&request, &token).await;

        if let Err(err) = run_blocking(move || session.commit()) {
            let request_id = request.id.as_ref().map(ToString::to_string);
            self.audit.record_diagnostic(&McpDiagnosticEvent::new(
                DiagnosticLevel::Warn,
                "token_store",
                request_id,
                format!("commit failed, changes rolled back: {err}"),
            ));
        }
        Exchange {
            response,
            method,
            tool,
            token_name,
        }
    }

    /// Validates the credential inside the session.
    fn authenticate(
        &self,
        session: &mut dyn StoreSession,
        credential: &str,
    ) -> Result<Option<TokenInfo>, String> {
        run_blocking(|| self.validator.validate(session, credential, Timestamp::now()))
            .map_err(|err| err.to_string())
    }

    /// Applies the size limit and decodes the body.
    fn decode(&self, body: &RequestBody) -> Result<JsonRpcRequest, JsonRpcResponse> {
        match body {
            RequestBody::Complete(bytes) if bytes.len() <= self.max_body_bytes => {
                decode_request(bytes).map_err(RequestDecodeError::into_response)
            }
            RequestBody::Complete(_) | RequestBody::Oversized => Err(JsonRpcResponse::error(
                None,
                JsonRpcError::new(INVALID_REQUEST, "request body too large"),
            )),
            RequestBody::Interrupted => Err(RequestDecodeError::Parse(
                "request body was interrupted".to_string(),
            )
            .into_response()),
        }
    }

    /// Emits the audit event and metrics for a finished exchange.
    fn observe(&self, exchange: &Exchange, request_bytes: Option<usize>, started: Instant) {
        let response_bytes = serde_json::to_vec(&exchange.response).map_or(0, |bytes| bytes.len());
        let error_code = exchange.response.error_code();
        let outcome = if error_code.is_some() { McpOutcome::Error } else { McpOutcome::Ok };
        let error_kind = error_code.map(error_kind);
        self.audit.record(&McpAuditEvent::new(McpAuditEventParams {
            request_id: exchange.response.id.as_ref().map(ToString::to_string),
            method: exchange.method,
            tool: exchange.tool.clone(),
            outcome,
            error_code,
            error_kind,
            token_name: exchange.token_name.clone(),
            request_bytes,
            response_bytes,
        }));
        let event = McpMetricEvent {
            method: exchange.method,
            tool: exchange.tool.clone(),
            outcome,
            error_code,
            error_kind,
            request_bytes,
            response_bytes,
        };
        self.metrics.record_request(event.clone());
        self.metrics.record_latency(event, started.elapsed());
    }

    /// Records a pipeline diagnostic.
    fn diagnose(&self, level: DiagnosticLevel, component: &'static str, message: String) {
        self.audit.record_diagnostic(&McpDiagnosticEvent::new(level, component, None, message));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs blocking store work without stalling a multi-thread runtime.
pub(crate) fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Discards a session's buffered changes.
fn rollback(session: Box<dyn StoreSession>) {
    run_blocking(move || session.rollback());
}

/// Builds an authentication failure envelope.
fn auth_failure(message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse::error(None, JsonRpcError::new(AUTH_FAILED, message))
}

/// Builds an internal failure envelope.
fn internal_failure(cause: &str) -> JsonRpcResponse {
    JsonRpcResponse::error(None, JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {cause}")))
}

/// Extracts the tool name of a `tools/call` request for telemetry.
fn tool_name(request: &JsonRpcRequest, method: McpMethod) -> Option<String> {
    if method != McpMethod::ToolsCall {
        return None;
    }
    request.params.get("name").and_then(Value::as_str).map(ToString::to_string)
}
