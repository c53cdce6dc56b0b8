// crates/ontos-mcp/src/jsonrpc.rs
// ============================================================================
// Module: JSON-RPC Envelope Codec
// Description: JSON-RPC 2.0 request decoding and response envelopes.
// Purpose: Keep request shape rules and error codes in one place.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Decodes untrusted request bodies into [`JsonRpcRequest`] and builds the two
//! response shapes the gateway emits. A response carries exactly one of
//! `result` or `error`; [`ResponsePayload`] makes the other state
//! unrepresentable. Batches are not supported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-RPC protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

/// Malformed request body.
pub const PARSE_ERROR: i64 = -32_700;
/// Request does not match the JSON-RPC shape.
pub const INVALID_REQUEST: i64 = -32_600;
/// Unknown method or tool.
pub const METHOD_NOT_FOUND: i64 = -32_601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32_602;
/// Unexpected server fault.
pub const INTERNAL_ERROR: i64 = -32_603;
/// Missing, invalid, or expired credential.
pub const AUTH_FAILED: i64 = -32_001;
/// Caller lacks the scope a tool requires.
pub const MISSING_SCOPE: i64 = -32_002;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Request identifier echoed back in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

/// Decoded JSON-RPC request.
///
/// # Invariants
/// - `method` is non-empty.
/// - `params` is empty when the request omitted them or sent `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Method name.
    pub method: String,
    /// Named parameters.
    pub params: Map<String, Value>,
    /// Request identifier; absent for notifications.
    pub id: Option<RequestId>,
}

/// Request decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestDecodeError {
    /// Body is not valid JSON.
    #[error("Failed to parse JSON: {0}")]
    Parse(String),
    /// Body is JSON but not a valid request.
    #[error("Invalid request: {reason}")]
    Invalid {
        /// Identifier recovered from the body, when valid.
        id: Option<RequestId>,
        /// Shape violation.
        reason: String,
    },
}

impl RequestDecodeError {
    /// Converts the failure into the response sent to the caller.
    #[must_use]
    pub fn into_response(self) -> JsonRpcResponse {
        let message = self.to_string();
        match self {
            Self::Parse(_) => JsonRpcResponse::error(None, JsonRpcError::new(PARSE_ERROR, message)),
            Self::Invalid {
                id, ..
            } => JsonRpcResponse::error(id, JsonRpcError::new(INVALID_REQUEST, message)),
        }
    }
}

// ============================================================================
// SECTION: Response Types
// ============================================================================

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Creates an error without structured detail.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Mutually exclusive response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    /// Successful result.
    Result(Value),
    /// Error object.
    Error(JsonRpcError),
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version tag.
    pub jsonrpc: &'static str,
    /// Result or error.
    #[serde(flatten)]
    pub payload: ResponsePayload,
    /// Echoed request identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Builds a success envelope.
    #[must_use]
    pub const fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            payload: ResponsePayload::Result(result),
            id,
        }
    }

    /// Builds an error envelope.
    #[must_use]
    pub const fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            payload: ResponsePayload::Error(error),
            id,
        }
    }

    /// Returns the error code for error envelopes.
    #[must_use]
    pub const fn error_code(&self) -> Option<i64> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(error) => Some(error.code),
        }
    }

    /// Returns the result for success envelopes.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a request body.
///
/// # Errors
///
/// Returns [`RequestDecodeError::Parse`] when the body is not JSON and
/// [`RequestDecodeError::Invalid`] when it does not match the request shape.
pub fn decode_request(body: &[u8]) -> Result<JsonRpcRequest, RequestDecodeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| RequestDecodeError::Parse(err.to_string()))?;
    request_from_value(value)
}

/// Validates a parsed body against the request shape.
fn request_from_value(value: Value) -> Result<JsonRpcRequest, RequestDecodeError> {
    let Value::Object(mut object) = value else {
        return Err(invalid(None, "request must be a JSON object"));
    };
    let id = match object.remove("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(RequestId::String(id)),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(id) => Some(RequestId::Number(id)),
            None => return Err(invalid(None, "id must be a string or integer")),
        },
        Some(_) => return Err(invalid(None, "id must be a string or integer")),
    };
    match object.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => return Err(invalid(id, "jsonrpc must be \"2.0\"")),
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(invalid(id, "method must be a non-empty string")),
    };
    let params = match object.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(invalid(id, "params must be an object")),
    };
    Ok(JsonRpcRequest {
        method,
        params,
        id,
    })
}

/// Builds an invalid-request failure.
fn invalid(id: Option<RequestId>, reason: &str) -> RequestDecodeError {
    RequestDecodeError::Invalid {
        id,
        reason: reason.to_string(),
    }
}

/// Returns a stable label for an error code.
#[must_use]
pub const fn error_kind(code: i64) -> &'static str {
    match code {
        PARSE_ERROR => "parse_error",
        INVALID_REQUEST => "invalid_request",
        METHOD_NOT_FOUND => "method_not_found",
        INVALID_PARAMS => "invalid_params",
        INTERNAL_ERROR => "internal_error",
        AUTH_FAILED => "auth_failed",
        MISSING_SCOPE => "missing_scope",
        _ => "unknown",
    }
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

    use serde_json::json;

    use super::*;

    fn decode(value: &Value) -> Result<JsonRpcRequest, RequestDecodeError> {
        decode_request(value.to_string().as_bytes())
    }

    #[test]
    fn decodes_minimal_request() {
        let request = decode(&json!({"jsonrpc": "2.0", "method": "ping"})).unwrap();
        assert_eq!(request.method, "ping");
        assert!(request.params.is_empty());
        assert_eq!(request.id, None);
    }

    #[test]
    fn null_id_and_params_are_absent() {
        let request =
            decode(&json!({"jsonrpc": "2.0", "method": "ping", "id": null, "params": null}))
                .unwrap();
        assert_eq!(request.id, None);
        assert!(request.params.is_empty());
    }

    #[test]
    fn malformed_body_is_parse_error_without_id() {
        let err = decode_request(b"{\"jsonrpc\": ").unwrap_err();
        assert!(matches!(err, RequestDecodeError::Parse(_)));
        let response = err.into_response();
        assert_eq!(response.error_code(), Some(PARSE_ERROR));
        assert_eq!(response.id, None);
    }

    #[test]
    fn valid_id_is_kept_when_shape_fails() {
        let err = decode(&json!({"jsonrpc": "1.0", "method": "ping", "id": 42})).unwrap_err();
        let response = err.into_response();
        assert_eq!(response.error_code(), Some(INVALID_REQUEST));
        assert_eq!(response.id, Some(RequestId::Number(42)));
    }

    #[test]
    fn rejects_non_object_bodies_and_fields() {
        for body in [
            json!([{"jsonrpc": "2.0", "method": "ping"}]),
            json!({"method": "ping"}),
            json!({"jsonrpc": "2.0", "method": ""}),
            json!({"jsonrpc": "2.0", "method": 7}),
            json!({"jsonrpc": "2.0", "method": "ping", "params": [1]}),
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1.5}),
            json!({"jsonrpc": "2.0", "method": "ping", "id": {"x": 1}}),
        ] {
            let err = decode(&body).unwrap_err();
            assert!(matches!(err, RequestDecodeError::Invalid { .. }), "{body}");
        }
    }

    #[test]
    fn envelopes_serialize_exactly_one_payload() {
        let ok = serde_json::to_value(JsonRpcResponse::success(
            Some(RequestId::String("a".to_string())),
            json!({"pong": true}),
        ))
        .unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "result": {"pong": true}, "id": "a"}));

        let err = serde_json::to_value(JsonRpcResponse::error(
            None,
            JsonRpcError::new(AUTH_FAILED, "Invalid or expired API key"),
        ))
        .unwrap();
        assert_eq!(
            err,
            json!({"jsonrpc": "2.0", "error": {"code": -32001, "message": "Invalid or expired API key"}})
        );
    }
}
