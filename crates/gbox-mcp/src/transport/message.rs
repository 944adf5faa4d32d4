//! Request body parsing and JSON-RPC error envelopes for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rmcp::model::{ClientJsonRpcMessage, ClientRequest};
use serde_json::{json, Value};

/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The payload is not a valid JSON-RPC message.
pub const INVALID_REQUEST: i64 = -32600;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;
/// Implementation-defined server error.
pub const SERVER_ERROR: i64 = -32000;

/// JSON-RPC error envelope.
pub fn error_body(code: i64, message: &str, id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message },
        "id": id,
    })
}

/// HTTP response wrapping a JSON-RPC error envelope with a null id.
pub fn error_response(status: StatusCode, code: i64, message: &str) -> Response {
    (status, Json(error_body(code, message, Value::Null))).into_response()
}

/// Decode a POST body into one client message, or the 400 response to send.
pub fn parse_message(body: &[u8]) -> Result<ClientJsonRpcMessage, Response> {
    let value: Value = serde_json::from_slice(body).map_err(|_| {
        error_response(StatusCode::BAD_REQUEST, PARSE_ERROR, "Parse error: Invalid JSON")
    })?;

    if value.is_array() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Invalid Request: Batch requests are not supported",
        ));
    }

    serde_json::from_value(value).map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Invalid Request: Server received invalid JSON-RPC message",
        )
    })
}

/// Whether the message is a protocol `initialize` request.
pub fn is_initialize(message: &ClientJsonRpcMessage) -> bool {
    matches!(
        message,
        ClientJsonRpcMessage::Request(request)
            if matches!(request.request, ClientRequest::InitializeRequest(_))
    )
}
