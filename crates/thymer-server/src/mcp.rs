//! Stateless MCP endpoint: JSON-RPC 2.0 over `POST /`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thymer_core::BridgeError;

use crate::api::mcp_tool_list;
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "thymer";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
/// The tool call reached the peer and failed (or timed out).
pub const APPLICATION_ERROR: i32 = -32000;
/// No peer has announced tools; the call never left the bridge.
pub const NOT_CONNECTED: i32 = -32001;

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response. `id` is always present, null when unknown.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }
}

/// Outcome of dispatching one request.
#[derive(Debug)]
pub enum Reply {
    Response(RpcResponse),
    /// Notifications get an empty 204.
    NoContent,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Response(resp) => Json(resp).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle))
        .route("/mcp", post(handle))
        .with_state(state)
}

async fn handle(State(state): State<AppState>, body: String) -> Reply {
    let raw: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => return Reply::Response(RpcResponse::parse_error()),
    };
    let request: RpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return Reply::Response(RpcResponse::error(
                None,
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
            ))
        }
    };
    dispatch(&state, request).await
}

/// Route one request through the method table.
pub async fn dispatch(state: &AppState, request: RpcRequest) -> Reply {
    let RpcRequest { method, params, id } = request;
    tracing::debug!(%method, "mcp request");

    if method.starts_with("notifications/") {
        return Reply::NoContent;
    }

    let response = match method.as_str() {
        "initialize" => RpcResponse::success(id, initialize_result()),
        "tools/list" => {
            let tools = mcp_tool_list(&state.bridge.tools());
            RpcResponse::success(id, json!({ "tools": tools }))
        }
        "tools/call" => call_tool(state, id, params.unwrap_or(Value::Null)).await,
        other => RpcResponse::method_not_found(id, other),
    };
    Reply::Response(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": { "listChanged": true } },
    })
}

async fn call_tool(state: &AppState, id: Option<Value>, params: Value) -> RpcResponse {
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.is_empty() {
        return RpcResponse::error(id, INVALID_PARAMS, "Invalid params: name required");
    }
    if !state.bridge.is_connected() {
        return RpcResponse::error(id, NOT_CONNECTED, "upstream not connected");
    }
    let args = params.get("arguments").filter(|a| a.is_object()).cloned();

    match state.bridge.execute_tool(name, args).await {
        Ok(result) => RpcResponse::success(
            id,
            json!({ "content": [], "structuredContent": structured_content(result) }),
        ),
        Err(BridgeError::NotConnected) => {
            RpcResponse::error(id, NOT_CONNECTED, "upstream not connected")
        }
        Err(e) => {
            tracing::warn!(tool = name, error_kind = e.error_kind(), "mcp tool call failed");
            RpcResponse::error(id, APPLICATION_ERROR, e.to_string())
        }
    }
}

/// Objects pass through; anything else is wrapped as `{"text": ...}`.
pub fn structured_content(result: Value) -> Value {
    match result {
        Value::Object(_) => result,
        Value::String(s) => json!({ "text": s }),
        other => json!({ "text": other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::testing::{connect_peer, read_json, test_state};

    async fn post_rpc(state: AppState, path: &str, body: &str) -> Response {
        router(state)
            .oneshot(Request::post(path).body(Body::from(body.to_owned())).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn structured_content_shapes() {
        assert_eq!(structured_content(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(structured_content(json!("hi")), json!({"text": "hi"}));
        assert_eq!(structured_content(json!([1, 2])), json!({"text": "[1,2]"}));
        assert_eq!(structured_content(Value::Null), json!({"text": "null"}));
    }

    #[tokio::test]
    async fn parse_error_has_null_id() {
        let resp = post_rpc(test_state(), "/", "{not json").await;
        let body = read_json(resp).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn non_object_request_is_invalid() {
        let body = read_json(post_rpc(test_state(), "/", "[1,2]").await).await;
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let body = read_json(
            post_rpc(test_state(), "/", r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await,
        )
        .await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["result"]["serverInfo"]["name"], "thymer");
        assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], true);
    }

    #[tokio::test]
    async fn notifications_get_no_content() {
        let resp = post_rpc(
            test_state(),
            "/mcp",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_method() {
        let body = read_json(
            post_rpc(test_state(), "/", r#"{"jsonrpc":"2.0","id":"x","method":"prompts/list"}"#)
                .await,
        )
        .await;
        assert_eq!(body["id"], "x");
        assert_eq!(body["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(body["error"]["message"], "Method not found: prompts/list");
    }

    #[tokio::test]
    async fn tools_list_from_registry() {
        let state = test_state();
        let empty = read_json(
            post_rpc(state.clone(), "/", r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await,
        )
        .await;
        assert_eq!(empty["result"]["tools"], json!([]));

        let _peer = connect_peer(&state.bridge, |_| json!({"result": null}));
        let body = read_json(
            post_rpc(state, "/", r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await,
        )
        .await;
        let tools = body["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo_find");
        assert_eq!(tools[0]["description"], "Find echoes");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tools_call_requires_name() {
        let body = read_json(
            post_rpc(
                test_state(),
                "/",
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"arguments":{}}}"#,
            )
            .await,
        )
        .await;
        assert_eq!(body["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tools_call_not_connected_is_distinct() {
        let body = read_json(
            post_rpc(
                test_state(),
                "/",
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"echo_find"}}"#,
            )
            .await,
        )
        .await;
        assert_eq!(body["error"]["code"], NOT_CONNECTED);
    }

    #[tokio::test]
    async fn tools_call_returns_structured_content() {
        let state = test_state();
        let mut peer = connect_peer(&state.bridge, |_| json!({"result": {"items": [1]}}));
        let body = read_json(
            post_rpc(
                state,
                "/",
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo_find","arguments":{"q":"x"}}}"#,
            )
            .await,
        )
        .await;
        assert_eq!(body["id"], 5);
        assert_eq!(body["result"]["content"], json!([]));
        assert_eq!(body["result"]["structuredContent"], json!({"items": [1]}));

        let request = peer.requests.recv().await.unwrap();
        assert_eq!(request["args"], json!({"q": "x"}));
    }

    #[tokio::test]
    async fn tools_call_remote_error_is_application_error() {
        let state = test_state();
        let _peer = connect_peer(&state.bridge, |_| json!({"error": "boom"}));
        let body = read_json(
            post_rpc(
                state,
                "/",
                r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"echo_find"}}"#,
            )
            .await,
        )
        .await;
        assert_eq!(body["error"]["code"], APPLICATION_ERROR);
        assert_eq!(body["error"]["message"], "boom");
    }
}
