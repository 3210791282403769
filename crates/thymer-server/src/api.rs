//! Local HTTP API: status, collection queries, sync and capture.

use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::errors::GatewayError;
use crate::state::AppState;

/// Tool used for quick captures.
const CAPTURE_TOOL: &str = "log_to_journal";

type ApiResult<T> = Result<T, GatewayError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/query", get(query))
        .route("/api/sync", post(sync))
        .route("/api/capture", post(capture))
        .route("/api/mcp/tools", get(mcp_tools))
        .route("/api/mcp/call", post(mcp_call))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("access-control-allow-private-network"),
            HeaderValue::from_static("true"),
        ))
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.bridge.snapshot();
    Json(json!({
        "connected": snapshot.connected,
        "tools": snapshot.tool_count(),
        "plugins": snapshot.plugins,
        "workspace": state.settings.workspace,
        "thymer_url": state.settings.thymer_url(),
        "pending_calls": state.bridge.pending_calls(),
        "metrics": state.bridge.metrics().report(),
    }))
}

fn require_connected(state: &AppState) -> ApiResult<()> {
    if state.bridge.is_connected() {
        Ok(())
    } else {
        Err(GatewayError::NotConnected)
    }
}

/// Tool name answering queries for a collection.
pub fn query_tool_name(collection: &str) -> String {
    format!("{collection}_find")
}

/// Query adapter: `collection=<c>` selects `<c>_find`; the remaining
/// parameters become string arguments (first occurrence wins).
async fn query(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    require_connected(&state)?;

    let mut collection = None;
    let mut args = Map::new();
    for (key, value) in params {
        if key == "collection" {
            if collection.is_none() {
                collection = Some(value);
            }
        } else if !args.contains_key(&key) {
            let _ = args.insert(key, Value::String(value));
        }
    }
    let collection = collection
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GatewayError::bad_request("collection parameter required"))?;

    let tool = query_tool_name(&collection);
    tracing::debug!(%tool, args = args.len(), "query");
    let result = state.bridge.execute_tool(&tool, Some(Value::Object(args))).await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SyncRequest {
    plugin: String,
    all: bool,
}

async fn sync(State(state): State<AppState>, body: String) -> ApiResult<Json<Value>> {
    require_connected(&state)?;
    let req: SyncRequest =
        serde_json::from_str(&body).map_err(|_| GatewayError::bad_request("invalid JSON"))?;

    if req.all {
        state.bridge.sync_all().await?;
    } else if !req.plugin.is_empty() {
        state.bridge.sync(&req.plugin).await?;
    } else {
        return Err(GatewayError::bad_request("plugin or all required"));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CaptureRequest {
    text: String,
}

/// Capture text from a JSON `{text, source?, tags?}` body, or treat a
/// non-JSON body as the text itself.
pub fn capture_text(body: &str) -> String {
    match serde_json::from_str::<CaptureRequest>(body) {
        Ok(req) => req.text,
        Err(_) => body.to_owned(),
    }
}

async fn capture(State(state): State<AppState>, body: String) -> ApiResult<Json<Value>> {
    require_connected(&state)?;
    let text = capture_text(&body);
    if text.is_empty() {
        return Err(GatewayError::bad_request("text required"));
    }
    let result = state
        .bridge
        .execute_tool(CAPTURE_TOOL, Some(json!({ "content": text })))
        .await?;
    Ok(Json(result))
}

/// Tools in MCP listing shape.
pub fn mcp_tool_list(tools: &[thymer_core::Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": t.parameters,
            })
        })
        .collect()
}

async fn mcp_tools(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(mcp_tool_list(&state.bridge.tools()))
}

#[derive(Debug, Deserialize)]
struct CallRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

async fn mcp_call(State(state): State<AppState>, body: String) -> ApiResult<Json<Value>> {
    require_connected(&state)?;
    let req: CallRequest =
        serde_json::from_str(&body).map_err(|_| GatewayError::bad_request("invalid JSON"))?;
    if req.name.is_empty() {
        return Err(GatewayError::bad_request("name required"));
    }
    let result = state.bridge.execute_tool(&req.name, req.args).await?;
    Ok(Json(result))
}
