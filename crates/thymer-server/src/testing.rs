//! Helpers shared by the in-crate router tests.

use axum::response::Response;
use serde_json::{json, Value};
use thymer_bridge::{Bridge, BridgeConfig, Connection, Outbound};
use thymer_core::ConnectionId;
use thymer_settings::DesktopSettings;
use tokio::sync::mpsc;

use crate::state::AppState;

pub(crate) fn test_state() -> AppState {
    AppState::new(Bridge::new(BridgeConfig::default()), DesktopSettings::default())
}

/// A peer answering every correlated request with `respond(frame)`, which
/// returns the reply body without its `id`.
pub(crate) struct FakePeer {
    /// Every correlated request the peer received, in order.
    pub requests: mpsc::UnboundedReceiver<Value>,
}

/// Install a connection that has announced one tool, `echo_find`.
pub(crate) fn connect_peer<F>(bridge: &Bridge, respond: F) -> FakePeer
where
    F: Fn(&Value) -> Value + Send + 'static,
{
    let Connection {
        id, mut outbound, ..
    } = bridge.accept();
    let tools = json!({
        "type": "tools",
        "tools": [{
            "type": "function",
            "function": {
                "name": "echo_find",
                "description": "Find echoes",
                "parameters": {"type": "object", "properties": {}}
            }
        }]
    });
    bridge.dispatch_frame(&id, &tools.to_string());

    let (tx, rx) = mpsc::unbounded_channel();
    let b = bridge.clone();
    let peer_id: ConnectionId = id;
    tokio::spawn(async move {
        while let Some(Outbound::Text(text)) = outbound.recv().await {
            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let Some(call_id) = frame.get("id").and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };
            let mut reply = respond(&frame);
            reply["id"] = Value::String(call_id);
            let _ = tx.send(frame);
            b.dispatch_frame(&peer_id, &reply.to_string());
        }
    });

    FakePeer { requests: rx }
}

pub(crate) async fn read_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
