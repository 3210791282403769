//! WebSocket transport for the peer connection.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{future, SinkExt, StreamExt};
use thymer_bridge::{Connection, Outbound};
use thymer_core::ConnectionId;
use tokio::sync::mpsc;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// How long a finished read loop waits for the writer to flush.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Any path upgrades; the peer is a trusted local client.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one peer socket: a writer task drains the bridge's outbound queue
/// and pings, while this task feeds inbound text to the bridge read loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let Connection {
        id,
        outbound,
        cancel,
    } = state.bridge.accept();
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(id.clone(), ws_tx, outbound));

    let reader_id = id.clone();
    let frames = ws_rx
        .take_while(move |msg| {
            let open = match msg {
                Ok(Message::Close(frame)) => {
                    tracing::debug!(connection_id = %reader_id, ?frame, "peer sent close");
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(connection_id = %reader_id, error = %e, "read error");
                    false
                }
            };
            future::ready(open)
        })
        .filter_map(|msg| future::ready(text_payload(msg)))
        .take_until(state.shutdown.clone().cancelled_owned());

    state.bridge.serve(&id, &cancel, frames).await;

    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Text content of a data frame. Binary frames count if they are UTF-8.
fn text_payload(msg: Result<Message, axum::Error>) -> Option<String> {
    match msg {
        Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
        Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

async fn write_loop(
    id: ConnectionId,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    ping_interval.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(Outbound::Text(text)) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame { code, reason: reason.into() };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    tracing::debug!(connection_id = %id, code, "sent close frame");
                    break;
                }
                None => break,
            },
            _ = ping_interval.tick() => {
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                tracing::trace!(connection_id = %id, "sent ping");
            }
        }
    }

    let _ = ws_tx.close().await;
}
