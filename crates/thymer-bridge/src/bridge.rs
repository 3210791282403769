use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use thymer_core::normalize::{normalize_plugins, normalize_tools};
use thymer_core::protocol::{ControlMessage, InboundFrame, Push, Request};
use thymer_core::{BridgeError, CapabilitySnapshot, ConnectionId, Plugin, Tool};
use thymer_telemetry::MetricsRecorder;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::correlator::{Correlator, PendingCall};
use crate::events::BridgeEvent;
use crate::metrics;
use crate::registry::CapabilityRegistry;

/// Close code sent to a connection replaced by a newer one (policy violation).
pub const SUPERSEDED_CLOSE_CODE: u16 = 1008;
pub const SUPERSEDED_CLOSE_REASON: &str = "Replaced by new client";

/// A frame the transport must write to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Write a close frame, then drop the socket.
    Close { code: u16, reason: String },
}

/// Transport-side half of an accepted connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Frames to write, in order. Closed once the connection is released.
    pub outbound: mpsc::Receiver<Outbound>,
    /// Cancelled when a newer connection supersedes this one.
    pub cancel: CancellationToken,
}

struct Installed {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

struct Inner {
    config: BridgeConfig,
    installed: Mutex<Option<Installed>>,
    registry: CapabilityRegistry,
    correlator: Correlator,
    events: broadcast::Sender<BridgeEvent>,
    /// Set once `Connected` has been raised and no `Disconnected` has
    /// followed yet. Survives supersede, unlike the registry flag.
    announced: AtomicBool,
    metrics: Arc<MetricsRecorder>,
}

/// A request registered against one installed connection, ready to send.
struct Prepared<'a> {
    pending: PendingCall<'a>,
    tx: mpsc::Sender<Outbound>,
    frame: String,
}

/// Handle to the bridge. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_metrics(config, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(config: BridgeConfig, metrics: Arc<MetricsRecorder>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                installed: Mutex::new(None),
                registry: CapabilityRegistry::new(),
                correlator: Correlator::new(),
                events,
                announced: AtomicBool::new(false),
                metrics,
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.inner.metrics
    }

    /// Install a new connection, superseding any previous one.
    ///
    /// The previous connection is sent a close frame, its read loop is
    /// cancelled, the registry is cleared and its pending calls fail with
    /// [`BridgeError::Disconnected`]. No disconnect event is raised for it.
    /// `get_tools` and `get_plugins` are queued on the new connection.
    pub fn accept(&self) -> Connection {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.inner.config.max_send_queue.max(4));
        let cancel = CancellationToken::new();

        {
            let mut slot = self.inner.installed.lock();
            let previous = slot.replace(Installed {
                id: id.clone(),
                tx: tx.clone(),
                cancel: cancel.clone(),
            });
            if let Some(prev) = previous {
                info!(
                    connection_id = %prev.id,
                    replaced_by = %id,
                    "closing previous connection (replaced by new client)"
                );
                if let Err(e) = prev.tx.try_send(Outbound::Close {
                    code: SUPERSEDED_CLOSE_CODE,
                    reason: SUPERSEDED_CLOSE_REASON.to_owned(),
                }) {
                    self.inner.metrics.counter_inc(metrics::CLOSE_FRAMES_DROPPED_TOTAL, 1);
                    warn!(
                        connection_id = %prev.id,
                        error = %e,
                        "could not queue close frame, dropping socket"
                    );
                }
                prev.cancel.cancel();
                let _ = self.inner.registry.clear();
                self.inner.metrics.gauge_set(metrics::CONNECTED, 0);
                let failed = self.inner.correlator.fail_all(&BridgeError::Disconnected);
                self.inner
                    .metrics
                    .counter_inc(metrics::CALL_DISCONNECTS_TOTAL, failed as u64);
            }
        }

        self.inner.metrics.counter_inc(metrics::CONNECTIONS_TOTAL, 1);
        info!(connection_id = %id, "peer connected");

        for msg in [ControlMessage::GetTools, ControlMessage::GetPlugins] {
            match msg.encode() {
                Ok(text) => {
                    if tx.try_send(Outbound::Text(text)).is_err() {
                        warn!(connection_id = %id, ?msg, "failed to queue capability request");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode capability request"),
            }
        }

        Connection {
            id,
            outbound: rx,
            cancel,
        }
    }

    /// Read loop for an accepted connection.
    ///
    /// Dispatches every inbound text frame until the stream ends or the
    /// connection is superseded, then tears down state if this connection is
    /// still the installed one.
    pub async fn serve<S>(&self, id: &ConnectionId, cancel: &CancellationToken, frames: S)
    where
        S: Stream<Item = String>,
    {
        let mut frames = std::pin::pin!(frames);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(connection_id = %id, "read loop cancelled");
                    break;
                }
                frame = frames.next() => match frame {
                    Some(text) => self.dispatch_frame(id, &text),
                    None => break,
                },
            }
        }
        self.release(id);
    }

    /// Route one inbound frame: replies go to the correlator, everything else
    /// is a push. Frames from a connection that is no longer installed are
    /// ignored.
    pub fn dispatch_frame(&self, from: &ConnectionId, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.inner.metrics.counter_inc(metrics::MALFORMED_FRAMES_TOTAL, 1);
                warn!(connection_id = %from, error = %e, "dropping inbound frame");
                return;
            }
        };

        if !self.is_installed(from) {
            debug!(connection_id = %from, "ignoring frame from superseded connection");
            return;
        }

        if let Some(call_id) = frame.id().filter(|id| self.inner.correlator.is_pending(id)) {
            let call_id = call_id.to_owned();
            let outcome = frame.into_outcome().map_err(BridgeError::Remote);
            let _ = self.inner.correlator.complete(&call_id, outcome);
            return;
        }

        self.apply_push(from, frame.into_push());
    }

    fn apply_push(&self, from: &ConnectionId, push: Push) {
        match push {
            Push::Tools(entries) => {
                let tools = normalize_tools(&entries);
                let tool_count = tools.len();
                let became_connected = {
                    let slot = self.inner.installed.lock();
                    if !slot.as_ref().is_some_and(|c| &c.id == from) {
                        return;
                    }
                    let flipped = self.inner.registry.replace_tools(tools);
                    if flipped {
                        self.inner.announced.store(true, Ordering::SeqCst);
                    }
                    flipped
                };
                info!(connection_id = %from, count = tool_count, "received tools");
                if became_connected {
                    self.inner.metrics.gauge_set(metrics::CONNECTED, 1);
                    let _ = self.inner.events.send(BridgeEvent::Connected {
                        connection_id: from.clone(),
                        tool_count,
                    });
                }
            }
            Push::Plugins(entries) => {
                let plugins = normalize_plugins(&entries);
                let count = plugins.len();
                {
                    let slot = self.inner.installed.lock();
                    if !slot.as_ref().is_some_and(|c| &c.id == from) {
                        return;
                    }
                    self.inner.registry.replace_plugins(plugins);
                }
                info!(connection_id = %from, count, "received plugins");
            }
            Push::Register { version } => {
                info!(connection_id = %from, %version, "peer registered");
            }
            Push::SyncComplete { plugin } => {
                info!(connection_id = %from, %plugin, "sync complete");
            }
            Push::Ignored(kind) => {
                debug!(connection_id = %from, ?kind, "ignoring push");
            }
        }
    }

    /// Tear down after a read loop exits. A no-op for superseded connections.
    fn release(&self, id: &ConnectionId) {
        let (announced, failed) = {
            let mut slot = self.inner.installed.lock();
            if !slot.as_ref().is_some_and(|c| &c.id == id) {
                debug!(connection_id = %id, "superseded connection exited");
                return;
            }
            let _ = slot.take();
            let _ = self.inner.registry.clear();
            let failed = self.inner.correlator.fail_all(&BridgeError::Disconnected);
            // A superseded connection may have raised `Connected`; the
            // disconnect belongs to whichever connection exits last.
            let announced = self.inner.announced.swap(false, Ordering::SeqCst);
            (announced, failed)
        };

        self.inner
            .metrics
            .counter_inc(metrics::CALL_DISCONNECTS_TOTAL, failed as u64);
        info!(connection_id = %id, failed_calls = failed, "peer disconnected");

        if announced {
            self.inner.metrics.gauge_set(metrics::CONNECTED, 0);
            self.inner.metrics.counter_inc(metrics::DISCONNECTS_TOTAL, 1);
            let _ = self.inner.events.send(BridgeEvent::Disconnected {
                connection_id: id.clone(),
            });
        }
    }

    fn is_installed(&self, id: &ConnectionId) -> bool {
        self.inner
            .installed
            .lock()
            .as_ref()
            .is_some_and(|c| &c.id == id)
    }

    /// Queue a frame on the installed connection.
    pub async fn send(&self, msg: Outbound) -> Result<(), BridgeError> {
        let tx = self
            .inner
            .installed
            .lock()
            .as_ref()
            .map(|c| c.tx.clone())
            .ok_or(BridgeError::NotConnected)?;
        tx.send(msg).await.map_err(|_| BridgeError::NotConnected)
    }

    /// Send a correlated request and wait for its outcome.
    ///
    /// Exactly one of result, [`BridgeError::Remote`], [`BridgeError::Timeout`]
    /// or [`BridgeError::Disconnected`] is returned.
    pub async fn call(&self, request: Request, timeout: Duration) -> Result<Value, BridgeError> {
        let prepared = self.prepare(&request)?;
        self.transmit(prepared, request.kind(), timeout).await
    }

    /// Register a call against the installed connection and capture that
    /// connection's sender in the same critical section as `accept`, so the
    /// request can only reach the connection whose pending set holds it.
    fn prepare(&self, request: &Request) -> Result<Prepared<'_>, BridgeError> {
        let (tx, pending) = {
            let slot = self.inner.installed.lock();
            let tx = slot
                .as_ref()
                .map(|c| c.tx.clone())
                .ok_or(BridgeError::NotConnected)?;
            (tx, self.inner.correlator.register())
        };
        let frame = request.encode(pending.id())?;
        Ok(Prepared { pending, tx, frame })
    }

    async fn transmit(
        &self,
        prepared: Prepared<'_>,
        kind: &str,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        let Prepared { pending, tx, frame } = prepared;
        let call_id = pending.id().clone();

        // Failed by a supersede before it left: never write it anywhere.
        if self.inner.correlator.is_pending(call_id.as_str()) {
            tx.send(Outbound::Text(frame))
                .await
                .map_err(|_| BridgeError::NotConnected)?;
        } else {
            debug!(call_id = %call_id, "connection replaced before send");
        }

        let m = &self.inner.metrics;
        m.counter_inc(metrics::CALLS_TOTAL, 1);
        debug!(call_id = %call_id, kind, "call sent");

        let started = Instant::now();
        let outcome = pending.wait(timeout).await;
        m.histogram_observe(
            metrics::CALL_DURATION_MS,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        if let Err(e) = &outcome {
            match e {
                BridgeError::Timeout(_) => m.counter_inc(metrics::CALL_TIMEOUTS_TOTAL, 1),
                BridgeError::Remote(_) => m.counter_inc(metrics::CALL_REMOTE_ERRORS_TOTAL, 1),
                _ => {}
            }
            debug!(call_id = %call_id, error_kind = e.error_kind(), "call failed");
        }
        outcome
    }

    /// `tool_call` with the configured deadline.
    pub async fn execute_tool(&self, name: &str, args: Option<Value>) -> Result<Value, BridgeError> {
        self.call(Request::tool_call(name, args), self.inner.config.call_timeout)
            .await
    }

    pub async fn sync(&self, plugin: &str) -> Result<(), BridgeError> {
        self.call(Request::sync(plugin), self.inner.config.call_timeout)
            .await
            .map(|_| ())
    }

    pub async fn sync_all(&self) -> Result<(), BridgeError> {
        self.call(Request::sync_all(), self.inner.config.call_timeout)
            .await
            .map(|_| ())
    }

    /// Whether the peer has announced its tools, not mere socket presence.
    pub fn is_connected(&self) -> bool {
        self.inner.registry.is_connected()
    }

    /// Whether a transport connection is installed, announced or not.
    pub fn has_connection(&self) -> bool {
        self.inner.installed.lock().is_some()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.installed.lock().as_ref().map(|c| c.id.clone())
    }

    pub fn snapshot(&self) -> CapabilitySnapshot {
        self.inner.registry.snapshot()
    }

    pub fn tools(&self) -> Arc<Vec<Tool>> {
        self.snapshot().tools
    }

    pub fn plugins(&self) -> Arc<Vec<Plugin>> {
        self.snapshot().plugins
    }

    pub fn tool_count(&self) -> usize {
        self.snapshot().tool_count()
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
