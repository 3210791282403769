//! Starts the MCP server when the peer announces its tools and stops it
//! when the peer goes away.

use std::net::SocketAddr;

use thymer_bridge::BridgeEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::mcp;
use crate::state::AppState;

struct Running {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the MCP listener and follows bridge events.
pub struct McpSupervisor {
    state: AppState,
    host: String,
    port: u16,
    running: Option<Running>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
}

impl McpSupervisor {
    pub fn new(
        state: AppState,
        host: String,
        port: u16,
    ) -> (Self, watch::Receiver<Option<SocketAddr>>) {
        let (addr_tx, addr_rx) = watch::channel(None);
        (
            Self {
                state,
                host,
                port,
                running: None,
                addr_tx,
            },
            addr_rx,
        )
    }

    /// Bind and serve unless already running. Bind failures are logged.
    pub async fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let listener = match tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(l) => l,
            Err(e) => {
                warn!(host = %self.host, port = self.port, error = %e, "failed to start MCP server");
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "failed to read MCP listener address");
                return;
            }
        };

        let cancel = self.state.shutdown.child_token();
        let router = mcp::router(self.state.clone());
        let signal = cancel.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
            {
                warn!(error = %e, "MCP server error");
            }
        });

        info!(%addr, "MCP server listening");
        self.running = Some(Running { addr, cancel, task });
        let _ = self.addr_tx.send_replace(Some(addr));
    }

    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        info!(addr = %running.addr, "stopping MCP server");
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "MCP server task failed");
        }
        let _ = self.addr_tx.send_replace(None);
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    async fn reconcile(&mut self) {
        if self.state.bridge.is_connected() {
            self.start().await;
        } else {
            self.stop().await;
        }
    }

    /// Follow bridge events until shutdown.
    pub async fn run(mut self) {
        let mut events = self.state.bridge.subscribe();
        let shutdown = self.state.shutdown.clone();
        self.reconcile().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(BridgeEvent::Connected { tool_count, .. }) => {
                        info!(tool_count, "peer connected, starting MCP server");
                        self.start().await;
                    }
                    Ok(BridgeEvent::Disconnected { .. }) => {
                        info!("peer disconnected, stopping MCP server");
                        self.stop().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle events lagged");
                        self.reconcile().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.stop().await;
    }
}

/// Spawn the supervisor; returns its task and a watch on the MCP address.
pub fn spawn(
    state: AppState,
    host: String,
    port: u16,
) -> (JoinHandle<()>, watch::Receiver<Option<SocketAddr>>) {
    let (supervisor, addr_rx) = McpSupervisor::new(state, host, port);
    (tokio::spawn(supervisor.run()), addr_rx)
}
