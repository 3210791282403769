use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use thymer_bridge::Bridge;
use thymer_settings::DesktopSettings;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;
use crate::{api, lifecycle, ws};

/// Default timeout for graceful shutdown before aborting tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Bind the peer WebSocket endpoint and the HTTP API, and spawn the MCP
/// lifecycle supervisor (unless the MCP port is 0).
pub async fn start(settings: DesktopSettings, bridge: Bridge) -> Result<ServerHandle, std::io::Error> {
    let host = settings.server.host.clone();
    let ws_port = settings.server.ws_port;
    let http_port = settings.server.http_port;
    let mcp_port = settings.server.mcp_port;
    let mcp_enabled = settings.server.mcp_enabled();

    let state = AppState::new(bridge, settings);

    let ws_listener = TcpListener::bind((host.as_str(), ws_port)).await?;
    let ws_addr = ws_listener.local_addr()?;
    let http_listener = TcpListener::bind((host.as_str(), http_port)).await?;
    let http_addr = http_listener.local_addr()?;

    let mut tasks = vec![
        serve(ws_listener, ws::router(state.clone()), state.shutdown.clone(), "ws"),
        serve(http_listener, api::router(state.clone()), state.shutdown.clone(), "http"),
    ];

    let mcp_addr = if mcp_enabled {
        let (task, addr_rx) = lifecycle::spawn(state.clone(), host, mcp_port);
        tasks.push(task);
        addr_rx
    } else {
        tracing::info!("MCP server disabled");
        watch::channel(None).1
    };

    tracing::info!(%ws_addr, %http_addr, "thymer bridge started");

    Ok(ServerHandle {
        ws_addr,
        http_addr,
        mcp_addr,
        state,
        tasks,
    })
}

fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    name: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            tracing::warn!(server = name, error = %e, "server error");
        }
    })
}

/// Handle returned by `start()`: addresses plus the background tasks.
pub struct ServerHandle {
    pub ws_addr: SocketAddr,
    pub http_addr: SocketAddr,
    mcp_addr: watch::Receiver<Option<SocketAddr>>,
    state: AppState,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address of the MCP server while it is running.
    pub fn mcp_addr(&self) -> Option<SocketAddr> {
        *self.mcp_addr.borrow()
    }

    /// Watch the MCP address as the server starts and stops.
    pub fn watch_mcp_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.mcp_addr.clone()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.state.bridge
    }

    /// Cancel every server and wait for them to drain.
    pub async fn shutdown(self) {
        self.state.shutdown.cancel();
        tracing::info!(task_count = self.tasks.len(), "waiting for servers to stop");

        let aborts: Vec<_> = self.tasks.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(self.tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}, aborting");
            for handle in aborts {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_settings(mcp_port: u16) -> DesktopSettings {
        let mut settings = DesktopSettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.http_port = 0;
        settings.server.ws_port = 0;
        settings.server.mcp_port = mcp_port;
        settings
    }

    #[tokio::test]
    async fn binds_ephemeral_ports() {
        let handle = start(local_settings(0), Bridge::default()).await.unwrap();
        assert_ne!(handle.ws_addr.port(), 0);
        assert_ne!(handle.http_addr.port(), 0);
        assert_ne!(handle.ws_addr, handle.http_addr);
        assert_eq!(handle.tasks.len(), 2);
        assert_eq!(handle.mcp_addr(), None);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn mcp_supervisor_waits_for_peer() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let handle = start(local_settings(port), Bridge::default()).await.unwrap();
        assert_eq!(handle.tasks.len(), 3);
        tokio::task::yield_now().await;
        assert_eq!(handle.mcp_addr(), None);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn port_in_use_is_an_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut settings = local_settings(0);
        settings.server.http_port = taken.local_addr().unwrap().port();
        assert!(start(settings, Bridge::default()).await.is_err());
    }
}
