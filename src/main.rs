//! # thymer-desktop
//!
//! Desktop bridge binary: loads settings, starts the peer WebSocket
//! endpoint, the local HTTP API and the MCP server, then waits for Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use thymer_bridge::{Bridge, BridgeConfig};
use thymer_settings::DesktopSettings;
use thymer_telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use tracing::Level;

/// Thymer desktop bridge.
#[derive(Parser, Debug)]
#[command(name = "thymer-desktop", about = "Thymer desktop bridge")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// HTTP API port (0 for auto-assign).
    #[arg(long)]
    http: Option<u16>,

    /// Peer WebSocket port (0 for auto-assign).
    #[arg(long)]
    ws: Option<u16>,

    /// MCP port (0 disables the MCP server).
    #[arg(long)]
    mcp: Option<u16>,

    /// Settings file (defaults to the per-user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Human-readable debug logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn telemetry(&self) -> TelemetryConfig {
        if self.debug {
            TelemetryConfig {
                log_level: Level::DEBUG,
                format: LogFormat::Compact,
                ..TelemetryConfig::default()
            }
        } else {
            TelemetryConfig::default()
        }
    }

    fn load_settings(&self) -> Result<DesktopSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(thymer_settings::settings_path);
        let mut settings = thymer_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.http {
            settings.server.http_port = port;
        }
        if let Some(port) = self.ws {
            settings.server.ws_port = port;
        }
        if let Some(port) = self.mcp {
            settings.server.mcp_port = port;
        }
        Ok(settings)
    }
}

fn bridge_config(settings: &DesktopSettings) -> BridgeConfig {
    BridgeConfig {
        call_timeout: settings.server.call_timeout(),
        max_send_queue: settings.server.max_send_queue,
        ..BridgeConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = init_telemetry(cli.telemetry());

    let settings = cli.load_settings()?;
    tracing::info!(
        workspace = %settings.workspace,
        thymer_url = %settings.thymer_url(),
        "settings loaded"
    );

    let bridge = Bridge::with_metrics(bridge_config(&settings), telemetry.metrics());
    let handle = thymer_server::start(settings, bridge)
        .await
        .context("Failed to start servers")?;

    tracing::info!(
        ws_addr = %handle.ws_addr,
        http_addr = %handle.http_addr,
        "thymer-desktop ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
