use std::sync::Arc;

use thymer_bridge::Bridge;
use thymer_settings::DesktopSettings;
use tokio_util::sync::CancellationToken;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Bridge,
    pub settings: Arc<DesktopSettings>,
    /// Cancelled on server shutdown; ends open peer connections.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(bridge: Bridge, settings: DesktopSettings) -> Self {
        Self {
            bridge,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }
}
