use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thymer_core::BridgeError;

/// Failure of a local HTTP gateway request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The peer has not announced its capabilities.
    #[error("SyncHub not connected")]
    NotConnected,
    #[error("{0}")]
    BadRequest(String),
    /// The round trip through the bridge failed.
    #[error("{0}")]
    Upstream(#[from] BridgeError),
}

impl GatewayError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotConnected | Self::Upstream(BridgeError::NotConnected) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(BridgeError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "gateway request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        assert_eq!(GatewayError::NotConnected.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(GatewayError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::from(BridgeError::Timeout(Duration::from_secs(30))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::from(BridgeError::Remote("boom".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::from(BridgeError::Disconnected).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::from(BridgeError::NotConnected).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn remote_message_is_verbatim() {
        let err = GatewayError::from(BridgeError::Remote("collection missing".into()));
        assert_eq!(err.to_string(), "collection missing");
    }
}
