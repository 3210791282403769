use std::time::Duration;

/// Failure taxonomy for everything that goes through the bridge.
///
/// Callers decide about retries; nothing inside the bridge retries on its own.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// No peer connection is installed (or it has not announced capabilities yet).
    #[error("not connected")]
    NotConnected,
    /// No reply arrived within the deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The peer answered with an explicit error payload.
    #[error("{0}")]
    Remote(String),
    /// The owning connection went away while the call was pending.
    #[error("disconnected")]
    Disconnected,
    /// An inbound frame could not be understood.
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl BridgeError {
    /// Only timeouts are worth retrying: the peer may simply have been slow.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Timeout(_) => "timeout",
            Self::Remote(_) => "remote_error",
            Self::Disconnected => "disconnected",
            Self::Malformed(_) => "malformed",
            Self::Serialize(_) => "serialize",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_retryable() {
        assert!(BridgeError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!BridgeError::NotConnected.is_retryable());
        assert!(!BridgeError::Remote("boom".into()).is_retryable());
        assert!(!BridgeError::Disconnected.is_retryable());
        assert!(!BridgeError::Malformed("x".into()).is_retryable());
    }

    #[test]
    fn remote_error_passes_message_verbatim() {
        assert_eq!(BridgeError::Remote("boom".into()).to_string(), "boom");
    }

    #[test]
    fn timeout_and_disconnect_are_distinct() {
        let timeout = BridgeError::Timeout(Duration::from_secs(30));
        assert_ne!(timeout, BridgeError::Disconnected);
        assert_eq!(timeout.error_kind(), "timeout");
        assert_eq!(BridgeError::Disconnected.error_kind(), "disconnected");
        assert!(timeout.to_string().contains("30"));
    }
}
