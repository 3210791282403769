//! Metric names recorded by the bridge.

pub const CALLS_TOTAL: &str = "bridge_calls_total";
pub const CALL_TIMEOUTS_TOTAL: &str = "bridge_call_timeouts_total";
pub const CALL_REMOTE_ERRORS_TOTAL: &str = "bridge_call_remote_errors_total";
pub const CALL_DISCONNECTS_TOTAL: &str = "bridge_call_disconnects_total";
pub const CALL_DURATION_MS: &str = "bridge_call_duration_ms";
pub const CONNECTIONS_TOTAL: &str = "bridge_connections_total";
pub const DISCONNECTS_TOTAL: &str = "bridge_disconnects_total";
pub const MALFORMED_FRAMES_TOTAL: &str = "bridge_malformed_frames_total";
/// 1 while the peer has announced its tools, else 0.
pub const CONNECTED: &str = "bridge_connected";
/// Supersede close frames that could not be queued on a full outbound queue.
pub const CLOSE_FRAMES_DROPPED_TOTAL: &str = "bridge_close_frames_dropped_total";
