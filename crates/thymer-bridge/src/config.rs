use std::time::Duration;

/// Bridge tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Deadline for a correlated call when the caller does not pass one.
    pub call_timeout: Duration,
    /// Outbound frames buffered per connection.
    pub max_send_queue: usize,
    /// Lifecycle events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_send_queue: 256,
            event_capacity: 64,
        }
    }
}
