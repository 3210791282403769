use thymer_core::ConnectionId;

/// Connection lifecycle notifications, delivered over a broadcast channel
/// after all bridge locks are released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The first tools push landed on this connection.
    Connected {
        connection_id: ConnectionId,
        tool_count: usize,
    },
    /// A connection that had announced tools went away.
    Disconnected { connection_id: ConnectionId },
}

impl BridgeEvent {
    pub fn connection_id(&self) -> &ConnectionId {
        match self {
            Self::Connected { connection_id, .. } | Self::Disconnected { connection_id } => {
                connection_id
            }
        }
    }
}
