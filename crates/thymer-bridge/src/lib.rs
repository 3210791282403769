//! # thymer-bridge
//!
//! Owns the single peer connection, correlates replies with outstanding
//! calls, and tracks the capabilities the peer announces.
//!
//! The bridge is transport-agnostic: a transport calls [`Bridge::accept`],
//! drains [`Connection::outbound`] into its socket, and feeds inbound text
//! frames to [`Bridge::serve`].

pub mod bridge;
pub mod config;
pub mod correlator;
pub mod events;
pub mod metrics;
pub mod registry;

pub use bridge::{Bridge, Connection, Outbound, SUPERSEDED_CLOSE_CODE, SUPERSEDED_CLOSE_REASON};
pub use config::BridgeConfig;
pub use correlator::{CallOutcome, Correlator, PendingCall};
pub use events::BridgeEvent;
pub use registry::CapabilityRegistry;
