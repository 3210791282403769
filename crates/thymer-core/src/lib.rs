pub mod capability;
pub mod errors;
pub mod ids;
pub mod normalize;
pub mod protocol;

pub use capability::{CapabilitySnapshot, Plugin, Tool};
pub use errors::BridgeError;
pub use ids::{CallId, ConnectionId};
pub use normalize::{normalize_plugins, normalize_tools, ToolDescriptor};
pub use protocol::{ControlMessage, InboundFrame, Push, Request};
