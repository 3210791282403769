use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remotely-announced tool in canonical shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted arguments. Never absent: sources that omit
    /// it get [`Tool::empty_schema`].
    pub parameters: serde_json::Value,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters.unwrap_or_else(Self::empty_schema),
        }
    }

    /// Schema accepting an object with no declared properties.
    pub fn empty_schema() -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
}

/// A sync plugin on the peer side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    pub enabled: bool,
}

/// Consistent view of the capability registry at one instant.
///
/// `connected == false` always comes with empty `tools` and `plugins`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CapabilitySnapshot {
    pub tools: Arc<Vec<Tool>>,
    pub plugins: Arc<Vec<Plugin>>,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl CapabilitySnapshot {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}
