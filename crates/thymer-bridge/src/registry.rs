use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thymer_core::{CapabilitySnapshot, Plugin, Tool};

#[derive(Default)]
struct State {
    tools: Arc<Vec<Tool>>,
    plugins: Arc<Vec<Plugin>>,
    connected: bool,
    connected_at: Option<DateTime<Utc>>,
}

/// Latest announced tools and plugins plus the connected flag.
///
/// Sets are swapped wholesale; readers always get both halves from the same
/// instant. Plugins announced before the first tools push are kept but stay
/// hidden until the registry is connected.
#[derive(Default)]
pub struct CapabilityRegistry {
    state: RwLock<State>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CapabilitySnapshot {
        let state = self.state.read();
        if !state.connected {
            return CapabilitySnapshot::disconnected();
        }
        CapabilitySnapshot {
            tools: Arc::clone(&state.tools),
            plugins: Arc::clone(&state.plugins),
            connected: true,
            connected_at: state.connected_at,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    /// Replace the tool set. Returns `true` when this push is the one that
    /// flipped the registry to connected.
    pub fn replace_tools(&self, tools: Vec<Tool>) -> bool {
        let mut state = self.state.write();
        state.tools = Arc::new(tools);
        if state.connected {
            return false;
        }
        state.connected = true;
        state.connected_at = Some(Utc::now());
        true
    }

    pub fn replace_plugins(&self, plugins: Vec<Plugin>) {
        self.state.write().plugins = Arc::new(plugins);
    }

    /// Reset to empty and disconnected. Returns the previous connected flag.
    pub fn clear(&self) -> bool {
        let mut state = self.state.write();
        let was_connected = state.connected;
        *state = State::default();
        was_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> Tool {
        Tool::new(name, "", None)
    }

    fn plugin(name: &str) -> Plugin {
        Plugin {
            name: name.into(),
            enabled: true,
        }
    }

    #[test]
    fn starts_disconnected_and_empty() {
        let registry = CapabilityRegistry::new();
        let snap = registry.snapshot();
        assert!(!registry.is_connected());
        assert!(!snap.connected);
        assert!(snap.tools.is_empty());
    }

    #[test]
    fn first_tools_push_connects_once() {
        let registry = CapabilityRegistry::new();
        assert!(registry.replace_tools(vec![tool("a")]));
        assert!(!registry.replace_tools(vec![tool("a"), tool("b")]));
        let snap = registry.snapshot();
        assert!(snap.connected);
        assert!(snap.connected_at.is_some());
        assert_eq!(snap.tool_count(), 2);
    }

    #[test]
    fn empty_tools_push_still_connects() {
        let registry = CapabilityRegistry::new();
        assert!(registry.replace_tools(Vec::new()));
        assert!(registry.is_connected());
    }

    #[test]
    fn plugins_hidden_until_connected() {
        let registry = CapabilityRegistry::new();
        registry.replace_plugins(vec![plugin("github")]);
        assert!(!registry.is_connected());
        assert!(registry.snapshot().plugins.is_empty());

        let _ = registry.replace_tools(vec![tool("a")]);
        assert_eq!(registry.snapshot().plugins.len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let registry = CapabilityRegistry::new();
        let _ = registry.replace_tools(vec![tool("a")]);
        registry.replace_plugins(vec![plugin("github")]);

        assert!(registry.clear());
        assert!(!registry.clear());

        let snap = registry.snapshot();
        assert!(!snap.connected);
        assert!(snap.tools.is_empty());
        assert!(snap.plugins.is_empty());

        // Reconnect flips again.
        assert!(registry.replace_tools(vec![tool("b")]));
    }

    #[test]
    fn snapshot_survives_later_replace() {
        let registry = CapabilityRegistry::new();
        let _ = registry.replace_tools(vec![tool("a")]);
        let before = registry.snapshot();
        let _ = registry.replace_tools(vec![tool("b"), tool("c")]);
        assert_eq!(before.tools.len(), 1);
        assert_eq!(before.tools[0].name, "a");
        assert_eq!(registry.snapshot().tools.len(), 2);
    }
}
