//! Desktop bridge settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object, stored as `config.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesktopSettings {
    /// Workspace slug (`acme`) or full domain (`notes.acme.com`).
    pub workspace: String,
    /// Explicit web app URL. Wins over the workspace-derived one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thymer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub server: ServerSettings,
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            workspace: String::new(),
            thymer_url: None,
            token: None,
            server: ServerSettings::default(),
        }
    }
}

impl DesktopSettings {
    /// URL of the web app the peer runs in.
    pub fn thymer_url(&self) -> String {
        if let Some(url) = self.thymer_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_owned();
        }
        if self.workspace.is_empty() {
            return "https://app.thymer.com".to_owned();
        }
        if !self.workspace.contains('.') {
            return format!("https://{}.thymer.com", self.workspace);
        }
        format!("https://{}", self.workspace)
    }
}

/// Listener and bridge tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address for all listeners.
    pub host: String,
    /// Local HTTP API port.
    pub http_port: u16,
    /// Port the peer's WebSocket connects to.
    pub ws_port: u16,
    /// MCP endpoint port. `0` disables the MCP server.
    pub mcp_port: u16,
    /// Deadline for a single correlated call.
    pub call_timeout_secs: u64,
    /// Outbound frames buffered per connection before sends fail.
    pub max_send_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 9847,
            ws_port: 9848,
            mcp_port: 9850,
            call_timeout_secs: 30,
            max_send_queue: 256,
        }
    }
}

impl ServerSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn mcp_enabled(&self) -> bool {
        self.mcp_port != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = DesktopSettings::default();
        assert_eq!(s.server.http_port, 9847);
        assert_eq!(s.server.ws_port, 9848);
        assert_eq!(s.server.mcp_port, 9850);
        assert_eq!(s.server.call_timeout(), Duration::from_secs(30));
        assert!(s.server.mcp_enabled());
    }

    #[test]
    fn url_from_stored_value() {
        let s = DesktopSettings {
            workspace: "acme".into(),
            thymer_url: Some("https://custom.example".into()),
            ..Default::default()
        };
        assert_eq!(s.thymer_url(), "https://custom.example");
    }

    #[test]
    fn url_from_workspace() {
        let mut s = DesktopSettings::default();
        assert_eq!(s.thymer_url(), "https://app.thymer.com");

        s.workspace = "acme".into();
        assert_eq!(s.thymer_url(), "https://acme.thymer.com");

        s.workspace = "notes.acme.com".into();
        assert_eq!(s.thymer_url(), "https://notes.acme.com");
    }

    #[test]
    fn empty_stored_url_is_ignored() {
        let s = DesktopSettings {
            workspace: "acme".into(),
            thymer_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(s.thymer_url(), "https://acme.thymer.com");
    }

    #[test]
    fn serde_uses_camel_case_and_skips_absent() {
        let json = serde_json::to_value(DesktopSettings::default()).unwrap();
        assert_eq!(json["server"]["httpPort"], 9847);
        assert!(json.get("thymerUrl").is_none());
        assert!(json.get("token").is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let s: DesktopSettings =
            serde_json::from_str(r#"{"workspace":"acme","thymerUrl":"https://x"}"#).unwrap();
        assert_eq!(s.workspace, "acme");
        assert_eq!(s.thymer_url.as_deref(), Some("https://x"));
        assert_eq!(s.server, ServerSettings::default());
    }
}
