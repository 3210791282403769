//! Wire shapes exchanged with the peer over the control channel.
//!
//! Every frame is a JSON object. Requests carry `{id, type, ...params}`;
//! replies echo the `id` with either `result` or `error`; pushes carry a
//! `type` and no pending `id`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::BridgeError;
use crate::ids::CallId;

pub const TOOL_CALL: &str = "tool_call";
pub const SYNC: &str = "sync";
pub const SYNC_ALL: &str = "sync_all";

/// Fire-and-forget control messages sent on every new connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    GetTools,
    GetPlugins,
}

impl ControlMessage {
    pub fn encode(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A correlated request: `type` plus free-form params, sent with a call id.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    kind: String,
    params: Map<String, Value>,
}

impl Request {
    pub fn new(kind: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// `tool_call` with `{name, args}`. Missing args are sent as an empty object.
    pub fn tool_call(name: impl Into<String>, args: Option<Value>) -> Self {
        let mut params = Map::new();
        let _ = params.insert("name".into(), Value::String(name.into()));
        let args = match args {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(v) => v,
        };
        let _ = params.insert("args".into(), args);
        Self::new(TOOL_CALL, params)
    }

    pub fn sync(plugin: impl Into<String>) -> Self {
        let mut params = Map::new();
        let _ = params.insert("plugin".into(), Value::String(plugin.into()));
        Self::new(SYNC, params)
    }

    pub fn sync_all() -> Self {
        Self::new(SYNC_ALL, Map::new())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Serialize as `{id, type, ...params}`. `id` and `type` win over params
    /// of the same name.
    pub fn encode(&self, id: &CallId) -> Result<String, BridgeError> {
        let mut frame = self.params.clone();
        let _ = frame.insert("id".into(), Value::String(id.as_str().to_owned()));
        let _ = frame.insert("type".into(), Value::String(self.kind.clone()));
        Ok(serde_json::to_string(&frame)?)
    }
}

/// A decoded inbound frame, not yet routed.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    body: Map<String, Value>,
}

impl InboundFrame {
    /// Decode a text frame. Anything but a JSON object is malformed.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(body)) => Ok(Self { body }),
            Ok(other) => Err(BridgeError::Malformed(format!(
                "expected JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(BridgeError::Malformed(e.to_string())),
        }
    }

    /// The correlation id, if the frame carries a string `id`.
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    /// Interpret the frame as a reply. A non-null `error` rejects (strings are
    /// passed through verbatim); otherwise `result` resolves, defaulting to null.
    pub fn into_outcome(mut self) -> Result<Value, String> {
        match self.body.remove("error") {
            Some(Value::String(msg)) => return Err(msg),
            Some(Value::Null) | None => {}
            Some(other) => return Err(other.to_string()),
        }
        Ok(self.body.remove("result").unwrap_or(Value::Null))
    }

    /// Interpret the frame as a push message.
    pub fn into_push(mut self) -> Push {
        let kind = self.kind().map(str::to_owned);
        match kind.as_deref() {
            Some("tools") => match self.body.remove("tools") {
                Some(Value::Array(entries)) => Push::Tools(entries),
                _ => Push::Ignored(Some("tools".into())),
            },
            Some("plugins") => match self.body.remove("plugins") {
                Some(Value::Array(entries)) => Push::Plugins(entries),
                _ => Push::Ignored(Some("plugins".into())),
            },
            Some("register") => Push::Register {
                version: string_field(&self.body, "version"),
            },
            Some("sync_complete") => Push::SyncComplete {
                plugin: string_field(&self.body, "plugin"),
            },
            other => Push::Ignored(other.map(str::to_owned)),
        }
    }
}

/// Unsolicited messages from the peer.
#[derive(Clone, Debug, PartialEq)]
pub enum Push {
    /// Raw tool entries, in either the nested-function or the flat shape.
    Tools(Vec<Value>),
    Plugins(Vec<Value>),
    Register { version: String },
    SyncComplete { plugin: String },
    /// Unknown type, or a known type without a usable payload.
    Ignored(Option<String>),
}

pub(crate) fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
