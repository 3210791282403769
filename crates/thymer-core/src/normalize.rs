//! Conversion of announced capabilities into their canonical shape.
//!
//! Tool entries arrive either wrapped as
//! `{type: "function", function: {name, description, parameters}}` or flat as
//! `{name, description, parameters}`. Both collapse into [`Tool`].

use serde_json::{Map, Value};

use crate::capability::{Plugin, Tool};
use crate::protocol::string_field;

/// The recognised wire shapes of a single tool entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolDescriptor<'a> {
    /// `{function: {...}}` envelope; the inner object holds the fields.
    Nested(&'a Map<String, Value>),
    /// Fields directly on the entry.
    Flat(&'a Map<String, Value>),
}

impl<'a> ToolDescriptor<'a> {
    /// Classify an entry. Non-objects have no recognised shape.
    pub fn detect(entry: &'a Value) -> Option<Self> {
        let obj = entry.as_object()?;
        match obj.get("function") {
            Some(Value::Object(inner)) => Some(Self::Nested(inner)),
            _ => Some(Self::Flat(obj)),
        }
    }

    fn fields(&self) -> &'a Map<String, Value> {
        match self {
            Self::Nested(m) | Self::Flat(m) => m,
        }
    }

    /// Extract the canonical tool. `None` when the name is missing or empty.
    pub fn into_tool(self) -> Option<Tool> {
        let fields = self.fields();
        let name = string_field(fields, "name");
        if name.is_empty() {
            return None;
        }
        let parameters = match fields.get("parameters") {
            Some(Value::Object(schema)) => Some(Value::Object(schema.clone())),
            _ => None,
        };
        Some(Tool::new(name, string_field(fields, "description"), parameters))
    }
}

/// Normalise a full `tools` push. Unusable entries are dropped, never fatal.
pub fn normalize_tools(entries: &[Value]) -> Vec<Tool> {
    let mut tools = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match ToolDescriptor::detect(entry).and_then(ToolDescriptor::into_tool) {
            Some(tool) => tools.push(tool),
            None => tracing::debug!(index, "dropping tool entry without a name"),
        }
    }
    tools
}

/// Normalise a `plugins` push. Non-object entries are dropped.
pub fn normalize_plugins(entries: &[Value]) -> Vec<Plugin> {
    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| Plugin {
            name: string_field(obj, "name"),
            enabled: obj.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_function_shape() {
        let entries = vec![json!({
            "type": "function",
            "function": {"name": "echo_find", "description": "d", "parameters": {}}
        })];
        let tools = normalize_tools(&entries);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo_find");
        assert_eq!(tools[0].description, "d");
        assert_eq!(tools[0].parameters, json!({}));
    }

    #[test]
    fn flat_shape() {
        let schema = json!({"type": "object", "properties": {"q": {"type": "string"}}});
        let entries = vec![json!({"name": "search", "description": "find things", "parameters": schema})];
        let tools = normalize_tools(&entries);
        assert_eq!(tools, vec![Tool::new("search", "find things", Some(schema))]);
    }

    #[test]
    fn detect_distinguishes_shapes() {
        let nested = json!({"function": {"name": "a"}});
        let flat = json!({"name": "a"});
        assert!(matches!(ToolDescriptor::detect(&nested), Some(ToolDescriptor::Nested(_))));
        assert!(matches!(ToolDescriptor::detect(&flat), Some(ToolDescriptor::Flat(_))));
        assert_eq!(ToolDescriptor::detect(&json!("a")), None);
    }

    #[test]
    fn non_object_function_field_falls_back_to_flat() {
        let entry = json!({"name": "a", "function": "oops"});
        assert!(matches!(ToolDescriptor::detect(&entry), Some(ToolDescriptor::Flat(_))));
        assert_eq!(normalize_tools(&[entry])[0].name, "a");
    }

    #[test]
    fn entries_without_name_are_dropped() {
        let entries = vec![
            json!({"description": "no name"}),
            json!({"name": ""}),
            json!({"function": {"description": "nested, no name"}}),
            json!(42),
            json!({"name": "kept"}),
        ];
        let tools = normalize_tools(&entries);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "kept");
    }

    #[test]
    fn missing_or_non_object_schema_defaults() {
        let entries = vec![json!({"name": "a"}), json!({"name": "b", "parameters": "string"})];
        let tools = normalize_tools(&entries);
        assert_eq!(tools[0].parameters, Tool::empty_schema());
        assert_eq!(tools[1].parameters, Tool::empty_schema());
    }

    #[test]
    fn plugins_normalize() {
        let entries = vec![
            json!({"name": "github", "enabled": true}),
            json!({"name": "readwise"}),
            json!("junk"),
        ];
        let plugins = normalize_plugins(&entries);
        assert_eq!(
            plugins,
            vec![
                Plugin { name: "github".into(), enabled: true },
                Plugin { name: "readwise".into(), enabled: false },
            ]
        );
    }
}
