//! Input schemas for tools and the listing sent to the model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A tool's input schema (a JSON Schema object, restricted to the subset
/// [`super::validation`] understands).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    /// Start an object schema.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder::default()
    }
}

/// What the model sees for one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Builds an object schema one property at a time.
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
    alternatives: Vec<Vec<String>>,
}

impl ParameterBuilder {
    fn field(mut self, name: impl Into<String>, mut schema: Value, description: String, required: bool) -> Self {
        let name = name.into();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".into(), description.into());
        }
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.field(name, json!({ "type": "string" }), description.into(), required)
    }

    /// A number constrained to `minimum..=maximum`.
    pub fn number_range(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        minimum: f64,
        maximum: f64,
        required: bool,
    ) -> Self {
        let schema = json!({ "type": "number", "minimum": minimum, "maximum": maximum });
        self.field(name, schema, description.into(), required)
    }

    /// A string restricted to `values`, with an optional default that
    /// validation fills in when the field is absent.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        default: Option<&str>,
        required: bool,
    ) -> Self {
        let mut schema = json!({ "type": "string", "enum": values });
        if let (Some(default), Some(obj)) = (default, schema.as_object_mut()) {
            obj.insert("default".into(), default.into());
        }
        self.field(name, schema, description.into(), required)
    }

    /// Accept the input when every field of at least one group is present.
    pub fn any_of_required(mut self, groups: &[&[&str]]) -> Self {
        self.alternatives = groups
            .iter()
            .map(|group| group.iter().map(|f| f.to_string()).collect())
            .collect();
        self
    }

    pub fn build(self) -> ToolParameters {
        let mut schema = json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        });
        if !self.alternatives.is_empty() {
            let any_of: Vec<Value> = self
                .alternatives
                .into_iter()
                .map(|group| json!({ "required": group }))
                .collect();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("anyOf".into(), any_of.into());
            }
        }
        ToolParameters { schema }
    }
}
