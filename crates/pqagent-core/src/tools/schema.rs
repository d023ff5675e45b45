//! Tool declarations and parameter-schema normalization.
//!
//! Tools may describe their parameters either as a full JSON schema or as a
//! legacy flat `name -> description` map. Both are normalized once, at
//! registration, into [`ParameterSchema`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::RegistryError;

/// Parameter description as supplied by a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSpec {
    /// A JSON-schema object (`{"type": "object", "properties": ..., "required": ...}`).
    Schema(Value),
    /// Legacy flat form: every field is a required string.
    Flat(Vec<(String, String)>),
}

impl ParameterSpec {
    pub fn flat<const N: usize>(fields: [(&str, &str); N]) -> Self {
        ParameterSpec::Flat(
            fields
                .iter()
                .map(|(name, desc)| ((*name).to_string(), (*desc).to_string()))
                .collect(),
        )
    }

    /// Detect the shape of an untyped parameter description.
    ///
    /// An object with a `type` key is a schema; an object whose values are
    /// all strings is the flat form.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("parameters must be a JSON object".to_string());
        };
        if map.contains_key("type") {
            return Ok(ParameterSpec::Schema(Value::Object(map)));
        }

        let mut fields = Vec::with_capacity(map.len());
        for (name, desc) in map {
            match desc {
                Value::String(desc) => fields.push((name, desc)),
                other => {
                    return Err(format!(
                        "flat parameter '{name}' must map to a description string, got {other}"
                    ))
                }
            }
        }
        Ok(ParameterSpec::Flat(fields))
    }

    pub(crate) fn normalize(self, tool_name: &str) -> Result<ParameterSchema, RegistryError> {
        match self {
            ParameterSpec::Flat(fields) => {
                let required = fields.iter().map(|(name, _)| name.clone()).collect();
                let properties = fields
                    .into_iter()
                    .map(|(name, desc)| (name, json!({"type": "string", "description": desc})))
                    .collect();
                Ok(ParameterSchema::object(properties, required))
            }
            ParameterSpec::Schema(value) => {
                let schema: ParameterSchema =
                    serde_json::from_value(value).map_err(|e| RegistryError::InvalidSchema {
                        tool_name: tool_name.to_string(),
                        reason: e.to_string(),
                    })?;
                if schema.kind != "object" {
                    return Err(RegistryError::InvalidSchema {
                        tool_name: tool_name.to_string(),
                        reason: format!("top-level type must be 'object', got '{}'", schema.kind),
                    });
                }
                if let Some(missing) = schema
                    .required
                    .iter()
                    .find(|field| !schema.properties.contains_key(*field))
                {
                    return Err(RegistryError::InvalidSchema {
                        tool_name: tool_name.to_string(),
                        reason: format!("required field '{missing}' has no property"),
                    });
                }
                Ok(schema)
            }
        }
    }
}

/// Canonical parameter schema sent to the model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
    /// Any further schema keywords (`additionalProperties`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParameterSchema {
    pub fn object(properties: Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            kind: "object".to_string(),
            properties,
            required,
            extra: Map::new(),
        }
    }
}

/// Name, description and normalized parameters of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_form_normalizes_to_required_strings() {
        let schema = ParameterSpec::flat([("path", "Target file"), ("content", "Body")])
            .normalize("write_file")
            .unwrap();
        assert_eq!(schema.kind, "object");
        assert_eq!(schema.required, vec!["path", "content"]);
        assert_eq!(schema.properties["path"]["type"], "string");
        assert_eq!(schema.properties["content"]["description"], "Body");
    }

    #[test]
    fn test_schema_form_is_kept() {
        let spec = ParameterSpec::Schema(json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "start_line": {"type": "integer"}},
            "required": ["path"],
            "additionalProperties": false
        }));
        let schema = spec.normalize("read_file").unwrap();
        assert_eq!(schema.required, vec!["path"]);
        assert_eq!(schema.properties["start_line"]["type"], "integer");
        assert_eq!(schema.extra["additionalProperties"], false);

        let wire = serde_json::to_value(&schema).unwrap();
        assert_eq!(wire["type"], "object");
        assert_eq!(wire["additionalProperties"], false);
    }

    #[test]
    fn test_non_object_schema_rejected() {
        let spec = ParameterSpec::Schema(json!({"type": "array"}));
        assert!(matches!(
            spec.normalize("bad"),
            Err(RegistryError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_required_without_property_rejected() {
        let spec = ParameterSpec::Schema(json!({
            "type": "object",
            "properties": {},
            "required": ["path"]
        }));
        assert!(spec.normalize("bad").is_err());
    }

    #[test]
    fn test_from_value_detects_shape() {
        let flat = ParameterSpec::from_value(json!({"input_path": "Input file"})).unwrap();
        assert_eq!(
            flat,
            ParameterSpec::Flat(vec![("input_path".to_string(), "Input file".to_string())])
        );

        let schema = ParameterSpec::from_value(json!({"type": "object"})).unwrap();
        assert!(matches!(schema, ParameterSpec::Schema(_)));

        assert!(ParameterSpec::from_value(json!({"path": 3})).is_err());
        assert!(ParameterSpec::from_value(json!("path")).is_err());
    }
}
