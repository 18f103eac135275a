// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! Tool descriptors travel as
//! `{"properties": {name: {"type", "description"}}, "required": {"0": name, ...}}`.
//! The `required` list is written as an object keyed by stringified index for
//! compatibility with existing consumers; parsing also accepts a plain array.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl PropertyType {
    /// Whether `value` has this JSON type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            PropertyType::String => "a string",
            PropertyType::Integer | PropertyType::Number => "a number",
            PropertyType::Boolean => "a boolean",
            PropertyType::Object => "an object",
            PropertyType::Array => "an array",
        }
    }
}

/// Schema of a single parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

/// Input schema of a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, with = "indexed_required")]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Check presence and JSON type of every declared parameter.
    ///
    /// Returns the first problem found, or `None` when `args` is valid.
    pub fn validate(&self, args: &Value) -> Option<String> {
        let Some(object) = args.as_object() else {
            return Some("Arguments must be a JSON object".to_string());
        };

        // An explicit null counts as present and then fails the type check
        for name in &self.required {
            if !object.contains_key(name) {
                return Some(format!("Missing required parameter: {}", name));
            }
        }

        for (name, property) in &self.properties {
            match object.get(name) {
                None => {}
                Some(value) if property.kind.matches(value) => {}
                Some(_) => {
                    return Some(format!(
                        "Parameter '{}' must be {}",
                        name,
                        property.kind.expectation()
                    ))
                }
            }
        }

        None
    }

    /// Standard JSON Schema form used in provider requests
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, property)| {
                let mut schema = json!({
                    "type": property.kind,
                    "description": property.description,
                });
                if let Some(items) = &property.items {
                    schema["items"] = items.clone();
                }
                (name.clone(), schema)
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Name, description and schema of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

mod indexed_required {
    use super::*;

    pub fn serialize<S: Serializer>(required: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            required
                .iter()
                .enumerate()
                .map(|(index, name)| (index.to_string(), name)),
        )
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RequiredWire {
        List(Vec<String>),
        Indexed(BTreeMap<String, String>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match RequiredWire::deserialize(deserializer)? {
            RequiredWire::List(list) => list,
            RequiredWire::Indexed(map) => {
                let mut entries: Vec<(usize, String)> = map
                    .into_iter()
                    .map(|(key, name)| (key.parse().unwrap_or(usize::MAX), name))
                    .collect();
                entries.sort_by_key(|(index, _)| *index);
                entries.into_iter().map(|(_, name)| name).collect()
            }
        })
    }
}

/// Helper to create a tool input schema
pub struct SchemaBuilder {
    properties: BTreeMap<String, PropertySchema>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: BTreeMap::new(),
            required: vec![],
        }
    }

    fn property(mut self, name: &str, kind: PropertyType, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySchema {
                kind,
                description: description.to_string(),
                items: None,
            },
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, PropertyType::String, description, required)
    }

    /// Add an integer property
    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, PropertyType::Integer, description, required)
    }

    /// Add a boolean property
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, PropertyType::Boolean, description, required)
    }

    /// Add an array property
    pub fn array(mut self, name: &str, description: &str, item_type: &str, required: bool) -> Self {
        self = self.property(name, PropertyType::Array, description, required);
        if let Some(property) = self.properties.get_mut(name) {
            property.items = Some(json!({ "type": item_type }));
        }
        self
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            properties: self.properties,
            required: self.required,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read_file_schema() -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "Path to read", true)
            .boolean("verbose", "Verbose output", false)
            .build()
    }

    #[test]
    fn test_schema_builder_default() {
        let schema = SchemaBuilder::default().build();
        assert!(schema.properties.is_empty());
        assert!(schema.required.is_empty());
    }

    #[test]
    fn test_required_serialized_as_indexed_object() {
        let schema = SchemaBuilder::new()
            .string("path", "Path", true)
            .string("content", "Content", true)
            .build();
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["required"], json!({"0": "path", "1": "content"}));
        assert_eq!(value["properties"]["path"]["type"], "string");
        assert_eq!(value["properties"]["path"]["description"], "Path");
    }

    #[test]
    fn test_required_parses_both_shapes() {
        let indexed: ToolInputSchema =
            serde_json::from_value(json!({"properties": {}, "required": {"1": "b", "0": "a", "10": "k", "2": "c"}}))
                .unwrap();
        assert_eq!(indexed.required, vec!["a", "b", "c", "k"]);

        let list: ToolInputSchema =
            serde_json::from_value(json!({"properties": {}, "required": ["path"]})).unwrap();
        assert_eq!(list.required, vec!["path"]);
    }

    #[test]
    fn test_validate_missing_required() {
        let schema = read_file_schema();
        assert_eq!(
            schema.validate(&json!({})),
            Some("Missing required parameter: path".to_string())
        );
    }

    #[test]
    fn test_validate_null_is_a_type_error() {
        let schema = SchemaBuilder::new()
            .string("path", "Path", true)
            .integer("line_count", "Lines", false)
            .build();
        assert_eq!(
            schema.validate(&json!({"path": null})),
            Some("Parameter 'path' must be a string".to_string())
        );
        assert_eq!(
            schema.validate(&json!({"path": "a", "line_count": null})),
            Some("Parameter 'line_count' must be a number".to_string())
        );
    }

    #[test]
    fn test_validate_wrong_types() {
        let schema = SchemaBuilder::new()
            .string("path", "Path", true)
            .integer("line_count", "Lines", false)
            .boolean("recursive", "Recurse", false)
            .array("tags", "Tags", "string", false)
            .build();

        assert_eq!(
            schema.validate(&json!({"path": 1})),
            Some("Parameter 'path' must be a string".to_string())
        );
        assert_eq!(
            schema.validate(&json!({"path": "a", "line_count": "3"})),
            Some("Parameter 'line_count' must be a number".to_string())
        );
        assert_eq!(
            schema.validate(&json!({"path": "a", "line_count": 1.5})),
            Some("Parameter 'line_count' must be a number".to_string())
        );
        assert_eq!(
            schema.validate(&json!({"path": "a", "recursive": "yes"})),
            Some("Parameter 'recursive' must be a boolean".to_string())
        );
        assert_eq!(
            schema.validate(&json!({"path": "a", "tags": "x"})),
            Some("Parameter 'tags' must be an array".to_string())
        );
    }

    #[test]
    fn test_validate_ok() {
        let schema = read_file_schema();
        assert_eq!(schema.validate(&json!({"path": "a.txt"})), None);
        assert_eq!(schema.validate(&json!({"path": "a.txt", "verbose": true, "extra": 1})), None);
    }

    #[test]
    fn test_validate_non_object() {
        assert_eq!(
            read_file_schema().validate(&json!(["a.txt"])),
            Some("Arguments must be a JSON object".to_string())
        );
    }

    #[test]
    fn test_to_json_schema() {
        let schema = SchemaBuilder::new()
            .string("path", "Path", true)
            .array("tags", "Tags", "string", false)
            .build()
            .to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["path"]));
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
    }

    fn property_type() -> impl Strategy<Value = PropertyType> {
        prop_oneof![
            Just(PropertyType::String),
            Just(PropertyType::Integer),
            Just(PropertyType::Number),
            Just(PropertyType::Boolean),
            Just(PropertyType::Object),
            Just(PropertyType::Array),
        ]
    }

    proptest! {
        #[test]
        fn descriptor_json_roundtrip(
            name in "[a-z_]{1,16}",
            description in ".{0,40}",
            props in proptest::collection::btree_map("[a-z_]{1,10}", (property_type(), ".{0,20}", any::<bool>()), 0..6),
        ) {
            let mut builder = SchemaBuilder::new();
            for (prop, (kind, desc, required)) in &props {
                builder = builder.property(prop, *kind, desc, *required);
            }
            let descriptor = ToolDescriptor {
                name,
                description,
                input_schema: builder.build(),
            };

            let text = serde_json::to_string(&descriptor).unwrap();
            let parsed: ToolDescriptor = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(parsed, descriptor);
        }
    }
}
