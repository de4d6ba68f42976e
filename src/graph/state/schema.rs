// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// How stage output is merged into this field
    #[serde(default)]
    pub merge: MergePolicy,
    /// Default value
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether `value` has this type; null is accepted for every type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (FieldType::String, Value::String(_))
                | (FieldType::Number, Value::Number(_))
                | (FieldType::Boolean, Value::Bool(_))
                | (FieldType::Array, Value::Array(_))
                | (FieldType::Object, Value::Object(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        })
    }
}

/// Merge policy for combining a stage's output into accumulated state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// New value overwrites the old one (default)
    #[default]
    Replace,
    /// New value is concatenated onto an ordered sequence
    Append,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field that is overwritten on every write
    pub fn replace(self, name: &str, field_type: FieldType) -> Self {
        self.with_field(name, field_type, MergePolicy::Replace, None)
    }

    /// Declare an array field that accumulates across stage invocations
    pub fn append(self, name: &str) -> Self {
        self.with_field(name, FieldType::Array, MergePolicy::Append, None)
    }

    /// Declare a field with an explicit policy and default
    pub fn with_field(
        mut self,
        name: &str,
        field_type: FieldType,
        merge: MergePolicy,
        default: Option<Value>,
    ) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                field_type,
                merge,
                default,
            },
        );
        self
    }

    /// Merge policy for a field; undeclared fields are replaced
    pub fn policy(&self, name: &str) -> MergePolicy {
        self.fields
            .get(name)
            .map(|def| def.merge)
            .unwrap_or_default()
    }

    /// Look up a field definition
    pub fn field(&self, name: &str) -> Option<&StateFieldDef> {
        self.fields.get(name)
    }

    /// Check a value written to `name` against its declared type
    ///
    /// Undeclared fields are not checked. An append field declared as
    /// `array` takes any element; other append fields check each element.
    pub fn check(&self, name: &str, value: &Value) -> Result<(), String> {
        let Some(def) = self.fields.get(name) else {
            return Ok(());
        };
        let accepted = match (def.merge, value) {
            (MergePolicy::Append, _) if def.field_type == FieldType::Array => true,
            (MergePolicy::Append, Value::Array(items)) => {
                items.iter().all(|item| def.field_type.accepts(item))
            }
            _ => def.field_type.accepts(value),
        };
        if accepted {
            Ok(())
        } else {
            Err(format!(
                "Field '{}' expects {}, got {}",
                name,
                def.field_type,
                value_kind(value)
            ))
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_schema_deserialize() {
        let yaml = r#"
            document_text:
              type: string
            progress:
              type: number
              default: 0.0
            judgement:
              type: array
              merge: append
        "#;
        let schema: StateSchema = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(schema.fields.len(), 3);
        assert_eq!(
            schema.fields["document_text"].field_type,
            FieldType::String
        );
        assert_eq!(schema.fields["progress"].default, Some(json!(0.0)));
        assert_eq!(schema.fields["judgement"].merge, MergePolicy::Append);
    }

    #[test]
    fn test_merge_policy_default() {
        let def = StateFieldDef {
            field_type: FieldType::String,
            merge: MergePolicy::default(),
            default: None,
        };
        assert_eq!(def.merge, MergePolicy::Replace);
    }

    #[test]
    fn test_builder_helpers() {
        let schema = StateSchema::new()
            .replace("match_type", FieldType::String)
            .append("judgement");

        assert_eq!(schema.policy("match_type"), MergePolicy::Replace);
        assert_eq!(schema.policy("judgement"), MergePolicy::Append);
        assert_eq!(
            schema.field("judgement").map(|f| f.field_type),
            Some(FieldType::Array)
        );
    }

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::Number.accepts(&json!(55.0)));
        assert!(FieldType::Number.accepts(&json!(3)));
        assert!(FieldType::Boolean.accepts(&json!(false)));
        assert!(FieldType::Object.accepts(&json!({"term": "Revenue"})));
        assert!(FieldType::String.accepts(&Value::Null));
        assert!(!FieldType::Number.accepts(&json!("55")));
        assert!(!FieldType::String.accepts(&json!(["a"])));
    }

    #[test]
    fn test_check_against_declared_type() {
        let schema = StateSchema::new()
            .replace("progress", FieldType::Number)
            .append("judgement")
            .with_field("labels", FieldType::String, MergePolicy::Append, None);

        assert!(schema.check("progress", &json!(40.0)).is_ok());
        let err = schema.check("progress", &json!("forty")).unwrap_err();
        assert_eq!(err, "Field 'progress' expects number, got string");

        assert!(schema.check("judgement", &json!("NO")).is_ok());
        assert!(schema.check("judgement", &json!(["NO", 1])).is_ok());

        assert!(schema.check("labels", &json!("a")).is_ok());
        assert!(schema.check("labels", &json!(["a", "b"])).is_ok());
        assert!(schema.check("labels", &json!(["a", 2])).is_err());

        assert!(schema.check("undeclared", &json!({"any": "thing"})).is_ok());
    }

    #[test]
    fn test_undeclared_field_policy() {
        let schema = StateSchema::new();
        assert_eq!(schema.policy("anything"), MergePolicy::Replace);
    }
}
