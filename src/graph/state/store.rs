// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::schema::{MergePolicy, StateSchema};

/// Runtime workflow state with per-field merge policies
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Current state values
    fields: HashMap<String, Value>,
    /// Schema fixing each field's merge policy
    schema: Arc<StateSchema>,
}

/// Partial state returned by a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    values: Map<String, Value>,
}

impl WorkflowState {
    /// Create a new WorkflowState from a schema
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let mut fields = HashMap::new();

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                fields.insert(name.clone(), default.clone());
            } else if def.merge == MergePolicy::Append {
                fields.insert(name.clone(), Value::Array(vec![]));
            }
        }

        Self { fields, schema }
    }

    /// Create an empty WorkflowState
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
            schema: Arc::new(StateSchema::default()),
        }
    }

    /// Update a field using its declared merge policy
    pub fn update(&mut self, key: &str, value: Value) {
        match self.schema.policy(key) {
            MergePolicy::Replace => {
                self.fields.insert(key.to_string(), value);
            }
            MergePolicy::Append => {
                let current = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if !current.is_array() {
                    *current = Value::Array(vec![current.take()]);
                }
                if let Value::Array(items) = current {
                    match value {
                        Value::Array(new_items) => items.extend(new_items),
                        other => items.push(other),
                    }
                }
            }
        }
    }

    /// Check every value in `update` against the schema's declared types
    pub fn check_update(&self, update: &StateUpdate) -> Result<(), String> {
        update
            .values
            .iter()
            .try_for_each(|(key, value)| self.schema.check(key, value))
    }

    /// Merge a stage's partial state
    pub fn apply(&mut self, update: StateUpdate) {
        for (key, value) in update.values {
            self.update(&key, value);
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Elements of an array field, empty if missing
    pub fn get_array(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Last element of an array field as a string
    pub fn last_str(&self, key: &str) -> Option<&str> {
        self.get_array(key).last().and_then(Value::as_str)
    }

    /// The schema this state was created from
    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::empty()
    }
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::schema::FieldType;
    use serde_json::json;

    fn make_schema(fields: Vec<(&str, FieldType, MergePolicy, Option<Value>)>) -> Arc<StateSchema> {
        let mut schema = StateSchema::default();
        for (name, field_type, merge, default) in fields {
            schema = schema.with_field(name, field_type, merge, default);
        }
        Arc::new(schema)
    }

    #[test]
    fn test_empty_state() {
        let state = WorkflowState::empty();
        assert!(state.get("anything").is_none());
        assert!(state.get_array("anything").is_empty());
    }

    #[test]
    fn test_state_with_defaults() {
        let schema = make_schema(vec![
            (
                "refinement_attempts",
                FieldType::Number,
                MergePolicy::Replace,
                Some(json!(0)),
            ),
            ("judgement", FieldType::Array, MergePolicy::Append, None),
        ]);
        let state = WorkflowState::new(schema);

        assert_eq!(state.get_i64("refinement_attempts"), Some(0));
        assert_eq!(state.get("judgement"), Some(&json!([])));
    }

    #[test]
    fn test_replace_policy() {
        let schema = make_schema(vec![(
            "match_type",
            FieldType::String,
            MergePolicy::Replace,
            None,
        )]);
        let mut state = WorkflowState::new(schema);

        state.update("match_type", json!("NO"));
        assert_eq!(state.get_str("match_type"), Some("NO"));

        state.update("match_type", json!("YES"));
        assert_eq!(state.get_str("match_type"), Some("YES"));
    }

    #[test]
    fn test_append_policy() {
        let schema = make_schema(vec![("judgement", FieldType::Array, MergePolicy::Append, None)]);
        let mut state = WorkflowState::new(schema);

        state.update("judgement", json!("NO"));
        assert_eq!(state.get("judgement"), Some(&json!(["NO"])));

        state.update("judgement", json!("PARTIAL"));
        assert_eq!(state.get("judgement"), Some(&json!(["NO", "PARTIAL"])));

        state.update("judgement", json!(["YES", "NO"]));
        assert_eq!(
            state.get("judgement"),
            Some(&json!(["NO", "PARTIAL", "YES", "NO"]))
        );
        assert_eq!(state.last_str("judgement"), Some("NO"));
    }

    #[test]
    fn test_append_policy_wraps_existing_scalar() {
        let schema = make_schema(vec![(
            "messages",
            FieldType::Array,
            MergePolicy::Append,
            Some(json!("seed")),
        )]);
        let mut state = WorkflowState::new(schema);

        state.update("messages", json!("next"));
        assert_eq!(state.get("messages"), Some(&json!(["seed", "next"])));
    }

    #[test]
    fn test_apply_update_uses_each_policy() {
        let schema = make_schema(vec![
            ("progress", FieldType::Number, MergePolicy::Replace, None),
            ("workflow_messages", FieldType::Array, MergePolicy::Append, None),
        ]);
        let mut state = WorkflowState::new(schema);

        for (progress, message) in [(10.0, "first"), (25.0, "second")] {
            state.apply(
                StateUpdate::new()
                    .set("progress", progress)
                    .set("workflow_messages", vec![message]),
            );
        }

        assert_eq!(state.get_f64("progress"), Some(25.0));
        assert_eq!(
            state.get("workflow_messages"),
            Some(&json!(["first", "second"]))
        );
    }

    #[test]
    fn test_to_json() {
        let mut state = WorkflowState::empty();
        state.update("a", json!(1));
        state.update("b", json!("hello"));

        let json = state.to_json();
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"], "hello");
    }

    #[test]
    fn test_undefined_field_uses_replace() {
        let mut state = WorkflowState::new(Arc::new(StateSchema::default()));

        state.update("unknown", json!("first"));
        state.update("unknown", json!("second"));
        assert_eq!(state.get_str("unknown"), Some("second"));
    }

    #[test]
    fn test_state_update_builder() {
        let update = StateUpdate::new().set("a", 1).set("b", "two");
        assert_eq!(update.len(), 2);
        assert_eq!(update.get("b"), Some(&json!("two")));
        assert!(StateUpdate::new().is_empty());
    }
}
