// SPDX-License-Identifier: MIT

//! Start-request schema for the instructions pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RegistryError;
use crate::graph::WorkflowState;
use crate::workflow::state::*;

/// Configuration required to start a workflow
///
/// Unknown fields are rejected so typos never silently drop input.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub ocg_term_details: Map<String, Value>,
    #[serde(default)]
    pub data_definitions: Map<String, Value>,
    pub document_text: String,
    pub human_labeled_answer: String,
    pub referenced_page_texts: Vec<String>,
    pub document_name: String,
    pub project_name: String,
}

impl WorkflowConfig {
    /// Parse a JSON payload
    pub fn from_json(value: Value) -> Result<Self, RegistryError> {
        serde_json::from_value(value).map_err(|e| RegistryError::InvalidConfig(e.to_string()))
    }

    /// Reject documents larger than `max_document_bytes`
    pub fn validate(&self, max_document_bytes: usize) -> Result<(), RegistryError> {
        let size = self.document_text.len();
        if size > max_document_bytes {
            return Err(RegistryError::PayloadTooLarge {
                size,
                limit: max_document_bytes,
            });
        }
        Ok(())
    }

    /// Seed `state` with the request fields and loop bookkeeping
    pub fn populate(&self, state: &mut WorkflowState, workflow_id: &str, max_refinement_attempts: u32) {
        state.update(WORKFLOW_ID, Value::from(workflow_id));
        state.update(OCG_TERM_DETAILS, Value::Object(self.ocg_term_details.clone()));
        state.update(DATA_DEFINITIONS, Value::Object(self.data_definitions.clone()));
        state.update(DOCUMENT_TEXT, Value::from(self.document_text.as_str()));
        state.update(
            HUMAN_LABELED_ANSWER,
            Value::from(self.human_labeled_answer.as_str()),
        );
        state.update(
            REFERENCED_PAGE_TEXTS,
            Value::from(self.referenced_page_texts.clone()),
        );
        state.update(DOCUMENT_NAME, Value::from(self.document_name.as_str()));
        state.update(PROJECT_NAME, Value::from(self.project_name.as_str()));
        state.update(REFINEMENT_ATTEMPTS, Value::from(0));
        state.update(MAX_REFINEMENT_ATTEMPTS, Value::from(max_refinement_attempts));
        state.update(PROGRESS, Value::from(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn payload() -> Value {
        json!({
            "ocg_term_details": {"term": "Net Revenue"},
            "document_text": "Net revenue was $4.2M.",
            "human_labeled_answer": "$4.2M",
            "referenced_page_texts": ["page 3"],
            "document_name": "annual-report.pdf",
            "project_name": "finance"
        })
    }

    #[test]
    fn test_parse_valid_payload() {
        let config = WorkflowConfig::from_json(payload()).unwrap();
        assert_eq!(config.document_name, "annual-report.pdf");
        assert!(config.data_definitions.is_empty());
        assert_eq!(config.ocg_term_details["term"], "Net Revenue");
    }

    #[test]
    fn test_missing_required_field() {
        let mut value = payload();
        value.as_object_mut().unwrap().remove("human_labeled_answer");

        let err = WorkflowConfig::from_json(value).unwrap_err();
        assert!(err.to_string().contains("human_labeled_answer"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut value = payload();
        value["priority"] = json!("high");

        let err = WorkflowConfig::from_json(value).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
    }

    #[test]
    fn test_term_details_must_be_object() {
        let mut value = payload();
        value["ocg_term_details"] = json!("Net Revenue");
        assert!(WorkflowConfig::from_json(value).is_err());
    }

    #[test]
    fn test_document_size_limit() {
        let config = WorkflowConfig::from_json(payload()).unwrap();
        assert!(config.validate(1024).is_ok());

        let err = config.validate(4).unwrap_err();
        assert!(matches!(err, RegistryError::PayloadTooLarge { limit: 4, .. }));
    }

    #[test]
    fn test_populate_initial_state() {
        let config = WorkflowConfig::from_json(payload()).unwrap();
        let mut state = WorkflowState::new(Arc::new(instructions_schema()));

        config.populate(&mut state, "wf-1", 3);

        assert_eq!(state.get_str(WORKFLOW_ID), Some("wf-1"));
        assert_eq!(state.get_str(PROJECT_NAME), Some("finance"));
        assert_eq!(state.get_i64(REFINEMENT_ATTEMPTS), Some(0));
        assert_eq!(state.get_i64(MAX_REFINEMENT_ATTEMPTS), Some(3));
        assert_eq!(state.get(REFERENCED_PAGE_TEXTS), Some(&json!(["page 3"])));
        assert_eq!(state.get(WORKFLOW_MESSAGES), Some(&json!([])));
        assert_eq!(state.get(DATA_DEFINITIONS), Some(&json!({})));
    }
}
