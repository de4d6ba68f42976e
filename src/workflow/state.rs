// SPDX-License-Identifier: MIT

//! Pipeline state fields and their merge policies

use serde_json::json;

use crate::graph::{FieldType, MergePolicy, StateSchema};

pub const WORKFLOW_ID: &str = "workflow_id";
pub const OCG_TERM_DETAILS: &str = "ocg_term_details";
pub const DATA_DEFINITIONS: &str = "data_definitions";
pub const DOCUMENT_TEXT: &str = "document_text";
pub const HUMAN_LABELED_ANSWER: &str = "human_labeled_answer";
pub const REFERENCED_PAGE_TEXTS: &str = "referenced_page_texts";
pub const DOCUMENT_NAME: &str = "document_name";
pub const PROJECT_NAME: &str = "project_name";

pub const INITIAL_AI_INSTRUCTIONS: &str = "initial_ai_instructions";
pub const FINAL_AI_INSTRUCTIONS: &str = "final_ai_instructions";
pub const REASONING_EXPLANATION: &str = "reasoning_explanation";

pub const VERIFIED_INSTRUCTIONS: &str = "verified_instructions";
pub const VERIFICATION_REPORT: &str = "verification_report";

pub const EXTRACTED_ANSWER: &str = "extracted_answer";
pub const EXTRACTION_REASONING: &str = "extraction_reasoning";

pub const VALIDATION_EXTRACTED_ANSWER: &str = "validation_extracted_answer";
pub const VALIDATION_EXTRACTION_REASONING: &str = "validation_extraction_reasoning";

pub const MATCH_TYPE: &str = "match_type";
pub const JUDGEMENT: &str = "judgement";
pub const EVALUATION_REASONING: &str = "evaluation_reasoning";

pub const VALIDATION_MATCH_TYPE: &str = "validation_match_type";
pub const VALIDATION_JUDGEMENT: &str = "validation_judgement";
pub const VALIDATION_EVALUATION_REASONING: &str = "validation_evaluation_reasoning";
pub const VALIDATION_IS_SUCCESS: &str = "validation_is_success";
pub const ACCURACY_MAINTAINED: &str = "accuracy_maintained";

pub const REFINED_INSTRUCTIONS: &str = "refined_instructions";
pub const REFINEMENT_REASONING: &str = "refinement_reasoning";

pub const IS_SUCCESS: &str = "is_success";
pub const REFINEMENT_ATTEMPTS: &str = "refinement_attempts";
pub const MAX_REFINEMENT_ATTEMPTS: &str = "max_refinement_attempts";
pub const WORKFLOW_MESSAGES: &str = "workflow_messages";
pub const PROGRESS: &str = "progress";

/// Schema of the instructions pipeline
///
/// Iterative outputs (answers, judgements, refinements, messages) accumulate;
/// everything else holds the latest value.
pub fn instructions_schema() -> StateSchema {
    use FieldType::*;

    StateSchema::new()
        .replace(WORKFLOW_ID, String)
        .replace(OCG_TERM_DETAILS, Object)
        .replace(DATA_DEFINITIONS, Object)
        .replace(DOCUMENT_TEXT, String)
        .replace(HUMAN_LABELED_ANSWER, String)
        .replace(REFERENCED_PAGE_TEXTS, Array)
        .replace(DOCUMENT_NAME, String)
        .replace(PROJECT_NAME, String)
        .replace(INITIAL_AI_INSTRUCTIONS, String)
        .replace(FINAL_AI_INSTRUCTIONS, String)
        .replace(REASONING_EXPLANATION, String)
        .replace(VERIFIED_INSTRUCTIONS, String)
        .replace(VERIFICATION_REPORT, String)
        .append(EXTRACTED_ANSWER)
        .append(EXTRACTION_REASONING)
        .replace(VALIDATION_EXTRACTED_ANSWER, String)
        .replace(VALIDATION_EXTRACTION_REASONING, String)
        .replace(MATCH_TYPE, String)
        .append(JUDGEMENT)
        .replace(EVALUATION_REASONING, String)
        .replace(VALIDATION_MATCH_TYPE, String)
        .replace(VALIDATION_JUDGEMENT, String)
        .replace(VALIDATION_EVALUATION_REASONING, String)
        .replace(VALIDATION_IS_SUCCESS, Boolean)
        .replace(ACCURACY_MAINTAINED, Boolean)
        .append(REFINED_INSTRUCTIONS)
        .append(REFINEMENT_REASONING)
        .with_field(IS_SUCCESS, Boolean, MergePolicy::Replace, Some(json!(false)))
        .with_field(REFINEMENT_ATTEMPTS, Number, MergePolicy::Replace, Some(json!(0)))
        .replace(MAX_REFINEMENT_ATTEMPTS, Number)
        .append(WORKFLOW_MESSAGES)
        .with_field(PROGRESS, Number, MergePolicy::Replace, Some(json!(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulating_fields() {
        let schema = instructions_schema();
        for field in [
            EXTRACTED_ANSWER,
            EXTRACTION_REASONING,
            JUDGEMENT,
            REFINED_INSTRUCTIONS,
            REFINEMENT_REASONING,
            WORKFLOW_MESSAGES,
        ] {
            assert_eq!(schema.policy(field), MergePolicy::Append, "{}", field);
        }
    }

    #[test]
    fn test_scalar_fields_replace() {
        let schema = instructions_schema();
        for field in [MATCH_TYPE, REFINEMENT_ATTEMPTS, PROGRESS, IS_SUCCESS, REFERENCED_PAGE_TEXTS] {
            assert_eq!(schema.policy(field), MergePolicy::Replace, "{}", field);
        }
    }
}
