// SPDX-License-Identifier: MIT

//! Routing functions for the pipeline's conditional edges
//!
//! Each edge set has its own label enum, so the graph refuses to compile if
//! a label is left without a destination.

use std::fmt;

use crate::graph::{RouteLabel, WorkflowState};
use crate::workflow::models::Judgment;
use crate::workflow::state::{
    DOCUMENT_TEXT, IS_SUCCESS, JUDGEMENT, MAX_REFINEMENT_ATTEMPTS, REFINEMENT_ATTEMPTS,
};

/// Used when the state carries no explicit bound
pub const DEFAULT_MAX_REFINEMENT_ATTEMPTS: i64 = 3;

/// Routes out of `document_processor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRoute {
    Generate,
    End,
}

/// Routes out of `evaluator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationRoute {
    Success,
    Refine,
    Verify,
}

/// Routes out of `ai_instructions_verifier`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationRoute {
    Validate,
    End,
}

/// Nothing to work on without document text
pub fn route_from_document_processor(state: &WorkflowState) -> DocumentRoute {
    match state.get_str(DOCUMENT_TEXT) {
        Some(text) if !text.is_empty() => DocumentRoute::Generate,
        _ => DocumentRoute::End,
    }
}

/// Accept a match, refine while attempts remain, otherwise verify as-is
///
/// An empty judgement list counts as `NO`; an unrecognised judgement is
/// sent straight to verification. The attempt counter compared against
/// `max_refinement_attempts` is what bounds the extract/evaluate/refine cycle.
pub fn route_after_evaluation(state: &WorkflowState) -> EvaluationRoute {
    let judgment = match state.get_array(JUDGEMENT).last() {
        None => Some(Judgment::No),
        Some(value) => value.as_str().and_then(Judgment::parse),
    };
    let attempts = state.get_i64(REFINEMENT_ATTEMPTS).unwrap_or(0);
    let max_attempts = state
        .get_i64(MAX_REFINEMENT_ATTEMPTS)
        .unwrap_or(DEFAULT_MAX_REFINEMENT_ATTEMPTS);

    match judgment {
        Some(judgment) if judgment.is_match() => EvaluationRoute::Success,
        Some(Judgment::No) if attempts < max_attempts => EvaluationRoute::Refine,
        _ => EvaluationRoute::Verify,
    }
}

/// Only successful instructions go through validation
pub fn route_after_verification(state: &WorkflowState) -> VerificationRoute {
    if state.get_bool(IS_SUCCESS).unwrap_or(false) {
        VerificationRoute::Validate
    } else {
        VerificationRoute::End
    }
}

impl fmt::Display for DocumentRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentRoute::Generate => "generate",
            DocumentRoute::End => "end",
        })
    }
}

impl RouteLabel for DocumentRoute {
    fn variants() -> Option<Vec<Self>> {
        Some(vec![DocumentRoute::Generate, DocumentRoute::End])
    }
}

impl fmt::Display for EvaluationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluationRoute::Success => "success",
            EvaluationRoute::Refine => "refine",
            EvaluationRoute::Verify => "verify",
        })
    }
}

impl RouteLabel for EvaluationRoute {
    fn variants() -> Option<Vec<Self>> {
        Some(vec![
            EvaluationRoute::Success,
            EvaluationRoute::Refine,
            EvaluationRoute::Verify,
        ])
    }
}

impl fmt::Display for VerificationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerificationRoute::Validate => "validate",
            VerificationRoute::End => "end",
        })
    }
}

impl RouteLabel for VerificationRoute {
    fn variants() -> Option<Vec<Self>> {
        Some(vec![VerificationRoute::Validate, VerificationRoute::End])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::instructions_schema;
    use serde_json::json;
    use std::sync::Arc;

    fn state() -> WorkflowState {
        WorkflowState::new(Arc::new(instructions_schema()))
    }

    #[test]
    fn test_empty_document_ends() {
        let mut s = state();
        assert_eq!(route_from_document_processor(&s), DocumentRoute::End);

        s.update(DOCUMENT_TEXT, json!(""));
        assert_eq!(route_from_document_processor(&s), DocumentRoute::End);

        s.update(DOCUMENT_TEXT, json!("Revenue grew."));
        assert_eq!(route_from_document_processor(&s), DocumentRoute::Generate);
    }

    #[test]
    fn test_latest_judgement_decides() {
        let mut s = state();
        s.update(JUDGEMENT, json!("NO"));
        s.update(JUDGEMENT, json!("PARTIAL"));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Success);

        s.update(JUDGEMENT, json!("NO"));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Refine);
    }

    #[test]
    fn test_refinement_bound() {
        let mut s = state();
        s.update(JUDGEMENT, json!("NO"));
        s.update(MAX_REFINEMENT_ATTEMPTS, json!(2));

        s.update(REFINEMENT_ATTEMPTS, json!(1));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Refine);

        s.update(REFINEMENT_ATTEMPTS, json!(2));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Verify);
    }

    #[test]
    fn test_missing_judgement_counts_as_no() {
        let mut s = state();
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Refine);

        s.update(REFINEMENT_ATTEMPTS, json!(DEFAULT_MAX_REFINEMENT_ATTEMPTS));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Verify);
    }

    #[test]
    fn test_unrecognised_judgement_skips_refinement() {
        let mut s = state();
        s.update(REFINEMENT_ATTEMPTS, json!(0));
        s.update(JUDGEMENT, json!("UNSURE"));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Verify);

        s.update(JUDGEMENT, json!(42));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Verify);

        s.update(JUDGEMENT, json!("no"));
        assert_eq!(route_after_evaluation(&s), EvaluationRoute::Refine);
    }

    #[test]
    fn test_verification_route() {
        let mut s = state();
        assert_eq!(route_after_verification(&s), VerificationRoute::End);

        s.update(IS_SUCCESS, json!(true));
        assert_eq!(route_after_verification(&s), VerificationRoute::Validate);
    }
}
