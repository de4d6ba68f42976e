// SPDX-License-Identifier: MIT

//! Model backend used by the pipeline stages
//!
//! Prompt construction and model invocation live behind this trait. The
//! stages only handle state bookkeeping around the structured outputs.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::graph::WorkflowState;
use crate::workflow::models::{
    EvaluationOutput, ExtractionOutput, InstructionsOutput, Judgment, RefinementOutput,
    VerificationOutput,
};

/// Structured-output model calls made by the instructions pipeline
#[async_trait]
pub trait InstructionBackend: Send + Sync {
    /// Draft extraction instructions for the term described in the state
    async fn generate_instructions(
        &self,
        state: &WorkflowState,
    ) -> Result<InstructionsOutput, BoxError>;

    /// Follow `instructions` against the document to extract an answer
    async fn extract_answer(
        &self,
        state: &WorkflowState,
        instructions: &str,
    ) -> Result<ExtractionOutput, BoxError>;

    /// Judge `extracted_answer` against the human-labeled answer
    async fn evaluate(
        &self,
        state: &WorkflowState,
        extracted_answer: &str,
    ) -> Result<EvaluationOutput, BoxError>;

    /// Improve `instructions` after a failed evaluation
    async fn refine(
        &self,
        state: &WorkflowState,
        instructions: &str,
    ) -> Result<RefinementOutput, BoxError>;

    /// Review final instructions before validation
    async fn verify(
        &self,
        state: &WorkflowState,
        instructions: &str,
    ) -> Result<VerificationOutput, BoxError>;
}

/// Backend without a model: empty texts and a `NO` judgment every time
///
/// Verification passes the instructions through unchanged.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderBackend;

#[async_trait]
impl InstructionBackend for PlaceholderBackend {
    async fn generate_instructions(
        &self,
        _state: &WorkflowState,
    ) -> Result<InstructionsOutput, BoxError> {
        Ok(InstructionsOutput::default())
    }

    async fn extract_answer(
        &self,
        _state: &WorkflowState,
        _instructions: &str,
    ) -> Result<ExtractionOutput, BoxError> {
        Ok(ExtractionOutput::default())
    }

    async fn evaluate(
        &self,
        _state: &WorkflowState,
        _extracted_answer: &str,
    ) -> Result<EvaluationOutput, BoxError> {
        Ok(EvaluationOutput {
            judgment: Judgment::No,
            reasoning: String::new(),
        })
    }

    async fn refine(
        &self,
        _state: &WorkflowState,
        _instructions: &str,
    ) -> Result<RefinementOutput, BoxError> {
        Ok(RefinementOutput::default())
    }

    async fn verify(
        &self,
        _state: &WorkflowState,
        instructions: &str,
    ) -> Result<VerificationOutput, BoxError> {
        Ok(VerificationOutput {
            verified_instructions: instructions.to_string(),
            verification_report: String::new(),
        })
    }
}
