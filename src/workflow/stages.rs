// SPDX-License-Identifier: MIT

//! Pipeline stages
//!
//! Each stage reads the merged state, makes at most one backend call and
//! returns the fields it changes, one `workflow_messages` entry and the new
//! `progress` value.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::graph::{StageExecutor, StageResult, StateUpdate, WorkflowState};
use crate::workflow::backend::InstructionBackend;
use crate::workflow::state::*;

pub const DOCUMENT_PROCESSOR: &str = "document_processor";
pub const INSTRUCTIONS_GENERATOR: &str = "ai_instructions_generator";
pub const EXTRACTOR: &str = "extractor";
pub const EVALUATOR: &str = "evaluator";
pub const SUCCESS_HANDLER: &str = "success_handler";
pub const REFINER: &str = "refine_ai_instructions";
pub const VERIFIER: &str = "ai_instructions_verifier";
pub const VALIDATION_EXTRACTOR: &str = "validation_extractor";
pub const VALIDATION_EVALUATOR: &str = "validation_evaluator";

/// The pipeline's stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    DocumentProcessor,
    InstructionsGenerator,
    Extractor,
    Evaluator,
    SuccessHandler,
    Refiner,
    Verifier,
    ValidationExtractor,
    ValidationEvaluator,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 9] = [
        PipelineStep::DocumentProcessor,
        PipelineStep::InstructionsGenerator,
        PipelineStep::Extractor,
        PipelineStep::Evaluator,
        PipelineStep::SuccessHandler,
        PipelineStep::Refiner,
        PipelineStep::Verifier,
        PipelineStep::ValidationExtractor,
        PipelineStep::ValidationEvaluator,
    ];

    /// Node name in the graph
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::DocumentProcessor => DOCUMENT_PROCESSOR,
            PipelineStep::InstructionsGenerator => INSTRUCTIONS_GENERATOR,
            PipelineStep::Extractor => EXTRACTOR,
            PipelineStep::Evaluator => EVALUATOR,
            PipelineStep::SuccessHandler => SUCCESS_HANDLER,
            PipelineStep::Refiner => REFINER,
            PipelineStep::Verifier => VERIFIER,
            PipelineStep::ValidationExtractor => VALIDATION_EXTRACTOR,
            PipelineStep::ValidationEvaluator => VALIDATION_EVALUATOR,
        }
    }

    /// Percentage reported once the stage has completed
    pub fn progress(&self) -> f64 {
        match self {
            PipelineStep::DocumentProcessor => 10.0,
            PipelineStep::InstructionsGenerator => 25.0,
            PipelineStep::Extractor => 40.0,
            PipelineStep::Evaluator => 55.0,
            PipelineStep::SuccessHandler => 65.0,
            PipelineStep::Refiner => 50.0,
            PipelineStep::Verifier => 75.0,
            PipelineStep::ValidationExtractor => 85.0,
            PipelineStep::ValidationEvaluator => 100.0,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pipeline step bound to the backend it calls
pub struct InstructionStage {
    step: PipelineStep,
    backend: Arc<dyn InstructionBackend>,
}

impl InstructionStage {
    pub fn new(step: PipelineStep, backend: Arc<dyn InstructionBackend>) -> Self {
        Self { step, backend }
    }

    fn finish(&self, update: StateUpdate, message: impl Into<String>) -> StateUpdate {
        update
            .set(WORKFLOW_MESSAGES, message.into())
            .set(PROGRESS, self.step.progress())
    }

    async fn generate_instructions(&self, state: &WorkflowState) -> StageResult {
        let output = self.backend.generate_instructions(state).await?;
        Ok(StateUpdate::new()
            .set(INITIAL_AI_INSTRUCTIONS, output.initial_ai_instructions)
            .set(REASONING_EXPLANATION, output.reasoning_explanation))
    }

    async fn extract(&self, state: &WorkflowState) -> StageResult {
        let instructions = current_instructions(state);
        let output = self.backend.extract_answer(state, instructions).await?;
        Ok(StateUpdate::new()
            .set(EXTRACTED_ANSWER, output.extracted_answer)
            .set(EXTRACTION_REASONING, output.extraction_reasoning))
    }

    async fn evaluate(&self, state: &WorkflowState) -> StageResult {
        let answer = state.last_str(EXTRACTED_ANSWER).unwrap_or_default();
        let output = self.backend.evaluate(state, answer).await?;
        Ok(StateUpdate::new()
            .set(JUDGEMENT, output.judgment.as_str())
            .set(MATCH_TYPE, output.judgment.as_str())
            .set(EVALUATION_REASONING, output.reasoning))
    }

    async fn refine(&self, state: &WorkflowState) -> StageResult {
        let attempt = state.get_i64(REFINEMENT_ATTEMPTS).unwrap_or(0) + 1;
        let output = self
            .backend
            .refine(state, current_instructions(state))
            .await?;
        Ok(StateUpdate::new()
            .set(REFINEMENT_ATTEMPTS, attempt)
            .set(REFINED_INSTRUCTIONS, output.refined_instructions)
            .set(REFINEMENT_REASONING, output.refinement_reasoning))
    }

    async fn verify(&self, state: &WorkflowState) -> StageResult {
        let instructions = state
            .get_str(FINAL_AI_INSTRUCTIONS)
            .unwrap_or_else(|| current_instructions(state));
        let output = self.backend.verify(state, instructions).await?;
        Ok(StateUpdate::new()
            .set(VERIFIED_INSTRUCTIONS, output.verified_instructions)
            .set(VERIFICATION_REPORT, output.verification_report))
    }

    async fn validation_extract(&self, state: &WorkflowState) -> StageResult {
        let instructions = state.get_str(VERIFIED_INSTRUCTIONS).unwrap_or_default();
        let output = self.backend.extract_answer(state, instructions).await?;
        Ok(StateUpdate::new()
            .set(VALIDATION_EXTRACTED_ANSWER, output.extracted_answer)
            .set(VALIDATION_EXTRACTION_REASONING, output.extraction_reasoning))
    }

    async fn validation_evaluate(&self, state: &WorkflowState) -> StageResult {
        let answer = state
            .get_str(VALIDATION_EXTRACTED_ANSWER)
            .unwrap_or_default();
        let output = self.backend.evaluate(state, answer).await?;
        let matched = output.judgment.is_match();
        Ok(StateUpdate::new()
            .set(VALIDATION_MATCH_TYPE, output.judgment.as_str())
            .set(VALIDATION_JUDGEMENT, output.judgment.as_str())
            .set(VALIDATION_EVALUATION_REASONING, output.reasoning)
            .set(VALIDATION_IS_SUCCESS, matched)
            .set(ACCURACY_MAINTAINED, matched))
    }
}

#[async_trait]
impl StageExecutor for InstructionStage {
    async fn execute(&self, state: &WorkflowState) -> StageResult {
        log::debug!("Running stage {}", self.step);

        let (update, message) = match self.step {
            PipelineStep::DocumentProcessor => {
                (StateUpdate::new(), "Document processed".to_string())
            }
            PipelineStep::InstructionsGenerator => (
                self.generate_instructions(state).await?,
                "Initial AI instructions generated".to_string(),
            ),
            PipelineStep::Extractor => {
                (self.extract(state).await?, "Extractor executed".to_string())
            }
            PipelineStep::Evaluator => {
                (self.evaluate(state).await?, "Evaluation complete".to_string())
            }
            PipelineStep::SuccessHandler => {
                let update = StateUpdate::new()
                    .set(IS_SUCCESS, true)
                    .set(FINAL_AI_INSTRUCTIONS, current_instructions(state));
                (update, "Success handler executed".to_string())
            }
            PipelineStep::Refiner => {
                let update = self.refine(state).await?;
                let attempt = update
                    .get(REFINEMENT_ATTEMPTS)
                    .and_then(Value::as_i64)
                    .unwrap_or_default();
                (update, format!("Refinement attempt {}", attempt))
            }
            PipelineStep::Verifier => {
                (self.verify(state).await?, "Verification complete".to_string())
            }
            PipelineStep::ValidationExtractor => (
                self.validation_extract(state).await?,
                "Validation extraction complete".to_string(),
            ),
            PipelineStep::ValidationEvaluator => (
                self.validation_evaluate(state).await?,
                "Validation evaluation complete".to_string(),
            ),
        };

        Ok(self.finish(update, message))
    }
}

/// Latest refined instructions, falling back to the initial draft
pub fn current_instructions(state: &WorkflowState) -> &str {
    state
        .last_str(REFINED_INSTRUCTIONS)
        .or_else(|| state.get_str(INITIAL_AI_INSTRUCTIONS))
        .unwrap_or_default()
}
