// SPDX-License-Identifier: MIT

//! Wiring of the AI instructions pipeline

use std::sync::Arc;

use crate::error::GraphError;
use crate::graph::{CompiledGraph, StateGraph, END, START};
use crate::workflow::backend::InstructionBackend;
use crate::workflow::routing::*;
use crate::workflow::stages::*;
use crate::workflow::state::instructions_schema;

/// Build and compile the pipeline graph around `backend`
///
/// ```text
/// document_processor ─┬─> ai_instructions_generator -> extractor -> evaluator
///                     └─> END
/// evaluator ─┬─> success_handler ──────> ai_instructions_verifier
///            ├─> refine_ai_instructions ─> extractor
///            └─> ai_instructions_verifier
/// ai_instructions_verifier ─┬─> validation_extractor -> validation_evaluator -> END
///                           └─> END
/// ```
pub fn build_instructions_graph(
    backend: Arc<dyn InstructionBackend>,
) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(instructions_schema());

    for step in PipelineStep::ALL {
        graph.add_stage(
            step.name(),
            Arc::new(InstructionStage::new(step, backend.clone())),
        )?;
    }

    graph.add_edge(START, DOCUMENT_PROCESSOR)?;
    graph.add_conditional_edge(
        DOCUMENT_PROCESSOR,
        route_from_document_processor,
        [
            (DocumentRoute::Generate, INSTRUCTIONS_GENERATOR),
            (DocumentRoute::End, END),
        ],
    )?;
    graph.add_edge(INSTRUCTIONS_GENERATOR, EXTRACTOR)?;
    graph.add_edge(EXTRACTOR, EVALUATOR)?;
    graph.add_conditional_edge(
        EVALUATOR,
        route_after_evaluation,
        [
            (EvaluationRoute::Success, SUCCESS_HANDLER),
            (EvaluationRoute::Refine, REFINER),
            (EvaluationRoute::Verify, VERIFIER),
        ],
    )?;
    graph.add_edge(SUCCESS_HANDLER, VERIFIER)?;
    graph.add_edge(REFINER, EXTRACTOR)?;
    graph.add_conditional_edge(
        VERIFIER,
        route_after_verification,
        [
            (VerificationRoute::Validate, VALIDATION_EXTRACTOR),
            (VerificationRoute::End, END),
        ],
    )?;
    graph.add_edge(VALIDATION_EXTRACTOR, VALIDATION_EVALUATOR)?;
    graph.add_edge(VALIDATION_EVALUATOR, END)?;

    graph.compile()
}
