// SPDX-License-Identifier: MIT

//! AI instructions document pipeline
//!
//! Builds the stage graph (generate, extract, evaluate, refine, verify,
//! validate) and runs executions of it in the background through the
//! [`WorkflowRegistry`].

pub mod backend;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod routing;
pub mod stages;
pub mod state;

pub use backend::{InstructionBackend, PlaceholderBackend};
pub use config::WorkflowConfig;
pub use pipeline::build_instructions_graph;
pub use registry::{ExecutionLimits, ExecutionRecord, ExecutionStatus, WorkflowRegistry};
