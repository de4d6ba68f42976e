// SPDX-License-Identifier: MIT

//! Stage graph toolkit
//!
//! This module provides:
//! - `StateGraph` - declarative stages, edges and conditional routing
//! - `CompiledGraph` - the validated, immutable execution plan
//! - `WorkflowEngine` - sequential traversal with snapshot publication
//! - `Checkpointer` - per-execution state lineage

pub mod builder;
pub mod checkpoint;
pub mod compiled;
pub mod executor;
pub mod route;
pub mod stage;
pub mod state;

pub use builder::StateGraph;
pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
pub use compiled::CompiledGraph;
pub use executor::{ExecutionFailure, NoopObserver, Snapshot, SnapshotObserver, WorkflowEngine};
pub use route::RouteLabel;
pub use stage::{FnStage, StageExecutor, StageResult};
pub use state::{FieldType, MergePolicy, StateFieldDef, StateSchema, StateUpdate, WorkflowState};

/// Sentinel for the graph entry point
pub const START: &str = "__start__";

/// Sentinel for the terminal marker
pub const END: &str = "__end__";
