// SPDX-License-Identifier: MIT

//! Stage-graph orchestration for the AI instructions document pipeline.
//!
//! - [`graph`] - declarative stage graphs, typed state merging, execution and checkpoints
//! - [`workflow`] - the document-processing pipeline and its execution registry
//! - [`server`] - HTTP start/poll surface

pub mod error;
pub mod graph;
pub mod server;
pub mod settings;
pub mod workflow;
