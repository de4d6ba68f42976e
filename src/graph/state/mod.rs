// SPDX-License-Identifier: MIT

//! State management for stage graphs
//!
//! This module provides:
//! - `StateSchema` - field table with a fixed merge policy per field
//! - `WorkflowState` - runtime state storage that applies those policies
//! - `StateUpdate` - the partial state a stage returns

mod schema;
mod store;

pub use schema::{FieldType, MergePolicy, StateFieldDef, StateSchema};
pub use store::{StateUpdate, WorkflowState};
