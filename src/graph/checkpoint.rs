// SPDX-License-Identifier: MIT

//! Checkpoint storage keyed by execution identifier
//!
//! Each execution owns one lineage of snapshots. The engine appends to it
//! after every stage merge, so the latest state can be read back while the
//! execution is still running.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::CheckpointError;
use crate::graph::state::WorkflowState;

/// Snapshot of the merged state after a stage transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub execution_id: String,
    /// Number of stages completed when the snapshot was taken
    pub step: usize,
    /// Stage that produced the snapshot (START for the initial state)
    pub stage: String,
    pub values: Value,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(execution_id: &str, step: usize, stage: &str, state: &WorkflowState) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            step,
            stage: stage.to_string(),
            values: state.to_json(),
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for execution checkpoints
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Append a snapshot to the execution's lineage
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    /// Latest snapshot for an execution
    async fn load(&self, execution_id: &str) -> Result<Checkpoint, CheckpointError>;

    /// Full lineage for an execution, oldest first
    async fn history(&self, execution_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;
}

/// Process-local checkpointer
#[derive(Clone, Default)]
pub struct InMemoryCheckpointer {
    lineages: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let mut lineages = self.lineages.write().await;
        lineages
            .entry(checkpoint.execution_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn load(&self, execution_id: &str) -> Result<Checkpoint, CheckpointError> {
        let lineages = self.lineages.read().await;
        lineages
            .get(execution_id)
            .and_then(|lineage| lineage.last())
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(execution_id.to_string()))
    }

    async fn history(&self, execution_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let lineages = self.lineages.read().await;
        lineages
            .get(execution_id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(execution_id.to_string()))
    }
}
