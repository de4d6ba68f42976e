// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Walks a [`CompiledGraph`] from START to END, one stage at a time, merging
//! each partial update into the state and publishing a snapshot before the
//! next stage is chosen.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::graph::checkpoint::{Checkpoint, Checkpointer};
use crate::graph::compiled::CompiledGraph;
use crate::graph::state::{StateUpdate, WorkflowState};
use crate::graph::{END, START};

/// State published after a stage has been merged
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub execution_id: String,
    /// Number of stages completed so far
    pub step: usize,
    /// Stage that just completed
    pub stage: String,
    pub state: WorkflowState,
}

/// Receives snapshots while an execution progresses
///
/// `on_snapshot` is awaited before the next stage starts.
#[async_trait]
pub trait SnapshotObserver: Send + Sync {
    async fn on_snapshot(&self, snapshot: &Snapshot);
}

/// Observer that ignores every snapshot
pub struct NoopObserver;

#[async_trait]
impl SnapshotObserver for NoopObserver {
    async fn on_snapshot(&self, _snapshot: &Snapshot) {}
}

#[async_trait]
impl SnapshotObserver for mpsc::Sender<Snapshot> {
    async fn on_snapshot(&self, snapshot: &Snapshot) {
        if self.send(snapshot.clone()).await.is_err() {
            log::debug!(
                "Snapshot receiver for {} dropped at step {}",
                snapshot.execution_id,
                snapshot.step
            );
        }
    }
}

/// A terminal failure together with the state merged before it happened
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    pub error: ExecutionError,
    pub state: WorkflowState,
}

/// Sequential graph executor backed by a checkpointer
pub struct WorkflowEngine {
    checkpointer: Arc<dyn Checkpointer>,
}

impl WorkflowEngine {
    pub fn new(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self { checkpointer }
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run `graph` from START until END is reached or an error occurs
    ///
    /// Stage errors, routing errors and cancellation abort the execution;
    /// the state merged up to that point is returned in the failure.
    pub async fn execute(
        &self,
        graph: &CompiledGraph,
        execution_id: &str,
        initial_state: WorkflowState,
        observer: &dyn SnapshotObserver,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState, ExecutionFailure> {
        let mut state = initial_state;
        match self
            .traverse(graph, execution_id, &mut state, observer, cancel)
            .await
        {
            Ok(steps) => {
                log::info!("Execution {} reached END after {} stages", execution_id, steps);
                Ok(state)
            }
            Err(error) => Err(ExecutionFailure { error, state }),
        }
    }

    async fn traverse(
        &self,
        graph: &CompiledGraph,
        execution_id: &str,
        state: &mut WorkflowState,
        observer: &dyn SnapshotObserver,
        cancel: &CancellationToken,
    ) -> Result<usize, ExecutionError> {
        self.checkpointer
            .save(Checkpoint::new(execution_id, 0, START, state))
            .await?;

        let mut step = 0;
        let mut current = graph.next_node(START, state)?;

        while current != END {
            let update = self.run_stage(graph, &current, state, cancel).await?;
            state
                .check_update(&update)
                .map_err(|message| ExecutionError::stage(current.clone(), message.into()))?;
            state.apply(update);
            step += 1;

            self.checkpointer
                .save(Checkpoint::new(execution_id, step, &current, state))
                .await?;

            observer
                .on_snapshot(&Snapshot {
                    execution_id: execution_id.to_string(),
                    step,
                    stage: current.clone(),
                    state: state.clone(),
                })
                .await;

            let next = graph.next_node(&current, state)?;
            log::debug!("Execution {}: {} -> {}", execution_id, current, next);
            current = next;
        }

        Ok(step)
    }

    async fn run_stage(
        &self,
        graph: &CompiledGraph,
        name: &str,
        state: &WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<StateUpdate, ExecutionError> {
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let stage = graph
            .stage(name)
            .ok_or_else(|| ExecutionError::UnknownStage(name.to_string()))?;

        log::info!("Executing stage: {}", name);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            result = stage.execute(state) => {
                result.map_err(|source| ExecutionError::stage(name, source))
            }
        }
    }
}
