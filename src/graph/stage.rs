// SPDX-License-Identifier: MIT

//! Stage capability - one function per stage producing a partial-state update

use async_trait::async_trait;

use crate::error::BoxError;
use crate::graph::state::{StateUpdate, WorkflowState};

/// Result of a single stage invocation
pub type StageResult = Result<StateUpdate, BoxError>;

/// Core trait for all stage implementations
///
/// A stage reads the merged state and returns only the fields it wants to
/// change. It must not rely on side effects outside the returned update.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Run the stage against the current state
    async fn execute(&self, state: &WorkflowState) -> StageResult;
}

/// Adapter turning a synchronous closure into a stage
pub struct FnStage<F> {
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&WorkflowState) -> StageResult + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> StageExecutor for FnStage<F>
where
    F: Fn(&WorkflowState) -> StageResult + Send + Sync,
{
    async fn execute(&self, state: &WorkflowState) -> StageResult {
        (self.func)(state)
    }
}
