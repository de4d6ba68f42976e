// SPDX-License-Identifier: MIT

//! Typed error handling for instructflow-rs
//!
//! Graph definition problems are reported as [`GraphError`] before anything
//! runs. Failures of a single execution are [`ExecutionError`]s and only ever
//! affect that execution's record.

use std::error::Error;
use thiserror::Error;

/// Boxed error returned by stage functions and model backends
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Top-level error type for instructflow-rs
#[derive(Debug, Error)]
pub enum FlowError {
    /// Invalid graph definition
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A workflow execution failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Checkpoint storage errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Registry lookups and start requests
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors (bad env vars, unreadable settings file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while building or compiling a stage graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// A stage with this name already exists
    #[error("Stage '{0}' is already registered")]
    DuplicateStage(String),

    /// An edge references a stage that was never registered
    #[error("Unknown stage '{0}'")]
    UnknownStage(String),

    /// The node already owns an outgoing transition
    #[error("Stage '{0}' already has an outgoing edge")]
    DuplicateEdge(String),

    /// Structural validation failed during compile
    #[error("Graph validation failed: {0}")]
    Validation(String),
}

/// Errors that terminate a single workflow execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A routing function returned a label with no destination
    #[error("Routing error after stage '{stage}': label '{label}' has no destination")]
    Routing { stage: String, label: String },

    /// A stage function returned an error
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: BoxError,
    },

    /// The traversal reached a node without a registered stage
    #[error("No stage registered for '{0}'")]
    UnknownStage(String),

    /// Snapshot persistence failed
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// The execution was cancelled before reaching END
    #[error("Workflow cancelled")]
    Cancelled,

    /// The execution exceeded the configured workflow timeout
    #[error("Workflow timed out after {seconds} seconds")]
    TimedOut { seconds: u64 },
}

/// Checkpoint storage errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No checkpoint lineage exists for the execution
    #[error("No checkpoint found for execution '{0}'")]
    NotFound(String),
}

/// Errors surfaced by the workflow registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Unknown workflow identifier
    #[error("Workflow not found")]
    NotFound(String),

    /// The start payload failed validation
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfig(String),

    /// The submitted document exceeds the configured size limit
    #[error("Document is {size} bytes, exceeding the maximum of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl FlowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl ExecutionError {
    /// Wrap a stage failure
    pub fn stage(stage: impl Into<String>, source: BoxError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source,
        }
    }
}
