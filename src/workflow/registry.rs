// SPDX-License-Identifier: MIT

//! Registry of workflow executions
//!
//! `start` records a new execution and hands it to a background task; the
//! task is the only writer of that record. `status` clones the current
//! record, so pollers never hold a lock across an await.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ExecutionError, GraphError, RegistryError};
use crate::graph::{
    CompiledGraph, InMemoryCheckpointer, Snapshot, SnapshotObserver, WorkflowEngine,
    WorkflowState,
};
use crate::workflow::backend::InstructionBackend;
use crate::workflow::config::WorkflowConfig;
use crate::workflow::pipeline::build_instructions_graph;
use crate::workflow::state::PROGRESS;

/// Lifecycle of an execution
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Status of one execution as seen by pollers
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub workflow_id: String,
    pub status: ExecutionStatus,
    /// Latest merged state
    pub state: WorkflowState,
    pub progress: f64,
    /// Last stage that completed
    pub current_stage: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    fn new(workflow_id: &str, state: WorkflowState) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: workflow_id.to_string(),
            status: ExecutionStatus::Running,
            progress: state.get_f64(PROGRESS).unwrap_or(0.0),
            state,
            current_stage: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn complete(&mut self, state: WorkflowState) {
        self.progress = state.get_f64(PROGRESS).unwrap_or(self.progress);
        self.state = state;
        self.status = ExecutionStatus::Completed;
        self.updated_at = Utc::now();
    }

    fn fail(&mut self, state: Option<WorkflowState>, error: String) {
        if let Some(state) = state {
            self.state = state;
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}

/// Resource limits applied to every execution
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Executions allowed to run at the same time; others wait for a slot
    pub max_concurrent: usize,
    /// Wall-clock limit per execution, counted once it starts running
    pub timeout: Option<Duration>,
    /// Largest accepted `document_text`, in bytes
    pub max_document_bytes: usize,
    pub max_refinement_attempts: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            timeout: Some(Duration::from_secs(3600)),
            max_document_bytes: 50 * 1024 * 1024,
            max_refinement_attempts: 3,
        }
    }
}

type RecordMap = HashMap<String, Arc<RwLock<ExecutionRecord>>>;

/// Process-wide table of executions
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct WorkflowRegistry {
    graph: Arc<CompiledGraph>,
    engine: Arc<WorkflowEngine>,
    records: Arc<RwLock<RecordMap>>,
    limits: Arc<ExecutionLimits>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl WorkflowRegistry {
    pub fn new(graph: CompiledGraph, engine: WorkflowEngine, limits: ExecutionLimits) -> Self {
        let permits = Arc::new(Semaphore::new(limits.max_concurrent.max(1)));
        Self {
            graph: Arc::new(graph),
            engine: Arc::new(engine),
            records: Arc::new(RwLock::new(HashMap::new())),
            limits: Arc::new(limits),
            permits,
            shutdown: CancellationToken::new(),
        }
    }

    /// Registry running the instructions pipeline with in-memory checkpoints
    pub fn for_backend(
        backend: Arc<dyn InstructionBackend>,
        limits: ExecutionLimits,
    ) -> Result<Self, GraphError> {
        let graph = build_instructions_graph(backend)?;
        let engine = WorkflowEngine::new(Arc::new(InMemoryCheckpointer::new()));
        Ok(Self::new(graph, engine, limits))
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Fresh state carrying the graph's schema defaults
    pub fn initial_state(&self) -> WorkflowState {
        self.graph.initial_state()
    }

    /// Validate a raw JSON payload and start it
    pub async fn start_json(&self, payload: Value) -> Result<String, RegistryError> {
        let config = WorkflowConfig::from_json(payload)?;
        self.start(&config).await
    }

    /// Start the pipeline for `config` and return its workflow id
    ///
    /// Nothing is recorded when the config is rejected.
    pub async fn start(&self, config: &WorkflowConfig) -> Result<String, RegistryError> {
        config.validate(self.limits.max_document_bytes)?;

        let workflow_id = Uuid::new_v4().to_string();
        let mut state = self.graph.initial_state();
        config.populate(&mut state, &workflow_id, self.limits.max_refinement_attempts);

        self.launch(workflow_id.clone(), state).await;
        Ok(workflow_id)
    }

    /// Start the graph from a prepared state
    ///
    /// Build `state` from [`WorkflowRegistry::initial_state`] so the
    /// graph's merge policies apply.
    pub async fn start_with_state(&self, state: WorkflowState) -> String {
        let workflow_id = Uuid::new_v4().to_string();
        self.launch(workflow_id.clone(), state).await;
        workflow_id
    }

    /// Current record for `workflow_id`
    pub async fn status(&self, workflow_id: &str) -> Result<ExecutionRecord, RegistryError> {
        let record = self
            .records
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(workflow_id.to_string()))?;
        let record = record.read().await;
        Ok(record.clone())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Cancel every queued and running execution
    pub fn shutdown(&self) {
        log::info!("Cancelling all workflow executions");
        self.shutdown.cancel();
    }

    async fn launch(&self, workflow_id: String, state: WorkflowState) {
        let record = Arc::new(RwLock::new(ExecutionRecord::new(&workflow_id, state.clone())));
        self.records
            .write()
            .await
            .insert(workflow_id.clone(), record.clone());
        log::info!("Started workflow {}", workflow_id);

        let registry = self.clone();
        tokio::spawn(async move {
            let task = tokio::spawn(registry.run(workflow_id.clone(), state, record.clone()));
            if let Err(e) = task.await {
                log::error!("Workflow {} task aborted: {}", workflow_id, e);
                record
                    .write()
                    .await
                    .fail(None, format!("Execution task aborted: {}", e));
            }
        });
    }

    async fn run(self, workflow_id: String, state: WorkflowState, record: Arc<RwLock<ExecutionRecord>>) {
        let cancel = self.shutdown.child_token();

        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit.ok(),
            _ = cancel.cancelled() => None,
        };
        let Some(_permit) = permit else {
            log::warn!("Workflow {} cancelled before it started", workflow_id);
            record
                .write()
                .await
                .fail(None, ExecutionError::Cancelled.to_string());
            return;
        };

        let timer = self.limits.timeout.map(|timeout| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        });

        let observer = RecordObserver {
            record: record.clone(),
        };
        let outcome = self
            .engine
            .execute(&self.graph, &workflow_id, state, &observer, &cancel)
            .await;

        if let Some(timer) = timer {
            timer.abort();
        }

        let mut record = record.write().await;
        match outcome {
            Ok(state) => {
                log::info!("Workflow {} completed", workflow_id);
                record.complete(state);
            }
            Err(failure) => {
                let error = match failure.error {
                    ExecutionError::Cancelled if !self.shutdown.is_cancelled() => self
                        .limits
                        .timeout
                        .map(|t| ExecutionError::TimedOut {
                            seconds: t.as_secs(),
                        })
                        .unwrap_or(ExecutionError::Cancelled),
                    other => other,
                };
                log::error!("Workflow {} failed: {}", workflow_id, error);
                record.fail(Some(failure.state), error.to_string());
            }
        }
    }
}

/// Publishes snapshots into the execution's record
struct RecordObserver {
    record: Arc<RwLock<ExecutionRecord>>,
}

#[async_trait]
impl SnapshotObserver for RecordObserver {
    async fn on_snapshot(&self, snapshot: &Snapshot) {
        let mut record = self.record.write().await;
        record.progress = snapshot.state.get_f64(PROGRESS).unwrap_or(record.progress);
        record.current_stage = Some(snapshot.stage.clone());
        record.state = snapshot.state.clone();
        record.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Checkpointer, StateGraph, StateSchema, StateUpdate, START};
    use crate::workflow::backend::PlaceholderBackend;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "ocg_term_details": {"term": "Net Revenue"},
            "document_text": "Net revenue was $4.2M.",
            "human_labeled_answer": "$4.2M",
            "referenced_page_texts": ["page 3"],
            "document_name": "report.pdf",
            "project_name": "finance"
        })
    }

    fn pipeline_registry() -> WorkflowRegistry {
        WorkflowRegistry::for_backend(Arc::new(PlaceholderBackend), ExecutionLimits::default())
            .unwrap()
    }

    fn sleeping_graph(delay: Duration) -> CompiledGraph {
        struct Sleep(Duration);

        #[async_trait]
        impl crate::graph::StageExecutor for Sleep {
            async fn execute(&self, _state: &WorkflowState) -> crate::graph::StageResult {
                tokio::time::sleep(self.0).await;
                Ok(StateUpdate::new().set("progress", 100.0))
            }
        }

        let mut graph = StateGraph::new(StateSchema::new());
        graph.add_stage("sleep", Arc::new(Sleep(delay))).unwrap();
        graph.add_edge(START, "sleep").unwrap();
        graph.compile().unwrap()
    }

    async fn wait_terminal(registry: &WorkflowRegistry, id: &str) -> ExecutionRecord {
        for _ in 0..500 {
            let record = registry.status(id).await.unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("workflow {} never finished", id);
    }

    fn in_memory_engine() -> WorkflowEngine {
        WorkflowEngine::new(Arc::new(InMemoryCheckpointer::new()))
    }

    #[tokio::test]
    async fn test_start_returns_while_running() {
        let registry = WorkflowRegistry::new(
            sleeping_graph(Duration::from_millis(200)),
            in_memory_engine(),
            ExecutionLimits::default(),
        );

        let id = registry.start_with_state(WorkflowState::empty()).await;
        let record = registry.status(&id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.progress, 0.0);

        let record = wait_terminal(&registry, &id).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.progress, 100.0);
        assert_eq!(record.current_stage.as_deref(), Some("sleep"));
    }

    #[tokio::test]
    async fn test_pipeline_completes() {
        let registry = pipeline_registry();
        let id = registry.start_json(payload()).await.unwrap();

        let record = wait_terminal(&registry, &id).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.current_stage.as_deref(), Some("ai_instructions_verifier"));
        assert_eq!(record.state.get_str("workflow_id"), Some(id.as_str()));
        assert_eq!(record.state.get_array("judgement").len(), 4);
        assert!(record.error.is_none());

        let history = registry.engine().checkpointer().history(&id).await.unwrap();
        assert_eq!(history.first().map(|c| c.stage.as_str()), Some(START));
    }

    #[tokio::test]
    async fn test_invalid_payload_creates_no_record() {
        let registry = pipeline_registry();
        let mut value = payload();
        value.as_object_mut().unwrap().remove("document_name");

        let err = registry.start_json(value).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_oversized_document_rejected() {
        let limits = ExecutionLimits {
            max_document_bytes: 8,
            ..ExecutionLimits::default()
        };
        let registry = WorkflowRegistry::for_backend(Arc::new(PlaceholderBackend), limits).unwrap();

        let err = registry.start_json(payload()).await.unwrap_err();
        assert!(matches!(err, RegistryError::PayloadTooLarge { .. }));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let registry = pipeline_registry();
        let err = registry.status("missing").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(err.to_string(), "Workflow not found");
    }

    #[tokio::test]
    async fn test_status_idempotent_once_terminal() {
        let registry = pipeline_registry();
        let id = registry.start_json(payload()).await.unwrap();
        let first = wait_terminal(&registry, &id).await;

        let second = registry.status(&id).await.unwrap();
        assert_eq!(second.status, first.status);
        assert_eq!(second.updated_at, first.updated_at);
        assert_eq!(second.state.to_json(), first.state.to_json());
    }

    #[tokio::test]
    async fn test_stage_error_marks_failed() {
        let mut graph = StateGraph::new(StateSchema::new().append("trail"));
        graph
            .add_fn_stage("first", |_| Ok(StateUpdate::new().set("trail", "first")))
            .unwrap();
        graph
            .add_fn_stage("broken", |_| Err("backend unavailable".into()))
            .unwrap();
        graph.add_edge(START, "first").unwrap();
        graph.add_edge("first", "broken").unwrap();

        let registry =
            WorkflowRegistry::new(graph.compile().unwrap(), in_memory_engine(), ExecutionLimits::default());
        let id = registry.start_with_state(registry.initial_state()).await;

        let record = wait_terminal(&registry, &id).await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.unwrap().contains("backend unavailable"));
        assert_eq!(record.state.get("trail"), Some(&json!(["first"])));
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let limits = ExecutionLimits {
            timeout: Some(Duration::from_millis(50)),
            ..ExecutionLimits::default()
        };
        let registry = WorkflowRegistry::new(
            sleeping_graph(Duration::from_secs(30)),
            in_memory_engine(),
            limits,
        );

        let id = registry.start_with_state(WorkflowState::empty()).await;
        let record = wait_terminal(&registry, &id).await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued() {
        let limits = ExecutionLimits {
            max_concurrent: 1,
            ..ExecutionLimits::default()
        };
        let registry = WorkflowRegistry::new(
            sleeping_graph(Duration::from_secs(30)),
            in_memory_engine(),
            limits,
        );

        let running = registry.start_with_state(WorkflowState::empty()).await;
        let queued = registry.start_with_state(WorkflowState::empty()).await;
        registry.shutdown();

        for id in [running, queued] {
            let record = wait_terminal(&registry, &id).await;
            assert_eq!(record.status, ExecutionStatus::Failed);
            assert_eq!(record.error.as_deref(), Some("Workflow cancelled"));
        }
    }
}
