// SPDX-License-Identifier: MIT

//! Compiled, immutable execution plan

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::graph::stage::StageExecutor;
use crate::graph::state::{StateSchema, WorkflowState};
use crate::graph::END;

/// Type-erased routing function returning a label
pub(crate) type Router = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// The single outgoing transition of a node
#[derive(Clone)]
pub(crate) enum Transition {
    /// Unconditional edge
    Direct(String),
    /// Destination chosen by a routing function
    Conditional(ConditionalEdge),
}

#[derive(Clone)]
pub(crate) struct ConditionalEdge {
    pub(crate) router: Router,
    /// Label to destination node
    pub(crate) destinations: HashMap<String, String>,
    /// Closed label set declared by the label type, if any
    pub(crate) declared: Option<Vec<String>>,
}

impl Transition {
    /// Every node this transition can lead to
    pub(crate) fn targets(&self) -> Vec<&str> {
        match self {
            Transition::Direct(to) => vec![to.as_str()],
            Transition::Conditional(edge) => {
                edge.destinations.values().map(String::as_str).collect()
            }
        }
    }
}

/// Validated stage graph, safe for concurrent read-only use by many executions
pub struct CompiledGraph {
    schema: Arc<StateSchema>,
    stages: HashMap<String, Arc<dyn StageExecutor>>,
    stage_order: Vec<String>,
    transitions: HashMap<String, Transition>,
}

impl CompiledGraph {
    pub(crate) fn new(
        schema: Arc<StateSchema>,
        stages: HashMap<String, Arc<dyn StageExecutor>>,
        stage_order: Vec<String>,
        transitions: HashMap<String, Transition>,
    ) -> Self {
        Self {
            schema,
            stages,
            stage_order,
            transitions,
        }
    }

    /// The state schema every execution of this graph uses
    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Fresh state seeded with the schema defaults
    pub fn initial_state(&self) -> WorkflowState {
        WorkflowState::new(self.schema.clone())
    }

    pub fn stage(&self, name: &str) -> Option<&Arc<dyn StageExecutor>> {
        self.stages.get(name)
    }

    /// Stage names in registration order
    pub fn stage_names(&self) -> &[String] {
        &self.stage_order
    }

    /// Possible successors of a node, sorted
    pub fn successors(&self, from: &str) -> Vec<String> {
        let mut targets: Vec<String> = match self.transitions.get(from) {
            Some(transition) => transition.targets().into_iter().map(String::from).collect(),
            None => vec![END.to_string()],
        };
        targets.sort();
        targets.dedup();
        targets
    }

    /// Resolve the node that follows `from` for the given post-merge state
    ///
    /// A node without an outgoing edge transitions to END.
    pub fn next_node(&self, from: &str, state: &WorkflowState) -> Result<String, ExecutionError> {
        match self.transitions.get(from) {
            None => Ok(END.to_string()),
            Some(Transition::Direct(to)) => Ok(to.clone()),
            Some(Transition::Conditional(edge)) => {
                let label = (edge.router)(state);
                match edge.destinations.get(&label) {
                    Some(to) => Ok(to.clone()),
                    None => Err(ExecutionError::Routing {
                        stage: from.to_string(),
                        label,
                    }),
                }
            }
        }
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("stages", &self.stage_order)
            .field("transition_count", &self.transitions.len())
            .finish()
    }
}
