// SPDX-License-Identifier: MIT

//! Graph builder - declares stages and edges, then compiles them
//!
//! Building a graph never runs anything. `compile` validates the structure
//! and produces an immutable [`CompiledGraph`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::GraphError;
use crate::graph::compiled::{CompiledGraph, ConditionalEdge, Transition};
use crate::graph::route::RouteLabel;
use crate::graph::stage::{FnStage, StageExecutor, StageResult};
use crate::graph::state::{StateSchema, WorkflowState};
use crate::graph::{END, START};

/// Declarative graph of named stages, edges and routing functions
pub struct StateGraph {
    schema: Arc<StateSchema>,
    stages: HashMap<String, Arc<dyn StageExecutor>>,
    stage_order: Vec<String>,
    transitions: HashMap<String, Transition>,
}

impl StateGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            stages: HashMap::new(),
            stage_order: Vec::new(),
            transitions: HashMap::new(),
        }
    }

    /// Register a stage under a unique name
    pub fn add_stage(
        &mut self,
        name: &str,
        stage: Arc<dyn StageExecutor>,
    ) -> Result<(), GraphError> {
        if name == START || name == END {
            return Err(GraphError::Validation(format!(
                "'{}' is a reserved node name",
                name
            )));
        }
        if self.stages.contains_key(name) {
            return Err(GraphError::DuplicateStage(name.to_string()));
        }

        self.stages.insert(name.to_string(), stage);
        self.stage_order.push(name.to_string());
        Ok(())
    }

    /// Register a synchronous closure as a stage
    pub fn add_fn_stage<F>(&mut self, name: &str, func: F) -> Result<(), GraphError>
    where
        F: Fn(&WorkflowState) -> StageResult + Send + Sync + 'static,
    {
        self.add_stage(name, Arc::new(FnStage::new(func)))
    }

    /// Add an unconditional edge
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.check_source(from)?;
        self.check_target(to)?;

        self.transitions
            .insert(from.to_string(), Transition::Direct(to.to_string()));
        Ok(())
    }

    /// Add a conditional edge whose destination is picked by `router`
    ///
    /// `mapping` pairs each label with its destination stage (or END).
    pub fn add_conditional_edge<L, F, I, S>(
        &mut self,
        from: &str,
        router: F,
        mapping: I,
    ) -> Result<(), GraphError>
    where
        L: RouteLabel,
        F: Fn(&WorkflowState) -> L + Send + Sync + 'static,
        I: IntoIterator<Item = (L, S)>,
        S: AsRef<str>,
    {
        self.check_source(from)?;

        let mut destinations = HashMap::new();
        for (label, to) in mapping {
            let to = to.as_ref();
            self.check_target(to)?;
            destinations.insert(label.to_string(), to.to_string());
        }

        let declared: Option<Vec<String>> =
            L::variants().map(|labels| labels.iter().map(ToString::to_string).collect());

        self.transitions.insert(
            from.to_string(),
            Transition::Conditional(ConditionalEdge {
                router: Arc::new(move |state: &WorkflowState| router(state).to_string()),
                destinations,
                declared,
            }),
        );
        Ok(())
    }

    /// Validate the graph and produce an executable plan
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        if !self.transitions.contains_key(START) {
            return Err(GraphError::Validation(
                "No edge leaves START; the graph has no entry point".to_string(),
            ));
        }

        for (from, transition) in &self.transitions {
            if let Transition::Conditional(edge) = transition {
                if edge.destinations.is_empty() {
                    return Err(GraphError::Validation(format!(
                        "Conditional edge from '{}' has an empty label set",
                        from
                    )));
                }
                if let Some(declared) = &edge.declared {
                    if let Some(missing) = declared
                        .iter()
                        .find(|label| !edge.destinations.contains_key(*label))
                    {
                        return Err(GraphError::Validation(format!(
                            "Label '{}' of the conditional edge from '{}' has no destination",
                            missing, from
                        )));
                    }
                }
            }
        }

        let reachable = self.reachable_from_start();
        if let Some(orphan) = self
            .stage_order
            .iter()
            .find(|name| !reachable.contains(name.as_str()))
        {
            return Err(GraphError::Validation(format!(
                "Stage '{}' is unreachable from START",
                orphan
            )));
        }

        log::debug!(
            "Compiled graph with {} stages and {} transitions",
            self.stage_order.len(),
            self.transitions.len()
        );

        Ok(CompiledGraph::new(
            self.schema.clone(),
            self.stages.clone(),
            self.stage_order.clone(),
            self.transitions.clone(),
        ))
    }

    fn reachable_from_start(&self) -> HashSet<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([START]);

        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            if let Some(transition) = self.transitions.get(node) {
                queue.extend(transition.targets());
            }
        }
        seen
    }

    fn check_source(&self, from: &str) -> Result<(), GraphError> {
        if from == END {
            return Err(GraphError::Validation(
                "END cannot have outgoing edges".to_string(),
            ));
        }
        if from != START && !self.stages.contains_key(from) {
            return Err(GraphError::UnknownStage(from.to_string()));
        }
        if self.transitions.contains_key(from) {
            return Err(GraphError::DuplicateEdge(from.to_string()));
        }
        Ok(())
    }

    fn check_target(&self, to: &str) -> Result<(), GraphError> {
        if to == START {
            return Err(GraphError::Validation(
                "Edges cannot lead back to START".to_string(),
            ));
        }
        if to != END && !self.stages.contains_key(to) {
            return Err(GraphError::UnknownStage(to.to_string()));
        }
        Ok(())
    }
}
