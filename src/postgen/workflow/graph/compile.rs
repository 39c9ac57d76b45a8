// SPDX-License-Identifier: MIT

//! Graph builder - wires nodes and edges, then validates them into a runner

use crate::adk::error::WorkflowError;
use crate::postgen::agents::Step;
use crate::postgen::workflow::state::GenerationState;
use std::collections::HashMap;
use std::sync::Arc;

use super::executor::GraphRunner;
use super::types::{CompiledNode, Edge, NodeKind, WaitMode, END};

pub struct GraphBuilder {
    name: String,
    nodes: Vec<(String, NodeKind)>,
    wait_modes: HashMap<String, WaitMode>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            wait_modes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    /// Add a step node, identified by the step's name
    pub fn add_step(mut self, step: Arc<dyn Step>) -> Self {
        self.nodes.push((step.name().to_string(), NodeKind::Step(step)));
        self
    }

    /// Add a suspension point for human review
    pub fn add_interrupt(mut self, id: &str) -> Self {
        self.nodes.push((id.to_string(), NodeKind::Interrupt));
        self
    }

    pub fn set_entry(mut self, id: &str) -> Self {
        self.entry = Some(id.to_string());
        self
    }

    /// Unconditional edge; several targets fan out
    pub fn add_edge(mut self, from: &str, to: &[&str]) -> Self {
        self.edges.insert(
            from.to_string(),
            Edge::Direct(to.iter().map(|t| t.to_string()).collect()),
        );
        self
    }

    pub fn add_conditional_edge<F>(
        mut self,
        from: &str,
        condition: F,
        branches: &[(&str, &[&str])],
    ) -> Self
    where
        F: Fn(&GenerationState) -> String + Send + Sync + 'static,
    {
        let branches = branches
            .iter()
            .map(|(label, targets)| {
                (
                    label.to_string(),
                    targets.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        self.edges.insert(
            from.to_string(),
            Edge::Conditional {
                condition: Arc::new(condition),
                branches,
            },
        );
        self
    }

    /// Run `id` as soon as any predecessor arrives instead of waiting for all
    pub fn wait_any(mut self, id: &str) -> Self {
        self.wait_modes.insert(id.to_string(), WaitMode::Any);
        self
    }

    pub fn compile(self) -> Result<GraphRunner, WorkflowError> {
        let entry = self
            .entry
            .ok_or_else(|| WorkflowError::MissingEntry(self.name.clone()))?;

        let known = |id: &str| self.nodes.iter().any(|(n, _)| n == id);
        if !known(&entry) {
            return Err(WorkflowError::UnknownNode(entry));
        }

        let mut depends_on: HashMap<String, Vec<String>> = HashMap::new();
        for (from, edge) in &self.edges {
            if !known(from) {
                return Err(WorkflowError::UnknownNode(from.clone()));
            }
            for target in edge.all_targets() {
                if target == END {
                    continue;
                }
                if !known(target) {
                    return Err(WorkflowError::UnknownNode(target.to_string()));
                }
                let preds = depends_on.entry(target.to_string()).or_default();
                if !preds.contains(from) {
                    preds.push(from.clone());
                }
            }
        }

        let nodes = self
            .nodes
            .into_iter()
            .map(|(id, kind)| {
                let mut preds = depends_on.remove(&id).unwrap_or_default();
                preds.sort();
                CompiledNode {
                    wait_mode: self.wait_modes.get(&id).copied().unwrap_or_default(),
                    depends_on: preds,
                    kind,
                    id,
                }
            })
            .collect();

        Ok(GraphRunner::new(self.name, entry, nodes, self.edges))
    }
}
