// SPDX-License-Identifier: MIT

//! Graph type definitions

use crate::postgen::agents::Step;
use crate::postgen::workflow::state::{Field, GenerationState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Edge target that terminates the run
pub const END: &str = "__end__";

/// How to wait for predecessors
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// Wait for ALL predecessors to arrive (default)
    #[default]
    All,
    /// Run when ANY predecessor arrives
    Any,
}

/// What a node does when scheduled
#[derive(Clone)]
pub enum NodeKind {
    Step(Arc<dyn Step>),
    /// Suspends the run until a review is present on the state
    Interrupt,
}

/// Compiled node ready for execution
#[derive(Clone)]
pub struct CompiledNode {
    pub id: String,
    pub kind: NodeKind,
    /// Every node with an edge (direct or conditional) into this one
    pub depends_on: Vec<String>,
    pub wait_mode: WaitMode,
}

impl CompiledNode {
    /// Fields the node may write; interrupts write nothing
    pub fn writes(&self) -> &'static [Field] {
        match &self.kind {
            NodeKind::Step(step) => step.writes(),
            NodeKind::Interrupt => &[],
        }
    }
}

/// Maps the state after a node to a branch label
pub type BranchFn = Arc<dyn Fn(&GenerationState) -> String + Send + Sync>;

/// Outgoing edges of one node
#[derive(Clone)]
pub enum Edge {
    /// Always continue to every listed target
    Direct(Vec<String>),
    /// Evaluate the condition, then continue to the branch's targets
    Conditional {
        condition: BranchFn,
        branches: HashMap<String, Vec<String>>,
    },
}

impl Edge {
    /// Every node this edge could ever lead to
    pub fn all_targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(targets) => targets.iter().map(String::as_str).collect(),
            Edge::Conditional { branches, .. } => branches
                .values()
                .flat_map(|t| t.iter().map(String::as_str))
                .collect(),
        }
    }
}

/// Progress reported while a graph runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    NodeStart {
        node: String,
        superstep: usize,
    },
    NodeEnd {
        node: String,
        superstep: usize,
        fields: Vec<Field>,
    },
    Progress {
        superstep: usize,
        refinement_count: u32,
        message: String,
    },
    AwaitingReview {
        session_id: String,
        draft: String,
    },
    Complete {
        final_post: String,
        refinement_count: u32,
    },
    Error {
        message: String,
    },
}

impl WorkflowEvent {
    /// SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::NodeStart { .. } => "node_start",
            WorkflowEvent::NodeEnd { .. } => "node_end",
            WorkflowEvent::Progress { .. } => "progress",
            WorkflowEvent::AwaitingReview { .. } => "awaiting_review",
            WorkflowEvent::Complete { .. } => "complete",
            WorkflowEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_mode_default() {
        assert_eq!(WaitMode::default(), WaitMode::All);
    }

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::NodeEnd {
            node: "writer".to_string(),
            superstep: 2,
            fields: vec![Field::Draft, Field::Writer],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node_end");
        assert_eq!(json["fields"][0], "draft");
        assert_eq!(event.kind(), "node_end");
    }

    #[test]
    fn test_conditional_targets() {
        let edge = Edge::Conditional {
            condition: Arc::new(|_| "end".to_string()),
            branches: HashMap::from([
                ("refine".to_string(), vec!["writer".to_string()]),
                ("end".to_string(), vec![END.to_string()]),
            ]),
        };
        let mut targets = edge.all_targets();
        targets.sort();
        assert_eq!(targets, vec![END, "writer"]);
    }
}
