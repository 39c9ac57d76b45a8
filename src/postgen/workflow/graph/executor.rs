// SPDX-License-Identifier: MIT

//! Graph executor
//!
//! Runs in supersteps. Every node in the frontier sees the same state
//! snapshot and runs concurrently; their updates are checked against the
//! nodes' declared writes and applied together at the barrier. Completed
//! nodes then deliver arrivals along their edges, and a node joins the next
//! frontier once its wait mode is satisfied.

use crate::adk::error::{PostgenError, WorkflowError};
use crate::postgen::workflow::state::{Field, GenerationState, RunStatus, StateUpdate};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;

use super::checkpoint::Checkpoint;
use super::types::{CompiledNode, Edge, NodeKind, WaitMode, WorkflowEvent, END};

/// Safety limit on supersteps per invocation
pub const MAX_SUPERSTEPS: usize = 100;

/// How an invocation stopped
#[derive(Debug)]
pub enum RunOutcome {
    Completed(GenerationState),
    /// Stopped at an interrupt; resume from the checkpoint
    Suspended(Checkpoint),
}

type Arrivals = HashMap<String, BTreeSet<String>>;

/// Compiled, validated graph
pub struct GraphRunner {
    name: String,
    entry: String,
    nodes: HashMap<String, CompiledNode>,
    node_order: Vec<String>, // Insertion order for deterministic scheduling
    edges: HashMap<String, Edge>,
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

impl GraphRunner {
    pub(super) fn new(
        name: String,
        entry: String,
        nodes: Vec<CompiledNode>,
        edges: HashMap<String, Edge>,
    ) -> Self {
        let node_order: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            name,
            entry,
            nodes,
            node_order,
            edges,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: &str) -> Option<&CompiledNode> {
        self.nodes.get(id)
    }

    /// Run from the entry node
    pub async fn invoke(
        &self,
        state: GenerationState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, PostgenError> {
        self.run_from(state, vec![self.entry.clone()], Arrivals::new(), events)
            .await
    }

    /// Continue a suspended run
    pub async fn resume(
        &self,
        checkpoint: Checkpoint,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, PostgenError> {
        checkpoint.state.check_version()?;
        if let Some(unknown) = checkpoint
            .frontier
            .iter()
            .find(|id| !self.nodes.contains_key(*id))
        {
            return Err(WorkflowError::UnknownNode(unknown.clone()).into());
        }
        self.run_from(
            checkpoint.state,
            checkpoint.frontier,
            checkpoint.arrivals,
            events,
        )
        .await
    }

    async fn run_from(
        &self,
        mut state: GenerationState,
        mut frontier: Vec<String>,
        mut arrivals: Arrivals,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, PostgenError> {
        state.status = RunStatus::Running;
        let mut superstep = 0;

        while !frontier.is_empty() {
            superstep += 1;
            if superstep > MAX_SUPERSTEPS {
                log::error!("Graph '{}' exceeded {} supersteps", self.name, MAX_SUPERSTEPS);
                return Err(WorkflowError::MaxSupersteps(MAX_SUPERSTEPS).into());
            }

            let interrupted = frontier
                .iter()
                .any(|id| matches!(self.nodes[id].kind, NodeKind::Interrupt));
            if interrupted && state.review.is_none() {
                log::info!(
                    "Graph '{}' suspended for review (session {})",
                    self.name,
                    state.input.session_id
                );
                state.status = RunStatus::AwaitingReview;
                emit(
                    events,
                    WorkflowEvent::AwaitingReview {
                        session_id: state.input.session_id.clone(),
                        draft: state.draft.clone(),
                    },
                )
                .await;
                return Ok(RunOutcome::Suspended(Checkpoint {
                    state,
                    frontier,
                    arrivals,
                }));
            }

            log::info!(
                "Graph superstep {}: executing {} nodes: {:?}",
                superstep,
                frontier.len(),
                frontier
            );
            for id in &frontier {
                emit(
                    events,
                    WorkflowEvent::NodeStart {
                        node: id.clone(),
                        superstep,
                    },
                )
                .await;
            }

            let results = {
                let snapshot = &state;
                join_all(
                    frontier
                        .iter()
                        .map(|id| self.execute_node(&self.nodes[id], snapshot)),
                )
                .await
            };

            let mut updates = Vec::with_capacity(results.len());
            for (id, result) in frontier.iter().zip(results) {
                match result {
                    Ok(update) => updates.push((id.as_str(), update)),
                    Err(e) => {
                        log::error!("Node {} failed: {}", id, e);
                        return Err(e);
                    }
                }
            }
            self.check_writes(&updates)?;

            for (id, update) in updates {
                let fields = update
                    .as_ref()
                    .map(|u| u.fields().to_vec())
                    .unwrap_or_default();
                if let Some(update) = update {
                    state.apply(update)?;
                }
                log::info!("Node {} completed", id);
                emit(
                    events,
                    WorkflowEvent::NodeEnd {
                        node: id.to_string(),
                        superstep,
                        fields,
                    },
                )
                .await;
            }

            for id in &frontier {
                for target in self.next_targets(id, &state)? {
                    if target != END {
                        arrivals.entry(target).or_default().insert(id.clone());
                    }
                }
            }
            frontier = self.ready_nodes(&mut arrivals);

            emit(
                events,
                WorkflowEvent::Progress {
                    superstep,
                    refinement_count: state.refinement_count,
                    message: if frontier.is_empty() {
                        "finishing".to_string()
                    } else {
                        format!("next: {}", frontier.join(", "))
                    },
                },
            )
            .await;
        }

        state.status = RunStatus::Completed;
        Ok(RunOutcome::Completed(state))
    }

    /// Run one node; interrupts that reach here already have their review
    async fn execute_node(
        &self,
        node: &CompiledNode,
        state: &GenerationState,
    ) -> Result<Option<StateUpdate>, PostgenError> {
        match &node.kind {
            NodeKind::Step(step) => {
                log::debug!("Executing node {} (reads {:?})", node.id, step.reads());
                step.run(state).await.map(Some)
            }
            NodeKind::Interrupt => Ok(None),
        }
    }

    /// Every update stays inside its node's declared writes, and parallel
    /// updates never touch the same field
    fn check_writes(&self, updates: &[(&str, Option<StateUpdate>)]) -> Result<(), WorkflowError> {
        let mut written: HashMap<Field, &str> = HashMap::new();
        for (id, update) in updates {
            let Some(update) = update else { continue };
            let allowed = self.nodes[*id].writes();
            for field in update.fields() {
                if !allowed.contains(field) {
                    return Err(WorkflowError::UndeclaredWrite {
                        node: id.to_string(),
                        field: field.as_str().to_string(),
                    });
                }
                if let Some(first) = written.insert(*field, *id) {
                    return Err(WorkflowError::ConflictingWrites {
                        field: field.as_str().to_string(),
                        first: first.to_string(),
                        second: id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn next_targets(&self, id: &str, state: &GenerationState) -> Result<Vec<String>, WorkflowError> {
        match self.edges.get(id) {
            None => Ok(Vec::new()),
            Some(Edge::Direct(targets)) => Ok(targets.clone()),
            Some(Edge::Conditional {
                condition,
                branches,
            }) => {
                let branch = condition(state);
                log::debug!("Node {} routed to '{}'", id, branch);
                branches
                    .get(&branch)
                    .cloned()
                    .ok_or_else(|| WorkflowError::UnknownBranch {
                        node: id.to_string(),
                        branch,
                    })
            }
        }
    }

    /// Nodes whose wait mode is satisfied; their arrivals are consumed
    fn ready_nodes(&self, arrivals: &mut Arrivals) -> Vec<String> {
        let ready: Vec<String> = self
            .node_order
            .iter()
            .filter(|id| {
                let node = &self.nodes[*id];
                match arrivals.get(*id) {
                    None => false,
                    Some(arrived) if arrived.is_empty() => false,
                    Some(arrived) => match node.wait_mode {
                        WaitMode::All => node.depends_on.iter().all(|d| arrived.contains(d)),
                        WaitMode::Any => true,
                    },
                }
            })
            .cloned()
            .collect();

        for id in &ready {
            arrivals.remove(id);
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::evaluator::Scores;
    use crate::postgen::agents::Step;
    use crate::postgen::workflow::gate::QualityChecks;
    use crate::postgen::workflow::graph::GraphBuilder;
    use crate::postgen::workflow::review::ReviewInput;
    use crate::postgen::workflow::state::{GenerationInput, SentimentAnalysis, SeoMetrics};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Step that returns whatever its function builds from the snapshot
    struct FnStep {
        name: &'static str,
        writes: &'static [Field],
        update: fn(&GenerationState) -> StateUpdate,
        calls: AtomicUsize,
    }

    impl FnStep {
        fn new(
            name: &'static str,
            writes: &'static [Field],
            update: fn(&GenerationState) -> StateUpdate,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                writes,
                update,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Step for FnStep {
        fn name(&self) -> &str {
            self.name
        }
        fn reads(&self) -> &'static [Field] {
            &[]
        }
        fn writes(&self) -> &'static [Field] {
            self.writes
        }
        async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((self.update)(state))
        }
    }

    fn initial_state() -> GenerationState {
        GenerationState::new(
            GenerationInput {
                user_id: "u".to_string(),
                session_id: "session-u-12345678".to_string(),
                topic: "t".to_string(),
                platform: "linkedin".to_string(),
                tone: None,
                content_type: None,
                human_force_publish: false,
            },
            1,
        )
    }

    fn draft_step(name: &'static str) -> Arc<FnStep> {
        FnStep::new(name, &[Field::Draft, Field::Writer, Field::Review], |s| {
            StateUpdate::Draft {
                draft: format!("draft {}", s.refinement_count),
                writer: "w".to_string(),
            }
        })
    }

    fn scores_step() -> Arc<FnStep> {
        FnStep::new("scores", &[Field::Scores], |_| {
            StateUpdate::Scores(Scores::from([("faithfulness".to_string(), 0.9)]))
        })
    }

    fn sentiment_step() -> Arc<FnStep> {
        FnStep::new("sentiment", &[Field::SentimentAnalysis], |_| {
            StateUpdate::Sentiment(SentimentAnalysis {
                sentiment_score: 0.8,
                detected_tone: "professional".to_string(),
                tone_match: true,
            })
        })
    }

    fn seo_step() -> Arc<FnStep> {
        FnStep::new("seo", &[Field::SeoMetrics], |_| {
            StateUpdate::Seo(SeoMetrics {
                keyword_density: 1.0,
                readability_score: 0.8,
                word_count: 3,
                optimal_length: true,
                hashtag_count: 0,
            })
        })
    }

    /// Merge that records whether all three analyses were visible
    fn join_step() -> Arc<FnStep> {
        FnStep::new(
            "join",
            &[Field::QualityChecks, Field::NeedsRefinement, Field::Feedback],
            |s| StateUpdate::Merge {
                quality_checks: QualityChecks::default(),
                needs_refinement: !(s.scores.contains_key("faithfulness")
                    && s.sentiment_analysis.is_some()
                    && s.seo_metrics.is_some()),
                feedback: "joined".to_string(),
            },
        )
    }

    fn completed(outcome: RunOutcome) -> GenerationState {
        match outcome {
            RunOutcome::Completed(state) => state,
            RunOutcome::Suspended(_) => panic!("run suspended unexpectedly"),
        }
    }

    #[tokio::test]
    async fn test_fan_out_fan_in_barrier() {
        let join = join_step();
        let runner = GraphBuilder::new("fan")
            .add_step(draft_step("draft"))
            .add_step(scores_step())
            .add_step(sentiment_step())
            .add_step(seo_step())
            .add_step(join.clone())
            .set_entry("draft")
            .add_edge("draft", &["scores", "sentiment", "seo"])
            .add_edge("scores", &["join"])
            .add_edge("sentiment", &["join"])
            .add_edge("seo", &["join"])
            .add_edge("join", &[END])
            .compile()
            .unwrap();

        let (tx, mut rx) = mpsc::channel(100);
        let state = completed(runner.invoke(initial_state(), Some(&tx)).await.unwrap());
        drop(tx);

        assert_eq!(join.calls.load(Ordering::SeqCst), 1);
        assert!(!state.needs_refinement);
        assert_eq!(state.feedback.as_deref(), Some("joined"));
        assert_eq!(state.status, RunStatus::Completed);

        let mut starts = Vec::new();
        while let Some(event) = rx.recv().await {
            if let WorkflowEvent::NodeStart { node, superstep } = event {
                starts.push((superstep, node));
            }
        }
        assert_eq!(
            starts,
            vec![
                (1, "draft".to_string()),
                (2, "scores".to_string()),
                (2, "sentiment".to_string()),
                (2, "seo".to_string()),
                (3, "join".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_undeclared_write_rejected() {
        let sneaky = FnStep::new("sneaky", &[Field::Draft], |_| StateUpdate::Finish {
            final_post: "x".to_string(),
            acceptance: crate::postgen::workflow::state::Acceptance::Passed,
        });
        let runner = GraphBuilder::new("g")
            .add_step(sneaky)
            .set_entry("sneaky")
            .compile()
            .unwrap();

        let err = runner.invoke(initial_state(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PostgenError::Workflow(WorkflowError::UndeclaredWrite { ref node, .. }) if node == "sneaky"
        ));
    }

    #[tokio::test]
    async fn test_parallel_writes_must_be_disjoint() {
        let runner = GraphBuilder::new("g")
            .add_step(draft_step("start"))
            .add_step(scores_step())
            .add_step(FnStep::new("also_scores", &[Field::Scores], |_| {
                StateUpdate::Scores(Scores::new())
            }))
            .set_entry("start")
            .add_edge("start", &["scores", "also_scores"])
            .compile()
            .unwrap();

        let err = runner.invoke(initial_state(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PostgenError::Workflow(WorkflowError::ConflictingWrites { ref field, .. }) if field == "scores"
        ));
    }

    #[tokio::test]
    async fn test_unknown_branch() {
        let runner = GraphBuilder::new("g")
            .add_step(draft_step("a"))
            .set_entry("a")
            .add_conditional_edge("a", |_| "sideways".to_string(), &[("end", &[END])])
            .compile()
            .unwrap();

        let err = runner.invoke(initial_state(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PostgenError::Workflow(WorkflowError::UnknownBranch { ref branch, .. }) if branch == "sideways"
        ));
    }

    #[tokio::test]
    async fn test_superstep_limit() {
        let runner = GraphBuilder::new("spin")
            .add_step(draft_step("spin"))
            .set_entry("spin")
            .add_conditional_edge("spin", |_| "again".to_string(), &[("again", &["spin"])])
            .compile()
            .unwrap();

        let err = runner.invoke(initial_state(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PostgenError::Workflow(WorkflowError::MaxSupersteps(MAX_SUPERSTEPS))
        ));
    }

    #[tokio::test]
    async fn test_interrupt_suspends_and_resumes() {
        let after = scores_step();
        let runner = GraphBuilder::new("review")
            .add_step(draft_step("draft"))
            .add_interrupt("review")
            .add_step(after.clone())
            .set_entry("draft")
            .add_edge("draft", &["review"])
            .add_edge("review", &["scores"])
            .compile()
            .unwrap();

        let outcome = runner.invoke(initial_state(), None).await.unwrap();
        let mut checkpoint = match outcome {
            RunOutcome::Suspended(cp) => cp,
            RunOutcome::Completed(_) => panic!("expected suspension"),
        };
        assert_eq!(checkpoint.state.status, RunStatus::AwaitingReview);
        assert_eq!(checkpoint.frontier, vec!["review".to_string()]);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);

        // Resuming without a review just suspends again
        let again = runner.resume(checkpoint.clone(), None).await.unwrap();
        assert!(matches!(again, RunOutcome::Suspended(_)));

        checkpoint
            .state
            .apply(StateUpdate::Review(ReviewInput::approve()))
            .unwrap();
        let state = completed(runner.resume(checkpoint, None).await.unwrap());
        assert_eq!(after.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_resume_rejects_unknown_frontier() {
        let runner = GraphBuilder::new("g")
            .add_step(draft_step("a"))
            .set_entry("a")
            .compile()
            .unwrap();
        let checkpoint = Checkpoint {
            state: initial_state(),
            frontier: vec!["ghost".to_string()],
            arrivals: Arrivals::new(),
        };
        let err = runner.resume(checkpoint, None).await.unwrap_err();
        assert!(matches!(err, PostgenError::Workflow(WorkflowError::UnknownNode(_))));
    }
}
