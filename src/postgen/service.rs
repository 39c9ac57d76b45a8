// SPDX-License-Identifier: MIT

//! Post generator - runs the graph for a request and manages suspended runs

use crate::adk::error::PostgenError;
use crate::adk::evaluator::Scores;
use crate::postgen::agents::Deps;
use crate::postgen::config::AppConfig;
use crate::postgen::workflow::build_post_graph;
use crate::postgen::workflow::graph::{
    Checkpoint, Checkpointer, GraphRunner, RunOutcome, WorkflowEvent,
};
use crate::postgen::workflow::state::{
    Acceptance, GenerationInput, GenerationState, RunStatus, SentimentAnalysis, SeoMetrics,
    StateUpdate,
};
use crate::postgen::workflow::{QualityChecks, ReviewInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One request to generate a post
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub user_id: String,
    pub session_id: String,
    pub topic: String,
    pub platform: String,
    pub tone: Option<String>,
    pub content_type: Option<String>,
    /// Overrides the configured refinement cap
    pub max_refinements: Option<u32>,
    pub human_force_publish: bool,
    /// Overrides the configured review setting
    pub review: Option<bool>,
}

/// A finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub session_id: String,
    pub final_post: String,
    pub writer: String,
    pub tone: String,
    pub acceptance: Acceptance,
    pub refinement_count: u32,
    pub quality_checks: QualityChecks,
    pub scores: Scores,
    pub sentiment_analysis: Option<SentimentAnalysis>,
    pub seo_metrics: Option<SeoMetrics>,
    pub feedback: Option<String>,
    pub sources: usize,
}

impl GenerationResult {
    fn from_state(state: GenerationState) -> Result<Self, PostgenError> {
        let final_post = state.final_post.ok_or_else(|| {
            PostgenError::generation("workflow", "run completed without a final post")
        })?;
        Ok(Self {
            session_id: state.input.session_id,
            final_post,
            writer: state.writer,
            tone: state.tone,
            acceptance: state.acceptance.unwrap_or(Acceptance::CapReached),
            refinement_count: state.refinement_count,
            quality_checks: state.quality_checks,
            scores: state.scores,
            sentiment_analysis: state.sentiment_analysis,
            seo_metrics: state.seo_metrics,
            feedback: state.feedback,
            sources: state.retrieved_docs.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed(GenerationResult),
    AwaitingReview {
        session_id: String,
        draft: String,
        writer: String,
        refinement_count: u32,
    },
}

pub struct PostGenerator {
    graph: GraphRunner,
    review_graph: GraphRunner,
    checkpointer: Arc<dyn Checkpointer>,
    max_refinements: u32,
    review_by_default: bool,
}

impl PostGenerator {
    pub fn new(
        deps: Deps,
        config: &AppConfig,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Result<Self, PostgenError> {
        let top_k = config.retrieval.top_k;
        Ok(Self {
            graph: build_post_graph(&deps, &config.quality, top_k, false)?,
            review_graph: build_post_graph(&deps, &config.quality, top_k, true)?,
            checkpointer,
            max_refinements: config.quality.max_refinements,
            review_by_default: config.review.enabled,
        })
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<GenerationOutcome, PostgenError> {
        let review = request.review.unwrap_or(self.review_by_default);
        let max_refinements = request.max_refinements.unwrap_or(self.max_refinements);
        let input = GenerationInput {
            user_id: request.user_id,
            session_id: request.session_id,
            topic: request.topic,
            platform: request.platform,
            tone: request.tone,
            content_type: request.content_type,
            human_force_publish: request.human_force_publish,
        };
        log::info!(
            "Generating post for session {} (topic: '{}', platform: {}, review: {})",
            input.session_id,
            input.topic,
            input.platform,
            review
        );

        let state = GenerationState::new(input, max_refinements);
        let graph = if review {
            &self.review_graph
        } else {
            &self.graph
        };
        let outcome = graph.invoke(state, events).await?;
        self.finish(outcome, events).await
    }

    /// Continue a run suspended for review
    pub async fn resume(
        &self,
        session_id: &str,
        review: ReviewInput,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<GenerationOutcome, PostgenError> {
        let checkpoint = self
            .checkpointer
            .claim(session_id)
            .await?
            .ok_or_else(|| PostgenError::SessionNotFound(session_id.to_string()))?;

        if checkpoint.state.status != RunStatus::AwaitingReview {
            return Err(PostgenError::NotAwaitingReview {
                session_id: session_id.to_string(),
                status: checkpoint.state.status.as_str().to_string(),
            });
        }

        log::info!(
            "Resuming session {} (approved: {})",
            session_id,
            review.human_approved
        );
        let mut resumed = checkpoint.clone();
        let result = match resumed.state.apply(StateUpdate::Review(review)) {
            Ok(()) => self.review_graph.resume(resumed, events).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(outcome) => self.finish(outcome, events).await,
            Err(e) => {
                // Hand the run back to the reviewer so the resume can be retried
                log::warn!("Resume of session {} failed: {}", session_id, e);
                self.checkpointer.save(session_id, checkpoint).await?;
                Err(e)
            }
        }
    }

    /// Status of the latest run for a session
    pub async fn status(&self, session_id: &str) -> Result<Option<RunStatus>, PostgenError> {
        Ok(self
            .checkpointer
            .load(session_id)
            .await?
            .map(|cp| cp.state.status))
    }

    async fn finish(
        &self,
        outcome: RunOutcome,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<GenerationOutcome, PostgenError> {
        match outcome {
            RunOutcome::Suspended(checkpoint) => {
                let state = &checkpoint.state;
                let result = GenerationOutcome::AwaitingReview {
                    session_id: state.input.session_id.clone(),
                    draft: state.draft.clone(),
                    writer: state.writer.clone(),
                    refinement_count: state.refinement_count,
                };
                let key = state.input.session_id.clone();
                self.checkpointer.save(&key, checkpoint).await?;
                Ok(result)
            }
            RunOutcome::Completed(state) => {
                // Keep the finished state so a late resume reports the status
                self.checkpointer
                    .save(
                        &state.input.session_id,
                        Checkpoint {
                            state: state.clone(),
                            frontier: Vec::new(),
                            arrivals: Default::default(),
                        },
                    )
                    .await?;

                let result = GenerationResult::from_state(state)?;
                log::info!(
                    "Session {} completed: {:?} after {} refinements",
                    result.session_id,
                    result.acceptance,
                    result.refinement_count
                );
                if let Some(tx) = events {
                    let _ = tx
                        .send(WorkflowEvent::Complete {
                            final_post: result.final_post.clone(),
                            refinement_count: result.refinement_count,
                        })
                        .await;
                }
                Ok(GenerationOutcome::Completed(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::llm::{LlmClient, Prompt};
    use crate::adk::memory::InMemoryStore;
    use crate::postgen::agents::mocks::{passages, MockEvaluator, MockRetriever};
    use crate::postgen::workflow::graph::MemoryCheckpointer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers the sentiment prompt with JSON and everything else with text
    struct ScriptedLlm;

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError> {
            if prompt.system.contains("analyze the tone") {
                Ok(r#"{"sentiment_score": 0.9, "detected_tone": "professional"}"#.to_string())
            } else if prompt.system.contains("planning") {
                Ok("1. Hook\n2. Key points\n3. CTA".to_string())
            } else {
                Ok("Rust makes async simple. Try it today.".to_string())
            }
        }
    }

    /// Slow enough that two resumes overlap; counts sentiment calls
    #[derive(Default)]
    struct SlowLlm {
        analyses: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if prompt.system.contains("analyze the tone") {
                self.analyses.fetch_add(1, Ordering::SeqCst);
            }
            ScriptedLlm.generate(prompt).await
        }
    }

    /// The second writer call fails with a transient error
    #[derive(Default)]
    struct FlakyWriterLlm {
        writer_calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FlakyWriterLlm {
        async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError> {
            if prompt.system.contains("copywriter")
                && self.writer_calls.fetch_add(1, Ordering::SeqCst) == 1
            {
                return Err(PostgenError::transient("openai", "503"));
            }
            ScriptedLlm.generate(prompt).await
        }
    }

    fn generator(faithfulness: f64) -> PostGenerator {
        generator_with(Arc::new(ScriptedLlm), faithfulness)
    }

    fn generator_with(llm: Arc<dyn LlmClient>, faithfulness: f64) -> PostGenerator {
        let scores: Scores = [
            ("faithfulness".to_string(), faithfulness),
            ("answer_relevancy".to_string(), 0.9),
        ]
        .into_iter()
        .collect();
        let deps = Deps {
            llm,
            retriever: Arc::new(MockRetriever(passages(&["Tokio is a runtime"]))),
            memory: Arc::new(InMemoryStore::new()),
            evaluator: Arc::new(MockEvaluator(scores)),
        };
        PostGenerator::new(deps, &AppConfig::default(), Arc::new(MemoryCheckpointer::new()))
            .unwrap()
    }

    fn request(review: bool) -> GenerationRequest {
        GenerationRequest {
            user_id: "user-1".to_string(),
            session_id: "session-user-1-0000abcd".to_string(),
            topic: "Rust async".to_string(),
            platform: "twitter".to_string(),
            tone: Some("professional".to_string()),
            content_type: None,
            max_refinements: None,
            human_force_publish: false,
            review: Some(review),
        }
    }

    #[tokio::test]
    async fn test_generate_completes() {
        let outcome = generator(0.95).generate(request(false), None).await.unwrap();
        let result = match outcome {
            GenerationOutcome::Completed(r) => r,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(result.final_post, "Rust makes async simple. Try it today.");
        assert_eq!(result.writer, "twitter_writer");
        assert_eq!(result.acceptance, Acceptance::Passed);
        assert_eq!(result.refinement_count, 0);
        assert_eq!(result.sources, 1);
    }

    #[tokio::test]
    async fn test_low_faithfulness_hits_cap() {
        let outcome = generator(0.4).generate(request(false), None).await.unwrap();
        match outcome {
            GenerationOutcome::Completed(r) => {
                assert_eq!(r.acceptance, Acceptance::CapReached);
                assert_eq!(r.refinement_count, 1);
                assert!(!r.quality_checks.faithfulness);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_review_suspend_and_resume() {
        let generator = generator(0.95);
        let outcome = generator.generate(request(true), None).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::AwaitingReview { .. }));
        assert_eq!(
            generator.status("session-user-1-0000abcd").await.unwrap(),
            Some(RunStatus::AwaitingReview)
        );

        let outcome = generator
            .resume("session-user-1-0000abcd", ReviewInput::approve(), None)
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Completed(_)));

        let err = generator
            .resume("session-user-1-0000abcd", ReviewInput::approve(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PostgenError::NotAwaitingReview { .. }));
    }

    #[tokio::test]
    async fn test_resume_unknown_session() {
        let err = generator(0.95)
            .resume("session-nobody-00000000", ReviewInput::approve(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PostgenError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_resumes_run_once() {
        let llm = Arc::new(SlowLlm::default());
        let generator = generator_with(llm.clone(), 0.95);
        let session = "session-user-1-0000abcd";
        let outcome = generator.generate(request(true), None).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::AwaitingReview { .. }));

        let (first, second) = tokio::join!(
            generator.resume(session, ReviewInput::approve(), None),
            generator.resume(session, ReviewInput::approve(), None),
        );
        let completed = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Ok(GenerationOutcome::Completed(_))))
            .count();
        assert_eq!(completed, 1);
        assert!([first, second].into_iter().any(|r| matches!(
            r,
            Err(PostgenError::NotAwaitingReview { .. })
        )));
        assert_eq!(llm.analyses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_resume_can_be_retried() {
        let generator = generator_with(Arc::new(FlakyWriterLlm::default()), 0.95);
        let session = "session-user-1-0000abcd";
        generator.generate(request(true), None).await.unwrap();

        let err = generator
            .resume(session, ReviewInput::reject("shorter"), None)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            generator.status(session).await.unwrap(),
            Some(RunStatus::AwaitingReview)
        );

        let outcome = generator
            .resume(session, ReviewInput::reject("shorter"), None)
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::AwaitingReview { .. }));
    }
}
