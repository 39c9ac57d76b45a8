// SPDX-License-Identifier: MIT

//! Planner - preferences + retrieved context -> post outline

use super::{Deps, Step};
use crate::adk::error::PostgenError;
use crate::adk::llm::Prompt;
use crate::adk::retriever::ScoredPassage;
use crate::postgen::workflow::state::{Field, GenerationState, RetrievedDoc, StateUpdate};
use async_trait::async_trait;

/// Characters of each passage quoted into the context
const EXCERPT_CHARS: usize = 500;

const PLANNER_INSTRUCTION: &str = "You are a content planning specialist. \
Create a structured outline for a social media post with: \
1. a hook or opening line, 2. three to five key points, \
3. a call-to-action or closing thought, 4. suggested hashtags if the platform uses them. \
Cite the research context where relevant. Keep the outline concise but actionable.";

/// Format passages as numbered `[Source i]` excerpts separated by blank lines
pub fn format_context(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let excerpt: String = p.content.chars().take(EXCERPT_CHARS).collect();
            format!("[Source {}]: {}...", i + 1, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct PlannerStep {
    deps: Deps,
    top_k: usize,
}

impl PlannerStep {
    pub fn new(deps: Deps, top_k: usize) -> Self {
        Self { deps, top_k }
    }

    /// Explicit tone, else the stored preference, else the state default
    async fn resolve_tone(&self, state: &GenerationState) -> Result<String, PostgenError> {
        if let Some(tone) = &state.input.tone {
            return Ok(tone.clone());
        }
        let stored = self
            .deps
            .memory
            .get_preferences(&state.input.user_id)
            .await?
            .and_then(|prefs| prefs.preferred_tone);
        match stored {
            Some(tone) => {
                log::info!("Using stored tone for {}: {}", state.input.user_id, tone);
                Ok(tone)
            }
            None => Ok(state.tone.clone()),
        }
    }
}

#[async_trait]
impl Step for PlannerStep {
    fn name(&self) -> &str {
        "planner"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Tone]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::Tone, Field::Plan, Field::Context, Field::RetrievedDocs]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let tone = self.resolve_tone(state).await?;
        let passages = self
            .deps
            .retriever
            .search(&state.input.topic, self.top_k)
            .await?;
        let context = format_context(&passages);
        log::info!("Planner retrieved {} context documents", passages.len());

        let prompt = Prompt::new(
            PLANNER_INSTRUCTION,
            format!(
                "Topic: {}\nPlatform: {}\nTone: {}\n\nResearch Context:\n{}\n\nCreate a detailed outline for this post.",
                state.input.topic, state.input.platform, tone, context
            ),
        );
        let plan = self.deps.llm.generate(&prompt).await?;
        if plan.trim().is_empty() {
            return Err(PostgenError::generation("planner", "LLM returned an empty plan"));
        }
        log::info!("Plan created ({} chars)", plan.len());

        Ok(StateUpdate::Plan {
            tone,
            plan,
            context,
            retrieved_docs: passages
                .into_iter()
                .map(|p| RetrievedDoc {
                    content: p.content,
                    score: p.score.clamp(0.0, 1.0),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::memory::{MemoryStore, UserPreferences};
    use crate::postgen::agents::mocks::{deps, input, passages, MockLlm, MockRetriever};
    use std::sync::Arc;

    #[test]
    fn test_format_context_truncates_and_numbers() {
        let long = "x".repeat(800);
        let context = format_context(&passages(&["first", &long]));
        let parts: Vec<&str> = context.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "[Source 1]: first...");
        assert!(parts[1].starts_with("[Source 2]: xxx"));
        assert_eq!(parts[1].len(), "[Source 2]: ".len() + 500 + 3);
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[tokio::test]
    async fn test_planner_uses_stored_tone() {
        let llm = Arc::new(MockLlm::new(&["1. Hook\n2. Points"]));
        let deps = deps(llm.clone());
        let mut prefs = UserPreferences::defaults_for("user-456", "linkedin");
        prefs.preferred_tone = Some("casual".to_string());
        deps.memory.upsert_preferences("user-456", prefs).await.unwrap();

        let planner = PlannerStep::new(deps, 5);
        let state = GenerationState::new(input("linkedin", None), 1);
        let update = planner.run(&state).await.unwrap();

        match update {
            StateUpdate::Plan {
                tone,
                plan,
                context,
                retrieved_docs,
            } => {
                assert_eq!(tone, "casual");
                assert_eq!(plan, "1. Hook\n2. Points");
                assert!(context.starts_with("[Source 1]: Rust 2024"));
                assert_eq!(retrieved_docs.len(), 1);
            }
            other => panic!("unexpected update: {:?}", other),
        }

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("Tone: casual"));
    }

    #[tokio::test]
    async fn test_explicit_tone_wins() {
        let llm = Arc::new(MockLlm::new(&["plan"]));
        let deps = deps(llm);
        let mut prefs = UserPreferences::defaults_for("user-456", "linkedin");
        prefs.preferred_tone = Some("casual".to_string());
        deps.memory.upsert_preferences("user-456", prefs).await.unwrap();

        let mut request = input("linkedin", None);
        request.tone = Some("witty".to_string());
        let state = GenerationState::new(request, 1);
        let update = PlannerStep::new(deps, 5).run(&state).await.unwrap();
        assert!(matches!(update, StateUpdate::Plan { tone, .. } if tone == "witty"));
    }

    #[tokio::test]
    async fn test_planner_respects_top_k() {
        let llm = Arc::new(MockLlm::new(&["plan"]));
        let mut deps = deps(llm);
        deps.retriever = Arc::new(MockRetriever(passages(&["a", "b", "c", "d"])));
        let state = GenerationState::new(input("linkedin", None), 1);
        let update = PlannerStep::new(deps, 2).run(&state).await.unwrap();
        assert!(matches!(update, StateUpdate::Plan { retrieved_docs, .. } if retrieved_docs.len() == 2));
    }

    #[tokio::test]
    async fn test_empty_plan_is_generation_error() {
        let llm = Arc::new(MockLlm::new(&["   "]));
        let state = GenerationState::new(input("linkedin", None), 1);
        let err = PlannerStep::new(deps(llm), 5).run(&state).await.unwrap_err();
        assert!(matches!(err, PostgenError::Generation { .. }));
    }
}
