// SPDX-License-Identifier: MIT

//! Writer - outline + feedback -> draft, styled per writer variant

use super::{Deps, Step};
use crate::adk::error::PostgenError;
use crate::adk::llm::Prompt;
use crate::postgen::workflow::routing::route_to_specialized_writer;
use crate::postgen::workflow::state::{Field, GenerationState, StateUpdate};
use async_trait::async_trait;

const WRITER_INSTRUCTION: &str = "You are a social media copywriter. \
Turn the outline into a finished post in the requested tone. \
Only state facts supported by the research context. Return the post text only.";

pub struct WriterStep {
    deps: Deps,
}

impl WriterStep {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    fn prompt(&self, state: &GenerationState) -> (Prompt, &'static str) {
        let variant =
            route_to_specialized_writer(&state.input.platform, state.input.content_type.as_deref());

        let mut user = format!(
            "Topic: {}\nPlatform: {}\nTone: {}\n\nOutline:\n{}\n\nResearch Context:\n{}",
            state.input.topic, state.input.platform, state.tone, state.plan, state.context
        );
        // Feedback only matters once there is a previous draft to revise
        if !state.draft.is_empty() {
            if let Some(feedback) = &state.feedback {
                user.push_str(&format!(
                    "\n\nPrevious draft:\n{}\n\nRevise it to address this feedback:\n{}",
                    state.draft, feedback
                ));
            }
        }

        let system = format!("{}\n\n{}", WRITER_INSTRUCTION, variant.style_guidance());
        (Prompt::new(system, user), variant.name())
    }
}

#[async_trait]
impl Step for WriterStep {
    fn name(&self) -> &str {
        "writer"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Tone, Field::Plan, Field::Context, Field::Draft, Field::Feedback]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::Draft, Field::Writer, Field::Review]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let (prompt, writer) = self.prompt(state);
        log::info!(
            "Writer '{}' drafting (refinement {}/{})",
            writer,
            state.refinement_count,
            state.max_refinements
        );

        let draft = self.deps.llm.generate(&prompt).await?;
        let draft = draft.trim().to_string();
        if draft.is_empty() {
            return Err(PostgenError::generation(writer, "LLM returned an empty draft"));
        }

        Ok(StateUpdate::Draft {
            draft,
            writer: writer.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgen::agents::mocks::{deps, input, MockLlm};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writer_uses_variant() {
        let llm = Arc::new(MockLlm::new(&["  A post about Rust.  "]));
        let writer = WriterStep::new(deps(llm.clone()));
        let mut state = GenerationState::new(input("linkedin", Some("technical")), 1);
        state.plan = "1. Hook".to_string();

        let update = writer.run(&state).await.unwrap();
        assert_eq!(
            update,
            StateUpdate::Draft {
                draft: "A post about Rust.".to_string(),
                writer: "technical_linkedin_writer".to_string(),
            }
        );

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].system.contains("engineers"));
        assert!(prompts[0].user.contains("1. Hook"));
        assert!(!prompts[0].user.contains("Previous draft"));
    }

    #[tokio::test]
    async fn test_writer_includes_feedback_on_revision() {
        let llm = Arc::new(MockLlm::new(&["v2"]));
        let writer = WriterStep::new(deps(llm.clone()));
        let mut state = GenerationState::new(input("twitter", None), 1);
        state.draft = "v1".to_string();
        state.feedback = Some("Improve factual accuracy based on source materials.".to_string());

        writer.run(&state).await.unwrap();
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("Previous draft:\nv1"));
        assert!(prompts[0].user.contains("Improve factual accuracy"));
    }

    #[tokio::test]
    async fn test_empty_draft_is_error() {
        let llm = Arc::new(MockLlm::new(&[""]));
        let state = GenerationState::new(input("linkedin", None), 1);
        let err = WriterStep::new(deps(llm)).run(&state).await.unwrap_err();
        assert!(matches!(err, PostgenError::Generation { .. }));
    }
}
