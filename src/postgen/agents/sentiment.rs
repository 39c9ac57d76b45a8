// SPDX-License-Identifier: MIT

//! Sentiment analyzer - how well the draft's tone matches the request

use super::{Deps, Step};
use crate::adk::error::PostgenError;
use crate::adk::llm::Prompt;
use crate::postgen::workflow::state::{Field, GenerationState, SentimentAnalysis, StateUpdate};
use async_trait::async_trait;
use serde::Deserialize;

const SENTIMENT_INSTRUCTION: &str = "You analyze the tone of social media posts. \
Reply with a JSON object {\"sentiment_score\": <0.0-1.0, how well the post matches the requested tone>, \
\"detected_tone\": <one or two words>} and nothing else.";

#[derive(Debug, Deserialize)]
struct SentimentReply {
    sentiment_score: f64,
    detected_tone: String,
}

fn parse_reply(reply: &str) -> Option<SentimentReply> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if start >= end {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

pub struct SentimentStep {
    deps: Deps,
}

impl SentimentStep {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for SentimentStep {
    fn name(&self) -> &str {
        "sentiment_analyzer"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Draft, Field::Tone]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::SentimentAnalysis]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let prompt = Prompt::new(
            SENTIMENT_INSTRUCTION,
            format!("Requested tone: {}\n\nPost:\n{}", state.tone, state.draft),
        );

        let parsed = match self.deps.llm.generate(&prompt).await {
            Ok(reply) => parse_reply(&reply),
            Err(e) => {
                log::error!("Sentiment analysis failed: {}", e);
                None
            }
        };

        let analysis = match parsed {
            Some(reply) => SentimentAnalysis {
                tone_match: reply.detected_tone.trim().eq_ignore_ascii_case(state.tone.trim()),
                sentiment_score: reply.sentiment_score,
                detected_tone: reply.detected_tone,
            },
            None => {
                log::warn!("No usable sentiment reply, scoring 0.0");
                SentimentAnalysis {
                    sentiment_score: 0.0,
                    detected_tone: "unknown".to_string(),
                    tone_match: false,
                }
            }
        };

        log::info!("Sentiment score: {:.2}", analysis.sentiment_score);
        Ok(StateUpdate::Sentiment(analysis))
    }
}
