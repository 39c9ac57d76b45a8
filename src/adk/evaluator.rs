// SPDX-License-Identifier: MIT

//! Evaluator seam - named quality scores for a draft
//!
//! An evaluator may omit metrics. Callers treat a missing metric as 0.0,
//! so a partial answer can only make a check fail, never pass.

use crate::adk::error::PostgenError;
use crate::adk::llm::{LlmClient, Prompt};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metric name -> score in [0, 1]
pub type Scores = BTreeMap<String, f64>;

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score `draft` against `context`
    async fn score(&self, draft: &str, context: &str) -> Result<Scores, PostgenError>;
}

const JUDGE_INSTRUCTION: &str = "You are a strict content evaluator. \
Score the draft against the context for each requested metric on a scale from 0.0 to 1.0. \
Respond with a single JSON object mapping metric names to numbers and nothing else.";

/// Evaluator that asks an LLM to act as judge
pub struct LlmJudge {
    llm: Arc<dyn LlmClient>,
    metrics: Vec<String>,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn LlmClient>, metrics: &[&str]) -> Self {
        Self {
            llm,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn prompt(&self, draft: &str, context: &str) -> Prompt {
        Prompt::new(
            JUDGE_INSTRUCTION,
            format!(
                "Metrics: {}\n\nContext:\n{}\n\nDraft:\n{}",
                self.metrics.join(", "),
                context,
                draft
            ),
        )
    }

    /// Pull the configured metrics out of the judge's reply
    fn parse_scores(&self, reply: &str) -> Scores {
        let json = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => {
                log::warn!("Judge reply contained no JSON object");
                return Scores::new();
            }
        };

        let parsed: Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Judge reply was not valid JSON: {}", e);
                return Scores::new();
            }
        };

        self.metrics
            .iter()
            .filter_map(|metric| {
                let score = parsed.get(metric)?.as_f64()?;
                score
                    .is_finite()
                    .then(|| (metric.clone(), score.clamp(0.0, 1.0)))
            })
            .collect()
    }
}

#[async_trait]
impl Evaluator for LlmJudge {
    async fn score(&self, draft: &str, context: &str) -> Result<Scores, PostgenError> {
        let reply = self.llm.generate(&self.prompt(draft, context)).await?;
        let scores = self.parse_scores(&reply);
        log::debug!("Judge scores: {:?}", scores);
        Ok(scores)
    }
}
