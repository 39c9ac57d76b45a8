// SPDX-License-Identifier: MIT

//! Quality gate - merge analysis results and decide refine vs. end
//!
//! The gate is four threshold checks. Faithfulness and relevancy are
//! critical: while either fails and refinements remain, the draft goes back
//! to the writer. Once the cap is reached the current draft is accepted as
//! final, failing or not, and the acceptance records that.

use crate::adk::error::PostgenError;
use crate::adk::evaluator::Scores;
use crate::postgen::agents::Step;
use crate::postgen::config::QualityConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state::{Acceptance, Field, GenerationState, StateUpdate};

pub const FAITHFULNESS: &str = "faithfulness";
pub const ANSWER_RELEVANCY: &str = "answer_relevancy";

/// Outcome of the four threshold checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityChecks {
    pub faithfulness: bool,
    pub relevancy: bool,
    pub sentiment: bool,
    pub seo: bool,
}

impl QualityChecks {
    pub fn all_pass(&self) -> bool {
        self.faithfulness && self.relevancy && self.sentiment && self.seo
    }

    /// Faithfulness or relevancy failed
    pub fn critical_failure(&self) -> bool {
        !self.faithfulness || !self.relevancy
    }

    /// Names of failed checks, in feedback order
    pub fn failed(&self) -> Vec<&'static str> {
        [
            ("faithfulness", self.faithfulness),
            ("relevancy", self.relevancy),
            ("sentiment", self.sentiment),
            ("seo", self.seo),
        ]
        .into_iter()
        .filter(|(_, passed)| !passed)
        .map(|(name, _)| name)
        .collect()
    }

    pub fn passed_count(&self) -> usize {
        4 - self.failed().len()
    }
}

/// Routing decision after the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Refine,
    End,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Refine => "refine",
            Route::End => "end",
        }
    }
}

fn metric_or_zero(value: Option<f64>, name: &str) -> f64 {
    match value {
        Some(v) if !v.is_nan() => v,
        _ => {
            log::warn!("Evaluation missing for '{}', scoring 0.0", name);
            0.0
        }
    }
}

/// Evaluate the four checks; absent scores count as 0.0
pub fn evaluate_checks(
    scores: &Scores,
    sentiment_score: Option<f64>,
    readability_score: Option<f64>,
    config: &QualityConfig,
) -> QualityChecks {
    let faithfulness = metric_or_zero(scores.get(FAITHFULNESS).copied(), FAITHFULNESS);
    let relevancy = metric_or_zero(scores.get(ANSWER_RELEVANCY).copied(), ANSWER_RELEVANCY);
    let sentiment = metric_or_zero(sentiment_score, "sentiment_score");
    let readability = metric_or_zero(readability_score, "readability_score");

    QualityChecks {
        faithfulness: faithfulness >= config.faithfulness_threshold,
        relevancy: relevancy >= config.relevancy_threshold,
        sentiment: sentiment >= config.sentiment_threshold,
        seo: readability >= config.seo_threshold,
    }
}

/// One remediation sentence per failed check, in fixed order
pub fn build_feedback(checks: &QualityChecks, topic: &str, tone: &str) -> String {
    let mut parts = Vec::new();
    if !checks.faithfulness {
        parts.push("Improve factual accuracy based on source materials.".to_string());
    }
    if !checks.relevancy {
        parts.push(format!("Stay more focused on the topic: {}", topic));
    }
    if !checks.sentiment {
        parts.push(format!("Adjust tone to better match requested: {}", tone));
    }
    if !checks.seo {
        parts.push("Improve readability and keyword usage for better engagement.".to_string());
    }

    if parts.is_empty() {
        "All quality checks passed!".to_string()
    } else {
        parts.join(" ")
    }
}

/// Decide whether the draft goes back to the writer
pub fn decide_route(
    checks: &QualityChecks,
    needs_refinement: bool,
    refinement_count: u32,
    max_refinements: u32,
    human_force_publish: bool,
) -> Route {
    if human_force_publish {
        return Route::End;
    }
    if checks.critical_failure() && refinement_count < max_refinements {
        return Route::Refine;
    }
    if !needs_refinement || refinement_count >= max_refinements {
        return Route::End;
    }
    Route::Refine
}

/// Fan-in step: combine fact-check, sentiment and SEO results
pub struct MergeAnalysisStep {
    config: QualityConfig,
}

impl MergeAnalysisStep {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Step for MergeAnalysisStep {
    fn name(&self) -> &str {
        "merge_analysis"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Scores, Field::SentimentAnalysis, Field::SeoMetrics, Field::Tone]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::QualityChecks, Field::NeedsRefinement, Field::Feedback]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let checks = evaluate_checks(
            &state.scores,
            state.sentiment_analysis.as_ref().map(|s| s.sentiment_score),
            state.seo_metrics.as_ref().map(|s| s.readability_score),
            &self.config,
        );
        let feedback = build_feedback(&checks, &state.input.topic, &state.tone);

        log::info!("Quality checks: {}/4 passed", checks.passed_count());

        Ok(StateUpdate::Merge {
            quality_checks: checks,
            needs_refinement: !checks.all_pass(),
            feedback,
        })
    }
}

/// Router step: bump the refinement count or finalize the post
pub struct RouterStep;

#[async_trait]
impl Step for RouterStep {
    fn name(&self) -> &str {
        "router"
    }

    fn reads(&self) -> &'static [Field] {
        &[
            Field::QualityChecks,
            Field::NeedsRefinement,
            Field::RefinementCount,
            Field::Draft,
        ]
    }

    fn writes(&self) -> &'static [Field] {
        &[
            Field::RefinementCount,
            Field::Route,
            Field::FinalPost,
            Field::NeedsRefinement,
            Field::Acceptance,
        ]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let route = decide_route(
            &state.quality_checks,
            state.needs_refinement,
            state.refinement_count,
            state.max_refinements,
            state.input.human_force_publish,
        );

        match route {
            Route::Refine => {
                log::info!(
                    "Refinement needed, failed checks: {}. Attempt {}/{}",
                    state.quality_checks.failed().join(", "),
                    state.refinement_count + 1,
                    state.max_refinements
                );
                Ok(StateUpdate::Refine {
                    refinement_count: state.refinement_count + 1,
                })
            }
            Route::End => {
                let acceptance = if !state.needs_refinement {
                    Acceptance::Passed
                } else if state.input.human_force_publish {
                    Acceptance::HumanOverride
                } else {
                    Acceptance::CapReached
                };
                match acceptance {
                    Acceptance::Passed => log::info!("All quality gates passed"),
                    Acceptance::HumanOverride => log::info!("Publishing on human override"),
                    Acceptance::CapReached => log::warn!(
                        "Max refinements ({}) reached, accepting current draft",
                        state.max_refinements
                    ),
                }
                Ok(StateUpdate::Finish {
                    final_post: state.draft.clone(),
                    acceptance,
                })
            }
        }
    }
}

/// Branch label for the router's conditional edge
pub fn router_branch(state: &GenerationState) -> String {
    state.route.unwrap_or(Route::End).as_str().to_string()
}
