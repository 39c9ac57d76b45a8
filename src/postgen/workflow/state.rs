// SPDX-License-Identifier: MIT

//! Generation state - the record that flows through every step
//!
//! Steps never mutate the state directly. Each returns a [`StateUpdate`]
//! naming exactly the fields it touches, and the runner applies it after
//! checking the step declared those fields.

use crate::adk::error::StateError;
use crate::adk::evaluator::Scores;
use serde::{Deserialize, Serialize};

use super::gate::{QualityChecks, Route};
use super::review::ReviewInput;

/// Bumped whenever the serialized layout changes
pub const STATE_VERSION: u32 = 1;

/// Default tone when neither the request nor stored preferences name one
pub const DEFAULT_TONE: &str = "professional";

/// Fields a step may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Tone,
    Plan,
    Context,
    RetrievedDocs,
    Draft,
    Writer,
    Scores,
    SentimentAnalysis,
    SeoMetrics,
    QualityChecks,
    NeedsRefinement,
    Feedback,
    RefinementCount,
    Route,
    FinalPost,
    Acceptance,
    Review,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Tone => "tone",
            Field::Plan => "plan",
            Field::Context => "context",
            Field::RetrievedDocs => "retrieved_docs",
            Field::Draft => "draft",
            Field::Writer => "writer",
            Field::Scores => "scores",
            Field::SentimentAnalysis => "sentiment_analysis",
            Field::SeoMetrics => "seo_metrics",
            Field::QualityChecks => "quality_checks",
            Field::NeedsRefinement => "needs_refinement",
            Field::Feedback => "feedback",
            Field::RefinementCount => "refinement_count",
            Field::Route => "route",
            Field::FinalPost => "final_post",
            Field::Acceptance => "acceptance",
            Field::Review => "review",
        }
    }
}

/// Caller-supplied input; immutable once the run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    pub user_id: String,
    pub session_id: String,
    pub topic: String,
    pub platform: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Publish the first draft that reaches the router, whatever its scores
    #[serde(default)]
    pub human_force_publish: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub sentiment_score: f64,
    pub detected_tone: String,
    pub tone_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetrics {
    pub keyword_density: f64,
    pub readability_score: f64,
    pub word_count: usize,
    pub optimal_length: bool,
    pub hashtag_count: usize,
}

/// How the final post was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// Every quality check passed
    Passed,
    /// Refinement cap reached with checks still failing
    CapReached,
    /// Caller forced publication
    HumanOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingReview,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::AwaitingReview => "awaiting_review",
            RunStatus::Completed => "completed",
        }
    }
}

/// A step's output, one variant per kind of write
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Plan {
        tone: String,
        plan: String,
        context: String,
        retrieved_docs: Vec<RetrievedDoc>,
    },
    Draft {
        draft: String,
        writer: String,
    },
    Scores(Scores),
    Sentiment(SentimentAnalysis),
    Seo(SeoMetrics),
    Merge {
        quality_checks: QualityChecks,
        needs_refinement: bool,
        feedback: String,
    },
    Refine {
        refinement_count: u32,
    },
    Finish {
        final_post: String,
        acceptance: Acceptance,
    },
    Review(ReviewInput),
}

impl StateUpdate {
    /// Fields this update writes
    pub fn fields(&self) -> &'static [Field] {
        match self {
            StateUpdate::Plan { .. } => {
                &[Field::Tone, Field::Plan, Field::Context, Field::RetrievedDocs]
            }
            StateUpdate::Draft { .. } => &[Field::Draft, Field::Writer, Field::Review],
            StateUpdate::Scores(_) => &[Field::Scores],
            StateUpdate::Sentiment(_) => &[Field::SentimentAnalysis],
            StateUpdate::Seo(_) => &[Field::SeoMetrics],
            StateUpdate::Merge { .. } => {
                &[Field::QualityChecks, Field::NeedsRefinement, Field::Feedback]
            }
            StateUpdate::Refine { .. } => &[Field::RefinementCount, Field::Route],
            StateUpdate::Finish { .. } => &[
                Field::FinalPost,
                Field::NeedsRefinement,
                Field::Acceptance,
                Field::Route,
            ],
            StateUpdate::Review(_) => &[Field::Review, Field::Feedback],
        }
    }
}

/// The record shared by all steps of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub version: u32,
    pub input: GenerationInput,
    pub status: RunStatus,
    pub tone: String,
    pub plan: String,
    pub context: String,
    pub retrieved_docs: Vec<RetrievedDoc>,
    pub draft: String,
    pub writer: String,
    pub scores: Scores,
    pub sentiment_analysis: Option<SentimentAnalysis>,
    pub seo_metrics: Option<SeoMetrics>,
    pub quality_checks: QualityChecks,
    pub needs_refinement: bool,
    pub feedback: Option<String>,
    pub refinement_count: u32,
    pub max_refinements: u32,
    pub route: Option<Route>,
    pub final_post: Option<String>,
    pub acceptance: Option<Acceptance>,
    pub review: Option<ReviewInput>,
}

impl GenerationState {
    pub fn new(input: GenerationInput, max_refinements: u32) -> Self {
        let tone = input
            .tone
            .clone()
            .unwrap_or_else(|| DEFAULT_TONE.to_string());
        Self {
            version: STATE_VERSION,
            input,
            status: RunStatus::Running,
            tone,
            plan: String::new(),
            context: String::new(),
            retrieved_docs: Vec::new(),
            draft: String::new(),
            writer: String::new(),
            scores: Scores::new(),
            sentiment_analysis: None,
            seo_metrics: None,
            quality_checks: QualityChecks::default(),
            needs_refinement: false,
            feedback: None,
            refinement_count: 0,
            max_refinements,
            route: None,
            final_post: None,
            acceptance: None,
            review: None,
        }
    }

    /// Check a deserialized state can be resumed by this build
    pub fn check_version(&self) -> Result<(), StateError> {
        if self.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                found: self.version,
                expected: STATE_VERSION,
            });
        }
        Ok(())
    }

    /// Apply a step's update, enforcing the state invariants
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StateError> {
        match update {
            StateUpdate::Plan {
                tone,
                plan,
                context,
                retrieved_docs,
            } => {
                self.tone = tone;
                self.plan = plan;
                self.context = context;
                self.retrieved_docs = retrieved_docs;
            }
            StateUpdate::Draft { draft, writer } => {
                self.draft = draft;
                self.writer = writer;
                self.review = None;
            }
            StateUpdate::Scores(scores) => {
                self.scores = scores
                    .into_iter()
                    .map(|(k, v)| (k, clamp_unit(v)))
                    .collect();
            }
            StateUpdate::Sentiment(mut analysis) => {
                analysis.sentiment_score = clamp_unit(analysis.sentiment_score);
                self.sentiment_analysis = Some(analysis);
            }
            StateUpdate::Seo(mut metrics) => {
                metrics.readability_score = clamp_unit(metrics.readability_score);
                metrics.keyword_density = clamp_unit(metrics.keyword_density);
                self.seo_metrics = Some(metrics);
            }
            StateUpdate::Merge {
                quality_checks,
                needs_refinement,
                feedback,
            } => {
                self.quality_checks = quality_checks;
                self.needs_refinement = needs_refinement;
                self.feedback = Some(feedback);
            }
            StateUpdate::Refine { refinement_count } => {
                if refinement_count < self.refinement_count {
                    return Err(StateError::RefinementCountDecreased {
                        current: self.refinement_count,
                        proposed: refinement_count,
                    });
                }
                if refinement_count > self.max_refinements {
                    return Err(StateError::RefinementCapExceeded {
                        count: refinement_count,
                        max: self.max_refinements,
                    });
                }
                self.refinement_count = refinement_count;
                self.route = Some(Route::Refine);
            }
            StateUpdate::Finish {
                final_post,
                acceptance,
            } => {
                if self.final_post.is_some() {
                    return Err(StateError::FinalPostAlreadySet);
                }
                self.final_post = Some(final_post);
                self.needs_refinement = false;
                self.acceptance = Some(acceptance);
                self.route = Some(Route::End);
            }
            StateUpdate::Review(review) => {
                if !review.human_approved {
                    if let Some(feedback) = &review.human_feedback {
                        self.feedback = Some(feedback.clone());
                    }
                }
                self.review = Some(review);
            }
        }
        Ok(())
    }
}

/// Scores live in [0, 1]; NaN counts as a miss
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
