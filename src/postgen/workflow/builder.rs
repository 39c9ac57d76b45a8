// SPDX-License-Identifier: MIT

//! Workflow builder - wires the post-generation graph
//!
//! ```text
//! planner -> writer -> [human_review] -> fact_checker      -> merge_analysis -> router
//!              ^             |        -> sentiment_analyzer ->                   |
//!              |             |        -> seo_optimizer      ->                   |
//!              +-- rejected -+                                                   |
//!              +------------------------- refine -------------------------------+
//! ```

use crate::adk::error::WorkflowError;
use crate::postgen::agents::{
    Deps, FactCheckerStep, PlannerStep, SentimentStep, SeoStep, WriterStep,
};
use crate::postgen::config::QualityConfig;
use std::sync::Arc;

use super::gate::{router_branch, MergeAnalysisStep, RouterStep};
use super::graph::{GraphBuilder, GraphRunner, END};
use super::review::review_branch;

pub const HUMAN_REVIEW: &str = "human_review";

const ANALYSIS: &[&str] = &["fact_checker", "sentiment_analyzer", "seo_optimizer"];

/// Build the post-generation graph, optionally with a review pause after each draft
pub fn build_post_graph(
    deps: &Deps,
    quality: &QualityConfig,
    top_k: usize,
    enable_review: bool,
) -> Result<GraphRunner, WorkflowError> {
    let mut builder = GraphBuilder::new(if enable_review {
        "post_generator_hitl"
    } else {
        "post_generator"
    })
    .add_step(Arc::new(PlannerStep::new(deps.clone(), top_k)))
    .add_step(Arc::new(WriterStep::new(deps.clone())))
    .add_step(Arc::new(FactCheckerStep::new(deps.clone())))
    .add_step(Arc::new(SentimentStep::new(deps.clone())))
    .add_step(Arc::new(SeoStep))
    .add_step(Arc::new(MergeAnalysisStep::new(quality.clone())))
    .add_step(Arc::new(RouterStep))
    .set_entry("planner")
    .add_edge("planner", &["writer"])
    .wait_any("writer");

    builder = if enable_review {
        builder
            .add_interrupt(HUMAN_REVIEW)
            .add_edge("writer", &[HUMAN_REVIEW])
            .add_conditional_edge(
                HUMAN_REVIEW,
                review_branch,
                &[("approved", ANALYSIS), ("rejected", &["writer"])],
            )
    } else {
        builder.add_edge("writer", ANALYSIS)
    };

    for node in ANALYSIS {
        builder = builder.add_edge(node, &["merge_analysis"]);
    }

    let runner = builder
        .add_edge("merge_analysis", &["router"])
        .add_conditional_edge(
            "router",
            router_branch,
            &[("refine", &["writer"]), ("end", &[END])],
        )
        .compile()?;

    log::info!("Built graph '{}'", runner.name());
    Ok(runner)
}
