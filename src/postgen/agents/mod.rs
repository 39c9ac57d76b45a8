// SPDX-License-Identifier: MIT

//! Pipeline steps - the nodes of the post-generation graph
//!
//! Each step reads a shared snapshot of [`GenerationState`] and returns a
//! [`StateUpdate`]. The fields a step reads and writes are declared up front
//! so the runner can reject updates that stray outside them.

mod fact_checker;
mod planner;
mod sentiment;
mod seo;
mod writer;

pub use fact_checker::FactCheckerStep;
pub use planner::{format_context, PlannerStep};
pub use sentiment::SentimentStep;
pub use seo::{compute_seo_metrics, SeoStep};
pub use writer::WriterStep;

use crate::adk::error::PostgenError;
use crate::adk::evaluator::Evaluator;
use crate::adk::llm::LlmClient;
use crate::adk::memory::MemoryStore;
use crate::adk::retriever::Retriever;
use crate::postgen::workflow::state::{Field, GenerationState, StateUpdate};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for every graph node that does work
#[async_trait]
pub trait Step: Send + Sync {
    /// Node name, as used in edges and events
    fn name(&self) -> &str;

    /// State fields consulted besides the caller input
    fn reads(&self) -> &'static [Field];

    /// State fields the returned update may touch
    fn writes(&self) -> &'static [Field];

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError>;
}

/// Collaborators shared by the steps of one generator
#[derive(Clone)]
pub struct Deps {
    pub llm: Arc<dyn LlmClient>,
    pub retriever: Arc<dyn Retriever>,
    pub memory: Arc<dyn MemoryStore>,
    pub evaluator: Arc<dyn Evaluator>,
}
