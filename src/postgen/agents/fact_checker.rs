// SPDX-License-Identifier: MIT

//! Fact checker - faithfulness and relevancy scores for the draft

use super::{Deps, Step};
use crate::adk::error::PostgenError;
use crate::adk::evaluator::Scores;
use crate::postgen::workflow::gate::{ANSWER_RELEVANCY, FAITHFULNESS};
use crate::postgen::workflow::state::{Field, GenerationState, StateUpdate};
use async_trait::async_trait;

pub struct FactCheckerStep {
    deps: Deps,
}

impl FactCheckerStep {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for FactCheckerStep {
    fn name(&self) -> &str {
        "fact_checker"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Draft, Field::Context]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::Scores]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let raw = match self.deps.evaluator.score(&state.draft, &state.context).await {
            Ok(scores) => scores,
            Err(e) => {
                log::error!("Evaluator failed, scoring draft 0.0: {}", e);
                Scores::new()
            }
        };

        // Exactly the two gate metrics; anything else the evaluator returns is dropped
        let mut scores = Scores::new();
        for metric in [FAITHFULNESS, ANSWER_RELEVANCY] {
            let value = match raw.get(metric) {
                Some(v) => *v,
                None => {
                    log::warn!("Evaluator returned no '{}' score, using 0.0", metric);
                    0.0
                }
            };
            scores.insert(metric.to_string(), value);
        }

        log::info!(
            "Fact check: faithfulness={:.2}, answer_relevancy={:.2}",
            scores[FAITHFULNESS],
            scores[ANSWER_RELEVANCY]
        );
        Ok(StateUpdate::Scores(scores))
    }
}
