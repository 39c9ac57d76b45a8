// SPDX-License-Identifier: MIT

//! Checkpoints - where a suspended run picks up again

use crate::adk::error::PostgenError;
use crate::postgen::workflow::state::{GenerationState, RunStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A suspended run: the state plus the scheduler position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: GenerationState,
    /// Nodes to run in the next superstep
    pub frontier: Vec<String>,
    /// Node -> predecessors that have arrived but not yet been consumed
    #[serde(default)]
    pub arrivals: HashMap<String, BTreeSet<String>>,
}

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, key: &str, checkpoint: Checkpoint) -> Result<(), PostgenError>;

    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, PostgenError>;

    /// Take ownership of a run suspended for review
    ///
    /// Returns the stored checkpoint as it was before the call. When its
    /// status was `AwaitingReview` the stored copy is switched to `Running`
    /// in the same step, so exactly one caller sees `AwaitingReview`.
    async fn claim(&self, key: &str) -> Result<Option<Checkpoint>, PostgenError>;
}

/// Process-local checkpoint store
#[derive(Clone, Default)]
pub struct MemoryCheckpointer {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, key: &str, checkpoint: Checkpoint) -> Result<(), PostgenError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(key.to_string(), checkpoint);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, PostgenError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(key).cloned())
    }

    async fn claim(&self, key: &str) -> Result<Option<Checkpoint>, PostgenError> {
        let mut checkpoints = self.checkpoints.write().await;
        let Some(stored) = checkpoints.get_mut(key) else {
            return Ok(None);
        };
        let before = stored.clone();
        if stored.state.status == RunStatus::AwaitingReview {
            stored.state.status = RunStatus::Running;
        }
        Ok(Some(before))
    }
}
