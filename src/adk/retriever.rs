// SPDX-License-Identifier: MIT

//! Retriever seam - scored passage search

use crate::adk::error::PostgenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A retrieved passage; `score` is in [0, 1], higher is more relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `k` passages, best first
    ///
    /// Fails with [`PostgenError::RetrievalUnavailable`] when the backing
    /// index cannot answer.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>, PostgenError>;

    /// Whether the backing index exists, for health reporting
    async fn is_ready(&self) -> bool {
        true
    }
}
