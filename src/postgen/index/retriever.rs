// SPDX-License-Identifier: MIT

//! Retriever over the local vector index

use crate::adk::error::PostgenError;
use crate::adk::llm::Embedder;
use crate::adk::retriever::{Retriever, ScoredPassage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::VectorIndex;

/// Embeds the query and ranks indexed chunks by cosine similarity
///
/// The index is loaded on first use; call [`IndexRetriever::reload`] after
/// an ingestion run to pick up new records.
pub struct IndexRetriever {
    index_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexRetriever {
    pub fn new(index_path: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index_path,
            embedder,
            index: RwLock::new(None),
        }
    }

    pub async fn reload(&self) -> Result<bool, PostgenError> {
        let loaded = VectorIndex::load(&self.index_path).await?;
        let found = loaded.is_some();
        *self.index.write().await = loaded.map(Arc::new);
        Ok(found)
    }

    async fn index(&self) -> Result<Arc<VectorIndex>, PostgenError> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let loaded = VectorIndex::load(&self.index_path)
            .await
            .map_err(|e| PostgenError::retrieval(format!("failed to load index: {}", e)))?
            .ok_or_else(|| {
                PostgenError::retrieval(format!(
                    "no index at {}",
                    VectorIndex::file_path(&self.index_path).display()
                ))
            })?;
        let index = Arc::new(loaded);
        *slot = Some(index.clone());
        Ok(index)
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>, PostgenError> {
        let index = self.index().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| PostgenError::retrieval("embedder returned no query vector"))?;

        Ok(index
            .search(&query_vector, k)
            .into_iter()
            .map(|(record, score)| ScoredPassage {
                content: record.content.clone(),
                score,
            })
            .collect())
    }

    async fn is_ready(&self) -> bool {
        if self.index.read().await.is_some() {
            return true;
        }
        tokio::fs::try_exists(VectorIndex::file_path(&self.index_path))
            .await
            .unwrap_or(false)
    }
}
