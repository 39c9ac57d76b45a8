// SPDX-License-Identifier: MIT

//! Local vector index persisted as JSON

use crate::adk::error::PostgenError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub total_pages: usize,
    pub chunk_size: usize,
    pub processed_at: String,
}

/// One embedded chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub page_number: usize,
    pub chunk_id: usize,
    pub metadata: ChunkMetadata,
    pub content_vector: Vec<f32>,
}

/// Per-record outcome of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    records: Vec<IndexRecord>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

/// Cosine similarity mapped from [-1, 1] onto [0, 1]
fn similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    ((dot / (norm_a * norm_b) + 1.0) / 2.0).clamp(0.0, 1.0)
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&IndexRecord> {
        self.positions.get(id).map(|&i| &self.records[i])
    }

    fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|r| r.content_vector.len())
    }

    fn reindex(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }

    /// Replace records with a known id, append the rest
    ///
    /// A record fails when its vector is empty or its dimensions differ from
    /// the vectors already stored.
    pub fn merge_or_upload(&mut self, records: Vec<IndexRecord>) -> Vec<UploadResult> {
        records
            .into_iter()
            .map(|record| {
                let key = record.id.clone();
                let expected = self.dimensions();
                let dims = record.content_vector.len();

                let error = if dims == 0 {
                    Some("missing content_vector".to_string())
                } else {
                    match expected {
                        Some(expected) if expected != dims => Some(format!(
                            "vector has {} dimensions, index has {}",
                            dims, expected
                        )),
                        _ => None,
                    }
                };
                if let Some(message) = error {
                    return UploadResult {
                        key,
                        succeeded: false,
                        error_message: Some(message),
                    };
                }

                match self.positions.get(&key) {
                    Some(&i) => self.records[i] = record,
                    None => {
                        self.positions.insert(key.clone(), self.records.len());
                        self.records.push(record);
                    }
                }
                UploadResult {
                    key,
                    succeeded: true,
                    error_message: None,
                }
            })
            .collect()
    }

    /// Top `k` records by similarity to `query`, best first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(&IndexRecord, f64)> {
        let mut scored: Vec<(&IndexRecord, f64)> = self
            .records
            .iter()
            .filter(|r| r.content_vector.len() == query.len())
            .map(|r| (r, similarity(query, &r.content_vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }

    /// Load `dir/index.json`; `None` when it does not exist
    pub async fn load(dir: &Path) -> Result<Option<Self>, PostgenError> {
        let path = Self::file_path(dir);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let mut index: Self = serde_json::from_str(&content)?;
        index.reindex();
        log::info!("Loaded {} records from {}", index.len(), path.display());
        Ok(Some(index))
    }

    /// Write `dir/index.json`, replacing any previous file
    pub async fn save(&self, dir: &Path) -> Result<(), PostgenError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = Self::file_path(dir);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(self)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::info!("Saved {} records to {}", self.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn record(id: &str, content: &str, vector: Vec<f32>) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        content: content.to_string(),
        title: "doc".to_string(),
        source: "doc.txt".to_string(),
        page_number: 1,
        chunk_id: 0,
        metadata: ChunkMetadata {
            total_pages: 1,
            chunk_size: content.chars().count(),
            processed_at: "2024-01-01T00:00:00+00:00".to_string(),
        },
        content_vector: vector,
    }
}
