// SPDX-License-Identifier: MIT

//! Ingestion pipeline: load -> chunk -> embed -> merge-or-upload
//!
//! Documents are plain text or markdown. A form feed (`\x0c`) starts a new
//! page, which is what common PDF-to-text tools emit.

use crate::adk::error::PostgenError;
use crate::adk::llm::Embedder;
use crate::postgen::config::IngestConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::splitter::TextSplitter;
use super::store::{ChunkMetadata, IndexRecord, VectorIndex};

const EXTENSIONS: &[&str] = &["txt", "md"];
const PAGE_BREAK: char = '\x0c';

/// A loaded document, one entry per page
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub pages: Vec<String>,
}

/// A chunk waiting for its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub page_number: usize,
    pub chunk_id: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    fn with_vector(self, content_vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: self.id,
            content: self.content,
            title: self.title,
            source: self.source,
            page_number: self.page_number,
            chunk_id: self.chunk_id,
            metadata: self.metadata,
            content_vector,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Failed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub files: Vec<FileReport>,
}

/// Stable chunk id: sha256 of `{source}-{page}-{idx}`, hex encoded
pub fn chunk_id(source: &str, page_number: usize, idx: usize) -> String {
    format!(
        "{:x}",
        Sha256::digest(format!("{}-{}-{}", source, page_number, idx).as_bytes())
    )
}

pub async fn load_document(path: &Path) -> Result<Document, PostgenError> {
    let text = tokio::fs::read_to_string(path).await?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document {
        source,
        pages: text.split(PAGE_BREAK).map(str::to_string).collect(),
    })
}

pub struct IngestPipeline {
    config: IngestConfig,
    index_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig, index_path: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap);
        Self {
            config,
            index_path,
            embedder,
            splitter,
        }
    }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let title = Path::new(&doc.source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| doc.source.clone());
        let processed_at = chrono::Utc::now().to_rfc3339();

        let mut chunks = Vec::new();
        for (i, page) in doc.pages.iter().enumerate() {
            if page.trim().is_empty() {
                continue;
            }
            let page_number = i + 1;
            for (idx, content) in self.splitter.split_text(page).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: chunk_id(&doc.source, page_number, idx),
                    title: title.clone(),
                    source: doc.source.clone(),
                    page_number,
                    chunk_id: idx,
                    metadata: ChunkMetadata {
                        total_pages: doc.pages.len(),
                        chunk_size: content.chars().count(),
                        processed_at: processed_at.clone(),
                    },
                    content,
                });
            }
        }
        log::info!("Created {} chunks from {}", chunks.len(), doc.source);
        chunks
    }

    /// Embed in batches; a failed batch is logged and its chunks dropped
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Vec<IndexRecord> {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = chunks.len().div_ceil(batch_size);
        let delay = Duration::from_secs_f64(self.config.batch_delay_secs.max(0.0));

        let mut records = Vec::with_capacity(chunks.len());
        let mut batches = chunks.chunks(batch_size).enumerate().peekable();
        while let Some((i, batch)) = batches.next() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(vectors) => {
                    records.extend(
                        batch
                            .iter()
                            .cloned()
                            .zip(vectors)
                            .map(|(chunk, vector)| chunk.with_vector(vector)),
                    );
                    log::info!("Embedding batch {}/{} complete", i + 1, total_batches);
                }
                Err(e) => {
                    log::error!("Embedding batch {}/{} failed: {}", i + 1, total_batches, e);
                }
            }
            if batches.peek().is_some() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        records
    }

    /// Run one file through the pipeline; `Ok(false)` when nothing was uploaded
    async fn process_file(&self, path: &Path, index: &mut VectorIndex) -> Result<bool, PostgenError> {
        let doc = load_document(path).await?;
        let chunks = self.chunk_document(&doc);
        if chunks.is_empty() {
            log::warn!("No chunks created for {}", doc.source);
            return Ok(false);
        }

        let expected = chunks.len();
        let records = self.embed_chunks(chunks).await;
        if records.len() < expected {
            log::warn!("{} chunks missing embeddings", expected - records.len());
        }
        if records.is_empty() {
            log::error!("No valid chunks to upload for {}", doc.source);
            return Ok(false);
        }

        let results = index.merge_or_upload(records);
        let failed: Vec<_> = results.iter().filter(|r| !r.succeeded).collect();
        for r in &failed {
            log::error!(
                "Upload failed: {} - {}",
                r.key,
                r.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        log::info!(
            "Upload complete: {} succeeded, {} failed",
            results.len() - failed.len(),
            failed.len()
        );
        Ok(failed.is_empty())
    }

    /// Ingest every supported file in `data_dir` into the index
    pub async fn run(&self, data_dir: &Path) -> Result<IngestReport, PostgenError> {
        if !tokio::fs::try_exists(data_dir).await? {
            return Err(PostgenError::config(format!(
                "Data directory not found: {}",
                data_dir.display()
            )));
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if supported {
                files.push(path);
            }
        }
        files.sort();

        let mut report = IngestReport {
            total: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            log::warn!("No documents found in {}", data_dir.display());
            return Ok(report);
        }
        log::info!(
            "Ingesting {} documents from {} into {}",
            files.len(),
            data_dir.display(),
            self.index_path.display()
        );

        let mut index = VectorIndex::load(&self.index_path)
            .await?
            .unwrap_or_default();

        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (status, error) = match self.process_file(path, &mut index).await {
                Ok(true) => (FileStatus::Success, None),
                Ok(false) => (FileStatus::Failed, None),
                Err(e) => {
                    log::error!("Unexpected error processing {}: {}", name, e);
                    (FileStatus::Error, Some(e.to_string()))
                }
            };
            if status == FileStatus::Success {
                report.successful += 1;
            } else {
                report.failed += 1;
            }
            report.files.push(FileReport {
                name,
                status,
                error,
            });
        }

        if report.successful > 0 {
            index.save(&self.index_path).await?;
        }
        log::info!(
            "Ingestion complete: {} total, {} successful, {} failed",
            report.total,
            report.successful,
            report.failed
        );
        Ok(report)
    }
}
