// SPDX-License-Identifier: MIT

//! Document ingestion and the local vector index

pub mod pipeline;
pub mod retriever;
pub mod splitter;
pub mod store;

pub use pipeline::{IngestPipeline, IngestReport};
pub use retriever::IndexRetriever;
pub use splitter::TextSplitter;
pub use store::VectorIndex;
