// SPDX-License-Identifier: MIT

//! Agent development kit - the external collaborators the workflow talks to
//!
//! Each collaborator is an async trait so the workflow can run against real
//! services in production and against mocks in tests:
//! - [llm] - chat generation and embeddings
//! - [retriever] - scored passage search
//! - [memory] - per-user preferences
//! - [evaluator] - named quality scores for a draft

pub mod error;
pub mod evaluator;
pub mod llm;
pub mod memory;
pub mod retriever;

pub use error::{PostgenError, StateError, WorkflowError};
