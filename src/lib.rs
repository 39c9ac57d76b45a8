// SPDX-License-Identifier: MIT

//! postgen-rs - multi-agent social post generation
//!
//! - [adk] holds the collaborator seams (LLM client, retriever, memory store,
//!   evaluator) and the crate error type.
//! - [postgen] holds the generation workflow, the ingestion pipeline and the
//!   HTTP server.

pub mod adk;
pub mod postgen;
