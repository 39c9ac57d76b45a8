// SPDX-License-Identifier: MIT

//! Post generation - agents, quality-gated workflow, ingestion and the HTTP API

pub mod agents;
pub mod config;
pub mod index;
pub mod runtime;
pub mod server;
pub mod service;
pub mod workflow;

pub use config::AppConfig;
pub use runtime::Runtime;
pub use service::{GenerationOutcome, GenerationRequest, GenerationResult, PostGenerator};
