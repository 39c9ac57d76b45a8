// SPDX-License-Identifier: MIT

//! LLM module - chat generation and embedding seams
//!
//! The workflow only ever needs "prompt in, text out" and "texts in, vectors
//! out". The provider implementation lives in [azure_openai].

pub mod azure_openai;

use crate::adk::error::PostgenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use azure_openai::{ChatEndpoint, OpenAIClient};

/// Configuration for a generation call
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A system instruction plus the user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Core trait for text generation
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError>;
}

/// Core trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns one vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PostgenError>;
}
