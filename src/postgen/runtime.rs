// SPDX-License-Identifier: MIT

//! Runtime wiring - builds the production collaborators from configuration

use crate::adk::error::PostgenError;
use crate::adk::evaluator::LlmJudge;
use crate::adk::llm::{ChatEndpoint, GenerationConfig, OpenAIClient};
use crate::adk::memory::InMemoryStore;
use crate::postgen::agents::Deps;
use crate::postgen::config::{AppConfig, LlmConfig, LlmProvider};
use crate::postgen::index::{IndexRetriever, IngestPipeline};
use crate::postgen::service::PostGenerator;
use crate::postgen::workflow::gate::{ANSWER_RELEVANCY, FAITHFULNESS};
use crate::postgen::workflow::graph::MemoryCheckpointer;
use std::sync::Arc;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Build the chat + embeddings client for the configured provider
pub fn build_llm(config: &LlmConfig) -> Result<Arc<OpenAIClient>, PostgenError> {
    let api_key = config.api_key.clone().ok_or_else(|| match config.provider {
        LlmProvider::Azure => PostgenError::config("AZURE_OPENAI_API_KEY not set"),
        LlmProvider::OpenAI => PostgenError::config("OPENAI_API_KEY not set"),
    })?;

    let endpoint = match config.provider {
        LlmProvider::Azure => ChatEndpoint::Azure {
            endpoint: config
                .endpoint
                .clone()
                .ok_or_else(|| PostgenError::config("AZURE_OPENAI_ENDPOINT not set"))?,
            api_version: config.api_version.clone(),
            chat_deployment: config.chat_deployment.clone(),
            embeddings_deployment: config.embeddings_deployment.clone(),
        },
        LlmProvider::OpenAI => ChatEndpoint::OpenAI {
            base_url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            chat_model: config.chat_deployment.clone(),
            embeddings_model: config.embeddings_deployment.clone(),
        },
    };

    Ok(Arc::new(OpenAIClient::new(
        endpoint,
        api_key,
        GenerationConfig {
            temperature: Some(config.temperature),
            ..Default::default()
        },
    )))
}

/// Everything the CLI and server share
#[derive(Clone)]
pub struct Runtime {
    pub config: AppConfig,
    pub llm: Arc<OpenAIClient>,
    pub retriever: Arc<IndexRetriever>,
    pub memory: Arc<InMemoryStore>,
    pub checkpointer: Arc<MemoryCheckpointer>,
    pub generator: Arc<PostGenerator>,
}

impl Runtime {
    pub fn from_config(config: AppConfig) -> Result<Self, PostgenError> {
        let llm = build_llm(&config.llm)?;
        let retriever = Arc::new(IndexRetriever::new(
            config.retrieval.index_path.clone(),
            llm.clone(),
        ));
        let memory = Arc::new(InMemoryStore::new());
        let checkpointer = Arc::new(MemoryCheckpointer::new());

        let deps = Deps {
            llm: llm.clone(),
            retriever: retriever.clone(),
            memory: memory.clone(),
            evaluator: Arc::new(LlmJudge::new(llm.clone(), &[FAITHFULNESS, ANSWER_RELEVANCY])),
        };
        let generator = Arc::new(PostGenerator::new(deps, &config, checkpointer.clone())?);

        Ok(Self {
            config,
            llm,
            retriever,
            memory,
            checkpointer,
            generator,
        })
    }

    pub fn ingest_pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.config.ingest.clone(),
            self.config.retrieval.index_path.clone(),
            self.llm.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_requires_endpoint_and_key() {
        let config = LlmConfig::default();
        assert!(matches!(build_llm(&config), Err(PostgenError::Config(_))));

        let config = LlmConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let err = build_llm(&config).err().unwrap();
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));
    }

    #[test]
    fn test_openai_defaults_base_url() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAI,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(build_llm(&config).is_ok());
    }

    #[test]
    fn test_runtime_from_config() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::OpenAI;
        config.llm.api_key = Some("sk-test".to_string());
        let runtime = Runtime::from_config(config).unwrap();
        assert_eq!(runtime.config.retrieval.top_k, 5);
    }
}
