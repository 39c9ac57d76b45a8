// SPDX-License-Identifier: MIT

//! Application configuration
//!
//! Resolution order: built-in defaults, then an optional YAML file, then
//! environment variables. Everything is resolved once at startup and passed
//! down explicitly; nothing reads the environment at call time.

use crate::adk::error::PostgenError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Thresholds and the refinement cap used by the quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub faithfulness_threshold: f64,
    pub relevancy_threshold: f64,
    pub sentiment_threshold: f64,
    pub seo_threshold: f64,
    pub max_refinements: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            faithfulness_threshold: 0.80,
            relevancy_threshold: 0.80,
            sentiment_threshold: 0.70,
            seo_threshold: 0.75,
            max_refinements: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Include error details in HTTP error bodies
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory holding `index.json`
    pub index_path: PathBuf,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/index"),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Azure,
    OpenAI,
}

impl FromStr for LlmProvider {
    type Err = PostgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "azure" | "azure-openai" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAI),
            other => Err(PostgenError::config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    /// Azure deployment or OpenAI model name for chat
    pub chat_deployment: String,
    /// Azure deployment or OpenAI model name for embeddings
    pub embeddings_deployment: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Azure,
            endpoint: None,
            api_key: None,
            api_version: "2024-02-01".to_string(),
            chat_deployment: "gpt-4o".to_string(),
            embeddings_deployment: "text-embedding-3-small".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    /// Pause between embedding batches, in seconds
    pub batch_delay_secs: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/docs"),
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 50,
            batch_delay_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReviewConfig {
    /// Suspend for human review after each draft unless a request says otherwise
    pub enabled: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub quality: QualityConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub ingest: IngestConfig,
    pub review: ReviewConfig,
}

impl AppConfig {
    /// Defaults, then `path` (if any), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, PostgenError> {
        let mut config = match path {
            Some(p) => {
                log::info!("Loading configuration from {}", p.display());
                Self::from_yaml(&std::fs::read_to_string(p)?)?
            }
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, PostgenError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), PostgenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvOverlay { lookup };

        env.set_string("API_HOST", &mut self.server.host);
        env.set_parsed("API_PORT", &mut self.server.port)?;
        env.set_bool("DEBUG", &mut self.server.debug);

        env.set_parsed("FAITHFULNESS_THRESHOLD", &mut self.quality.faithfulness_threshold)?;
        env.set_parsed("ANSWER_RELEVANCY_THRESHOLD", &mut self.quality.relevancy_threshold)?;
        env.set_parsed("MAX_REFINEMENT_LOOPS", &mut self.quality.max_refinements)?;

        if let Some(path) = env.get("INDEX_PATH") {
            self.retrieval.index_path = PathBuf::from(path);
        }
        env.set_parsed("RETRIEVAL_TOP_K", &mut self.retrieval.top_k)?;

        env.set_parsed("LLM_PROVIDER", &mut self.llm.provider)?;
        match self.llm.provider {
            LlmProvider::Azure => {
                env.set_option("AZURE_OPENAI_ENDPOINT", &mut self.llm.endpoint);
                env.set_option("AZURE_OPENAI_API_KEY", &mut self.llm.api_key);
            }
            LlmProvider::OpenAI => {
                env.set_option("OPENAI_BASE_URL", &mut self.llm.endpoint);
                env.set_option("OPENAI_API_KEY", &mut self.llm.api_key);
            }
        }
        env.set_string("AZURE_OPENAI_API_VERSION", &mut self.llm.api_version);
        env.set_string("AZURE_OPENAI_CHAT_DEPLOYMENT", &mut self.llm.chat_deployment);
        env.set_string(
            "AZURE_OPENAI_EMBEDDINGS_DEPLOYMENT",
            &mut self.llm.embeddings_deployment,
        );
        env.set_parsed("LLM_TEMPERATURE", &mut self.llm.temperature)?;

        if let Some(dir) = env.get("DATA_DIR") {
            self.ingest.data_dir = PathBuf::from(dir);
        }
        env.set_parsed("CHUNK_SIZE", &mut self.ingest.chunk_size)?;
        env.set_parsed("CHUNK_OVERLAP", &mut self.ingest.chunk_overlap)?;
        env.set_parsed("EMBEDDING_BATCH_SIZE", &mut self.ingest.batch_size)?;
        env.set_parsed("EMBEDDING_BATCH_DELAY", &mut self.ingest.batch_delay_secs)?;

        env.set_bool("ENABLE_HITL", &mut self.review.enabled);

        self.validate()
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), PostgenError> {
        let q = &self.quality;
        for (name, value) in [
            ("faithfulness_threshold", q.faithfulness_threshold),
            ("relevancy_threshold", q.relevancy_threshold),
            ("sentiment_threshold", q.sentiment_threshold),
            ("seo_threshold", q.seo_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PostgenError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.ingest.chunk_size == 0 {
            return Err(PostgenError::config("chunk_size must be positive"));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(PostgenError::config(
                "chunk_overlap must be smaller than chunk_size",
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(PostgenError::config("batch_size must be positive"));
        }
        Ok(())
    }
}

struct EnvOverlay<F> {
    lookup: F,
}

impl<F> EnvOverlay<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn set_string(&self, key: &str, target: &mut String) {
        if let Some(v) = self.get(key) {
            *target = v;
        }
    }

    fn set_option(&self, key: &str, target: &mut Option<String>) {
        if let Some(v) = self.get(key) {
            *target = Some(v);
        }
    }

    fn set_bool(&self, key: &str, target: &mut bool) {
        if let Some(v) = self.get(key) {
            *target = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn set_parsed<T>(&self, key: &str, target: &mut T) -> Result<(), PostgenError>
    where
        T: FromStr,
    {
        if let Some(v) = self.get(key) {
            *target = v
                .trim()
                .parse()
                .map_err(|_| PostgenError::config(format!("Invalid value for {}: {}", key, v)))?;
        }
        Ok(())
    }
}
