// SPDX-License-Identifier: MIT

//! OpenAI-compatible client - chat completions and embeddings
//!
//! Speaks the OpenAI wire format against either an Azure OpenAI resource
//! (deployment-scoped URLs, `api-key` header) or the public OpenAI API
//! (model in the body, bearer token).

use super::{Embedder, GenerationConfig, LlmClient, Prompt};
use crate::adk::error::PostgenError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;

/// Where requests go and how they are addressed
#[derive(Debug, Clone)]
pub enum ChatEndpoint {
    Azure {
        endpoint: String,
        api_version: String,
        chat_deployment: String,
        embeddings_deployment: String,
    },
    OpenAI {
        base_url: String,
        chat_model: String,
        embeddings_model: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Chat,
    Embeddings,
}

/// Chat + embeddings client for OpenAI-compatible APIs
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    endpoint: ChatEndpoint,
    config: GenerationConfig,
}

impl OpenAIClient {
    pub fn new(endpoint: ChatEndpoint, api_key: String, config: GenerationConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint,
            config,
        }
    }

    fn provider(&self) -> &'static str {
        match self.endpoint {
            ChatEndpoint::Azure { .. } => "azure-openai",
            ChatEndpoint::OpenAI { .. } => "openai",
        }
    }

    fn url(&self, op: Operation) -> Result<Url, PostgenError> {
        let path = match op {
            Operation::Chat => "chat/completions",
            Operation::Embeddings => "embeddings",
        };

        match &self.endpoint {
            ChatEndpoint::Azure {
                endpoint,
                api_version,
                chat_deployment,
                embeddings_deployment,
            } => {
                let deployment = match op {
                    Operation::Chat => chat_deployment,
                    Operation::Embeddings => embeddings_deployment,
                };
                let mut url = Url::parse(&format!(
                    "{}/openai/deployments/{}/{}",
                    endpoint.trim_end_matches('/'),
                    deployment,
                    path
                ))?;
                url.query_pairs_mut()
                    .append_pair("api-version", api_version);
                Ok(url)
            }
            ChatEndpoint::OpenAI { base_url, .. } => Ok(Url::parse(&format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path
            ))?),
        }
    }

    /// Build the chat completions request body
    fn chat_body(&self, prompt: &Prompt) -> Value {
        let mut body = json!({
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ]
        });

        if let ChatEndpoint::OpenAI { chat_model, .. } = &self.endpoint {
            body["model"] = json!(chat_model);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }
        body
    }

    fn embeddings_body(&self, texts: &[String]) -> Value {
        let mut body = json!({ "input": texts });
        if let ChatEndpoint::OpenAI {
            embeddings_model, ..
        } = &self.endpoint
        {
            body["model"] = json!(embeddings_model);
        }
        body
    }

    /// Extract the assistant text from a chat completions response
    fn parse_chat_response(response: &Value) -> Result<String, PostgenError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| PostgenError::generation("openai", "No choices in response"))?;

        match choice["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => Err(PostgenError::generation(
                "openai",
                "Response message has no text content",
            )),
        }
    }

    /// Extract vectors from an embeddings response, ordered by `index`
    fn parse_embeddings_response(
        response: &Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, PostgenError> {
        let data = response["data"]
            .as_array()
            .ok_or_else(|| PostgenError::generation("openai", "No data in embeddings response"))?;

        let mut indexed: Vec<(usize, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
                let vector = item["embedding"]
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_f64())
                            .map(|v| v as f32)
                            .collect()
                    })
                    .unwrap_or_default();
                (index, vector)
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != expected {
            return Err(PostgenError::generation(
                "openai",
                format!(
                    "Expected {} embeddings, received {}",
                    expected,
                    indexed.len()
                ),
            ));
        }

        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }

    async fn post(&self, url: Url, body: &Value) -> Result<Value, PostgenError> {
        let request = self.client.post(url).json(body);
        let request = match self.endpoint {
            ChatEndpoint::Azure { .. } => request.header("api-key", &self.api_key),
            ChatEndpoint::OpenAI { .. } => request.bearer_auth(&self.api_key),
        };

        let resp = request.send().await.map_err(|e| {
            let message = format!("{} request failed: {}", self.provider(), e);
            if e.is_connect() || e.is_timeout() {
                PostgenError::transient(self.provider(), message)
            } else {
                PostgenError::generation(self.provider(), message)
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = format!("{} API error ({}): {}", self.provider(), status, text);
            return Err(if is_transient_status(status) {
                PostgenError::transient(self.provider(), message)
            } else {
                PostgenError::generation(self.provider(), message)
            });
        }

        resp.json().await.map_err(|e| {
            PostgenError::generation(
                self.provider(),
                format!("{} returned an unreadable body: {}", self.provider(), e),
            )
        })
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError> {
        let url = self.url(Operation::Chat)?;
        let body = self.chat_body(prompt);

        log::debug!(
            "{} chat request: {}",
            self.provider(),
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp_json = self.post(url, &body).await?;
        let text = Self::parse_chat_response(&resp_json)?;
        log::info!("{} returned {} chars", self.provider(), text.len());
        Ok(text)
    }
}

#[async_trait]
impl Embedder for OpenAIClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PostgenError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(Operation::Embeddings)?;
        let body = self.embeddings_body(texts);
        let resp_json = self.post(url, &body).await?;
        Self::parse_embeddings_response(&resp_json, texts.len())
    }
}
