// SPDX-License-Identifier: MIT

//! Request and response bodies for the HTTP API

use crate::adk::error::PostgenError;
use crate::postgen::service::GenerationResult;
use crate::postgen::workflow::ReviewInput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn default_platform() -> String {
    "linkedin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub user_id: String,
    pub platform: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub session_id: String,
    pub topic: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub max_refinements: Option<u32>,
    #[serde(default)]
    pub human_force_publish: bool,
    #[serde(default)]
    pub review: Option<bool>,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), PostgenError> {
        if self.topic.trim().is_empty() {
            return Err(PostgenError::InvalidRequest(
                "topic must not be empty".to_string(),
            ));
        }
        if self.platform.trim().is_empty() {
            return Err(PostgenError::InvalidRequest(
                "platform must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resume body; everything but the session id is checked by [`ReviewInput`]
#[derive(Debug, Clone, Deserialize)]
pub struct ResumeRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub review: Map<String, Value>,
}

impl ResumeRequest {
    pub fn review_input(&self) -> Result<ReviewInput, PostgenError> {
        ReviewInput::from_fields(&self.review)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerateResponse {
    Completed(GenerationResult),
    AwaitingReview {
        session_id: String,
        draft: String,
        writer: String,
        refinement_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub components: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
