// SPDX-License-Identifier: MIT

//! Typed error handling for postgen-rs
//!
//! Every generation request fails independently; nothing here is fatal to the
//! process. Evaluation misses are not errors at all (they score 0.0), and
//! reaching the refinement cap is a normal termination.

use thiserror::Error;

/// Top-level error type for postgen-rs
#[derive(Debug, Error)]
pub enum PostgenError {
    /// The retriever cannot answer (index missing, backend down)
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// An LLM or embeddings call failed
    #[error("Generation failed at {provider}: {message}")]
    Generation {
        provider: String,
        message: String,
        /// Rate limits and 5xx responses; callers may retry these
        transient: bool,
    },

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session id is malformed or unknown
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Request body failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resume payload failed validation
    #[error("Invalid review input: {0}")]
    InvalidReview(String),

    /// No checkpoint stored for the session
    #[error("No suspended run for session '{0}'")]
    SessionNotFound(String),

    /// Resume was requested for a run that is not waiting on a reviewer
    #[error("Session '{session_id}' is not awaiting review (status: {status})")]
    NotAwaitingReview { session_id: String, status: String },

    /// Graph construction or execution errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// A step tried to put the state somewhere it may not go
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Graph construction and scheduling errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An edge or entry point names a node that was never added
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Graph has no entry point
    #[error("Graph '{0}' has no entry point")]
    MissingEntry(String),

    /// A step returned an update for a field it does not declare
    #[error("Node '{node}' wrote undeclared field '{field}'")]
    UndeclaredWrite { node: String, field: String },

    /// Two nodes of the same superstep wrote the same field
    #[error("Nodes '{first}' and '{second}' both wrote field '{field}' in one superstep")]
    ConflictingWrites {
        field: String,
        first: String,
        second: String,
    },

    /// A conditional edge produced a branch label with no target
    #[error("Node '{node}' routed to unknown branch '{branch}'")]
    UnknownBranch { node: String, branch: String },

    /// Safety limit on supersteps
    #[error("Max supersteps reached: {0}")]
    MaxSupersteps(usize),
}

/// Invariant violations on `GenerationState`
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("final_post is already set")]
    FinalPostAlreadySet,

    #[error("refinement_count may not decrease ({current} -> {proposed})")]
    RefinementCountDecreased { current: u32, proposed: u32 },

    #[error("refinement_count {count} exceeds max_refinements {max}")]
    RefinementCapExceeded { count: u32, max: u32 },

    #[error("unsupported state version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

impl PostgenError {
    /// Create a non-transient generation error
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Create a transient generation error (rate limit, service unavailable)
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a caller could reasonably retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation { transient: true, .. })
    }
}
