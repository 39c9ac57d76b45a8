// SPDX-License-Identifier: MIT

//! HTTP API - sessions, generation, streaming generation and review resume

pub mod schemas;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::PostgenError;
use crate::adk::memory::{MemoryStore, UserPreferences};
use crate::adk::retriever::Retriever;
use crate::postgen::config::ServerConfig;
use crate::postgen::service::{GenerationOutcome, GenerationRequest, PostGenerator};
use crate::postgen::workflow::graph::WorkflowEvent;

use schemas::{
    CreateSessionRequest, CreateSessionResponse, ErrorResponse, GenerateRequest,
    GenerateResponse, HealthResponse, ResumeRequest,
};

/// Parse `session-{user_id}-{8 hex}` back into the user id
pub fn parse_session_id(session_id: &str) -> Option<String> {
    let rest = session_id.strip_prefix("session-")?;
    let (user_id, suffix) = rest.rsplit_once('-')?;
    if user_id.is_empty()
        || suffix.len() != 8
        || !suffix.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }
    Some(user_id.to_string())
}

/// Session id -> user id for sessions created through this server
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user_id: &str) -> String {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let session_id = format!("session-{}-{}", user_id, suffix);
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), user_id.to_string());
        session_id
    }

    /// Registered sessions first, then the id format itself
    pub async fn resolve(&self, session_id: &str) -> Result<String, PostgenError> {
        if let Some(user_id) = self.sessions.read().await.get(session_id) {
            return Ok(user_id.clone());
        }
        parse_session_id(session_id).ok_or_else(|| {
            PostgenError::InvalidSession(format!(
                "'{}' is not of the form session-{{user_id}}-{{8 hex}}",
                session_id
            ))
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<PostGenerator>,
    pub memory: Arc<dyn MemoryStore>,
    pub retriever: Arc<dyn Retriever>,
    pub sessions: SessionRegistry,
    /// Include error details in responses
    pub debug: bool,
}

impl AppState {
    fn fail(&self, error: PostgenError) -> ApiError {
        ApiError {
            error,
            debug: self.debug,
        }
    }
}

pub struct ApiError {
    error: PostgenError,
    debug: bool,
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match &self.error {
            PostgenError::RetrievalUnavailable(_) => {
                (StatusCode::FAILED_DEPENDENCY, "retrieval_unavailable")
            }
            e @ PostgenError::Generation { .. } if e.is_transient() => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            PostgenError::Generation { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "generation_failed")
            }
            PostgenError::InvalidSession(_) => (StatusCode::BAD_REQUEST, "invalid_session"),
            PostgenError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            PostgenError::InvalidReview(_) => (StatusCode::BAD_REQUEST, "invalid_review"),
            PostgenError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            PostgenError::NotAwaitingReview { .. } => {
                (StatusCode::CONFLICT, "not_awaiting_review")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self.error);
        } else {
            log::warn!("Request rejected: {}", self.error);
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal error while generating the post".to_string()
        } else {
            self.error.to_string()
        };
        let body = ErrorResponse {
            error: code.to_string(),
            message,
            detail: self.debug.then(|| format!("{:?}", self.error)),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/posts:generate", post(generate_post))
        .route("/posts:generate:stream", post(stream_post))
        .route("/posts:resume", post(resume_post))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: &ServerConfig, state: AppState) -> Result<(), PostgenError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Social post generation API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "endpoints": [
            "POST /sessions",
            "POST /posts:generate",
            "POST /posts:generate:stream",
            "POST /posts:resume"
        ]
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let retriever_ready = state.retriever.is_ready().await;
    let mut components = BTreeMap::new();
    components.insert(
        "retriever".to_string(),
        if retriever_ready { "ok" } else { "not_initialized" }.to_string(),
    );
    components.insert("ltm".to_string(), "ok".to_string());
    components.insert("checkpointer".to_string(), "ok".to_string());

    let (status, message) = if retriever_ready {
        ("healthy", "All components operational")
    } else {
        ("degraded", "Vector index not found; run ingestion first")
    };
    Json(HealthResponse {
        status: status.to_string(),
        message: message.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        components,
    })
}

async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    if payload.user_id.trim().is_empty() {
        return Err(state.fail(PostgenError::InvalidRequest(
            "user_id must not be empty".to_string(),
        )));
    }

    let existing = state
        .memory
        .get_preferences(&payload.user_id)
        .await
        .map_err(|e| state.fail(e))?;
    if existing.is_none() {
        log::info!("Creating default preferences for user {}", payload.user_id);
        state
            .memory
            .upsert_preferences(
                &payload.user_id,
                UserPreferences::defaults_for(&payload.user_id, &payload.platform),
            )
            .await
            .map_err(|e| state.fail(e))?;
    }

    let session_id = state.sessions.create(&payload.user_id).await;
    log::info!("Created session {}", session_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            user_id: payload.user_id,
            platform: payload.platform,
            message: "Session created".to_string(),
        }),
    ))
}

async fn generation_request(
    state: &AppState,
    payload: GenerateRequest,
) -> Result<GenerationRequest, ApiError> {
    payload.validate().map_err(|e| state.fail(e))?;
    let user_id = state
        .sessions
        .resolve(&payload.session_id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(GenerationRequest {
        user_id,
        session_id: payload.session_id,
        topic: payload.topic,
        platform: payload.platform,
        tone: payload.tone,
        content_type: payload.content_type,
        max_refinements: payload.max_refinements,
        human_force_publish: payload.human_force_publish,
        review: payload.review,
    })
}

fn outcome_response(outcome: GenerationOutcome) -> (StatusCode, Json<GenerateResponse>) {
    match outcome {
        GenerationOutcome::Completed(result) => {
            (StatusCode::OK, Json(GenerateResponse::Completed(result)))
        }
        GenerationOutcome::AwaitingReview {
            session_id,
            draft,
            writer,
            refinement_count,
        } => (
            StatusCode::ACCEPTED,
            Json(GenerateResponse::AwaitingReview {
                session_id,
                draft,
                writer,
                refinement_count,
            }),
        ),
    }
}

async fn generate_post(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let request = generation_request(&state, payload).await?;
    let outcome = state
        .generator
        .generate(request, None)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(outcome_response(outcome))
}

async fn resume_post(
    State(state): State<AppState>,
    Json(payload): Json<ResumeRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let review = payload.review_input().map_err(|e| state.fail(e))?;
    state
        .sessions
        .resolve(&payload.session_id)
        .await
        .map_err(|e| state.fail(e))?;
    let outcome = state
        .generator
        .resume(&payload.session_id, review, None)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(outcome_response(outcome))
}

/// Event JSON with a UTC timestamp
fn sse_payload(event: &WorkflowEvent) -> Value {
    let mut payload = match serde_json::to_value(event) {
        Ok(value) => value,
        Err(e) => json!({ "type": "error", "message": e.to_string() }),
    };
    if let Value::Object(map) = &mut payload {
        map.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    payload
}

async fn stream_post(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = generation_request(&state, payload).await?;
    let (tx, rx) = mpsc::channel(100);

    let generator = state.generator.clone();
    tokio::spawn(async move {
        log::info!("Starting streaming generation for {}", request.session_id);
        if let Err(e) = generator.generate(request, Some(&tx)).await {
            log::error!("Streaming generation failed: {}", e);
            let _ = tx
                .send(WorkflowEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|event: WorkflowEvent| {
        let sse = Event::default()
            .event(event.kind())
            .json_data(sse_payload(&event))
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok(sse)
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::evaluator::Scores;
    use crate::adk::llm::{LlmClient, Prompt};
    use crate::adk::memory::InMemoryStore;
    use crate::adk::retriever::ScoredPassage;
    use crate::postgen::agents::mocks::{passages, MockEvaluator, MockRetriever};
    use crate::postgen::agents::Deps;
    use crate::postgen::config::AppConfig;
    use crate::postgen::workflow::graph::MemoryCheckpointer;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct ScriptedLlm;

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &Prompt) -> Result<String, PostgenError> {
            if prompt.system.contains("analyze the tone") {
                Ok(r#"{"sentiment_score": 0.9, "detected_tone": "professional"}"#.to_string())
            } else if prompt.system.contains("planning") {
                Ok("1. Hook\n2. Points".to_string())
            } else {
                Ok("Ownership keeps Rust fast and safe. #rust".to_string())
            }
        }
    }

    /// Always unavailable, like a missing index
    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        async fn search(&self, _q: &str, _k: usize) -> Result<Vec<ScoredPassage>, PostgenError> {
            Err(PostgenError::retrieval("no index"))
        }

        async fn is_ready(&self) -> bool {
            false
        }
    }

    fn app_with(retriever: Arc<dyn Retriever>) -> (Router, Arc<InMemoryStore>) {
        let scores: Scores = [
            ("faithfulness".to_string(), 0.95),
            ("answer_relevancy".to_string(), 0.9),
        ]
        .into_iter()
        .collect();
        let memory = Arc::new(InMemoryStore::new());
        let deps = Deps {
            llm: Arc::new(ScriptedLlm),
            retriever: retriever.clone(),
            memory: memory.clone(),
            evaluator: Arc::new(MockEvaluator(scores)),
        };
        let generator = PostGenerator::new(
            deps,
            &AppConfig::default(),
            Arc::new(MemoryCheckpointer::new()),
        )
        .unwrap();
        let state = AppState {
            generator: Arc::new(generator),
            memory: memory.clone(),
            retriever,
            sessions: SessionRegistry::new(),
            debug: false,
        };
        (router(state), memory)
    }

    fn app() -> (Router, Arc<InMemoryStore>) {
        app_with(Arc::new(MockRetriever(passages(&["Rust ownership"]))))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_session_id() {
        assert_eq!(
            parse_session_id("session-ana-1a2b3c4d").as_deref(),
            Some("ana")
        );
        assert_eq!(
            parse_session_id("session-user-42-deadbeef").as_deref(),
            Some("user-42")
        );
        assert_eq!(parse_session_id("session-ana-xyz"), None);
        assert_eq!(parse_session_id("session--1a2b3c4d"), None);
        assert_eq!(parse_session_id("ana-1a2b3c4d"), None);
    }

    #[tokio::test]
    async fn test_registry_prefers_registered_sessions() {
        let registry = SessionRegistry::new();
        let id = registry.create("ana").await;
        assert!(id.starts_with("session-ana-"));
        assert_eq!(registry.resolve(&id).await.unwrap(), "ana");
        assert!(matches!(
            registry.resolve("bogus").await,
            Err(PostgenError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_health_reports_components() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["retriever"], "ok");

        let (app, _) = app_with(Arc::new(DownRetriever));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["retriever"], "not_initialized");
    }

    #[tokio::test]
    async fn test_create_session_writes_default_preferences() {
        let (app, memory) = app();
        let response = app
            .oneshot(post_json("/sessions", json!({"user_id": "ana"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["platform"], "linkedin");
        assert!(parse_session_id(body["session_id"].as_str().unwrap()).is_some());

        let prefs = memory.get_preferences("ana").await.unwrap().unwrap();
        assert_eq!(prefs.preferred_tone.as_deref(), Some("professional"));
        assert!(prefs.platform_defaults.contains_key("linkedin"));
    }

    #[tokio::test]
    async fn test_generate_returns_post() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/posts:generate",
                json!({
                    "session_id": "session-ana-0123abcd",
                    "topic": "Rust ownership",
                    "platform": "twitter"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["writer"], "twitter_writer");
        assert_eq!(body["acceptance"], "passed");
        assert!(body["final_post"].as_str().unwrap().contains("Ownership"));
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_session() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/posts:generate",
                json!({"session_id": "nope", "topic": "Rust"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_session");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_retrieval_unavailable_is_424() {
        let (app, _) = app_with(Arc::new(DownRetriever));
        let response = app
            .oneshot(post_json(
                "/posts:generate",
                json!({"session_id": "session-ana-0123abcd", "topic": "Rust"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
        assert_eq!(body_json(response).await["error"], "retrieval_unavailable");
    }

    #[tokio::test]
    async fn test_review_round_trip_over_http() {
        let (app, _) = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/posts:generate",
                json!({
                    "session_id": "session-ana-0123abcd",
                    "topic": "Rust ownership",
                    "review": true
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "awaiting_review");
        assert!(!body["draft"].as_str().unwrap().is_empty());

        let response = app
            .clone()
            .oneshot(post_json(
                "/posts:resume",
                json!({"session_id": "session-ana-0123abcd", "human_approved": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json(
                "/posts:resume",
                json!({"session_id": "session-ana-0123abcd", "human_approved": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/posts:resume",
                json!({"session_id": "session-ana-0123abcd", "human_approved": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_resume_unknown_session_is_404() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/posts:resume",
                json!({"session_id": "session-bob-0123abcd", "human_approved": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_emits_events_in_order() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/posts:generate:stream",
                json!({"session_id": "session-ana-0123abcd", "topic": "Rust"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let start = text.find("event: node_start").unwrap();
        let complete = text.find("event: complete").unwrap();
        assert!(start < complete);
        assert!(text.contains("\"timestamp\""));
        assert!(!text.contains("event: error"));
    }

    #[test]
    fn test_generation_errors_map_by_transience() {
        let status = |error| ApiError { error, debug: false }.status();
        assert_eq!(
            status(PostgenError::transient("openai", "connection refused")),
            (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
        );
        assert_eq!(
            status(PostgenError::generation("openai", "unreadable body")),
            (StatusCode::INTERNAL_SERVER_ERROR, "generation_failed")
        );
    }

    #[test]
    fn test_sse_payload_adds_timestamp() {
        let payload = sse_payload(&WorkflowEvent::Error {
            message: "boom".to_string(),
        });
        assert_eq!(payload["type"], "error");
        assert!(payload["timestamp"].as_str().is_some());
    }
}
