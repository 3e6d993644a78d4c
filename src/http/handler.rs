//! HTTP handlers for the gateway API.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::graph::ResultRow;
use crate::nlq::{NlqError, Pipeline, Provenance};
use crate::schema::RECOMMENDED_QUESTIONS;

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
    pub neo4j_uri: String,
    pub model: String,
}

fn default_session() -> String {
    "default".to_string()
}

/// Parameters accepted by `/ask`.
#[derive(Deserialize)]
pub struct AskParams {
    pub query: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default)]
    pub dryrun: bool,
}

/// Response for `/ask`.
#[derive(Serialize)]
pub struct AskResponse {
    pub query: String,
    pub cypher: String,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<&'static str>,
    pub results: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub session_id: String,
    pub used_prev_context: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_format: Option<&'static str>,
}

/// Error envelope shared by every endpoint.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<NlqError> for ApiError {
    fn from(err: NlqError) -> Self {
        let status = match &err {
            NlqError::UnsafeQuery { .. } => StatusCode::BAD_REQUEST,
            NlqError::GeneratorUnavailable | NlqError::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            NlqError::Generator(_) | NlqError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "request failed");
        }
        Self { status, message: err.to_string() }
    }
}

/// `GET /ask`: translate, gate, and (unless dryrun) execute a question.
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AskParams>,
) -> Result<Json<AskResponse>, ApiError> {
    let outcome = state
        .pipeline
        .ask(&params.query, &params.session_id, params.dryrun)
        .await?;

    Ok(Json(AskResponse {
        query: outcome.question,
        cypher: outcome.cypher,
        provenance: outcome.provenance,
        template: outcome.template,
        results: outcome.results,
        note: outcome.dryrun.then(|| "dryrun=true".to_string()),
        session_id: outcome.session_id,
        used_prev_context: outcome.used_prev_context,
        answer: outcome.answer,
        answer_format: outcome.answer_shape.map(|s| s.as_str()),
    }))
}

/// Parameters accepted by `/reset`.
#[derive(Deserialize)]
pub struct ResetParams {
    #[serde(default = "default_session")]
    pub session_id: String,
}

/// `POST /reset`: drop one session's context slot.
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResetParams>,
) -> Json<serde_json::Value> {
    state.pipeline.contexts().clear(&params.session_id);
    Json(json!({
        "status": "ok",
        "message": format!("session '{}' 已清空", params.session_id),
    }))
}

/// `GET /schema`: the graph shape plus curated questions.
pub async fn schema_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "policy": "answers_must_come_from_database_only",
        "neo4j": { "uri": state.neo4j_uri },
        "schema": state.pipeline.schema().to_json(),
        "recommended_queries": RECOMMENDED_QUESTIONS,
    }))
}

/// `GET /health`: collaborator readiness.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "neo4j_ready": state.pipeline.store_ready(),
        "neo4j_uri": state.neo4j_uri,
        "llm_ready": state.pipeline.generator_ready(),
        "model": state.model,
    }))
}

/// `GET /`: entry points for a browser poking around.
pub async fn index_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "LLM → Cypher → Neo4j API",
        "try": [
            "/health",
            "/schema",
            "/ask?query=系统中都有哪些舌象？",
            "/ask?query=系统中都有哪些脉象？",
            "/ask?query=系统中有哪些处方的煎服方法及其频次？",
            "/ask?query=在中药为杏仁的案例中，都有哪些症状及其频次？",
            "/ask?query=在证型为肺热的案例中有哪些药方",
            "/ask?query=列出系统中的所有原始文献",
            "/ask?query=列出系统中脉象为空的案例号",
        ],
    }))
}
