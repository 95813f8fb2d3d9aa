use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::chain::Answer;
use crate::knowledge::IndexManifest;
use crate::service::RagService;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct IngestRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    pub question: String,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    status: &'static str,
    msg: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    msg: &'static str,
    index: Option<IndexManifest>,
}

pub(crate) async fn health_handler(State(service): State<Arc<RagService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        msg: "RAG FAQ Bot running",
        index: service.status().await.manifest,
    })
}

pub(crate) async fn ingest_handler(
    State(service): State<Arc<RagService>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = payload?;
    let url = req.url.trim();
    service.ingest_url(url).await?;

    Ok(Json(StatusResponse {
        status: "ok",
        msg: format!("Indexed content from {url}"),
    }))
}

pub(crate) async fn chat_handler(
    State(service): State<Arc<RagService>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(service.ask(&req.question).await?))
}
