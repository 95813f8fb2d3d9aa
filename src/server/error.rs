//! HTTP 에러 응답 (`{"detail": "..."}`)

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::chain::ChainError;
use crate::knowledge::RetrievalError;
use crate::pipeline::IngestError;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let detail = err.to_string();
        match err {
            ServiceError::NotReady => Self::Unavailable(detail),
            ServiceError::InvalidInput(_) => Self::Unprocessable(detail),
            ServiceError::Ingest(IngestError::EmptyCorpus(_)) => Self::Unprocessable(detail),
            ServiceError::Ingest(IngestError::Load { .. } | IngestError::Embed(_)) => {
                Self::Upstream(detail)
            }
            ServiceError::Ingest(IngestError::Chunking(_) | IngestError::Index(_)) => {
                Self::Internal(detail)
            }
            ServiceError::Answer(
                ChainError::Retrieval(RetrievalError::Embed(_)) | ChainError::Generate(_),
            ) => Self::Upstream(detail),
            ServiceError::Answer(ChainError::Retrieval(RetrievalError::Search(_))) => {
                Self::Internal(detail)
            }
            ServiceError::Internal(_) => Self::Internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed ({}): {}", status, self);
        } else {
            tracing::warn!("request rejected ({}): {}", status, self);
        }

        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_mapping() {
        let cases = [
            (ServiceError::NotReady, StatusCode::SERVICE_UNAVAILABLE),
            (
                ServiceError::InvalidInput("empty".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::Ingest(IngestError::EmptyCorpus("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::Ingest(IngestError::Embed(anyhow::anyhow!("down"))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::Ingest(IngestError::Index(anyhow::anyhow!("disk"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Answer(ChainError::Generate(anyhow::anyhow!("llm"))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::Answer(ChainError::Retrieval(RetrievalError::Embed(
                    anyhow::anyhow!("embedder down"),
                ))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::Answer(ChainError::Retrieval(RetrievalError::Search(
                    anyhow::anyhow!("Query dimension 768 does not match index dimension 384"),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Internal(anyhow::anyhow!("io")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Ingest(IngestError::Load {
                    source_name: "https://a.b".into(),
                    error: anyhow::anyhow!("HTTP 404"),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_detail_message() {
        let err = ApiError::from(ServiceError::NotReady);
        assert_eq!(err.to_string(), "No index loaded yet. Ingest a document first.");
    }
}
