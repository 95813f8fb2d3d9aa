//! HTTP 서버
//!
//! `GET /` 상태 확인, `POST /ingest` URL 인덱싱, `POST /chat` 질의응답.

mod error;
mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::RagService;

pub use error::ApiError;

use handlers::{chat_handler, health_handler, ingest_handler};

/// 요청 본문 최대 크기
const MAX_BODY_SIZE: usize = 1_048_576;

/// 라우터 생성
pub fn build_router(service: Arc<RagService>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/ingest", post(ingest_handler))
        .route("/chat", post(chat_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// CORS 레이어 (`"*"`가 있으면 전체 허용)
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 서버 실행 (Ctrl-C로 종료)
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind_addr();
    let cors_origins = config.server.cors_origins.clone();

    let service = Arc::new(RagService::new(config).await?);
    if let Err(e) = service.load_existing().await {
        tracing::warn!("Failed to load stored index: {}", e);
    }

    let router = build_router(service, &cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("RAG FAQ Bot listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::knowledge::test_support::{KeywordEmbedding, RecordingModel};

    const PAGE: &str = "<html><head><title>Vectors</title></head><body>\
        <nav>menu</nav><article><p>LanceDB stores vectors on local disk for the RAG bot. \
        Ollama runs the embedding model and the chat model that writes each answer.</p>\
        </article></body></html>";

    async fn app(dir: &TempDir) -> Router {
        let mut config = Config::default();
        config.index.dir = dir.path().join("vectorstore");
        let service = RagService::with_components(
            config,
            Arc::new(KeywordEmbedding),
            Arc::new(RecordingModel::new("Vectors live in LanceDB.")),
        )
        .await
        .unwrap();
        build_router(Arc::new(service), &["*".to_string()])
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app(&dir).await.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["msg"], "RAG FAQ Bot running");
        assert!(json["index"].is_null());
    }

    #[tokio::test]
    async fn test_chat_without_index() {
        let dir = TempDir::new().unwrap();
        let resp = app(&dir)
            .await
            .oneshot(post_json("/chat", serde_json::json!({"question": "hi"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(resp).await;
        assert!(json["detail"].as_str().unwrap().contains("No index"));
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let resp = app
            .clone()
            .oneshot(post_json("/chat", serde_json::json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = app
            .oneshot(post_json("/chat", serde_json::json!({"q": "missing"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(resp).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_ingest_then_chat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;
        let url = format!("{}/page", server.uri());

        let resp = app
            .clone()
            .oneshot(post_json("/ingest", serde_json::json!({ "url": url })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["msg"], format!("Indexed content from {url}"));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"question": "Where are vectors stored?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["answer"], "Vectors live in LanceDB.");
        assert_eq!(json["sources"][0]["title"], "Vectors");

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let json = json_body(app.oneshot(req).await.unwrap()).await;
        assert_eq!(json["index"]["sources"][0], url);
    }

    #[tokio::test]
    async fn test_ingest_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let resp = app(&dir)
            .await
            .oneshot(post_json(
                "/ingest",
                serde_json::json!({ "url": format!("{}/down", server.uri()) }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let dir = TempDir::new().unwrap();
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app(&dir).await.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }
}
