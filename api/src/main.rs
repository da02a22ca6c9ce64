use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod error;
mod extract;
mod middleware;
mod routes;
mod state;

const DEFAULT_PORT: u16 = 7860;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FanFou Tools API",
        version = "0.1.0",
        description = "FanFou microblog tools over HTTP. Credentials travel per request in X-Fanfou-* headers; nothing is stored server-side."
    ),
    paths(
        routes::health::health_check,
        routes::tools::list_tools,
        routes::tools::call_tool,
    ),
    components(schemas(
        HealthResponse,
        routes::tools::ToolSummary,
        fanfou_core::ApiError,
    )),
    tags(
        (name = "tools", description = "List and call FanFou tools"),
        (name = "system", description = "Service status")
    )
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn app(app_state: state::AppState) -> Router {
    Router::new()
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(routes::ui::router())
        .merge(routes::health::router())
        .merge(routes::tools::router())
        .merge(routes::mcp_http::router())
        .layer(axum::middleware::from_fn(middleware::security_headers::apply))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanfou_api=debug,fanfou_mcp_runtime=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let app_state = state::AppState::from_env();
    tracing::info!(
        event = "fanfou_endpoints",
        api_base = %app_state.endpoints.api_base,
        oauth_base = %app_state.endpoints.oauth_base,
    );

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("FanFou web listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app(state::AppState::default())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn openapi_document_lists_tool_routes() {
        let (status, _, doc) = get_json("/api-doc/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/api/tools"].is_object());
        assert!(doc["paths"]["/api/tools/{name}"]["post"].is_object());
        assert!(doc["paths"]["/health"].is_object());
    }

    #[tokio::test]
    async fn assembled_app_applies_security_headers() {
        let (status, headers, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["cache-control"], "no-store");
    }
}
