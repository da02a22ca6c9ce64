use axum::http::{HeaderName, HeaderValue, Method};
use fanfou_core::CredentialField;
use tower_http::cors::CorsLayer;

const DEFAULT_ORIGINS: &str = "http://localhost:7860";

/// Build a CORS layer from the `FANFOU_CORS_ORIGINS` env var.
///
/// - Origins: comma-separated list (default: `http://localhost:7860`)
/// - Methods: GET, POST, OPTIONS
/// - Headers: Content-Type plus every `X-Fanfou-*` credential header
/// - Exposed: the minted token headers, so browser clients can read them
pub fn build_cors_layer() -> CorsLayer {
    let origins_str =
        std::env::var("FANFOU_CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_ORIGINS.to_string());
    cors_layer_for(&origins_str)
}

fn cors_layer_for(origins_str: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_origins(origins_str))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers())
        .expose_headers([
            HeaderName::from_static(crate::routes::tools::MINTED_TOKEN_HEADER),
            HeaderName::from_static(crate::routes::tools::MINTED_TOKEN_SECRET_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

fn parse_origins(origins_str: &str) -> Vec<HeaderValue> {
    origins_str
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

fn allowed_headers() -> Vec<HeaderName> {
    let mut headers = vec![HeaderName::from_static("content-type")];
    headers.extend(
        CredentialField::ALL
            .into_iter()
            .filter_map(|field| HeaderName::try_from(field.header_name()).ok()),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use tower::ServiceExt;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        let origins = parse_origins(" https://a.example , ,https://b.example");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn credential_headers_are_allowed() {
        let headers = allowed_headers();
        assert_eq!(headers.len(), 1 + CredentialField::ALL.len());
        assert!(headers.iter().any(|h| h == "x-fanfou-oauth-token-secret"));
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin() {
        let app = Router::new()
            .route("/api/tools/x", post(|| async { StatusCode::OK }))
            .layer(cors_layer_for("https://ui.example"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/tools/x")
                    .header("origin", "https://ui.example")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "x-fanfou-api-key")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://ui.example"
        );
    }
}
