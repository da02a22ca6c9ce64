use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::extract::HeaderCredentials;
use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new().route(MCP_PATH, post(mcp_post).get(mcp_get))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// JSON-RPC over HTTP. Each request brings its own `X-Fanfou-*` credentials
/// and gets a server of its own.
async fn mcp_post(
    State(state): State<AppState>,
    credentials: HeaderCredentials,
    body: Bytes,
) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(event = "mcp_http_parse_error", error = %err);
            return (
                StatusCode::OK,
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": "Parse error"
                    }
                })),
            )
                .into_response();
        }
    };

    let mut responses =
        fanfou_mcp_runtime::handle_http_jsonrpc(state.endpoints, &credentials, incoming).await;

    match responses.len() {
        0 => StatusCode::ACCEPTED.into_response(),
        1 => (StatusCode::OK, Json(responses.remove(0))).into_response(),
        _ => (StatusCode::OK, Json(Value::Array(responses))).into_response(),
    }
}
