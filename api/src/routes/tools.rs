use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fanfou_core::{TokenPair, resolve};
use fanfou_mcp_runtime::{ToolDefinition, Toolbox, tool_definitions};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::{HeaderCredentials, ToolArguments};
use crate::state::AppState;

pub const MINTED_TOKEN_HEADER: &str = "x-fanfou-minted-oauth-token";
pub const MINTED_TOKEN_SECRET_HEADER: &str = "x-fanfou-minted-oauth-token-secret";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(call_tool))
}

/// One entry of the tool catalogue.
#[derive(Serialize, ToSchema)]
pub struct ToolSummary {
    /// Tool name, used as the `{name}` path segment
    pub name: String,
    /// What the tool does and how its text fields are formatted
    pub description: String,
    /// JSON Schema of the tool arguments
    #[serde(rename = "inputSchema")]
    #[schema(value_type = Object)]
    pub input_schema: Value,
}

impl From<ToolDefinition> for ToolSummary {
    fn from(definition: ToolDefinition) -> Self {
        Self {
            name: definition.name.to_string(),
            description: definition.description,
            input_schema: definition.input_schema,
        }
    }
}

/// List every tool with its argument schema
#[utoipa::path(
    get,
    path = "/api/tools",
    responses(
        (status = 200, description = "Tool catalogue", body = Vec<ToolSummary>)
    ),
    tag = "tools"
)]
pub async fn list_tools() -> Json<Vec<ToolSummary>> {
    Json(tool_definitions().into_iter().map(ToolSummary::from).collect())
}

/// Run one tool with the credentials in the `X-Fanfou-*` headers.
///
/// The body is the JSON argument object (empty means `{}`). FanFou failures
/// and confirmation prompts are tool results, so they come back as 200 with
/// the data the tool produced.
#[utoipa::path(
    post,
    path = "/api/tools/{name}",
    params(
        ("name" = String, Path, description = "Tool name from GET /api/tools")
    ),
    responses(
        (status = 200, description = "Tool result (data, error object or confirmation prompt)",
            headers(
                ("x-fanfou-minted-oauth-token" = String, description = "Set when this call logged in with username/password"),
                ("x-fanfou-minted-oauth-token-secret" = String, description = "Secret of the minted token pair")
            )
        ),
        (status = 400, description = "Arguments are not a JSON object", body = fanfou_core::ApiError),
        (status = 404, description = "Unknown tool", body = fanfou_core::ApiError)
    ),
    tag = "tools"
)]
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    credentials: HeaderCredentials,
    ToolArguments(args): ToolArguments,
) -> Result<Response, AppError> {
    let toolbox = Toolbox::new(state.endpoints, resolve(&credentials));
    let output = toolbox.call(&name, &args).await?;

    let mut headers = HeaderMap::new();
    if let Some(pair) = &output.minted {
        insert_minted_headers(&mut headers, pair);
    }
    Ok((StatusCode::OK, headers, Json(output.value)).into_response())
}

fn insert_minted_headers(headers: &mut HeaderMap, pair: &TokenPair) {
    for (name, value) in [
        (MINTED_TOKEN_HEADER, &pair.token),
        (MINTED_TOKEN_SECRET_HEADER, &pair.secret),
    ] {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!(event = "minted_token_header_skipped", header = name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use fanfou_mcp_runtime::Endpoints;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(endpoints: Endpoints) -> Router {
        router().with_state(AppState { endpoints })
    }

    fn with_token(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder
            .header("x-fanfou-api-key", "ck")
            .header("x-fanfou-api-secret", "cs")
            .header("x-fanfou-oauth-token", "tok")
            .header("x-fanfou-oauth-token-secret", "ts")
    }

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn list_tools_returns_catalogue() {
        let response = app(Endpoints::default())
            .oneshot(Request::builder().uri("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let tools = json.as_array().unwrap();
        assert_eq!(tools.len(), 11);
        assert!(tools.iter().all(|tool| tool["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_tool_is_404() {
        let request = with_token(Request::builder().method("POST").uri("/api/tools/nope"))
            .body(Body::empty())
            .unwrap();
        let response = app(Endpoints::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn non_object_arguments_are_400() {
        let request = with_token(Request::builder().method("POST").uri("/api/tools/get_home_timeline"))
            .header("content-type", "application/json")
            .body(Body::from("[1]"))
            .unwrap();
        let response = app(Endpoints::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "body");
    }

    #[tokio::test]
    async fn unconfirmed_delete_returns_prompt_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let request = with_token(Request::builder().method("POST").uri("/api/tools/delete_status"))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "status_id": "s9" }).to_string()))
            .unwrap();
        let response = app(Endpoints::new(server.uri(), server.uri()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["需要确认"], true);
    }

    #[tokio::test]
    async fn missing_credentials_come_back_as_data() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tools/get_home_timeline")
            .body(Body::empty())
            .unwrap();
        let response = app(Endpoints::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let message = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(message.contains("X-Fanfou-Api-Key"));
        assert!(message.contains("X-Fanfou-Api-Secret"));
    }

    #[tokio::test]
    async fn password_login_sets_minted_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("oauth_token=t1&oauth_token_secret=s1"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/show.json"))
            .and(query_param("id", "u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1",
                "name": "Alice"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/tools/get_user_info")
            .header("x-fanfou-api-key", "ck")
            .header("x-fanfou-api-secret", "cs")
            .header("x-fanfou-username", "alice")
            .header("x-fanfou-password", "pw")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "user_id": "u1" }).to_string()))
            .unwrap();
        let response = app(Endpoints::new(server.uri(), server.uri()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[MINTED_TOKEN_HEADER], "t1");
        assert_eq!(response.headers()[MINTED_TOKEN_SECRET_HEADER], "s1");
        assert_eq!(body_json(response).await["用户名"], "Alice");
    }
}
