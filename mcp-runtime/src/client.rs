use fanfou_core::{ConsumerKey, FanfouError, LoginPair, TokenPair, shape::MutationAction};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::signer::sign;

pub const DEFAULT_API_BASE: &str = "https://api.fanfou.com";
pub const DEFAULT_OAUTH_BASE: &str = "https://fanfou.com";

/// Remote hosts. Overridable so the whole client can be pointed at a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub oauth_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            oauth_base: DEFAULT_OAUTH_BASE.to_string(),
        }
    }
}

impl Endpoints {
    pub fn new(api_base: impl Into<String>, oauth_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            oauth_base: oauth_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// `FANFOU_API_BASE` / `FANFOU_OAUTH_BASE`, falling back to the public hosts.
    pub fn from_env() -> Self {
        let api_base = std::env::var("FANFOU_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());
        let oauth_base =
            std::env::var("FANFOU_OAUTH_BASE").unwrap_or_else(|_| DEFAULT_OAUTH_BASE.into());
        Self::new(api_base, oauth_base)
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Exchange a username/password for an access token pair (x_auth).
pub async fn login(
    http: &reqwest::Client,
    endpoints: &Endpoints,
    consumer: &ConsumerKey,
    credentials: &LoginPair,
) -> Result<TokenPair, FanfouError> {
    const ENDPOINT: &str = "oauth/access_token";
    let url = format!("{}/oauth/access_token", endpoints.oauth_base);
    let params = [
        ("x_auth_username", credentials.username.clone()),
        ("x_auth_password", credentials.password.clone()),
        ("x_auth_mode", "client_auth".to_string()),
    ];
    let signed = sign(&Method::GET, &url, consumer, None, &params);

    tracing::debug!(event = "fanfou_login", username = %credentials.username);
    let response = http
        .get(format!("{url}?{}", signed.encoded_params))
        .header(AUTHORIZATION, signed.authorization)
        .send()
        .await
        .map_err(|e| FanfouError::request_failed(ENDPOINT, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FanfouError::request_failed(ENDPOINT, e))?;
    if !status.is_success() {
        return Err(FanfouError::AuthenticationFailed(format!(
            "HTTP {}: {}",
            status.as_u16(),
            snippet(&body)
        )));
    }

    parse_token_response(&body).ok_or_else(|| {
        FanfouError::AuthenticationFailed(
            "response did not contain oauth_token and oauth_token_secret".to_string(),
        )
    })
}

fn parse_token_response(body: &str) -> Option<TokenPair> {
    let mut token = None;
    let mut secret = None;
    for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }
    match (token, secret) {
        (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
            Some(TokenPair { token, secret })
        }
        _ => None,
    }
}

/// One method per remote endpoint. Returns raw JSON; shaping lives in
/// `fanfou_core::shape`.
#[derive(Debug, Clone)]
pub struct FanfouApi {
    http: reqwest::Client,
    endpoints: Endpoints,
    consumer: ConsumerKey,
    token: TokenPair,
}

impl FanfouApi {
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        consumer: ConsumerKey,
        token: TokenPair,
    ) -> Self {
        Self {
            http,
            endpoints,
            consumer,
            token,
        }
    }

    pub fn token(&self) -> &TokenPair {
        &self.token
    }

    pub async fn verify_credentials(&self) -> Result<Value, FanfouError> {
        self.send(
            Method::POST,
            "account/verify_credentials",
            self.endpoints.api("/account/verify_credentials.json"),
            vec![("mode", "lite".to_string())],
        )
        .await
    }

    pub async fn home_timeline(&self, count: i64, max_id: Option<&str>) -> Result<Value, FanfouError> {
        let mut params = vec![("count", count.to_string()), ("format", "html".to_string())];
        push_opt(&mut params, "max_id", max_id);
        self.send(
            Method::GET,
            "statuses/home_timeline",
            self.endpoints.api("/statuses/home_timeline.json"),
            params,
        )
        .await
    }

    /// A non-empty `query` switches to the search endpoint.
    pub async fn user_timeline(
        &self,
        user_id: &str,
        count: i64,
        max_id: Option<&str>,
        query: Option<&str>,
    ) -> Result<Value, FanfouError> {
        let mut params = vec![
            ("id", user_id.to_string()),
            ("count", count.to_string()),
            ("format", "html".to_string()),
        ];
        push_opt(&mut params, "max_id", max_id);
        match query {
            Some(q) => {
                params.push(("q", q.to_string()));
                self.send(
                    Method::GET,
                    "search/user_timeline",
                    self.endpoints.api("/search/user_timeline.json"),
                    params,
                )
                .await
            }
            None => {
                self.send(
                    Method::GET,
                    "statuses/user_timeline",
                    self.endpoints.api("/statuses/user_timeline.json"),
                    params,
                )
                .await
            }
        }
    }

    pub async fn public_timeline(
        &self,
        count: i64,
        max_id: Option<&str>,
        query: Option<&str>,
    ) -> Result<Value, FanfouError> {
        let mut params = vec![("count", count.to_string()), ("format", "html".to_string())];
        push_opt(&mut params, "max_id", max_id);
        match query {
            Some(q) => {
                params.push(("q", q.to_string()));
                self.send(
                    Method::GET,
                    "search/public_timeline",
                    self.endpoints.api("/search/public_timeline.json"),
                    params,
                )
                .await
            }
            None => {
                self.send(
                    Method::GET,
                    "statuses/public_timeline",
                    self.endpoints.api("/statuses/public_timeline.json"),
                    params,
                )
                .await
            }
        }
    }

    pub async fn user_show(&self, user_id: &str) -> Result<Value, FanfouError> {
        self.send(
            Method::GET,
            "users/show",
            self.endpoints.api("/users/show.json"),
            vec![("id", user_id.to_string()), ("format", "html".to_string())],
        )
        .await
    }

    pub async fn status_show(&self, status_id: &str) -> Result<Value, FanfouError> {
        self.send(
            Method::GET,
            "statuses/show",
            self.endpoints
                .api(&format!("/statuses/show/{}.json", path_segment(status_id))),
            vec![("format", "html".to_string())],
        )
        .await
    }

    pub async fn favorite(&self, action: MutationAction, status_id: &str) -> Result<Value, FanfouError> {
        let path = format!(
            "/favorites/{}/{}.json",
            action.as_str(),
            path_segment(status_id)
        );
        let endpoint = match action {
            MutationAction::Create => "favorites/create",
            MutationAction::Destroy => "favorites/destroy",
        };
        self.send(Method::POST, endpoint, self.endpoints.api(&path), Vec::new())
            .await
    }

    pub async fn friendship(&self, action: MutationAction, user_id: &str) -> Result<Value, FanfouError> {
        let endpoint = match action {
            MutationAction::Create => "friendships/create",
            MutationAction::Destroy => "friendships/destroy",
        };
        self.send(
            Method::POST,
            endpoint,
            self.endpoints
                .api(&format!("/friendships/{}.json", action.as_str())),
            vec![("id", user_id.to_string())],
        )
        .await
    }

    pub async fn update_status(&self, text: &str) -> Result<Value, FanfouError> {
        self.send(
            Method::POST,
            "statuses/update",
            self.endpoints.api("/statuses/update.json"),
            vec![("status", text.to_string())],
        )
        .await
    }

    pub async fn destroy_status(&self, status_id: &str) -> Result<Value, FanfouError> {
        self.send(
            Method::POST,
            "statuses/destroy",
            self.endpoints.api("/statuses/destroy.json"),
            vec![("id", status_id.to_string())],
        )
        .await
    }

    /// Multipart upload. The signature covers only the OAuth parameters.
    pub async fn upload_photo(
        &self,
        text: &str,
        photo: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, FanfouError> {
        const ENDPOINT: &str = "photos/upload";
        let url = self.endpoints.api("/photos/upload.json");
        let signed = sign(&Method::POST, &url, &self.consumer, Some(&self.token), &[]);

        let part = reqwest::multipart::Part::bytes(photo)
            .file_name(format!("photo.{}", extension_for(content_type)))
            .mime_str(content_type)
            .map_err(|e| FanfouError::request_failed(ENDPOINT, e))?;
        let form = reqwest::multipart::Form::new()
            .part("photo", part)
            .text("status", text.to_string());

        tracing::debug!(event = "fanfou_request", endpoint = ENDPOINT, method = "POST");
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, signed.authorization)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FanfouError::request_failed(ENDPOINT, e))?;
        read_json(ENDPOINT, response).await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &'static str,
        url: String,
        params: Vec<(&str, String)>,
    ) -> Result<Value, FanfouError> {
        let signed = sign(&method, &url, &self.consumer, Some(&self.token), &params);
        tracing::debug!(event = "fanfou_request", endpoint, method = %method);

        let request = if method == Method::GET {
            let url = if signed.encoded_params.is_empty() {
                url
            } else {
                format!("{url}?{}", signed.encoded_params)
            };
            self.http.get(url)
        } else {
            self.http
                .request(method, url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(signed.encoded_params)
        };

        let response = request
            .header(AUTHORIZATION, signed.authorization)
            .send()
            .await
            .map_err(|e| FanfouError::request_failed(endpoint, e))?;
        read_json(endpoint, response).await
    }
}

async fn read_json(endpoint: &str, response: reqwest::Response) -> Result<Value, FanfouError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FanfouError::request_failed(endpoint, e))?;
    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes);
        return Err(FanfouError::request_failed(
            endpoint,
            format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
        ));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| FanfouError::request_failed(endpoint, format!("invalid JSON body: {e}")))
}

fn push_opt(params: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        params.push((key, value.to_string()));
    }
}

fn path_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    }
}
