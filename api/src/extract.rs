//! Request extractors for the tool routes.
//!
//! `HeaderCredentials` lifts the `X-Fanfou-*` headers into a credential
//! source so every request authenticates on its own. `ToolArguments` accepts
//! an empty body as `{}` and turns malformed JSON into a structured
//! `AppError` instead of axum's plain-text rejection.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use fanfou_core::{CredentialField, CredentialSource, FieldNaming};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Credential values copied out of the inbound request headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderCredentials {
    values: HashMap<CredentialField, String>,
}

impl HeaderCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let values = CredentialField::ALL
            .into_iter()
            .filter_map(|field| {
                // Non-ASCII values arrive as raw UTF-8 bytes.
                let value = headers.get(field.header_name())?;
                let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
                Some((field, value))
            })
            .collect();
        Self { values }
    }
}

impl CredentialSource for HeaderCredentials {
    fn lookup(&self, field: CredentialField) -> Option<String> {
        self.values.get(&field).cloned()
    }

    fn naming(&self) -> FieldNaming {
        FieldNaming::Header
    }
}

impl<S> FromRequestParts<S> for HeaderCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Tool call arguments: a JSON object, or nothing at all.
#[derive(Debug, Default)]
pub struct ToolArguments(pub Map<String, Value>);

impl<S> FromRequest<S> for ToolArguments
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation {
                message: format!("Failed to read request body: {}", rejection.body_text()),
                field: Some("body".to_string()),
                docs_hint: None,
            })?;
        parse_arguments(&body).map(ToolArguments)
    }
}

fn parse_arguments(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(AppError::Validation {
            message: "Tool arguments must be a JSON object".to_string(),
            field: Some("body".to_string()),
            docs_hint: Some("Send the arguments as {\"name\": value, ...}.".to_string()),
        }),
        Err(err) => Err(AppError::Validation {
            message: format!("Invalid JSON body: {err}"),
            field: Some("body".to_string()),
            docs_hint: Some(
                "See GET /api/tools for each tool's input schema.".to_string(),
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_names_are_case_insensitive_and_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert("x-fanfou-api-key", HeaderValue::from_static(" ck "));
        headers.insert("X-FANFOU-OAUTH-TOKEN", HeaderValue::from_static("tok"));

        let source = HeaderCredentials::from_headers(&headers);
        assert_eq!(source.lookup(CredentialField::ApiKey).as_deref(), Some("ck"));
        assert_eq!(source.lookup(CredentialField::OAuthToken).as_deref(), Some("tok"));
        assert!(source.lookup(CredentialField::Password).is_none());
        assert_eq!(source.naming(), FieldNaming::Header);
    }

    #[test]
    fn non_ascii_header_values_are_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-fanfou-password",
            HeaderValue::from_bytes("pässwörd饭".as_bytes()).unwrap(),
        );
        headers.insert("x-fanfou-username", HeaderValue::from_static("alice"));

        let source = HeaderCredentials::from_headers(&headers);
        assert_eq!(
            source.lookup(CredentialField::Password).as_deref(),
            Some("pässwörd饭")
        );
    }

    #[test]
    fn empty_or_null_body_means_no_arguments() {
        assert!(parse_arguments(b"").unwrap().is_empty());
        assert!(parse_arguments(b"  \n").unwrap().is_empty());
        assert!(parse_arguments(b"null").unwrap().is_empty());
        assert_eq!(parse_arguments(br#"{"count": 3}"#).unwrap()["count"], 3);
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(
            parse_arguments(b"[1, 2]"),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse_arguments(b"{oops"),
            Err(AppError::Validation { .. })
        ));
    }
}
