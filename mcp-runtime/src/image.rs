use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fanfou_core::FanfouError;
use fanfou_core::shape::choose_image_url;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

const IMAGE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Raw image bytes plus the declared media type.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Inline image data for a status photo, as a `data:` URL.
///
/// Never fails the caller: every problem is logged and reported as `None`.
pub async fn inline_data_url(http: &reqwest::Client, large: &str, normal: &str) -> Option<String> {
    match try_inline_data_url(http, large, normal).await {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(event = "inline_image_skipped", error = %err);
            None
        }
    }
}

async fn try_inline_data_url(
    http: &reqwest::Client,
    large: &str,
    normal: &str,
) -> Result<String, FanfouError> {
    let primary = if large.is_empty() { normal } else { large };
    let fallback = if large.is_empty() { "" } else { normal };

    let declared = head_content_length(http, primary).await?;
    let chosen = choose_image_url(declared, primary, fallback);
    if chosen != primary {
        tracing::debug!(
            event = "inline_image_fallback",
            declared_bytes = declared.unwrap_or_default(),
        );
    }

    let image = download(http, chosen).await?;
    Ok(format!(
        "data:{};base64,{}",
        image.content_type,
        STANDARD.encode(&image.bytes)
    ))
}

async fn head_content_length(http: &reqwest::Client, url: &str) -> Result<Option<u64>, FanfouError> {
    let response = http
        .head(url)
        .timeout(IMAGE_TIMEOUT)
        .send()
        .await
        .map_err(|e| FanfouError::ImageFetchFailed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(FanfouError::ImageFetchFailed(format!(
            "HEAD {url} returned HTTP {}",
            response.status().as_u16()
        )));
    }
    Ok(response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok()))
}

/// GET with the image timeout applied.
pub async fn download(http: &reqwest::Client, url: &str) -> Result<Downloaded, FanfouError> {
    let response = http
        .get(url)
        .timeout(IMAGE_TIMEOUT)
        .send()
        .await
        .map_err(|e| FanfouError::ImageFetchFailed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(FanfouError::ImageFetchFailed(format!(
            "GET {url} returned HTTP {}",
            response.status().as_u16()
        )));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FanfouError::ImageFetchFailed(e.to_string()))?;
    Ok(Downloaded {
        bytes: bytes.to_vec(),
        content_type,
    })
}
