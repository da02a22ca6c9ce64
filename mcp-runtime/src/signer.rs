use std::borrow::Cow;

use fanfou_core::{ConsumerKey, TokenPair};
use oauth_client::{ParamList, Token};
use reqwest::Method;

/// Output of HMAC-SHA1 signing for one request.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Value for the `Authorization` header.
    pub authorization: String,
    /// The signed parameters, percent-encoded. Goes in the query string for
    /// GET and in the form body for POST.
    pub encoded_params: String,
}

/// Sign `method url` with the consumer key and optional access token.
///
/// `url` must not carry a query string: every request parameter has to be
/// passed through `params` so that it is covered by the signature. Multipart
/// uploads pass no params; their body is not part of the signature base.
///
/// The request itself may go over HTTPS, but FanFou verifies signatures
/// against the `http://` form of the URL, so that is what gets signed.
pub fn sign(
    method: &Method,
    url: &str,
    consumer: &ConsumerKey,
    token: Option<&TokenPair>,
    params: &[(&str, String)],
) -> SignedRequest {
    let consumer = Token::new(consumer.key.as_str(), consumer.secret.as_str());
    let token = token.map(|pair| Token::new(pair.token.as_str(), pair.secret.as_str()));

    let param_list: ParamList<'_> = params
        .iter()
        .map(|(key, value)| (Cow::Borrowed(*key), Cow::Borrowed(value.as_str())))
        .collect();
    let other = (!param_list.is_empty()).then_some(&param_list);

    let base_url = signature_base_url(url);
    let (authorization, encoded_params) = oauth_client::authorization_header(
        method.as_str(),
        &base_url,
        &consumer,
        token.as_ref(),
        other,
    );
    SignedRequest {
        authorization,
        encoded_params,
    }
}

/// `https://host/path` becomes `http://host/path`; anything else is kept.
pub fn signature_base_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.scheme() == "https" => {
            let default_port = parsed.port().is_none() || parsed.port() == Some(443);
            if parsed.set_scheme("http").is_err() {
                return url.to_string();
            }
            if default_port {
                // The http default, so the serialized form carries no port.
                let _ = parsed.set_port(None);
            }
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
