use std::sync::atomic::{AtomicBool, Ordering};

use fanfou_core::{CredentialField, Credentials, FanfouError, Grant, TokenPair};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::client::{self, Endpoints, FanfouApi};

/// An authenticated connection to FanFou.
///
/// Opening a session performs the login exchange when only a password grant
/// is available. The caller's own user id is looked up on first use and then
/// kept for the life of the session.
#[derive(Debug)]
pub struct Session {
    api: FanfouApi,
    minted: Option<TokenPair>,
    minted_surfaced: AtomicBool,
    current_user: OnceCell<String>,
}

impl Session {
    pub async fn open(
        http: reqwest::Client,
        endpoints: Endpoints,
        credentials: &Credentials,
    ) -> Result<Self, FanfouError> {
        let consumer = credentials.consumer().clone();
        let (token, minted) = match credentials.grant() {
            Grant::Token(pair) => (pair.clone(), None),
            Grant::Password(login) => {
                let pair = client::login(&http, &endpoints, &consumer, login).await?;
                report_minted_token(&pair);
                (pair.clone(), Some(pair))
            }
        };
        Ok(Self {
            api: FanfouApi::new(http, endpoints, consumer, token),
            minted,
            minted_surfaced: AtomicBool::new(false),
            current_user: OnceCell::new(),
        })
    }

    pub fn api(&self) -> &FanfouApi {
        &self.api
    }

    /// The token pair minted when this session logged in, returned only on
    /// the first call so it reaches the caller exactly once.
    pub fn take_minted(&self) -> Option<TokenPair> {
        let pair = self.minted.as_ref()?;
        if self.minted_surfaced.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(pair.clone())
    }

    pub async fn current_user_id(&self) -> Result<&str, FanfouError> {
        let id = self
            .current_user
            .get_or_try_init(|| async {
                let me = self.api.verify_credentials().await?;
                user_id_of(&me).ok_or_else(|| {
                    FanfouError::request_failed(
                        "account/verify_credentials",
                        "response did not include a user id",
                    )
                })
            })
            .await?;
        Ok(id.as_str())
    }

    /// `None` (or empty) means the authenticated caller.
    pub async fn resolve_user_id(&self, user_id: Option<&str>) -> Result<String, FanfouError> {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Ok(id.to_string()),
            None => Ok(self.current_user_id().await?.to_string()),
        }
    }
}

fn user_id_of(profile: &Value) -> Option<String> {
    match profile.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

fn report_minted_token(pair: &TokenPair) {
    tracing::info!(
        event = "oauth_token_minted",
        token_var = CredentialField::OAuthToken.env_var(),
        token_secret_var = CredentialField::OAuthTokenSecret.env_var(),
        oauth_token = %pair.token,
        oauth_token_secret = %pair.secret,
        "store the minted token pair and drop the username/password"
    );
}
